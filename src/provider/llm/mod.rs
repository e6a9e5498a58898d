//! Builtin LLM providers: `claude`, `openai`, `gemini`.
//!
//! Each is a thin call-through to the vendor's chat API. Prompt assembly and
//! response parsing are shared in [`prompt`]; the vendor modules only speak
//! their wire format and map failures onto the common taxonomy.

mod claude;
mod gemini;
mod openai;
pub(crate) mod prompt;

pub use claude::ClaudeProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
