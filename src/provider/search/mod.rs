//! Builtin search providers: `google`, `bing`, `serpapi`, `searx`.
//!
//! Each runs the topic as one query against the engine's public JSON API and
//! returns a ranked snapshot of snippets, capped at `search.max_results`.

mod bing;
mod google;
mod searx;
mod serpapi;

pub use bing::BingSearch;
pub use google::GoogleSearch;
pub use searx::SearxSearch;
pub use serpapi::SerpApiSearch;
