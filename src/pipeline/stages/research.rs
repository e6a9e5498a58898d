//! Research stage: one search pass distilled into a dossier.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;

use crate::pipeline::artifact::{ResearchDossier, SourceSnippet, StagePayload};
use crate::pipeline::stage::{RunState, Stage, StageContext};
use crate::pipeline::{StageError, StageName};

const MAX_KEY_FACTS: usize = 8;
/// Snippets feeding the summary line.
const SUMMARY_SOURCES: usize = 3;

pub(crate) struct ResearchStage;

#[async_trait]
impl Stage for ResearchStage {
    fn name(&self) -> StageName {
        StageName::Research
    }

    async fn run(&self, state: &RunState, ctx: &StageContext) -> Result<StagePayload, StageError> {
        let raw = ctx
            .providers
            .search
            .research(&state.topic)
            .await
            .map_err(|e| StageError::provider(StageName::Research, e))?;
        let dossier = distill(&state.topic, raw);
        debug!(
            snippets = dossier.snippets.len(),
            facts = dossier.key_facts.len(),
            "research distilled"
        );
        Ok(StagePayload::Research(dossier))
    }
}

fn distill(topic: &str, raw: Vec<SourceSnippet>) -> ResearchDossier {
    // Engines repeat URLs across result types; keep the best-ranked copy.
    let mut seen = HashSet::new();
    let mut snippets: Vec<SourceSnippet> =
        raw.into_iter().filter(|s| seen.insert(s.url.clone())).collect();
    for (rank, snippet) in snippets.iter_mut().enumerate() {
        snippet.rank = rank;
    }

    let key_facts: Vec<String> = snippets
        .iter()
        .map(|s| s.snippet.trim())
        .filter(|t| !t.is_empty())
        .take(MAX_KEY_FACTS)
        .map(str::to_string)
        .collect();

    let summary = if key_facts.is_empty() {
        format!("No usable sources found for \"{topic}\".")
    } else {
        key_facts.iter().take(SUMMARY_SOURCES).cloned().collect::<Vec<_>>().join(" ")
    };

    let relevant_urls = snippets.iter().map(|s| s.url.clone()).collect();
    ResearchDossier { topic: topic.to_string(), snippets, key_facts, summary, relevant_urls }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str, snippet: &str, rank: usize) -> SourceSnippet {
        SourceSnippet {
            title: format!("title {rank}"),
            url: url.to_string(),
            snippet: snippet.to_string(),
            rank,
        }
    }

    #[test]
    fn duplicate_urls_keep_the_first_hit() {
        let dossier = distill(
            "claude 4",
            vec![
                hit("https://a.example", "first", 0),
                hit("https://b.example", "second", 1),
                hit("https://a.example", "repeat", 2),
            ],
        );
        assert_eq!(dossier.snippets.len(), 2);
        assert_eq!(dossier.snippets[0].snippet, "first");
        assert_eq!(dossier.relevant_urls, ["https://a.example", "https://b.example"]);
        // ranks are rewritten to the deduplicated order
        assert_eq!(dossier.snippets[1].rank, 1);
    }

    #[test]
    fn key_facts_skip_empty_snippets_and_cap_out() {
        let mut raw: Vec<SourceSnippet> =
            (0..12).map(|i| hit(&format!("https://s{i}.example"), &format!("fact {i}"), i)).collect();
        raw[1].snippet = "   ".to_string();
        let dossier = distill("claude 4", raw);
        assert_eq!(dossier.key_facts.len(), MAX_KEY_FACTS);
        assert!(!dossier.key_facts.contains(&"   ".to_string()));
        assert!(dossier.summary.starts_with("fact 0"));
    }

    #[test]
    fn empty_results_still_produce_a_dossier() {
        let dossier = distill("obscure topic", vec![]);
        assert!(dossier.snippets.is_empty());
        assert!(dossier.summary.contains("obscure topic"));
    }
}
