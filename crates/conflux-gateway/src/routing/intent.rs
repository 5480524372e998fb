//! Query intent classification.

use tracing::debug;

/// Intent category of a query, matched against platform capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    /// Factual lookup against curated knowledge.
    KnowledgeLookup,
    /// Search over documents and records.
    DocumentSearch,
    /// Multi-step process execution.
    MultiStepAutomation,
    /// Free-form conversation (the default).
    OpenConversation,
    /// Data inspection and reporting.
    DataAnalysis,
}

impl std::fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryIntent::KnowledgeLookup => write!(f, "knowledge-lookup"),
            QueryIntent::DocumentSearch => write!(f, "document-search"),
            QueryIntent::MultiStepAutomation => write!(f, "multi-step-automation"),
            QueryIntent::OpenConversation => write!(f, "open-conversation"),
            QueryIntent::DataAnalysis => write!(f, "data-analysis"),
        }
    }
}

impl QueryIntent {
    /// Capability tags a platform should declare to serve this intent.
    #[must_use]
    pub fn capability_tags(&self) -> &'static [&'static str] {
        match self {
            QueryIntent::KnowledgeLookup => &["knowledge-retrieval", "document-qa"],
            QueryIntent::DocumentSearch => &["document-search", "hybrid-retrieval"],
            QueryIntent::MultiStepAutomation => {
                &["multi-step-automation", "workflow-execution"]
            }
            QueryIntent::OpenConversation => &["conversational"],
            QueryIntent::DataAnalysis => &["data-analysis", "workflow-execution"],
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            QueryIntent::KnowledgeLookup => {
                &["what is", "define", "definition", "explain", "describe", "overview", "guide"]
            }
            QueryIntent::DocumentSearch => &[
                "document", "policy", "retention", "report", "manual", "handbook", "paper",
                "records", "file",
            ],
            QueryIntent::MultiStepAutomation => &[
                "automate", "automation", "workflow", "schedule", "trigger", "pipeline",
                "sync", "batch job", "every hour", "every day",
            ],
            QueryIntent::DataAnalysis => {
                &["analyze", "analysis", "statistics", "metric", "trend", "chart", "aggregate"]
            }
            QueryIntent::OpenConversation => &[],
        }
    }

    /// Classifies a query by keyword scoring; ties and no-matches fall back
    /// to `OpenConversation`.
    #[must_use]
    pub fn classify(query: &str) -> Self {
        let lower = query.to_lowercase();

        let candidates = [
            QueryIntent::KnowledgeLookup,
            QueryIntent::DocumentSearch,
            QueryIntent::MultiStepAutomation,
            QueryIntent::DataAnalysis,
        ];

        let mut best = QueryIntent::OpenConversation;
        let mut best_hits = 0usize;
        for intent in candidates {
            let hits =
                intent.keywords().iter().filter(|k| lower.contains(*k)).count();
            if hits > best_hits {
                best_hits = hits;
                best = intent;
            }
        }

        debug!(intent = %best, hits = best_hits, "Classified query intent");
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_queries() {
        assert_eq!(
            QueryIntent::classify("explain our data retention policy"),
            QueryIntent::DocumentSearch
        );
        assert_eq!(
            QueryIntent::classify("find the onboarding handbook"),
            QueryIntent::DocumentSearch
        );
    }

    #[test]
    fn test_automation_queries() {
        assert_eq!(
            QueryIntent::classify("automate the customer sync workflow every hour"),
            QueryIntent::MultiStepAutomation
        );
    }

    #[test]
    fn test_knowledge_queries() {
        assert_eq!(
            QueryIntent::classify("what is a service level objective"),
            QueryIntent::KnowledgeLookup
        );
    }

    #[test]
    fn test_analysis_queries() {
        assert_eq!(
            QueryIntent::classify("analyze the latency trend for last week"),
            QueryIntent::DataAnalysis
        );
    }

    #[test]
    fn test_default_is_open_conversation() {
        assert_eq!(QueryIntent::classify("hello there"), QueryIntent::OpenConversation);
        assert_eq!(QueryIntent::classify(""), QueryIntent::OpenConversation);
    }

    #[test]
    fn test_capability_tags_are_nonempty() {
        for intent in [
            QueryIntent::KnowledgeLookup,
            QueryIntent::DocumentSearch,
            QueryIntent::MultiStepAutomation,
            QueryIntent::OpenConversation,
            QueryIntent::DataAnalysis,
        ] {
            assert!(!intent.capability_tags().is_empty());
        }
    }
}
