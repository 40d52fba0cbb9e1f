use std::sync::Arc;

use tracing::warn;

use crate::domain::{Record, Registry};
use crate::error::KiraError;
use crate::ncbi::{EntrezClient, EntrezFetcher};
use crate::parsers;

/// One esummary document exactly as the registry returned it.
pub type RawSummary = serde_json::Value;

/// What a parser found out about the sample a record was taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleEvidence {
    /// A structured field named the sample.
    Explicit(String),
    /// Free text that may mention the sample.
    Text(String),
    /// The registry carries no sample information.
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSummary {
    pub record: Record,
    pub sample_evidence: SampleEvidence,
}

#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub parsed: Vec<ParsedSummary>,
    pub failures: usize,
}

pub trait Fetcher: Send + Sync {
    fn fetch_ids(&self, query: &str) -> Result<Vec<String>, KiraError>;
    fn fetch_summaries(&self, ids: &[String]) -> Result<Vec<RawSummary>, KiraError>;
}

pub trait SummaryParser: Send + Sync {
    fn parse_summary(
        &self,
        summary: &RawSummary,
        condition: &str,
    ) -> Result<ParsedSummary, KiraError>;

    /// Parses every summary, skipping the ones that fail.
    fn parse_summaries(&self, summaries: &[RawSummary], condition: &str) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();
        for summary in summaries {
            match self.parse_summary(summary, condition) {
                Ok(parsed) => outcome.parsed.push(parsed),
                Err(err) => {
                    warn!(error = %err, "skipping unparseable summary");
                    outcome.failures += 1;
                }
            }
        }
        outcome
    }
}

/// A registry together with the collaborators that query and parse it.
pub struct RegistrySource {
    pub registry: Registry,
    pub fetcher: Box<dyn Fetcher>,
    pub parser: Box<dyn SummaryParser>,
}

impl RegistrySource {
    pub fn new(
        registry: Registry,
        fetcher: Box<dyn Fetcher>,
        parser: Box<dyn SummaryParser>,
    ) -> Self {
        Self {
            registry,
            fetcher,
            parser,
        }
    }
}

/// Builds a live NCBI source for every requested registry, in order.
pub fn ncbi_sources(client: Arc<EntrezClient>, registries: &[Registry]) -> Vec<RegistrySource> {
    registries
        .iter()
        .map(|&registry| {
            RegistrySource::new(
                registry,
                Box::new(EntrezFetcher::new(Arc::clone(&client), registry)),
                parsers::parser_for(registry),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct FlakyParser;

    impl SummaryParser for FlakyParser {
        fn parse_summary(
            &self,
            summary: &RawSummary,
            condition: &str,
        ) -> Result<ParsedSummary, KiraError> {
            let id = summary["id"].as_str().ok_or_else(|| KiraError::SummaryParse {
                registry: "GEO".to_string(),
                id: "unknown".to_string(),
                message: "missing id".to_string(),
            })?;
            Ok(ParsedSummary {
                record: Record::new(Registry::Geo, condition, id),
                sample_evidence: SampleEvidence::None,
            })
        }
    }

    #[test]
    fn parse_summaries_counts_failures() {
        let summaries = vec![json!({"id": "GSE1"}), json!({}), json!({"id": "GSE2"})];
        let outcome = FlakyParser.parse_summaries(&summaries, "salt");
        assert_eq!(outcome.parsed.len(), 2);
        assert_eq!(outcome.failures, 1);
        assert_eq!(outcome.parsed[1].record.id, "GSE2");
    }
}
