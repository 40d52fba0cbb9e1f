use serde_json::Value;

use crate::domain::{Record, Registry};
use crate::error::KiraError;
use crate::registry::{ParsedSummary, RawSummary, SampleEvidence, SummaryParser};
use crate::vocabulary::MODEL_PLANT_ORGANISMS;

use super::{as_object, clean_text, missing_accession, text_field};

const LISTED_AUTHORS: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct PubMedParser;

impl SummaryParser for PubMedParser {
    fn parse_summary(
        &self,
        summary: &RawSummary,
        condition: &str,
    ) -> Result<ParsedSummary, KiraError> {
        let fields = as_object(Registry::PubMed, summary)?;
        let pmid = text_field(fields, "uid");
        if pmid.is_empty() {
            return Err(missing_accession(Registry::PubMed));
        }

        let title = clean_text(&text_field(fields, "title"));
        let names: Vec<&str> = fields
            .get("authors")
            .and_then(Value::as_array)
            .map(|authors| {
                authors
                    .iter()
                    .filter_map(|author| author.get("name").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();
        let mut authors = names
            .iter()
            .take(LISTED_AUTHORS)
            .copied()
            .collect::<Vec<_>>()
            .join(", ");
        if names.len() > LISTED_AUTHORS {
            authors.push_str(", et al.");
        }
        let source = text_field(fields, "source");
        let journal = match text_field(fields, "fulljournalname") {
            full if full.is_empty() => source.clone(),
            full => full,
        };
        let pubdate = text_field(fields, "pubdate");
        let doi = fields
            .get("articleids")
            .and_then(Value::as_array)
            .and_then(|ids| {
                ids.iter().find(|id| {
                    id.get("idtype").and_then(Value::as_str) == Some("doi")
                })
            })
            .and_then(|id| id.get("value").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();

        let mut parts = Vec::new();
        if !authors.is_empty() {
            parts.push(authors.clone());
        }
        if !source.is_empty() {
            parts.push(source);
        }
        if !pubdate.is_empty() {
            parts.push(format!("({pubdate})"));
        }

        let mut record = Record::new(Registry::PubMed, condition, format!("PMID:{pmid}"));
        record.description = clean_text(&parts.join(". "));
        record.organism = organism_in_title(&title).unwrap_or_default().to_string();
        record.title = title;
        for (key, value) in [
            ("authors", authors),
            ("journal", journal),
            ("pubdate", pubdate),
            ("doi", doi),
        ] {
            if !value.is_empty() {
                record.extra.insert(key.to_string(), value);
            }
        }

        Ok(ParsedSummary {
            record,
            sample_evidence: SampleEvidence::None,
        })
    }
}

fn organism_in_title(title: &str) -> Option<&'static str> {
    let title = title.to_lowercase();
    MODEL_PLANT_ORGANISMS
        .iter()
        .copied()
        .find(|organism| title.contains(&organism.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_article_summary() {
        let summary = json!({
            "uid": "38000001",
            "title": "Salt tolerance in Oryza sativa roots",
            "authors": [
                {"name": "Li X", "authtype": "Author"},
                {"name": "Wang Y", "authtype": "Author"},
                {"name": "Chen Z", "authtype": "Author"},
                {"name": "Zhao Q", "authtype": "Author"}
            ],
            "source": "Plant J",
            "fulljournalname": "The Plant journal",
            "pubdate": "2024 Mar",
            "articleids": [
                {"idtype": "pubmed", "value": "38000001"},
                {"idtype": "doi", "value": "10.1111/tpj.1"}
            ]
        });
        let parsed = PubMedParser.parse_summary(&summary, "salt").unwrap();
        let record = &parsed.record;
        assert_eq!(record.id, "PMID:38000001");
        assert_eq!(record.organism, "Oryza sativa");
        assert_eq!(
            record.description,
            "Li X, Wang Y, Chen Z, et al.. Plant J. (2024 Mar)"
        );
        assert_eq!(record.extra["journal"], "The Plant journal");
        assert_eq!(record.extra["doi"], "10.1111/tpj.1");
        assert_eq!(parsed.sample_evidence, SampleEvidence::None);
    }

    #[test]
    fn organism_is_blank_without_model_match() {
        let summary = json!({"uid": "5", "title": "A survey of stress genes"});
        let parsed = PubMedParser.parse_summary(&summary, "salt").unwrap();
        assert_eq!(parsed.record.organism, "");
        assert_eq!(parsed.record.description, "");
    }

    #[test]
    fn missing_uid_fails() {
        assert!(PubMedParser.parse_summary(&json!({"title": "x"}), "salt").is_err());
    }
}
