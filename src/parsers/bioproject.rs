use crate::domain::{Record, Registry};
use crate::error::KiraError;
use crate::registry::{ParsedSummary, RawSummary, SampleEvidence, SummaryParser};

use super::{as_object, clean_text, first_non_empty, missing_accession, text_field};

#[derive(Debug, Clone, Copy, Default)]
pub struct BioProjectParser;

impl SummaryParser for BioProjectParser {
    fn parse_summary(
        &self,
        summary: &RawSummary,
        condition: &str,
    ) -> Result<ParsedSummary, KiraError> {
        let fields = as_object(Registry::BioProject, summary)?;
        let id = first_non_empty([text_field(fields, "project_acc"), text_field(fields, "uid")])
            .ok_or_else(|| missing_accession(Registry::BioProject))?;

        let mut record = Record::new(Registry::BioProject, condition, id);
        record.title = clean_text(&text_field(fields, "project_title"));
        record.description = clean_text(&text_field(fields, "project_description"));
        record.organism = clean_text(&text_field(fields, "organism_name"));
        for (key, source) in [
            ("project_data_type", "project_data_type"),
            ("registration_date", "registration_date"),
            ("project_subtype", "project_type"),
        ] {
            let value = text_field(fields, source);
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

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_project_fields() {
        let summary = json!({
            "uid": "1020304",
            "project_acc": "PRJNA1020304",
            "project_title": "Salt  stress\ntranscriptome",
            "project_description": "RNA-seq of roots",
            "organism_name": "Arabidopsis thaliana",
            "project_data_type": "Transcriptome or Gene expression",
            "registration_date": "2023/10/01 00:00"
        });
        let parsed = BioProjectParser.parse_summary(&summary, "salt").unwrap();
        let record = parsed.record;
        assert_eq!(record.id, "PRJNA1020304");
        assert_eq!(record.title, "Salt stress transcriptome");
        assert_eq!(record.organism, "Arabidopsis thaliana");
        assert_eq!(record.condition, "salt");
        assert_eq!(record.extra["project_data_type"], "Transcriptome or Gene expression");
        assert!(!record.extra.contains_key("project_subtype"));
        assert_eq!(parsed.sample_evidence, SampleEvidence::None);
    }

    #[test]
    fn falls_back_to_uid() {
        let summary = json!({"uid": "42", "project_acc": ""});
        let parsed = BioProjectParser.parse_summary(&summary, "salt").unwrap();
        assert_eq!(parsed.record.id, "42");
    }

    #[test]
    fn missing_accession_fails() {
        let summary = json!({"project_title": "orphan"});
        assert!(BioProjectParser.parse_summary(&summary, "salt").is_err());
    }
}
