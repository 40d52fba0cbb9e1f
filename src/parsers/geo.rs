use crate::domain::{Record, Registry};
use crate::error::KiraError;
use crate::registry::{ParsedSummary, RawSummary, SampleEvidence, SummaryParser};

use super::{as_object, clean_text, first_non_empty, missing_accession, text_field};

/// GEO DataSets (`gds`). Series records are reported under their GSE accession.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoParser;

impl SummaryParser for GeoParser {
    fn parse_summary(
        &self,
        summary: &RawSummary,
        condition: &str,
    ) -> Result<ParsedSummary, KiraError> {
        let fields = as_object(Registry::Geo, summary)?;
        let series = text_field(fields, "gse")
            .split(|ch: char| ch == ';' || ch == ',')
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(|value| format!("GSE{value}"))
            .unwrap_or_default();
        let id = first_non_empty([
            series,
            text_field(fields, "accession"),
            text_field(fields, "uid"),
        ])
        .ok_or_else(|| missing_accession(Registry::Geo))?;

        let title = clean_text(&text_field(fields, "title"));
        let summary_text = clean_text(&text_field(fields, "summary"));

        let mut record = Record::new(Registry::Geo, condition, id);
        record.description = if summary_text.is_empty() {
            title.clone()
        } else {
            format!("{title}. {summary_text}")
        };
        record.organism = clean_text(&text_field(fields, "taxon"));
        for (key, source) in [
            ("platform_technology", "ptechtype"),
            ("n_samples", "n_samples"),
            ("entry_type", "entrytype"),
            ("gds_type", "gdstype"),
            ("publication_date", "pdat"),
            ("ftp_link", "ftplink"),
        ] {
            let value = text_field(fields, source);
            if !value.is_empty() {
                record.extra.insert(key.to_string(), value);
            }
        }

        let evidence = clean_text(&format!("{title} {summary_text}"));
        record.title = title;
        Ok(ParsedSummary {
            record,
            sample_evidence: SampleEvidence::Text(evidence),
        })
    }
}
