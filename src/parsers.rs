//! esummary JSON parsers, one per registry.

pub mod bioproject;
pub mod geo;
pub mod pubmed;
pub mod sra;

use serde_json::Value;

use crate::domain::Registry;
use crate::error::KiraError;
use crate::registry::{RawSummary, SummaryParser};

pub use bioproject::BioProjectParser;
pub use geo::GeoParser;
pub use pubmed::PubMedParser;
pub use sra::SraParser;

pub fn parser_for(registry: Registry) -> Box<dyn SummaryParser> {
    match registry {
        Registry::BioProject => Box::new(BioProjectParser),
        Registry::Sra => Box::new(SraParser),
        Registry::Geo => Box::new(GeoParser),
        Registry::PubMed => Box::new(PubMedParser),
    }
}

/// Collapses runs of whitespace and trims the ends.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The summary as a JSON object, or a parse error naming the registry.
pub(crate) fn as_object(
    registry: Registry,
    summary: &RawSummary,
) -> Result<&serde_json::Map<String, Value>, KiraError> {
    summary.as_object().ok_or_else(|| KiraError::SummaryParse {
        registry: registry.display_name().to_string(),
        id: "unknown".to_string(),
        message: "summary is not a JSON object".to_string(),
    })
}

/// A string field, tolerating numbers and arrays of strings.
pub(crate) fn text_field(summary: &serde_json::Map<String, Value>, key: &str) -> String {
    match summary.get(key) {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

pub(crate) fn first_non_empty(values: impl IntoIterator<Item = String>) -> Option<String> {
    values.into_iter().find(|value| !value.trim().is_empty())
}

pub(crate) fn missing_accession(registry: Registry) -> KiraError {
    KiraError::SummaryParse {
        registry: registry.display_name().to_string(),
        id: "unknown".to_string(),
        message: "no usable accession".to_string(),
    }
}
