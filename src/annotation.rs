use serde::Serialize;

use crate::domain::ConfidenceTier;
use crate::vocabulary::{GENERAL_SAMPLE_KEYWORDS, PLANT_SAMPLE_KEYWORDS, is_plant_organism, owned};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleAnnotation {
    pub label: Option<String>,
    pub confidence: ConfidenceTier,
}

impl SampleAnnotation {
    fn unknown() -> Self {
        Self {
            label: None,
            confidence: ConfidenceTier::Unknown,
        }
    }
}

/// Keyword-based sample/tissue inference.
///
/// Matching is a case-insensitive substring search. When several keywords
/// occur in the text, the one listed first in the vocabulary wins, so
/// vocabulary order is the tie-break policy.
#[derive(Debug, Clone)]
pub struct SampleAnnotationInferencer {
    plant: Vec<String>,
    general: Vec<String>,
    custom: Option<Vec<String>>,
}

impl Default for SampleAnnotationInferencer {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleAnnotationInferencer {
    pub fn new() -> Self {
        Self {
            plant: owned(PLANT_SAMPLE_KEYWORDS),
            general: owned(GENERAL_SAMPLE_KEYWORDS),
            custom: None,
        }
    }

    /// Uses one vocabulary for every organism.
    pub fn with_vocabulary(vocabulary: Vec<String>) -> Self {
        Self {
            custom: Some(vocabulary),
            ..Self::new()
        }
    }

    pub fn vocabulary_for(&self, organism: &str) -> &[String] {
        if let Some(custom) = &self.custom {
            return custom;
        }
        if is_plant_organism(organism) {
            &self.plant
        } else {
            &self.general
        }
    }

    pub fn infer(&self, text: &str, organism: &str) -> SampleAnnotation {
        let text = text.trim();
        if text.is_empty() {
            return SampleAnnotation::unknown();
        }
        let haystack = text.to_lowercase();
        self.vocabulary_for(organism)
            .iter()
            .find(|keyword| {
                let keyword = keyword.trim();
                !keyword.is_empty() && haystack.contains(&keyword.to_lowercase())
            })
            .map(|keyword| SampleAnnotation {
                label: Some(keyword.clone()),
                confidence: ConfidenceTier::Inferred,
            })
            .unwrap_or_else(SampleAnnotation::unknown)
    }

    /// A non-blank structured value short-circuits the keyword search.
    pub fn infer_with_explicit(
        &self,
        explicit: Option<&str>,
        text: &str,
        organism: &str,
    ) -> SampleAnnotation {
        match explicit.map(str::trim).filter(|value| !value.is_empty()) {
            Some(label) => SampleAnnotation {
                label: Some(label.to_string()),
                confidence: ConfidenceTier::Explicit,
            },
            None => self.infer(text, organism),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_keyword_is_inferred() {
        let inferencer = SampleAnnotationInferencer::new();
        let annotation = inferencer.infer("RNA from Arabidopsis Pollen", "Arabidopsis thaliana");
        assert_eq!(annotation.label.as_deref(), Some("pollen"));
        assert_eq!(annotation.confidence, ConfidenceTier::Inferred);
    }

    #[test]
    fn empty_text_is_unknown() {
        let inferencer = SampleAnnotationInferencer::new();
        let annotation = inferencer.infer("   ", "Arabidopsis thaliana");
        assert_eq!(annotation.label, None);
        assert_eq!(annotation.confidence, ConfidenceTier::Unknown);
    }

    #[test]
    fn no_match_is_unknown() {
        let inferencer = SampleAnnotationInferencer::new();
        let annotation = inferencer.infer("salt treatment time course", "Zea mays");
        assert_eq!(annotation.label, None);
        assert_eq!(annotation.confidence, ConfidenceTier::Unknown);
    }

    #[test]
    fn first_vocabulary_keyword_wins() {
        let inferencer = SampleAnnotationInferencer::with_vocabulary(vec![
            "leaf".to_string(),
            "root".to_string(),
        ]);
        let annotation = inferencer.infer("root and leaf tissue", "Zea mays");
        assert_eq!(annotation.label.as_deref(), Some("leaf"));
    }

    #[test]
    fn explicit_field_bypasses_search() {
        let inferencer = SampleAnnotationInferencer::new();
        let annotation =
            inferencer.infer_with_explicit(Some(" flag leaf "), "root tissue", "Triticum aestivum");
        assert_eq!(annotation.label.as_deref(), Some("flag leaf"));
        assert_eq!(annotation.confidence, ConfidenceTier::Explicit);

        let fallback = inferencer.infer_with_explicit(Some(""), "", "Triticum aestivum");
        assert_eq!(fallback.confidence, ConfidenceTier::Unknown);
    }

    #[test]
    fn organism_selects_vocabulary() {
        let inferencer = SampleAnnotationInferencer::new();
        let human = inferencer.infer("liver biopsy", "Homo sapiens");
        assert_eq!(human.label.as_deref(), Some("liver"));
        let plant = inferencer.infer("liver biopsy", "Oryza sativa");
        assert_eq!(plant.confidence, ConfidenceTier::Unknown);
    }
}
