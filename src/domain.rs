use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
pub enum Registry {
    #[serde(rename = "BioProject")]
    #[value(name = "bioproject")]
    BioProject,
    #[serde(rename = "SRA")]
    #[value(name = "sra")]
    Sra,
    #[serde(rename = "GEO")]
    #[value(name = "geo", alias = "gds")]
    Geo,
    #[serde(rename = "PubMed")]
    #[value(name = "pubmed")]
    PubMed,
}

impl Registry {
    pub const ALL: [Registry; 4] = [
        Registry::BioProject,
        Registry::Sra,
        Registry::Geo,
        Registry::PubMed,
    ];

    /// Entrez database name used by E-utilities.
    pub fn entrez_db(&self) -> &'static str {
        match self {
            Registry::BioProject => "bioproject",
            Registry::Sra => "sra",
            Registry::Geo => "gds",
            Registry::PubMed => "pubmed",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Registry::BioProject => "BioProject",
            Registry::Sra => "SRA",
            Registry::Geo => "GEO",
            Registry::PubMed => "PubMed",
        }
    }

    /// Whether the registry indexes records by organism.
    pub fn has_organism_field(&self) -> bool {
        !matches!(self, Registry::PubMed)
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Registry {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        Registry::ALL
            .into_iter()
            .find(|registry| {
                registry.entrez_db() == normalized
                    || registry.display_name().to_lowercase() == normalized
            })
            .ok_or_else(|| KiraError::UnknownRegistry(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Explicit,
    Inferred,
    Unknown,
    Absent,
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceTier::Explicit => write!(f, "explicit"),
            ConfidenceTier::Inferred => write!(f, "inferred"),
            ConfidenceTier::Unknown => write!(f, "unknown"),
            ConfidenceTier::Absent => write!(f, "absent"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub const ALL: [Grade; 5] = [Grade::A, Grade::B, Grade::C, Grade::D, Grade::F];

    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Grade::A
        } else if score >= 80.0 {
            Grade::B
        } else if score >= 70.0 {
            Grade::C
        } else if score >= 60.0 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        write!(f, "{letter}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SubScores {
    pub completeness: f64,
    pub title: f64,
    pub description: f64,
    pub sample: f64,
    pub organism: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub score: f64,
    pub grade: Grade,
    pub breakdown: SubScores,
}

/// One standardized registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub source: Registry,
    pub condition: String,
    pub id: String,
    pub title: String,
    pub description: String,
    pub organism: String,
    pub sample: Option<String>,
    pub sample_confidence: ConfidenceTier,
    pub extra: BTreeMap<String, String>,
    pub quality: Option<QualityAssessment>,
}

impl Record {
    pub fn new(source: Registry, condition: &str, id: impl Into<String>) -> Self {
        Self {
            source,
            condition: condition.to_string(),
            id: id.into(),
            title: String::new(),
            description: String::new(),
            organism: String::new(),
            sample: None,
            sample_confidence: ConfidenceTier::Absent,
            extra: BTreeMap::new(),
            quality: None,
        }
    }

    pub fn score(&self) -> Option<f64> {
        self.quality.map(|quality| quality.score)
    }

    pub fn grade(&self) -> Option<Grade> {
        self.quality.map(|quality| quality.grade)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedRecord {
    pub record: Record,
    pub reason: String,
}

/// The (organism, condition, experiment, label) tuple a run searches for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    pub organism: String,
    pub condition: String,
    pub experiment: String,
    pub label: String,
}

impl SearchRequest {
    pub fn new(
        organism: impl Into<String>,
        condition: impl Into<String>,
        experiment: impl Into<String>,
        label: impl Into<String>,
    ) -> Result<Self, KiraError> {
        let request = Self {
            organism: organism.into().trim().to_string(),
            condition: condition.into().trim().to_string(),
            experiment: experiment.into().trim().to_string(),
            label: label.into().trim().to_string(),
        };
        for (name, value) in [
            ("organism", &request.organism),
            ("condition", &request.condition),
            ("experiment", &request.experiment),
            ("label", &request.label),
        ] {
            if value.is_empty() {
                return Err(KiraError::InvalidRequest(format!("{name} must not be empty")));
            }
        }
        if request
            .label
            .chars()
            .any(|ch| ch == '/' || ch == '\\' || ch.is_control())
        {
            return Err(KiraError::InvalidRequest(format!(
                "label is used in file names and may not contain path separators: {}",
                request.label
            )));
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_registry_names() {
        assert_eq!("gds".parse::<Registry>().unwrap(), Registry::Geo);
        assert_eq!("GEO".parse::<Registry>().unwrap(), Registry::Geo);
        assert_eq!(" BioProject ".parse::<Registry>().unwrap(), Registry::BioProject);
        let err = "ena".parse::<Registry>().unwrap_err();
        assert_matches!(err, KiraError::UnknownRegistry(_));
    }

    #[test]
    fn grade_cut_points() {
        assert_eq!(Grade::from_score(90.0), Grade::A);
        assert_eq!(Grade::from_score(89.999), Grade::B);
        assert_eq!(Grade::from_score(80.0), Grade::B);
        assert_eq!(Grade::from_score(79.999), Grade::C);
        assert_eq!(Grade::from_score(70.0), Grade::C);
        assert_eq!(Grade::from_score(60.0), Grade::D);
        assert_eq!(Grade::from_score(59.999), Grade::F);
        assert_eq!(Grade::from_score(0.0), Grade::F);
        assert_eq!(Grade::from_score(100.0), Grade::A);
    }

    #[test]
    fn search_request_rejects_blank_fields() {
        let err = SearchRequest::new("Arabidopsis thaliana", " ", "RNA-seq", "salt").unwrap_err();
        assert_matches!(err, KiraError::InvalidRequest(_));
        let err =
            SearchRequest::new("Arabidopsis thaliana", "salt", "RNA-seq", "a/b").unwrap_err();
        assert_matches!(err, KiraError::InvalidRequest(_));
    }

    #[test]
    fn fresh_record_has_no_quality() {
        let record = Record::new(Registry::Sra, "salt", "SRX1");
        assert_eq!(record.score(), None);
        assert_eq!(record.grade(), None);
        assert_eq!(record.sample_confidence, ConfidenceTier::Absent);
    }
}
