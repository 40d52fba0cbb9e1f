use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::domain::{ConfidenceTier, Grade, QualityAssessment, Record, SubScores};
use crate::error::KiraError;
use crate::vocabulary::{BIOLOGICAL_KEYWORDS, COMMON_NAME_ALIASES, METHOD_KEYWORDS, owned};

const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub completeness: f64,
    pub title: f64,
    pub description: f64,
    pub sample: f64,
    pub organism: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            completeness: 0.30,
            title: 0.20,
            description: 0.20,
            sample: 0.20,
            organism: 0.10,
        }
    }
}

impl QualityWeights {
    pub fn sum(&self) -> f64 {
        self.completeness + self.title + self.description + self.sample + self.organism
    }

    pub fn validate(&self) -> Result<(), KiraError> {
        let sum = self.sum();
        let all_valid = [
            self.completeness,
            self.title,
            self.description,
            self.sample,
            self.organism,
        ]
        .iter()
        .all(|weight| weight.is_finite() && *weight >= 0.0);
        if !all_valid || !sum.is_finite() || (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(KiraError::InvalidQualityWeights { sum });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Id,
    Title,
    Description,
    Organism,
    Source,
    Sample,
    Extra,
}

impl RecordField {
    fn is_filled(&self, record: &Record) -> bool {
        match self {
            RecordField::Id => !record.id.trim().is_empty(),
            RecordField::Title => !record.title.trim().is_empty(),
            RecordField::Description => !record.description.trim().is_empty(),
            RecordField::Organism => !record.organism.trim().is_empty(),
            RecordField::Source => true,
            RecordField::Sample => record
                .sample
                .as_deref()
                .is_some_and(|sample| !sample.trim().is_empty()),
            RecordField::Extra => record.extra.values().any(|value| !value.trim().is_empty()),
        }
    }
}

/// Length + keyword scoring for one free-text field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRule {
    pub base: f64,
    /// `(minimum characters, points)`; the first tier the text reaches applies.
    pub length_tiers: Vec<(usize, f64)>,
    pub keywords: Vec<String>,
    pub per_keyword: f64,
    pub keyword_cap: f64,
}

impl TextRule {
    pub fn title_default() -> Self {
        Self {
            base: 30.0,
            length_tiers: vec![(40, 30.0), (21, 15.0)],
            keywords: owned(BIOLOGICAL_KEYWORDS),
            per_keyword: 10.0,
            keyword_cap: 40.0,
        }
    }

    pub fn description_default() -> Self {
        Self {
            base: 20.0,
            length_tiers: vec![(201, 40.0), (101, 30.0), (51, 20.0), (1, 10.0)],
            keywords: owned(METHOD_KEYWORDS),
            per_keyword: 4.0,
            keyword_cap: 40.0,
        }
    }

    pub fn score(&self, text: &str) -> f64 {
        let text = text.trim();
        if text.is_empty() {
            return 0.0;
        }
        let length = text.chars().count();
        let length_points = self
            .length_tiers
            .iter()
            .find(|(min_chars, _)| length >= *min_chars)
            .map(|(_, points)| *points)
            .unwrap_or(0.0);
        let lower = text.to_lowercase();
        let hits = self
            .keywords
            .iter()
            .filter(|keyword| lower.contains(&keyword.to_lowercase()))
            .count();
        let keyword_points = (hits as f64 * self.per_keyword).min(self.keyword_cap);
        clamp_score(self.base + length_points + keyword_points)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub checklist: Vec<RecordField>,
    pub title: TextRule,
    pub description: TextRule,
    pub common_names: Vec<String>,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            checklist: vec![
                RecordField::Id,
                RecordField::Title,
                RecordField::Description,
                RecordField::Organism,
                RecordField::Source,
                RecordField::Sample,
                RecordField::Extra,
            ],
            title: TextRule::title_default(),
            description: TextRule::description_default(),
            common_names: owned(COMMON_NAME_ALIASES),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QualityAssessor {
    weights: QualityWeights,
    rules: ScoringRules,
}

impl Default for QualityAssessor {
    fn default() -> Self {
        Self {
            weights: QualityWeights::default(),
            rules: ScoringRules::default(),
        }
    }
}

impl QualityAssessor {
    pub fn new(weights: QualityWeights, rules: ScoringRules) -> Result<Self, KiraError> {
        weights.validate()?;
        Ok(Self { weights, rules })
    }

    pub fn weights(&self) -> &QualityWeights {
        &self.weights
    }

    pub fn assess(&self, record: &Record) -> QualityAssessment {
        let breakdown = SubScores {
            completeness: self.completeness(record),
            title: self.rules.title.score(&record.title),
            description: self.rules.description.score(&record.description),
            sample: sample_score(record.sample_confidence),
            organism: self.organism_score(&record.organism),
        };
        let weights = &self.weights;
        let score = clamp_score(
            breakdown.completeness * weights.completeness
                + breakdown.title * weights.title
                + breakdown.description * weights.description
                + breakdown.sample * weights.sample
                + breakdown.organism * weights.organism,
        );
        QualityAssessment {
            score,
            grade: Grade::from_score(score),
            breakdown,
        }
    }

    pub fn assess_in_place(&self, record: &mut Record) {
        record.quality = Some(self.assess(record));
    }

    fn completeness(&self, record: &Record) -> f64 {
        let checklist = &self.rules.checklist;
        if checklist.is_empty() {
            return 0.0;
        }
        let filled = checklist
            .iter()
            .filter(|field| field.is_filled(record))
            .count();
        filled as f64 / checklist.len() as f64 * 100.0
    }

    fn organism_score(&self, organism: &str) -> f64 {
        let organism = organism.trim();
        if organism.is_empty() {
            return 0.0;
        }
        // "Thale cress" is shaped like a binomial, so aliases are checked first.
        let lower = organism.to_lowercase();
        if self
            .rules
            .common_names
            .iter()
            .any(|alias| alias.to_lowercase() == lower)
        {
            return 40.0;
        }
        let tokens = organism.split_whitespace().collect::<Vec<_>>();
        if tokens.len() >= 2 && is_genus(tokens[0]) && is_epithet(tokens[1]) {
            return 100.0;
        }
        if tokens.len() == 1 && is_genus(tokens[0]) {
            return 60.0;
        }
        0.0
    }
}

fn sample_score(confidence: ConfidenceTier) -> f64 {
    match confidence {
        ConfidenceTier::Explicit => 100.0,
        ConfidenceTier::Inferred => 60.0,
        ConfidenceTier::Unknown => 30.0,
        ConfidenceTier::Absent => 0.0,
    }
}

fn is_genus(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next().is_some_and(|ch| ch.is_uppercase())
        && chars.all(|ch| ch.is_lowercase() || ch == '-')
}

fn is_epithet(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|ch| ch.is_lowercase() || ch == '-')
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}

/// Aggregate quality statistics over a set of assessed records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub total: usize,
    pub mean: f64,
    pub median: f64,
    pub grades: BTreeMap<Grade, usize>,
    pub component_means: SubScores,
    pub low_completeness: usize,
    pub missing_sample: usize,
}

impl QualityReport {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let assessments = records
            .into_iter()
            .filter_map(|record| record.quality)
            .collect::<Vec<_>>();
        let total = assessments.len();
        let mut grades = Grade::ALL
            .into_iter()
            .map(|grade| (grade, 0usize))
            .collect::<BTreeMap<_, _>>();
        let mut sums = SubScores::default();
        let mut scores = Vec::with_capacity(total);
        let mut low_completeness = 0;
        let mut missing_sample = 0;
        for assessment in &assessments {
            *grades.entry(assessment.grade).or_default() += 1;
            scores.push(assessment.score);
            let parts = assessment.breakdown;
            sums.completeness += parts.completeness;
            sums.title += parts.title;
            sums.description += parts.description;
            sums.sample += parts.sample;
            sums.organism += parts.organism;
            if parts.completeness < 60.0 {
                low_completeness += 1;
            }
            if parts.sample < 30.0 {
                missing_sample += 1;
            }
        }
        let divisor = total.max(1) as f64;
        Self {
            total,
            mean: scores.iter().sum::<f64>() / divisor,
            median: median(&mut scores),
            grades,
            component_means: SubScores {
                completeness: sums.completeness / divisor,
                title: sums.title / divisor,
                description: sums.description / divisor,
                sample: sums.sample / divisor,
                organism: sums.organism / divisor,
            },
            low_completeness,
            missing_sample,
        }
    }

    pub fn recommendations(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if self.total == 0 {
            notes.push("No records were assessed.".to_string());
            return notes;
        }
        if self.mean < 60.0 {
            notes.push("Overall quality is LOW: review data sources, improve metadata extraction and curate key records manually.".to_string());
        } else if self.mean < 75.0 {
            notes.push("Overall quality is MODERATE: validate key records manually and enrich sample annotations.".to_string());
        } else {
            notes.push("Overall quality is GOOD.".to_string());
        }
        let total = self.total as f64;
        if self.low_completeness as f64 > total * 0.2 {
            notes.push(format!(
                "{} records ({:.1}%) have low completeness.",
                self.low_completeness,
                self.low_completeness as f64 / total * 100.0
            ));
        }
        if self.missing_sample as f64 > total * 0.3 {
            notes.push(format!(
                "{} records ({:.1}%) lack sample information.",
                self.missing_sample,
                self.missing_sample as f64 / total * 100.0
            ));
        }
        notes
    }

    pub fn render_text(&self, generated_at: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Quality Assessment Report");
        let _ = writeln!(out, "=========================\n");
        let _ = writeln!(out, "Generated: {generated_at}");
        let _ = writeln!(out, "Total records: {}\n", self.total);

        let _ = writeln!(out, "OVERALL QUALITY METRICS");
        let _ = writeln!(out, "-----------------------");
        let _ = writeln!(out, "Average quality score: {:.1}/100", self.mean);
        let _ = writeln!(out, "Median quality score: {:.1}/100\n", self.median);

        let _ = writeln!(out, "GRADE DISTRIBUTION");
        let _ = writeln!(out, "------------------");
        for (grade, count) in &self.grades {
            let pct = percent(*count, self.total);
            let _ = writeln!(out, "{grade}: {count} ({pct:.1}%)");
        }

        let means = &self.component_means;
        let _ = writeln!(out, "\nCOMPONENT SCORES (Average)");
        let _ = writeln!(out, "--------------------------");
        let _ = writeln!(out, "completeness: {:.1}/100", means.completeness);
        let _ = writeln!(out, "title_quality: {:.1}/100", means.title);
        let _ = writeln!(out, "description_quality: {:.1}/100", means.description);
        let _ = writeln!(out, "sample_quality: {:.1}/100", means.sample);
        let _ = writeln!(out, "organism_specificity: {:.1}/100", means.organism);

        let _ = writeln!(out, "\nRECOMMENDATIONS");
        let _ = writeln!(out, "---------------");
        for note in self.recommendations() {
            let _ = writeln!(out, "- {note}");
        }
        out
    }
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

pub(crate) fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::Registry;

    fn rich_record() -> Record {
        let mut record = Record::new(Registry::Sra, "salt", "SRX100");
        record.title = "Transcriptome profiling of root tissue under salt stress".to_string();
        record.description = "RNA-seq libraries were prepared from root samples with three biological replicate plants per treatment and control, sequencing reads were mapped to the reference genome and differential expression analysis was performed.".to_string();
        record.organism = "Arabidopsis thaliana".to_string();
        record.sample = Some("root".to_string());
        record.sample_confidence = ConfidenceTier::Explicit;
        record
            .extra
            .insert("library_strategy".to_string(), "RNA-Seq".to_string());
        record
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let weights = QualityWeights {
            completeness: 0.5,
            ..QualityWeights::default()
        };
        let err = QualityAssessor::new(weights, ScoringRules::default()).unwrap_err();
        assert_matches!(err, KiraError::InvalidQualityWeights { .. });
    }

    #[test]
    fn rejects_negative_weight() {
        let weights = QualityWeights {
            completeness: 0.5,
            organism: -0.1,
            ..QualityWeights::default()
        };
        assert!(weights.validate().is_err());
    }

    #[test]
    fn accepts_weights_within_tolerance() {
        let weights = QualityWeights {
            completeness: 0.1 + 0.2,
            ..QualityWeights::default()
        };
        assert!(QualityAssessor::new(weights, ScoringRules::default()).is_ok());
    }

    #[test]
    fn rich_record_scores_high() {
        let assessor = QualityAssessor::default();
        let assessment = assessor.assess(&rich_record());
        assert_eq!(assessment.breakdown.completeness, 100.0);
        assert_eq!(assessment.breakdown.sample, 100.0);
        assert_eq!(assessment.breakdown.organism, 100.0);
        assert_eq!(assessment.breakdown.title, 100.0);
        assert!(assessment.score >= 90.0);
        assert_eq!(assessment.grade, Grade::A);
    }

    #[test]
    fn empty_record_scores_floor_without_error() {
        let assessor = QualityAssessor::default();
        let mut record = Record::new(Registry::PubMed, "salt", "");
        assessor.assess_in_place(&mut record);
        let quality = record.quality.unwrap();
        // Only the source field is ever filled.
        assert!((quality.breakdown.completeness - 100.0 / 7.0).abs() < 1e-9);
        assert_eq!(quality.breakdown.title, 0.0);
        assert_eq!(quality.breakdown.description, 0.0);
        assert_eq!(quality.breakdown.sample, 0.0);
        assert_eq!(quality.breakdown.organism, 0.0);
        assert_eq!(quality.grade, Grade::F);
    }

    #[test]
    fn organism_specificity_tiers() {
        let assessor = QualityAssessor::default();
        assert_eq!(assessor.organism_score("Oryza sativa"), 100.0);
        assert_eq!(assessor.organism_score("Oryza sativa Japonica Group"), 100.0);
        assert_eq!(assessor.organism_score("Oryza"), 60.0);
        assert_eq!(assessor.organism_score("rice"), 40.0);
        assert_eq!(assessor.organism_score("Thale cress"), 40.0);
        assert_eq!(assessor.organism_score("uncultured bacterium 42"), 0.0);
        assert_eq!(assessor.organism_score(""), 0.0);
    }

    #[test]
    fn title_rule_saturates() {
        let rule = TextRule::title_default();
        assert_eq!(rule.score(""), 0.0);
        assert_eq!(rule.score("Short"), 30.0);
        assert_eq!(rule.score("A title of twenty-one!"), 45.0);
        let long = "x".repeat(400);
        assert_eq!(rule.score(&long), 60.0);
    }

    #[test]
    fn sample_tiers() {
        assert_eq!(sample_score(ConfidenceTier::Explicit), 100.0);
        assert_eq!(sample_score(ConfidenceTier::Inferred), 60.0);
        assert_eq!(sample_score(ConfidenceTier::Unknown), 30.0);
        assert_eq!(sample_score(ConfidenceTier::Absent), 0.0);
    }

    #[test]
    fn report_summarizes_grades() {
        let assessor = QualityAssessor::default();
        let mut good = rich_record();
        assessor.assess_in_place(&mut good);
        let mut poor = Record::new(Registry::PubMed, "salt", "PMID:1");
        assessor.assess_in_place(&mut poor);

        let report = QualityReport::from_records([&good, &poor]);
        assert_eq!(report.total, 2);
        assert_eq!(report.grades[&Grade::A], 1);
        assert_eq!(report.grades[&Grade::F], 1);
        assert_eq!(report.missing_sample, 1);
        let text = report.render_text("2026-01-01T00:00:00Z");
        assert!(text.contains("Total records: 2"));
        assert!(text.contains("A: 1 (50.0%)"));
    }

    #[test]
    fn report_on_empty_set() {
        let report = QualityReport::from_records(std::iter::empty());
        assert_eq!(report.total, 0);
        assert_eq!(report.mean, 0.0);
        assert_eq!(report.median, 0.0);
        assert_eq!(report.recommendations(), vec!["No records were assessed."]);
    }
}
