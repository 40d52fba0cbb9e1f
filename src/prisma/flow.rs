use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;
use crate::quality::percent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStage {
    Identification,
    Screening,
    Exclusion,
    Inclusion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub registry: String,
    /// `identification` for a failed search, `screening` for failed summary retrieval.
    #[serde(default = "identification_stage")]
    pub stage: FlowStage,
    pub message: String,
}

fn identification_stage() -> FlowStage {
    FlowStage::Identification
}

/// Every counter the flow diagram is drawn from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlowCounts {
    pub identified: IndexMap<String, u64>,
    pub fetch_failures: Vec<FetchFailure>,
    pub removed_before_screening: IndexMap<String, u64>,
    pub screened: Option<u64>,
    pub excluded: IndexMap<String, u64>,
    pub included: Option<u64>,
    pub included_by_source: IndexMap<String, u64>,
}

impl FlowCounts {
    pub fn identified_total(&self) -> u64 {
        self.identified.values().sum()
    }

    pub fn removed_total(&self) -> u64 {
        self.removed_before_screening.values().sum()
    }

    pub fn excluded_total(&self) -> u64 {
        self.excluded.values().sum()
    }

    pub fn failures_at(&self, stage: FlowStage) -> impl Iterator<Item = &FetchFailure> {
        self.fetch_failures
            .iter()
            .filter(move |failure| failure.stage == stage)
    }

    pub fn stage(&self) -> FlowStage {
        if self.included.is_some() {
            FlowStage::Inclusion
        } else if !self.excluded.is_empty() {
            FlowStage::Exclusion
        } else if self.screened.is_some() {
            FlowStage::Screening
        } else {
            FlowStage::Identification
        }
    }

    /// `included + Σ excluded == screened` and `screened ≤ Σ identified`.
    pub fn invariant_holds(&self) -> bool {
        match (self.screened, self.included) {
            (Some(screened), Some(included)) => {
                included + self.excluded_total() == screened
                    && screened + self.removed_total() <= self.identified_total()
            }
            _ => false,
        }
    }

    fn check(&self) -> Result<(), KiraError> {
        let identified = self.identified_total();
        let removed = self.removed_total();
        if removed > identified {
            return Err(violation(format!(
                "{removed} records removed before screening but only {identified} identified"
            )));
        }
        let excluded = self.excluded_total();
        match self.screened {
            Some(screened) if screened + removed > identified => {
                return Err(violation(format!(
                    "screened {screened} + removed {removed} exceeds identified {identified}"
                )));
            }
            Some(screened) if excluded > screened => {
                return Err(violation(format!(
                    "excluded {excluded} exceeds screened {screened}"
                )));
            }
            None if excluded > 0 || self.included.is_some() => {
                return Err(violation(
                    "exclusion or inclusion recorded before screening".to_string(),
                ));
            }
            _ => {}
        }
        if let (Some(screened), Some(included)) = (self.screened, self.included) {
            if included + excluded != screened {
                return Err(violation(format!(
                    "included {included} + excluded {excluded} != screened {screened}"
                )));
            }
            let by_source: u64 = self.included_by_source.values().sum();
            if !self.included_by_source.is_empty() && by_source != included {
                return Err(violation(format!(
                    "included by source sums to {by_source}, expected {included}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowSummary {
    pub total_identified: u64,
    pub total_removed_before_screening: u64,
    pub total_screened: u64,
    pub total_excluded: u64,
    pub total_included: u64,
    /// Percent of screened records that were excluded.
    pub exclusion_rate: f64,
}

/// Stage counters for one run.
///
/// Counters only move forward: identification per registry, then records
/// removed before screening, the screened total, exclusions by reason and
/// finally the included total. Recording into a stage that has already been
/// left, or setting a write-once counter twice, is a [`KiraError::FlowViolation`].
#[derive(Debug, Clone)]
pub struct PrismaFlow {
    condition: String,
    label: String,
    timestamp: String,
    counts: FlowCounts,
}

impl PrismaFlow {
    pub fn new(condition: &str, label: &str) -> Self {
        Self {
            condition: condition.to_string(),
            label: label.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            counts: FlowCounts::default(),
        }
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn counts(&self) -> &FlowCounts {
        &self.counts
    }

    pub fn stage(&self) -> FlowStage {
        self.counts.stage()
    }

    pub fn record_identified(&mut self, registry: &str, count: u64) -> Result<(), KiraError> {
        self.require_stage(FlowStage::Identification, "record identified records")?;
        if self.counts.identified.contains_key(registry) {
            return Err(violation(format!(
                "identification count for {registry} already recorded"
            )));
        }
        self.counts.identified.insert(registry.to_string(), count);
        Ok(())
    }

    /// Notes a registry failure. `stage` is where it happened: identification
    /// or screening (summary retrieval). Either is recorded before `set_screened`.
    pub fn record_fetch_failure(
        &mut self,
        registry: &str,
        stage: FlowStage,
        message: impl Into<String>,
    ) -> Result<(), KiraError> {
        self.require_stage(FlowStage::Identification, "note a fetch failure")?;
        if !matches!(stage, FlowStage::Identification | FlowStage::Screening) {
            return Err(violation(format!(
                "fetch failures belong to identification or screening, not {stage:?}"
            )));
        }
        self.counts.fetch_failures.push(FetchFailure {
            registry: registry.to_string(),
            stage,
            message: message.into(),
        });
        Ok(())
    }

    pub fn record_removed_before_screening(
        &mut self,
        reason: &str,
        count: u64,
    ) -> Result<(), KiraError> {
        self.require_stage(FlowStage::Identification, "remove records before screening")?;
        let reason = non_blank_reason(reason)?;
        if count == 0 {
            return Ok(());
        }
        let removed = self.counts.removed_total() + count;
        let identified = self.counts.identified_total();
        if removed > identified {
            return Err(violation(format!(
                "removing {count} more records would exceed {identified} identified"
            )));
        }
        *self
            .counts
            .removed_before_screening
            .entry(reason.to_string())
            .or_default() += count;
        Ok(())
    }

    pub fn set_screened(&mut self, count: u64) -> Result<(), KiraError> {
        self.require_stage(FlowStage::Identification, "set the screened total")?;
        let available = self
            .counts
            .identified_total()
            .saturating_sub(self.counts.removed_total());
        if count > available {
            return Err(violation(format!(
                "screened {count} exceeds {available} identified records left after removals"
            )));
        }
        self.counts.screened = Some(count);
        Ok(())
    }

    pub fn record_excluded(&mut self, reason: &str, count: u64) -> Result<(), KiraError> {
        let stage = self.stage();
        if !matches!(stage, FlowStage::Screening | FlowStage::Exclusion) {
            return Err(violation(format!(
                "cannot record exclusions during {stage:?}"
            )));
        }
        let reason = non_blank_reason(reason)?;
        if count == 0 {
            return Ok(());
        }
        let screened = self.counts.screened.unwrap_or(0);
        let excluded = self.counts.excluded_total() + count;
        if excluded > screened {
            return Err(violation(format!(
                "excluded {excluded} would exceed screened {screened}"
            )));
        }
        *self.counts.excluded.entry(reason.to_string()).or_default() += count;
        Ok(())
    }

    pub fn set_included(&mut self, count: u64) -> Result<(), KiraError> {
        let stage = self.stage();
        if !matches!(stage, FlowStage::Screening | FlowStage::Exclusion) {
            return Err(violation(format!(
                "cannot set the included total during {stage:?}"
            )));
        }
        let screened = self.counts.screened.unwrap_or(0);
        let excluded = self.counts.excluded_total();
        if count + excluded != screened {
            return Err(violation(format!(
                "included {count} + excluded {excluded} != screened {screened}"
            )));
        }
        self.counts.included = Some(count);
        Ok(())
    }

    pub fn set_included_by_source(
        &mut self,
        by_source: IndexMap<String, u64>,
    ) -> Result<(), KiraError> {
        self.require_stage(FlowStage::Inclusion, "break down included records")?;
        if !self.counts.included_by_source.is_empty() {
            return Err(violation("included breakdown already recorded".to_string()));
        }
        let included = self.counts.included.unwrap_or(0);
        let sum: u64 = by_source.values().sum();
        if sum != included {
            return Err(violation(format!(
                "included by source sums to {sum}, expected {included}"
            )));
        }
        self.counts.included_by_source = by_source;
        Ok(())
    }

    pub fn summary(&self) -> FlowSummary {
        let screened = self.counts.screened.unwrap_or(0);
        let excluded = self.counts.excluded_total();
        FlowSummary {
            total_identified: self.counts.identified_total(),
            total_removed_before_screening: self.counts.removed_total(),
            total_screened: screened,
            total_excluded: excluded,
            total_included: self.counts.included.unwrap_or(0),
            exclusion_rate: percent(excluded as usize, screened as usize),
        }
    }

    pub fn render(&self) -> FlowDocument {
        let counts = &self.counts;
        let excluded = counts.excluded_total();
        FlowDocument {
            metadata: FlowMetadata {
                condition: self.condition.clone(),
                label: self.label.clone(),
                timestamp: self.timestamp.clone(),
                stage: self.stage(),
            },
            identification: IdentificationSection {
                databases: counts.identified.clone(),
                total: counts.identified_total(),
                failures: counts.fetch_failures.clone(),
            },
            removed_before_screening: RemovedSection {
                reasons: counts.removed_before_screening.clone(),
                total: counts.removed_total(),
            },
            screening: ScreeningSection {
                records_screened: counts.screened,
                records_excluded: excluded,
                exclusion_reasons: counts.excluded.clone(),
            },
            included: IncludedSection {
                total: counts.included,
                by_source: counts.included_by_source.clone(),
            },
            invariant: InvariantCheck {
                identified_total: counts.identified_total(),
                screened: counts.screened.unwrap_or(0),
                included_plus_excluded: counts.included.unwrap_or(0) + excluded,
                holds: counts.invariant_holds(),
            },
        }
    }

    pub fn to_json(&self) -> Result<String, KiraError> {
        serde_json::to_string_pretty(&self.render())
            .map_err(|err| KiraError::FlowDocument(err.to_string()))
    }

    pub fn from_json(content: &str) -> Result<Self, KiraError> {
        let document: FlowDocument = serde_json::from_str(content)
            .map_err(|err| KiraError::FlowDocument(err.to_string()))?;
        Self::from_document(document)
    }

    pub fn load(path: &Path) -> Result<Self, KiraError> {
        let content = fs::read_to_string(path)
            .map_err(|err| KiraError::Filesystem(format!("read {}: {err}", path.display())))?;
        Self::from_json(&content)
    }

    pub fn from_document(document: FlowDocument) -> Result<Self, KiraError> {
        let counts = FlowCounts {
            identified: document.identification.databases,
            fetch_failures: document.identification.failures,
            removed_before_screening: document.removed_before_screening.reasons,
            screened: document.screening.records_screened,
            excluded: document.screening.exclusion_reasons,
            included: document.included.total,
            included_by_source: document.included.by_source,
        };
        counts.check()?;
        Ok(Self {
            condition: document.metadata.condition,
            label: document.metadata.label,
            timestamp: document.metadata.timestamp,
            counts,
        })
    }

    pub fn render_text_report(&self) -> String {
        let summary = self.summary();
        let counts = &self.counts;
        let mut out = String::new();

        let _ = writeln!(out, "PRISMA Flow Summary");
        let _ = writeln!(out, "===================\n");
        let _ = writeln!(out, "Condition: {}", self.condition);
        let _ = writeln!(out, "Label: {}", self.label);
        let _ = writeln!(out, "Date: {}\n", self.timestamp);

        let _ = writeln!(out, "IDENTIFICATION");
        let _ = writeln!(out, "--------------");
        for (registry, count) in &counts.identified {
            let _ = writeln!(out, "  {registry}: {count} records");
        }
        let _ = writeln!(out, "  TOTAL: {} records", summary.total_identified);
        for failure in counts.failures_at(FlowStage::Identification) {
            let _ = writeln!(
                out,
                "  ! {} unavailable: {}",
                failure.registry, failure.message
            );
        }

        let retrieval_failures = counts.failures_at(FlowStage::Screening).collect::<Vec<_>>();
        if !counts.removed_before_screening.is_empty() || !retrieval_failures.is_empty() {
            let _ = writeln!(
                out,
                "\nRecords removed before screening: {}",
                summary.total_removed_before_screening
            );
            for (reason, count) in &counts.removed_before_screening {
                let _ = writeln!(out, "  - {reason}: {count}");
            }
            for failure in retrieval_failures {
                let _ = writeln!(
                    out,
                    "  ! {} summaries unavailable: {}",
                    failure.registry, failure.message
                );
            }
        }

        let _ = writeln!(out, "\nSCREENING");
        let _ = writeln!(out, "---------");
        let _ = writeln!(out, "Records screened: {}", summary.total_screened);
        let _ = writeln!(
            out,
            "Records excluded: {} ({:.1}%)",
            summary.total_excluded, summary.exclusion_rate
        );
        if !counts.excluded.is_empty() {
            let _ = writeln!(out, "\nExclusion reasons:");
            for (reason, count) in &counts.excluded {
                let pct = percent(*count as usize, summary.total_excluded as usize);
                let _ = writeln!(out, "  - {reason}: {count} ({pct:.1}%)");
            }
        }

        let _ = writeln!(out, "\nINCLUDED");
        let _ = writeln!(out, "--------");
        let _ = writeln!(out, "Final dataset: {} records", summary.total_included);
        if !counts.included_by_source.is_empty() {
            let _ = writeln!(out, "\nBy source:");
            for (source, count) in &counts.included_by_source {
                let pct = percent(*count as usize, summary.total_included as usize);
                let _ = writeln!(out, "  {source}: {count} ({pct:.1}%)");
            }
        }

        let _ = writeln!(
            out,
            "\nInvariant (included + excluded == screened <= identified): {}",
            if counts.invariant_holds() { "holds" } else { "VIOLATED" }
        );
        out
    }

    fn require_stage(&self, expected: FlowStage, action: &str) -> Result<(), KiraError> {
        let stage = self.stage();
        if stage != expected {
            return Err(violation(format!("cannot {action} during {stage:?}")));
        }
        Ok(())
    }
}

fn violation(message: String) -> KiraError {
    KiraError::FlowViolation(message)
}

fn non_blank_reason(reason: &str) -> Result<&str, KiraError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(violation("a reason is required".to_string()));
    }
    Ok(reason)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    pub metadata: FlowMetadata,
    pub identification: IdentificationSection,
    pub removed_before_screening: RemovedSection,
    pub screening: ScreeningSection,
    pub included: IncludedSection,
    pub invariant: InvariantCheck,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowMetadata {
    pub condition: String,
    pub label: String,
    pub timestamp: String,
    pub stage: FlowStage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationSection {
    pub databases: IndexMap<String, u64>,
    pub total: u64,
    #[serde(default)]
    pub failures: Vec<FetchFailure>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemovedSection {
    pub reasons: IndexMap<String, u64>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningSection {
    pub records_screened: Option<u64>,
    pub records_excluded: u64,
    pub exclusion_reasons: IndexMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludedSection {
    pub total: Option<u64>,
    #[serde(default)]
    pub by_source: IndexMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvariantCheck {
    pub identified_total: u64,
    pub screened: u64,
    pub included_plus_excluded: u64,
    pub holds: bool,
}
