use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::Record;
use crate::error::KiraError;
use crate::quality::percent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum ScreeningDecision {
    Included,
    Excluded { reason: String },
}

impl ScreeningDecision {
    /// The reason is stored trimmed, the same way it reads back from CSV.
    pub fn excluded(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        ScreeningDecision::Excluded {
            reason: reason.trim().to_string(),
        }
    }

    pub fn is_included(&self) -> bool {
        matches!(self, ScreeningDecision::Included)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ScreeningDecision::Included => None,
            ScreeningDecision::Excluded { reason } => Some(reason),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ScreeningDecision::Included => "included",
            ScreeningDecision::Excluded { .. } => "excluded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreeningEntry {
    pub timestamp: String,
    pub record_id: String,
    pub database: String,
    pub title: String,
    pub decision: ScreeningDecision,
    pub quality_score: Option<f64>,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DatabaseTally {
    pub included: u64,
    pub excluded: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreeningStatistics {
    pub total: u64,
    pub included: u64,
    pub excluded: u64,
    /// `included / total`, 0.0 for an empty log.
    pub inclusion_rate: f64,
    pub exclusion_reasons: Vec<(String, u64)>,
    pub by_database: BTreeMap<String, DatabaseTally>,
}

/// Append-only record of every screening decision in a run.
#[derive(Debug, Clone)]
pub struct ScreeningLog {
    label: String,
    entries: Vec<ScreeningEntry>,
}

impl ScreeningLog {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn entries(&self) -> &[ScreeningEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(
        &mut self,
        record_id: &str,
        database: &str,
        decision: ScreeningDecision,
    ) -> Result<&ScreeningEntry, KiraError> {
        self.push(ScreeningEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            record_id: record_id.to_string(),
            database: database.to_string(),
            title: String::new(),
            decision,
            quality_score: None,
            notes: String::new(),
        })
    }

    pub fn append_record(
        &mut self,
        record: &Record,
        decision: ScreeningDecision,
        notes: &str,
    ) -> Result<&ScreeningEntry, KiraError> {
        self.push(ScreeningEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            record_id: record.id.clone(),
            database: record.source.display_name().to_string(),
            title: record.title.clone(),
            decision,
            quality_score: record.score(),
            notes: notes.to_string(),
        })
    }

    fn push(&mut self, mut entry: ScreeningEntry) -> Result<&ScreeningEntry, KiraError> {
        if let ScreeningDecision::Excluded { reason } = &mut entry.decision {
            if reason.trim().is_empty() {
                return Err(KiraError::ScreeningContract(format!(
                    "excluded record {} has no reason",
                    entry.record_id
                )));
            }
            if reason.trim().len() != reason.len() {
                *reason = reason.trim().to_string();
            }
        }
        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn statistics(&self) -> ScreeningStatistics {
        let mut included = 0u64;
        let mut reasons: BTreeMap<&str, u64> = BTreeMap::new();
        let mut by_database: BTreeMap<String, DatabaseTally> = BTreeMap::new();
        for entry in &self.entries {
            let tally = by_database.entry(entry.database.clone()).or_default();
            match &entry.decision {
                ScreeningDecision::Included => {
                    included += 1;
                    tally.included += 1;
                }
                ScreeningDecision::Excluded { reason } => {
                    *reasons.entry(reason.as_str()).or_default() += 1;
                    tally.excluded += 1;
                }
            }
        }

        let total = self.entries.len() as u64;
        let mut exclusion_reasons: Vec<(String, u64)> = reasons
            .into_iter()
            .map(|(reason, count)| (reason.to_string(), count))
            .collect();
        exclusion_reasons.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        ScreeningStatistics {
            total,
            included,
            excluded: total - included,
            inclusion_rate: if total == 0 {
                0.0
            } else {
                included as f64 / total as f64
            },
            exclusion_reasons,
            by_database,
        }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), KiraError> {
        let mut csv = csv::Writer::from_writer(writer);
        if self.entries.is_empty() {
            csv.write_record(ScreeningRow::COLUMNS)?;
        }
        for entry in &self.entries {
            csv.serialize(ScreeningRow::from(entry))?;
        }
        csv.flush()
            .map_err(|err| KiraError::Csv(format!("flush screening log: {err}")))?;
        Ok(())
    }

    pub fn read_csv<R: Read>(label: &str, reader: R) -> Result<Self, KiraError> {
        let mut csv = csv::Reader::from_reader(reader);
        let mut log = Self::new(label);
        for row in csv.deserialize::<ScreeningRow>() {
            let entry = row?.into_entry()?;
            log.push(entry)?;
        }
        Ok(log)
    }

    pub fn load(label: &str, path: &Path) -> Result<Self, KiraError> {
        let file = File::open(path)
            .map_err(|err| KiraError::Filesystem(format!("open {}: {err}", path.display())))?;
        Self::read_csv(label, file)
    }

    pub fn render_summary(&self) -> String {
        let stats = self.statistics();
        let mut out = String::new();
        let _ = writeln!(out, "Screening Summary: {}", self.label);
        let _ = writeln!(out, "{}\n", "=".repeat(60));

        let _ = writeln!(out, "OVERALL STATISTICS");
        let _ = writeln!(out, "------------------");
        let _ = writeln!(out, "Total records screened: {}", stats.total);
        let _ = writeln!(
            out,
            "Included: {} ({:.1}%)",
            stats.included,
            stats.inclusion_rate * 100.0
        );
        let _ = writeln!(
            out,
            "Excluded: {} ({:.1}%)",
            stats.excluded,
            percent(stats.excluded as usize, stats.total as usize)
        );

        if !stats.exclusion_reasons.is_empty() {
            let _ = writeln!(out, "\nEXCLUSION REASONS");
            let _ = writeln!(out, "-----------------");
            for (reason, count) in &stats.exclusion_reasons {
                let pct = percent(*count as usize, stats.excluded as usize);
                let _ = writeln!(out, "  {reason}: {count} ({pct:.1}%)");
            }
        }

        if !stats.by_database.is_empty() {
            let _ = writeln!(out, "\nBY DATABASE");
            let _ = writeln!(out, "-----------");
            for (database, tally) in &stats.by_database {
                let _ = writeln!(
                    out,
                    "  {database}: {} screened, {} included, {} excluded",
                    tally.included + tally.excluded,
                    tally.included,
                    tally.excluded
                );
            }
        }
        out
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ScreeningRow {
    timestamp: String,
    record_id: String,
    database: String,
    title: String,
    decision: String,
    reason: String,
    quality_score: Option<f64>,
    notes: String,
}

impl From<&ScreeningEntry> for ScreeningRow {
    fn from(entry: &ScreeningEntry) -> Self {
        Self {
            timestamp: entry.timestamp.clone(),
            record_id: entry.record_id.clone(),
            database: entry.database.clone(),
            title: entry.title.clone(),
            decision: entry.decision.label().to_string(),
            reason: entry.decision.reason().unwrap_or_default().to_string(),
            quality_score: entry.quality_score,
            notes: entry.notes.clone(),
        }
    }
}

impl ScreeningRow {
    const COLUMNS: &'static [&'static str] = &[
        "timestamp",
        "record_id",
        "database",
        "title",
        "decision",
        "reason",
        "quality_score",
        "notes",
    ];

    fn into_entry(self) -> Result<ScreeningEntry, KiraError> {
        let reason = self.reason.trim();
        let decision = match self.decision.trim() {
            "included" if reason.is_empty() => ScreeningDecision::Included,
            "included" => {
                return Err(KiraError::ScreeningContract(format!(
                    "included record {} carries an exclusion reason",
                    self.record_id
                )));
            }
            "excluded" if !reason.is_empty() => ScreeningDecision::excluded(reason),
            "excluded" => {
                return Err(KiraError::ScreeningContract(format!(
                    "excluded record {} has no reason",
                    self.record_id
                )));
            }
            other => {
                return Err(KiraError::ScreeningContract(format!(
                    "unknown decision {other:?} for record {}",
                    self.record_id
                )));
            }
        };
        Ok(ScreeningEntry {
            timestamp: self.timestamp,
            record_id: self.record_id,
            database: self.database,
            title: self.title,
            decision,
            quality_score: self.quality_score,
            notes: self.notes,
        })
    }
}
