use std::fs::{self, File};
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use serde::Serialize;
use tempfile::Builder;

use crate::domain::{ExcludedRecord, Record};
use crate::error::KiraError;
use crate::prisma::{PrismaFlow, ScreeningLog};
use crate::quality::QualityReport;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFiles {
    pub processed: Utf8PathBuf,
    /// Absent when nothing was excluded.
    pub excluded: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowFiles {
    pub json: Utf8PathBuf,
    pub report: Utf8PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreeningFiles {
    pub log: Utf8PathBuf,
    pub summary: Utf8PathBuf,
}

/// Where a run's datasets and audit artifacts end up.
pub trait RunStorage: Send + Sync {
    fn persist_records(
        &self,
        label: &str,
        included: &[Record],
        excluded: &[ExcludedRecord],
    ) -> Result<RecordFiles, KiraError>;

    fn persist_flow(&self, flow: &PrismaFlow) -> Result<FlowFiles, KiraError>;

    fn persist_screening_log(&self, log: &ScreeningLog) -> Result<ScreeningFiles, KiraError>;

    fn persist_quality_report(
        &self,
        label: &str,
        report: &QualityReport,
    ) -> Result<Utf8PathBuf, KiraError>;
}

/// Filesystem layout under an output root:
///
/// ```text
/// data/processed/<label>_<YYYYMMDD>_processed.csv
/// data/excluded/<label>_<YYYYMMDD>_excluded.csv
/// data/prisma_flows/<label>_<YYYYMMDD>_prisma_flow.json
/// data/prisma_flows/<label>_report.txt
/// data/<label>_<YYYYMMDD>_quality_report.txt
/// logs/<label>_<YYYYMMDD_HHMMSS>_screening.log
/// logs/<label>_<YYYYMMDD_HHMMSS>_screening_summary.txt
/// ```
#[derive(Debug, Clone)]
pub struct FsStore {
    root: Utf8PathBuf,
    started_at: DateTime<Local>,
}

impl FsStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self::with_timestamp(root, Local::now())
    }

    pub fn with_timestamp(root: impl Into<Utf8PathBuf>, started_at: DateTime<Local>) -> Self {
        Self {
            root: root.into(),
            started_at,
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn date(&self) -> String {
        self.started_at.format("%Y%m%d").to_string()
    }

    fn datetime(&self) -> String {
        self.started_at.format("%Y%m%d_%H%M%S").to_string()
    }

    pub fn processed_path(&self, label: &str) -> Utf8PathBuf {
        self.root
            .join("data")
            .join("processed")
            .join(format!("{label}_{}_processed.csv", self.date()))
    }

    pub fn excluded_path(&self, label: &str) -> Utf8PathBuf {
        self.root
            .join("data")
            .join("excluded")
            .join(format!("{label}_{}_excluded.csv", self.date()))
    }

    pub fn flow_json_path(&self, label: &str) -> Utf8PathBuf {
        self.root
            .join("data")
            .join("prisma_flows")
            .join(format!("{label}_{}_prisma_flow.json", self.date()))
    }

    pub fn flow_report_path(&self, label: &str) -> Utf8PathBuf {
        self.root
            .join("data")
            .join("prisma_flows")
            .join(format!("{label}_report.txt"))
    }

    pub fn quality_report_path(&self, label: &str) -> Utf8PathBuf {
        self.root
            .join("data")
            .join(format!("{label}_{}_quality_report.txt", self.date()))
    }

    pub fn screening_log_path(&self, label: &str) -> Utf8PathBuf {
        self.root
            .join("logs")
            .join(format!("{label}_{}_screening.log", self.datetime()))
    }

    pub fn screening_summary_path(&self, label: &str) -> Utf8PathBuf {
        self.root
            .join("logs")
            .join(format!("{label}_{}_screening_summary.txt", self.datetime()))
    }
}

impl RunStorage for FsStore {
    fn persist_records(
        &self,
        label: &str,
        included: &[Record],
        excluded: &[ExcludedRecord],
    ) -> Result<RecordFiles, KiraError> {
        let processed = self.processed_path(label);
        write_atomic(&processed, |file| {
            let mut csv = csv::Writer::from_writer(file);
            if included.is_empty() {
                csv.write_record(RecordRow::COLUMNS)?;
            }
            for record in included {
                csv.serialize(RecordRow::new(record, None)?)?;
            }
            csv.flush().map_err(io_error)
        })?;

        let excluded_path = if excluded.is_empty() {
            None
        } else {
            let path = self.excluded_path(label);
            write_atomic(&path, |file| {
                let mut csv = csv::Writer::from_writer(file);
                for entry in excluded {
                    csv.serialize(RecordRow::new(&entry.record, Some(&entry.reason))?)?;
                }
                csv.flush().map_err(io_error)
            })?;
            Some(path)
        };

        Ok(RecordFiles {
            processed,
            excluded: excluded_path,
        })
    }

    fn persist_flow(&self, flow: &PrismaFlow) -> Result<FlowFiles, KiraError> {
        let json = self.flow_json_path(flow.label());
        let content = flow.to_json()?;
        write_atomic(&json, |file| {
            file.write_all(content.as_bytes()).map_err(io_error)
        })?;

        let report = self.flow_report_path(flow.label());
        let text = flow.render_text_report();
        write_atomic(&report, |file| file.write_all(text.as_bytes()).map_err(io_error))?;
        Ok(FlowFiles { json, report })
    }

    fn persist_screening_log(&self, log: &ScreeningLog) -> Result<ScreeningFiles, KiraError> {
        let path = self.screening_log_path(log.label());
        write_atomic(&path, |file| log.write_csv(file))?;

        let summary = self.screening_summary_path(log.label());
        let text = log.render_summary();
        write_atomic(&summary, |file| file.write_all(text.as_bytes()).map_err(io_error))?;
        Ok(ScreeningFiles { log: path, summary })
    }

    fn persist_quality_report(
        &self,
        label: &str,
        report: &QualityReport,
    ) -> Result<Utf8PathBuf, KiraError> {
        let path = self.quality_report_path(label);
        let text = report.render_text(&self.started_at.to_rfc3339());
        write_atomic(&path, |file| file.write_all(text.as_bytes()).map_err(io_error))?;
        Ok(path)
    }
}

/// Flat CSV view of a [`Record`]; `extra` is embedded as a JSON object.
#[derive(Debug, Serialize)]
struct RecordRow<'a> {
    source: &'static str,
    condition: &'a str,
    id: &'a str,
    title: &'a str,
    description: &'a str,
    organism: &'a str,
    sample: &'a str,
    sample_confidence: String,
    quality_score: Option<f64>,
    quality_grade: Option<String>,
    completeness: Option<f64>,
    title_score: Option<f64>,
    description_score: Option<f64>,
    sample_score: Option<f64>,
    organism_score: Option<f64>,
    extra: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    exclusion_reason: Option<&'a str>,
}

impl<'a> RecordRow<'a> {
    /// Header for a processed file; serialization only emits it with the first row.
    const COLUMNS: &'static [&'static str] = &[
        "source",
        "condition",
        "id",
        "title",
        "description",
        "organism",
        "sample",
        "sample_confidence",
        "quality_score",
        "quality_grade",
        "completeness",
        "title_score",
        "description_score",
        "sample_score",
        "organism_score",
        "extra",
    ];

    fn new(record: &'a Record, exclusion_reason: Option<&'a str>) -> Result<Self, KiraError> {
        let extra = serde_json::to_string(&record.extra)
            .map_err(|err| KiraError::Csv(err.to_string()))?;
        let breakdown = record.quality.map(|quality| quality.breakdown);
        Ok(Self {
            source: record.source.display_name(),
            condition: &record.condition,
            id: &record.id,
            title: &record.title,
            description: &record.description,
            organism: &record.organism,
            sample: record.sample.as_deref().unwrap_or_default(),
            sample_confidence: record.sample_confidence.to_string(),
            quality_score: record.score(),
            quality_grade: record.grade().map(|grade| grade.to_string()),
            completeness: breakdown.map(|scores| scores.completeness),
            title_score: breakdown.map(|scores| scores.title),
            description_score: breakdown.map(|scores| scores.description),
            sample_score: breakdown.map(|scores| scores.sample),
            organism_score: breakdown.map(|scores| scores.organism),
            extra,
            exclusion_reason,
        })
    }
}

/// Writes through a temp file in the target directory, then renames it into place.
pub fn write_atomic<F>(path: &Utf8Path, write: F) -> Result<(), KiraError>
where
    F: FnOnce(&mut File) -> Result<(), KiraError>,
{
    let parent = path
        .parent()
        .ok_or_else(|| KiraError::Filesystem(format!("invalid destination path {path}")))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("create {parent}: {err}")))?;
    let mut temp = Builder::new()
        .prefix(".kira-dm")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    write(temp.as_file_mut())?;
    temp.as_file_mut()
        .sync_all()
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("persist {path}: {}", err.error)))?;
    Ok(())
}

fn io_error(err: std::io::Error) -> KiraError {
    KiraError::Filesystem(err.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::domain::Registry;
    use crate::prisma::ScreeningDecision;
    use crate::quality::QualityAssessor;

    fn store(root: &Utf8Path) -> FsStore {
        let started_at = Local
            .with_ymd_and_hms(2024, 5, 17, 9, 30, 5)
            .single()
            .unwrap();
        FsStore::with_timestamp(root.to_owned(), started_at)
    }

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, root)
    }

    #[test]
    fn layout_paths() {
        let store = store(Utf8Path::new("out"));
        assert_eq!(
            store.processed_path("salt"),
            Utf8PathBuf::from("out/data/processed/salt_20240517_processed.csv")
        );
        assert_eq!(
            store.flow_report_path("salt"),
            Utf8PathBuf::from("out/data/prisma_flows/salt_report.txt")
        );
        assert_eq!(
            store.screening_log_path("salt"),
            Utf8PathBuf::from("out/logs/salt_20240517_093005_screening.log")
        );
    }

    #[test]
    fn records_are_written_as_csv() {
        let (_dir, root) = temp_root();
        let store = store(&root);
        let mut kept = Record::new(Registry::Geo, "salt", "GSE1");
        kept.title = "Salt, stress".to_string();
        kept.extra.insert("n_samples".to_string(), "4".to_string());
        QualityAssessor::default().assess_in_place(&mut kept);
        let dropped = ExcludedRecord {
            record: Record::new(Registry::Sra, "salt", "SRX2"),
            reason: "below quality threshold".to_string(),
        };

        let files = store
            .persist_records("salt", std::slice::from_ref(&kept), &[dropped])
            .unwrap();
        let processed = fs::read_to_string(files.processed.as_std_path()).unwrap();
        let mut lines = processed.lines();
        assert!(lines.next().unwrap().starts_with("source,condition,id,title"));
        assert!(lines.next().unwrap().starts_with("GEO,salt,GSE1,\"Salt, stress\""));

        let excluded = fs::read_to_string(files.excluded.unwrap().as_std_path()).unwrap();
        assert!(excluded.lines().next().unwrap().ends_with("exclusion_reason"));
        assert!(excluded.contains("below quality threshold"));
    }

    #[test]
    fn empty_exclusions_skip_file() {
        let (_dir, root) = temp_root();
        let files = store(&root).persist_records("salt", &[], &[]).unwrap();
        assert!(files.excluded.is_none());
        let processed = fs::read_to_string(files.processed.as_std_path()).unwrap();
        assert_eq!(processed.trim_end(), RecordRow::COLUMNS.join(","));
    }

    #[test]
    fn explicit_header_matches_serialized_header() {
        let record = Record::new(Registry::Sra, "salt", "SRX1");
        let mut csv = csv::Writer::from_writer(Vec::new());
        csv.serialize(RecordRow::new(&record, None).unwrap()).unwrap();
        let bytes = csv.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().next().unwrap(), RecordRow::COLUMNS.join(","));
    }

    #[test]
    fn flow_and_log_are_persisted() {
        let (_dir, root) = temp_root();
        let store = store(&root);
        let mut flow = PrismaFlow::new("salt stress", "salt");
        flow.record_identified("SRA", 1).unwrap();
        flow.set_screened(1).unwrap();
        flow.set_included(1).unwrap();
        let files = store.persist_flow(&flow).unwrap();
        let loaded = PrismaFlow::load(files.json.as_std_path()).unwrap();
        assert_eq!(loaded.counts(), flow.counts());
        assert!(files.report.as_std_path().exists());

        let mut log = ScreeningLog::new("salt");
        log.append("SRX1", "SRA", ScreeningDecision::Included).unwrap();
        let files = store.persist_screening_log(&log).unwrap();
        let loaded = ScreeningLog::load("salt", files.log.as_std_path()).unwrap();
        assert_eq!(loaded.statistics(), log.statistics());
        let summary = fs::read_to_string(files.summary.as_std_path()).unwrap();
        assert!(summary.contains("Total records screened: 1"));
    }

    #[test]
    fn rewrite_replaces_previous_file() {
        let (_dir, root) = temp_root();
        let path = root.join("nested").join("file.txt");
        write_atomic(&path, |file| file.write_all(b"first").map_err(io_error)).unwrap();
        write_atomic(&path, |file| file.write_all(b"second").map_err(io_error)).unwrap();
        assert_eq!(fs::read_to_string(path.as_std_path()).unwrap(), "second");
    }
}
