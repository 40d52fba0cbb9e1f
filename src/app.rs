use std::collections::HashSet;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::annotation::SampleAnnotationInferencer;
use crate::domain::{ConfidenceTier, ExcludedRecord, Record, Registry, SearchRequest};
use crate::error::KiraError;
use crate::prisma::{FlowStage, PrismaFlow, ScreeningDecision, ScreeningLog};
use crate::quality::{QualityAssessor, QualityReport};
use crate::query::{QueryBuilder, validate_query};
use crate::registry::{ParsedSummary, RegistrySource, SampleEvidence};
use crate::store::RunStorage;

pub const QUALITY_EXCLUSION_REASON: &str = "below quality threshold";

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub quality_filter: bool,
    pub min_quality: f64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            quality_filter: true,
            min_quality: crate::config::DEFAULT_MIN_QUALITY,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunFiles {
    pub processed: camino::Utf8PathBuf,
    pub excluded: Option<camino::Utf8PathBuf>,
    pub quality_report: camino::Utf8PathBuf,
    pub flow_json: camino::Utf8PathBuf,
    pub flow_report: camino::Utf8PathBuf,
    pub screening_log: camino::Utf8PathBuf,
    pub screening_summary: camino::Utf8PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSummary {
    pub identified: u64,
    pub removed_before_screening: u64,
    pub screened: u64,
    pub included: u64,
    pub excluded: u64,
    pub exclusion_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub label: String,
    pub included: Vec<Record>,
    pub excluded: Vec<ExcludedRecord>,
    pub files: RunFiles,
    pub summary: RunSummary,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// State owned by a single run. Nothing here outlives [`DataMiner::run`].
pub struct PipelineRun {
    request: SearchRequest,
    raw_ids: IndexMap<Registry, Vec<String>>,
    records: Vec<Record>,
    included: Vec<Record>,
    excluded: Vec<ExcludedRecord>,
    flow: PrismaFlow,
    screening: ScreeningLog,
    started: Instant,
}

impl PipelineRun {
    pub fn new(request: SearchRequest) -> Self {
        let flow = PrismaFlow::new(&request.condition, &request.label);
        let screening = ScreeningLog::new(&request.label);
        Self {
            request,
            raw_ids: IndexMap::new(),
            records: Vec::new(),
            included: Vec::new(),
            excluded: Vec::new(),
            flow,
            screening,
            started: Instant::now(),
        }
    }

    pub fn flow(&self) -> &PrismaFlow {
        &self.flow
    }

    pub fn screening(&self) -> &ScreeningLog {
        &self.screening
    }

    fn progress(&self, sink: &dyn ProgressSink, phase: &str, message: String) {
        sink.event(ProgressEvent {
            message: format!("phase={phase}; {message}"),
            elapsed: Some(self.started.elapsed()),
        });
    }
}

/// Runs the six PRISMA stages over a set of registry sources.
pub struct DataMiner<S: RunStorage> {
    sources: Vec<RegistrySource>,
    assessor: QualityAssessor,
    inferencer: SampleAnnotationInferencer,
    query_builder: QueryBuilder,
    storage: S,
}

impl<S: RunStorage> DataMiner<S> {
    /// Only the first source for each registry is kept.
    pub fn new(
        sources: Vec<RegistrySource>,
        assessor: QualityAssessor,
        inferencer: SampleAnnotationInferencer,
        query_builder: QueryBuilder,
        storage: S,
    ) -> Self {
        let mut seen = HashSet::new();
        let sources = sources
            .into_iter()
            .filter(|source| {
                let first = seen.insert(source.registry);
                if !first {
                    warn!(registry = %source.registry, "ignoring duplicate registry source");
                }
                first
            })
            .collect();
        Self {
            sources,
            assessor,
            inferencer,
            query_builder,
            storage,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn registries(&self) -> Vec<Registry> {
        self.sources.iter().map(|source| source.registry).collect()
    }

    pub fn run(
        &self,
        request: SearchRequest,
        options: RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, KiraError> {
        if !options.min_quality.is_finite() || !(0.0..=100.0).contains(&options.min_quality) {
            return Err(KiraError::InvalidConfig {
                setting: "min_quality".to_string(),
                message: format!("{} is outside 0..=100", options.min_quality),
            });
        }

        let mut run = PipelineRun::new(request);
        info!(
            label = %run.request.label,
            organism = %run.request.organism,
            condition = %run.request.condition,
            experiment = %run.request.experiment,
            "starting run"
        );

        self.identify(&mut run, sink)?;
        self.screen(&mut run, sink)?;
        self.assess(&mut run, sink);
        self.select(&mut run, options, sink)?;
        let files = self.export(&run, sink)?;

        let flow = run.flow.summary();
        let summary = RunSummary {
            identified: flow.total_identified,
            removed_before_screening: flow.total_removed_before_screening,
            screened: flow.total_screened,
            included: flow.total_included,
            excluded: flow.total_excluded,
            exclusion_rate: flow.exclusion_rate,
        };
        run.progress(
            sink,
            "Done",
            format!(
                "{} included, {} excluded",
                summary.included, summary.excluded
            ),
        );
        info!(
            identified = summary.identified,
            screened = summary.screened,
            included = summary.included,
            excluded = summary.excluded,
            "run finished"
        );

        Ok(RunResult {
            label: run.request.label,
            included: run.included,
            excluded: run.excluded,
            files,
            summary,
        })
    }

    fn identify(&self, run: &mut PipelineRun, sink: &dyn ProgressSink) -> Result<(), KiraError> {
        for source in &self.sources {
            let name = source.registry.display_name();
            let query = self.query_builder.build(
                source.registry,
                &run.request.organism,
                &run.request.condition,
                &run.request.experiment,
            );
            run.progress(sink, "Identification", format!("searching {name}"));
            debug!(registry = name, %query, "built query");

            let fetched = if validate_query(&query) {
                source.fetcher.fetch_ids(&query)
            } else {
                Err(KiraError::InvalidRequest(format!("malformed query {query:?}")))
            };
            let ids = match fetched {
                Ok(ids) => ids,
                Err(err) => {
                    warn!(registry = name, error = %err, "identification failed");
                    run.flow
                        .record_fetch_failure(name, FlowStage::Identification, err.to_string())?;
                    Vec::new()
                }
            };
            info!(registry = name, count = ids.len(), "identified records");
            run.flow.record_identified(name, ids.len() as u64)?;
            run.raw_ids.insert(source.registry, ids);
        }
        Ok(())
    }

    fn screen(&self, run: &mut PipelineRun, sink: &dyn ProgressSink) -> Result<(), KiraError> {
        for source in &self.sources {
            let name = source.registry.display_name();
            let ids = run
                .raw_ids
                .get(&source.registry)
                .cloned()
                .unwrap_or_default();
            if ids.is_empty() {
                continue;
            }
            run.progress(
                sink,
                "Screening",
                format!("retrieving {} {name} summaries", ids.len()),
            );

            let mut summaries = match source.fetcher.fetch_summaries(&ids) {
                Ok(summaries) => summaries,
                Err(err) => {
                    warn!(registry = name, error = %err, "summary retrieval failed");
                    run.flow
                        .record_fetch_failure(name, FlowStage::Screening, err.to_string())?;
                    Vec::new()
                }
            };
            summaries.truncate(ids.len());

            let missing = ids.len() - summaries.len();
            if missing > 0 {
                run.flow.record_removed_before_screening(
                    &format!("summary not retrieved ({name})"),
                    missing as u64,
                )?;
            }

            let outcome = source
                .parser
                .parse_summaries(&summaries, &run.request.condition);
            if outcome.failures > 0 {
                warn!(registry = name, failures = outcome.failures, "unparseable summaries");
                run.flow.record_removed_before_screening(
                    &format!("parse failure upstream ({name})"),
                    outcome.failures as u64,
                )?;
            }
            for parsed in outcome.parsed {
                run.records.push(self.annotate(parsed));
            }
        }

        run.progress(
            sink,
            "Screening",
            format!("{} records screened", run.records.len()),
        );
        run.flow.set_screened(run.records.len() as u64)
    }

    fn annotate(&self, parsed: ParsedSummary) -> Record {
        let mut record = parsed.record;
        let annotation = match &parsed.sample_evidence {
            SampleEvidence::Explicit(value) => {
                self.inferencer
                    .infer_with_explicit(Some(value.as_str()), "", &record.organism)
            }
            SampleEvidence::Text(text) => self.inferencer.infer(text, &record.organism),
            SampleEvidence::None => {
                record.sample = None;
                record.sample_confidence = ConfidenceTier::Absent;
                return record;
            }
        };
        record.sample = annotation.label;
        record.sample_confidence = annotation.confidence;
        record
    }

    fn assess(&self, run: &mut PipelineRun, sink: &dyn ProgressSink) {
        run.progress(
            sink,
            "Assessment",
            format!("scoring {} records", run.records.len()),
        );
        for record in &mut run.records {
            self.assessor.assess_in_place(record);
        }
    }

    fn select(
        &self,
        run: &mut PipelineRun,
        options: RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<(), KiraError> {
        let threshold = options.min_quality;
        for record in &run.records {
            let score = record.score().unwrap_or(0.0);
            if !options.quality_filter || score >= threshold {
                run.screening.append_record(
                    record,
                    ScreeningDecision::Included,
                    &format!("score {score:.1}"),
                )?;
                run.included.push(record.clone());
            } else {
                run.screening.append_record(
                    record,
                    ScreeningDecision::excluded(QUALITY_EXCLUSION_REASON),
                    &format!("score {score:.1} below threshold {threshold:.1}"),
                )?;
                run.excluded.push(ExcludedRecord {
                    record: record.clone(),
                    reason: QUALITY_EXCLUSION_REASON.to_string(),
                });
            }
        }

        run.flow
            .record_excluded(QUALITY_EXCLUSION_REASON, run.excluded.len() as u64)?;
        run.flow.set_included(run.included.len() as u64)?;

        let mut by_source: IndexMap<String, u64> = IndexMap::new();
        for record in &run.included {
            *by_source
                .entry(record.source.display_name().to_string())
                .or_default() += 1;
        }
        run.flow.set_included_by_source(by_source)?;

        run.progress(
            sink,
            "Selection",
            format!(
                "{} included, {} excluded",
                run.included.len(),
                run.excluded.len()
            ),
        );
        Ok(())
    }

    fn export(&self, run: &PipelineRun, sink: &dyn ProgressSink) -> Result<RunFiles, KiraError> {
        let label = &run.request.label;
        run.progress(sink, "Export", "writing datasets".to_string());
        let records = self
            .storage
            .persist_records(label, &run.included, &run.excluded)?;

        run.progress(sink, "Audit", "writing PRISMA artifacts".to_string());
        let report = QualityReport::from_records(&run.records);
        let quality_report = self.storage.persist_quality_report(label, &report)?;
        let flow = self.storage.persist_flow(&run.flow)?;
        let screening = self.storage.persist_screening_log(&run.screening)?;

        Ok(RunFiles {
            processed: records.processed,
            excluded: records.excluded,
            quality_report,
            flow_json: flow.json,
            flow_report: flow.report,
            screening_log: screening.log,
            screening_summary: screening.summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;
    use serde_json::json;

    use super::*;
    use crate::parsers::GeoParser;
    use crate::registry::{Fetcher, RawSummary};
    use crate::store::FsStore;

    struct StaticFetcher {
        ids: Result<Vec<String>, String>,
        summaries: Vec<RawSummary>,
    }

    impl Fetcher for StaticFetcher {
        fn fetch_ids(&self, _query: &str) -> Result<Vec<String>, KiraError> {
            self.ids.clone().map_err(KiraError::NcbiHttp)
        }

        fn fetch_summaries(&self, _ids: &[String]) -> Result<Vec<RawSummary>, KiraError> {
            Ok(self.summaries.clone())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<String>>,
    }

    impl ProgressSink for RecordingSink {
        fn event(&self, event: ProgressEvent) {
            self.messages.lock().unwrap().push(event.message);
        }
    }

    fn miner(sources: Vec<RegistrySource>, root: &tempfile::TempDir) -> DataMiner<FsStore> {
        let root = Utf8PathBuf::from_path_buf(root.path().to_path_buf()).unwrap();
        DataMiner::new(
            sources,
            QualityAssessor::default(),
            SampleAnnotationInferencer::default(),
            QueryBuilder::default(),
            FsStore::new(root),
        )
    }

    fn request() -> SearchRequest {
        SearchRequest::new("Arabidopsis thaliana", "salt", "RNA-seq", "salt").unwrap()
    }

    #[test]
    fn fetch_failure_counts_as_zero_identified() {
        let temp = tempfile::tempdir().unwrap();
        let source = RegistrySource::new(
            Registry::Geo,
            Box::new(StaticFetcher {
                ids: Err("connection refused".to_string()),
                summaries: Vec::new(),
            }),
            Box::new(GeoParser),
        );
        let sink = RecordingSink::default();
        let result = miner(vec![source], &temp)
            .run(request(), RunOptions::default(), &sink)
            .unwrap();

        assert_eq!(result.summary.identified, 0);
        assert_eq!(result.summary.screened, 0);
        assert!(result.included.is_empty());
        assert!(result.files.excluded.is_none());

        let flow = PrismaFlow::load(result.files.flow_json.as_std_path()).unwrap();
        assert_eq!(flow.counts().fetch_failures.len(), 1);
        assert_eq!(flow.counts().identified["GEO"], 0);

        let messages = sink.messages.lock().unwrap();
        assert!(messages[0].starts_with("phase=Identification; searching GEO"));
    }

    #[test]
    fn text_evidence_is_inferred() {
        let temp = tempfile::tempdir().unwrap();
        let source = RegistrySource::new(
            Registry::Geo,
            Box::new(StaticFetcher {
                ids: Ok(vec!["1".to_string()]),
                summaries: vec![json!({
                    "uid": "1",
                    "accession": "GSE1",
                    "title": "Salt stress in Arabidopsis roots",
                    "summary": "Roots were sampled after NaCl treatment.",
                    "taxon": "Arabidopsis thaliana"
                })],
            }),
            Box::new(GeoParser),
        );
        let result = miner(vec![source], &temp)
            .run(
                request(),
                RunOptions {
                    quality_filter: false,
                    min_quality: 60.0,
                },
                &RecordingSink::default(),
            )
            .unwrap();

        let record = &result.included[0];
        assert_eq!(record.sample.as_deref(), Some("root"));
        assert_eq!(record.sample_confidence, ConfidenceTier::Inferred);
        assert!(record.quality.is_some());
    }

    #[test]
    fn threshold_outside_range_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let err = miner(Vec::new(), &temp)
            .run(
                request(),
                RunOptions {
                    quality_filter: true,
                    min_quality: 120.0,
                },
                &RecordingSink::default(),
            )
            .unwrap_err();
        assert_matches!(err, KiraError::InvalidConfig { .. });
        assert!(err.is_configuration());
    }
}
