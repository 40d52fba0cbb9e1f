use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{Record, Registry};
use crate::error::KiraError;
use crate::registry::{ParsedSummary, RawSummary, SampleEvidence, SummaryParser};

use super::{as_object, clean_text, first_non_empty, missing_accession, text_field};

const MAX_RUNS: usize = 5;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<Title>(.*?)</Title>").expect("static regex"));
static EXPERIMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<Experiment\s[^>]*acc="([^"]+)""#).expect("static regex"));
static ORGANISM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"ScientificName="([^"]+)""#).expect("static regex"));
static SAMPLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<Sample\s[^>]*name="([^"]*)""#).expect("static regex"));
static STRATEGY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<LIBRARY_STRATEGY>([^<]*)</LIBRARY_STRATEGY>").expect("static regex")
});
static SOURCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<LIBRARY_SOURCE>([^<]*)</LIBRARY_SOURCE>").expect("static regex")
});
static LAYOUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<LIBRARY_LAYOUT>\s*<(\w+)").expect("static regex"));
static PLATFORM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Platform[^>]*>([^<]*)</Platform>").expect("static regex"));
static BIOSAMPLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Biosample>([^<]*)</Biosample>").expect("static regex"));
static TISSUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)tissue="([^"]+)"|<tissue>([^<]+)</tissue>"#).expect("static regex")
});
static RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([SED]RR\d+)\b").expect("static regex"));

/// SRA experiments. Most metadata lives in the `expxml` XML fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SraParser;

impl SummaryParser for SraParser {
    fn parse_summary(
        &self,
        summary: &RawSummary,
        condition: &str,
    ) -> Result<ParsedSummary, KiraError> {
        let fields = as_object(Registry::Sra, summary)?;
        let expxml = text_field(fields, "expxml");
        let capture = |re: &Regex| -> String {
            re.captures(&expxml)
                .and_then(|caps| caps.get(1))
                .map(|m| clean_text(m.as_str()))
                .unwrap_or_default()
        };

        let id = first_non_empty([capture(&EXPERIMENT_RE), text_field(fields, "uid")])
            .ok_or_else(|| missing_accession(Registry::Sra))?;
        let organism = capture(&ORGANISM_RE);
        let sample_name = capture(&SAMPLE_RE);
        let strategy = capture(&STRATEGY_RE);
        let source = capture(&SOURCE_RE);

        let mut record = Record::new(Registry::Sra, condition, id);
        record.title = capture(&TITLE_RE);
        record.description = if strategy.is_empty() && organism.is_empty() {
            String::new()
        } else {
            clean_text(&format!("{strategy} from {organism}"))
        };
        record.organism = organism;

        let runs = run_accessions(&text_field(fields, "runs"));
        for (key, value) in [
            ("runs", runs.join(", ")),
            ("library_strategy", strategy.clone()),
            ("library_source", source.clone()),
            ("library_layout", capture(&LAYOUT_RE)),
            ("platform", capture(&PLATFORM_RE)),
            ("sample", sample_name.clone()),
            ("biosample", capture(&BIOSAMPLE_RE)),
        ] {
            if !value.is_empty() {
                record.extra.insert(key.to_string(), value);
            }
        }

        let explicit = TISSUE_RE.captures(&expxml).and_then(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|m| clean_text(m.as_str()))
        });
        let sample_evidence = match explicit {
            Some(tissue) if !tissue.is_empty() => SampleEvidence::Explicit(tissue),
            _ => SampleEvidence::Text(clean_text(&format!(
                "{} {sample_name} {strategy} {source}",
                record.title
            ))),
        };

        Ok(ParsedSummary {
            record,
            sample_evidence,
        })
    }
}

fn run_accessions(runs: &str) -> Vec<String> {
    RUN_RE
        .captures_iter(runs)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .take(MAX_RUNS)
        .collect()
}
