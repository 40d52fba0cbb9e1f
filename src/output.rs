use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, RunResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Prints progress lines to stderr so stdout stays clean for results.
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("[{:>6.1}s] {}", elapsed.as_secs_f64(), event.message),
            None => eprintln!("{}", event.message),
        }
    }
}

pub fn print_run_summary(result: &RunResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";
    let summary = &result.summary;

    println!("{cyan}KIRA-DM summary: {}{reset}", result.label);
    println!("  identified: {}", summary.identified);
    if summary.removed_before_screening > 0 {
        println!(
            "{yellow}  removed before screening: {}{reset}",
            summary.removed_before_screening
        );
    }
    println!("  screened:   {}", summary.screened);
    println!("{green}  included:   {}{reset}", summary.included);
    println!(
        "{yellow}  excluded:   {} ({:.1}%){reset}",
        summary.excluded, summary.exclusion_rate
    );

    let files = &result.files;
    println!("{cyan}Files{reset}");
    println!("  {}", files.processed);
    if let Some(excluded) = &files.excluded {
        println!("  {excluded}");
    }
    for path in [
        &files.quality_report,
        &files.flow_json,
        &files.flow_report,
        &files.screening_log,
        &files.screening_summary,
    ] {
        println!("  {path}");
    }
}
