//! Reporting sink: running counters plus rendered result lines.

use parking_lot::Mutex;
use tracing::{error, info};

use crate::error::Error;

/// Visual/log treatment of a report block. No semantics beyond grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCategory {
    /// Top-level story heading.
    Story,
    /// Scenario group inside a story.
    Group,
    /// Fine-grained sub-block.
    Detail,
}

/// Running totals for one test run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Results {
    pub total: u32,
    pub ok: u32,
    pub fail: u32,
    /// Expected number of results, for `12/340`-style counters. Zero
    /// when unknown.
    pub expected: u32,
}

impl Results {
    /// Summary line printed at the end of a run.
    pub fn summary(&self) -> String {
        format!(
            "Total: {} Passed: {} Failed: {}",
            self.total, self.ok, self.fail
        )
    }
}

/// Accumulates results and renders them to the log stream.
///
/// The only place where a thrown error is converted into a recorded
/// "fail" outcome instead of aborting the run.
#[derive(Debug, Default)]
pub struct Reporter {
    results: Mutex<Results>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset counters, keeping the expected total.
    pub fn reset(&self, expected: u32) {
        *self.results.lock() = Results {
            expected,
            ..Results::default()
        };
    }

    pub fn results(&self) -> Results {
        *self.results.lock()
    }

    /// Record a pass/fail result and render its line.
    pub fn add_result(&self, descr: &str, res: bool) {
        let counter = self.count(res);
        if res {
            info!(target: "uiprobe::report", "[{counter}] {descr}: OK");
        } else {
            error!(target: "uiprobe::report", "[{counter}] {descr}: FAIL");
        }
    }

    /// Record an error as a failing result; its message becomes the line.
    pub fn add_error(&self, err: &Error) {
        let counter = self.count(false);
        error!(target: "uiprobe::report", "[{counter}] FAIL {err}");
    }

    fn count(&self, res: bool) -> String {
        let mut results = self.results.lock();
        results.total += 1;
        if res {
            results.ok += 1;
        } else {
            results.fail += 1;
        }

        if results.expected > 0 {
            format!("{}/{}", results.total, results.expected)
        } else {
            results.total.to_string()
        }
    }

    pub fn set_block(&self, title: &str, category: BlockCategory) {
        match category {
            BlockCategory::Story => info!(target: "uiprobe::report", "=== {title} ==="),
            BlockCategory::Group => info!(target: "uiprobe::report", "--- {title} ---"),
            BlockCategory::Detail => info!(target: "uiprobe::report", "{title}"),
        }
    }

    pub fn set_duration(&self, ms: u64) {
        info!(target: "uiprobe::report", "Duration of tests: {}", format_time(ms));
    }
}

const SECOND: u64 = 1000;
const MINUTE: u64 = 60_000;
const HOUR: u64 = 3_600_000;

/// Format milliseconds as `HH:MM:SS`.
fn format_time(ms: u64) -> String {
    let hours = ms / HOUR;
    let minutes = (ms % HOUR) / MINUTE;
    let seconds = (ms % MINUTE) / SECOND;
    format!(
        "{}:{}:{}",
        lead_zero(hours),
        lead_zero(minutes),
        lead_zero(seconds)
    )
}

fn lead_zero(value: u64) -> String {
    if value < 10 {
        format!("0{value}")
    } else {
        value.to_string()
    }
}
