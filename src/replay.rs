//! Replay a captured run through the [`AttackRunner`] boundary.
//!
//! The external dump tool can serialize its outcome as a JSON [`RunReport`]
//! (result set plus tracker). `ReplayRunner` feeds such a capture back into
//! the module, which lets the reporting pipeline run end to end without
//! touching a live target.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::runner::{AttackRunner, DumpRequest, DumpResults, Tracker};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default)]
    pub results: Option<DumpResults>,
    #[serde(default)]
    pub tracker: Tracker,
}

pub struct ReplayRunner {
    report: RunReport,
}

impl ReplayRunner {
    pub fn new(report: RunReport) -> Self {
        Self { report }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)
            .with_context(|| format!("open {}", path.as_ref().display()))?;
        let report: RunReport = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parse {}", path.as_ref().display()))?;
        Ok(Self::new(report))
    }
}

impl AttackRunner for ReplayRunner {
    fn run(&mut self, request: &DumpRequest, host: &str) -> Result<Option<DumpResults>> {
        debug!(
            "replaying dump report for {host} (ca: {}, template: {})",
            request.ca, request.template
        );
        Ok(self.report.results.clone())
    }

    fn last_tracker(&self) -> Tracker {
        self.report.tracker.clone()
    }
}
