//! Import diagnostics for failed code units.
//!
//! When a run fails, the controller probes the unit's top-level imports in
//! isolated interpreter subprocesses and folds the findings into the failure
//! context fed back to the reasoning service. A missing module gets reported
//! by name instead of leaving the model to guess from a traceback.

use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use crate::domain::models::ExecutorConfig;

/// Per-module probe timeout. Importing should be fast; anything slower is
/// reported as a failed import rather than held against the session budget.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of probing the imports of one code unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Modules probed, sorted.
    pub modules: Vec<String>,
    /// Modules the interpreter could not find.
    pub missing: Vec<String>,
    /// Modules that raised some other error at import time, with the final
    /// line of the diagnostic.
    pub failed: Vec<(String, String)>,
}

impl ImportReport {
    /// True when every probed module imported cleanly.
    pub fn all_available(&self) -> bool {
        self.missing.is_empty() && self.failed.is_empty()
    }
}

fn import_line_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // `import a`, `import a.b as c`, `import a, b`
            Regex::new(r"(?m)^\s*import\s+([A-Za-z_][\w.]*(?:\s+as\s+\w+)?(?:\s*,\s*[A-Za-z_][\w.]*(?:\s+as\s+\w+)?)*)")
                .expect("static regex"),
            // `from a.b import c` - relative imports (`from . import x`) are skipped
            Regex::new(r"(?m)^\s*from\s+([A-Za-z_][\w.]*)\s+import\s")
                .expect("static regex"),
        ]
    })
}

/// Extract unique top-level imported module names from a code unit.
///
/// Only the first dotted segment is kept: `numpy` from `import numpy.linalg`
/// or `from numpy import array`. Result is sorted and deduplicated.
pub fn imported_modules(code: &str) -> Vec<String> {
    let [plain, from] = import_line_patterns();
    let mut modules: Vec<String> = Vec::new();

    for captures in plain.captures_iter(code) {
        for item in captures[1].split(',') {
            let name = item.trim().split_whitespace().next().unwrap_or_default();
            let top = name.split('.').next().unwrap_or_default();
            if !top.is_empty() {
                modules.push(top.to_string());
            }
        }
    }

    for captures in from.captures_iter(code) {
        let top = captures[1].split('.').next().unwrap_or_default();
        if !top.is_empty() {
            modules.push(top.to_string());
        }
    }

    modules.sort();
    modules.dedup();
    modules
}

/// Probes module availability in isolated interpreter subprocesses.
#[derive(Debug, Clone)]
pub struct ImportProbe {
    config: ExecutorConfig,
}

impl ImportProbe {
    /// Create a probe sharing the executor's interpreter configuration.
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Try importing each of the unit's top-level modules, one subprocess
    /// per module, and classify the failures.
    pub async fn probe_code(&self, code: &str) -> ImportReport {
        let modules = imported_modules(code);
        let mut report = ImportReport {
            modules: modules.clone(),
            ..ImportReport::default()
        };

        for module in modules {
            match self.probe_one(&module).await {
                ProbeResult::Available => {}
                ProbeResult::Missing => report.missing.push(module),
                ProbeResult::Failed(diagnostic) => report.failed.push((module, diagnostic)),
            }
        }

        debug!(
            probed = report.modules.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            "import probe finished"
        );
        report
    }

    async fn probe_one(&self, module: &str) -> ProbeResult {
        let run = Command::new(&self.config.interpreter)
            .arg("-c")
            .arg(format!("import {module}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(PROBE_TIMEOUT, run).await {
            Ok(Ok(output)) if output.status.success() => ProbeResult::Available,
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if stderr.contains("ModuleNotFoundError") || stderr.contains("No module named") {
                    ProbeResult::Missing
                } else {
                    let diagnostic = stderr.lines().last().unwrap_or("unknown error").to_string();
                    ProbeResult::Failed(diagnostic)
                }
            }
            Ok(Err(err)) => ProbeResult::Failed(format!("probe failed to run: {err}")),
            Err(_) => ProbeResult::Failed(format!(
                "import timed out after {}s",
                PROBE_TIMEOUT.as_secs()
            )),
        }
    }
}

enum ProbeResult {
    Available,
    Missing,
    Failed(String),
}
