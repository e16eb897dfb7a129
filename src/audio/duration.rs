use std::path::Path;

use super::tool_path_arg;
use crate::error::{AnalysisError, Result};
use crate::process::runner::CommandRunner;

pub fn probe_args(path: &Path) -> Vec<String> {
    vec![
        "-v".into(), "error".into(),
        "-show_entries".into(), "format=duration".into(),
        "-of".into(), "default=noprint_wrappers=1:nokey=1".into(),
        tool_path_arg(path),
    ]
}

/// Parses the probe's plain-text seconds value into whole milliseconds.
/// Returns `None` for anything that is not a finite, positive number.
pub fn parse_duration_ms(stdout: &str) -> Option<u64> {
    let line = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    let seconds: f64 = line.parse().ok()?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    Some((seconds * 1000.0).trunc().max(0.0) as u64)
}

/// Container duration in milliseconds, or `None` when it cannot be determined.
pub fn probe_duration(runner: &dyn CommandRunner, program: &str, path: &Path) -> Option<u64> {
    match try_probe(runner, program, path) {
        Ok(ms) => {
            log::debug!("{}: duration {}ms", path.display(), ms);
            Some(ms)
        }
        Err(err) => {
            log::warn!("{}: duration probe failed: {}", path.display(), err);
            None
        }
    }
}

fn try_probe(runner: &dyn CommandRunner, program: &str, path: &Path) -> Result<u64> {
    let output = runner.run(program, &probe_args(path))?.into_success(program)?;
    parse_duration_ms(&output.stdout)
        .ok_or_else(|| AnalysisError::Parse(format!("duration {:?}", output.stdout.trim())))
}
