use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{duration, precomputed, streaming};
use crate::process::runner::{CommandRunner, SystemRunner};

pub const DEFAULT_PEAK_COUNT: usize = 1000;
pub const DEFAULT_SAMPLE_RATE: u32 = 8000;
pub const DEFAULT_ZOOM: u32 = 256;
pub const DEFAULT_BITS: u32 = 8;

/// Duration and waveform envelope of one audio file.
///
/// `peaks`, when present, always holds exactly the configured peak count,
/// each value in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub duration_ms: Option<u64>,
    pub peaks: Option<Vec<f32>>,
}

/// Executable names or paths of the external utilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub ffprobe: String,
    pub ffmpeg: String,
    pub audiowaveform: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffprobe: "ffprobe".into(),
            ffmpeg: "ffmpeg".into(),
            audiowaveform: "audiowaveform".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    pub peak_count: usize,
    /// Decode rate for the streaming strategy.
    pub sample_rate: u32,
    /// Samples per pixel requested from the waveform tool.
    pub zoom: u32,
    pub bits: u32,
    /// Skip the waveform tool and always stream PCM.
    pub streaming_only: bool,
    pub tools: ToolPaths,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            peak_count: DEFAULT_PEAK_COUNT,
            sample_rate: DEFAULT_SAMPLE_RATE,
            zoom: DEFAULT_ZOOM,
            bits: DEFAULT_BITS,
            streaming_only: false,
            tools: ToolPaths::default(),
        }
    }
}

impl AnalysisOptions {
    /// Clamps values the utilities would reject.
    pub fn validated(mut self) -> Self {
        self.peak_count = self.peak_count.max(1);
        self.sample_rate = self.sample_rate.max(1);
        self.zoom = self.zoom.max(1);
        if self.bits != 8 && self.bits != 16 {
            log::warn!("unsupported bit depth {}, using {}", self.bits, DEFAULT_BITS);
            self.bits = DEFAULT_BITS;
        }
        self
    }
}

/// Runs the probe, then the waveform tool, then streaming decode as fallback.
///
/// Stateless between calls; one `Analyzer` can serve many threads.
pub struct Analyzer<R: CommandRunner = SystemRunner> {
    runner: R,
    options: AnalysisOptions,
}

impl Analyzer<SystemRunner> {
    pub fn new(options: AnalysisOptions) -> Self {
        Self::with_runner(SystemRunner::default(), options)
    }
}

impl<R: CommandRunner> Analyzer<R> {
    pub fn with_runner(runner: R, options: AnalysisOptions) -> Self {
        Self {
            runner,
            options: options.validated(),
        }
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn analyze(&self, path: &Path) -> AnalysisResult {
        let opts = &self.options;

        let Some(duration_ms) = duration::probe_duration(&self.runner, &opts.tools.ffprobe, path) else {
            return AnalysisResult::default();
        };

        if !opts.streaming_only {
            if let Some(peaks) = precomputed::compute_peaks(
                &self.runner,
                &opts.tools.audiowaveform,
                path,
                opts.peak_count,
                opts.zoom,
                opts.bits,
            ) {
                log::debug!("{}: peaks from waveform tool", path.display());
                return AnalysisResult {
                    duration_ms: Some(duration_ms),
                    peaks: Some(peaks),
                };
            }
            log::info!("{}: falling back to streaming decode", path.display());
        }

        let peaks = streaming::compute_peaks(
            &self.runner,
            &opts.tools.ffmpeg,
            path,
            duration_ms,
            opts.peak_count,
            opts.sample_rate,
        );
        if peaks.is_none() {
            log::warn!("{}: no waveform available", path.display());
        }

        AnalysisResult {
            duration_ms: Some(duration_ms),
            peaks,
        }
    }
}

/// Analyses `path` with default options and the system's tools.
pub fn analyze(path: impl AsRef<Path>) -> AnalysisResult {
    Analyzer::new(AnalysisOptions::default()).analyze(path.as_ref())
}
