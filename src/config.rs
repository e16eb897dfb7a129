use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::analyzer::{AnalysisOptions, ToolPaths};
use crate::process::runner::SystemRunner;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_peak_count")]
    pub peak_count: usize,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_zoom")]
    pub zoom: u32,
    #[serde(default = "default_bits")]
    pub bits: u32,
    #[serde(default)]
    pub streaming_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_audiowaveform")]
    pub audiowaveform: String,
    /// Per-process deadline in seconds; 0 disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            peak_count: default_peak_count(),
            sample_rate: default_sample_rate(),
            zoom: default_zoom(),
            bits: default_bits(),
            streaming_only: false,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffprobe: default_ffprobe(),
            ffmpeg: default_ffmpeg(),
            audiowaveform: default_audiowaveform(),
            timeout_secs: default_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

pub fn default_peak_count() -> usize { 1000 }
pub fn default_sample_rate() -> u32 { 8000 }
pub fn default_zoom() -> u32 { 256 }
pub fn default_bits() -> u32 { 8 }
pub fn default_ffprobe() -> String { "ffprobe".into() }
pub fn default_ffmpeg() -> String { "ffmpeg".into() }
pub fn default_audiowaveform() -> String { "audiowaveform".into() }
pub fn default_timeout_secs() -> u64 { 120 }
pub fn default_max_output_bytes() -> u64 { 64 * 1024 * 1024 }

impl Config {
    pub fn options(&self) -> AnalysisOptions {
        AnalysisOptions {
            peak_count: self.analysis.peak_count,
            sample_rate: self.analysis.sample_rate,
            zoom: self.analysis.zoom,
            bits: self.analysis.bits,
            streaming_only: self.analysis.streaming_only,
            tools: ToolPaths {
                ffprobe: self.tools.ffprobe.clone(),
                ffmpeg: self.tools.ffmpeg.clone(),
                audiowaveform: self.tools.audiowaveform.clone(),
            },
        }
    }

    pub fn runner(&self) -> SystemRunner {
        let timeout = (self.tools.timeout_secs > 0).then(|| Duration::from_secs(self.tools.timeout_secs));
        SystemRunner::new(timeout, self.tools.max_output_bytes)
    }
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

/// Explicit path, else `peakprobe.toml` in the working directory, else the
/// user's config directories.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("peakprobe.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("peakprobe").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("peakprobe").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
