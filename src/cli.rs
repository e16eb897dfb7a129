use clap::Parser;
use peakprobe::config::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "peakprobe", about = "Audio duration and waveform peak extractor")]
pub struct Cli {
    /// Audio files to analyse
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Number of peaks in the waveform envelope
    #[arg(short, long, default_value_t = 1000)]
    pub peaks: usize,

    /// Decode sample rate for the streaming fallback (Hz)
    #[arg(long, default_value_t = 8000)]
    pub sample_rate: u32,

    /// Samples per pixel requested from audiowaveform
    #[arg(long, default_value_t = 256)]
    pub zoom: u32,

    /// Bit depth requested from audiowaveform (8 or 16)
    #[arg(long, default_value_t = 8)]
    pub bits: u32,

    /// Per-process deadline in seconds (0 = none)
    #[arg(long, default_value_t = 120)]
    pub timeout: u64,

    /// Skip audiowaveform and always decode PCM with ffmpeg
    #[arg(long)]
    pub streaming_only: bool,

    /// ffprobe executable
    #[arg(long, default_value = "ffprobe")]
    pub ffprobe: String,

    /// ffmpeg executable
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: String,

    /// audiowaveform executable
    #[arg(long, default_value = "audiowaveform")]
    pub audiowaveform: String,

    /// Files analysed concurrently
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Config file (default: peakprobe.toml or ~/.config/peakprobe/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write JSON here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pretty-print JSON
    #[arg(long)]
    pub pretty: bool,
}

impl Cli {
    /// Overrides config values with flags the user actually changed.
    pub fn apply_to(&self, cfg: &mut Config) {
        if self.peaks != 1000 { cfg.analysis.peak_count = self.peaks; }
        if self.sample_rate != 8000 { cfg.analysis.sample_rate = self.sample_rate; }
        if self.zoom != 256 { cfg.analysis.zoom = self.zoom; }
        if self.bits != 8 { cfg.analysis.bits = self.bits; }
        if self.streaming_only { cfg.analysis.streaming_only = true; }
        if self.timeout != 120 { cfg.tools.timeout_secs = self.timeout; }
        if self.ffprobe != "ffprobe" { cfg.tools.ffprobe = self.ffprobe.clone(); }
        if self.ffmpeg != "ffmpeg" { cfg.tools.ffmpeg = self.ffmpeg.clone(); }
        if self.audiowaveform != "audiowaveform" { cfg.tools.audiowaveform = self.audiowaveform.clone(); }
    }
}
