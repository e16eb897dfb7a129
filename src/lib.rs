//! Duration and waveform-envelope extraction for stored audio files.
//!
//! [`analyze`] probes the duration with `ffprobe`, asks `audiowaveform` for a
//! precomputed envelope and, if that fails, streams mono PCM out of `ffmpeg`
//! and buckets it directly. Failures never propagate: they turn into `None`
//! fields on the returned [`AnalysisResult`].

pub mod audio;
pub mod config;
pub mod error;
pub mod process;

pub use audio::analyzer::{analyze, AnalysisOptions, AnalysisResult, Analyzer, ToolPaths};
pub use error::AnalysisError;
pub use process::runner::{CommandOutput, CommandRunner, OutputStream, SystemRunner};
