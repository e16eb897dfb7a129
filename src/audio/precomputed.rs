//! Peaks from a dedicated waveform extraction tool.
//!
//! The tool emits a JSON document whose `data` array interleaves the min and
//! max sample of each zoom window. Those pairs are max-pooled down to the
//! requested peak count and normalised against the loudest pair.

use std::path::Path;

use serde::Deserialize;

use super::bucket::{fit_to_length, round6};
use super::tool_path_arg;
use crate::error::{AnalysisError, Result};
use crate::process::runner::CommandRunner;

const MIN_AMPLITUDE: f64 = 0.000_001;

#[derive(Debug, Deserialize)]
struct ToolWaveform {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    channels: Option<u32>,
    #[serde(default)]
    sample_rate: Option<u32>,
    #[serde(default)]
    samples_per_pixel: Option<u32>,
    #[serde(default)]
    bits: Option<u32>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

pub fn tool_args(path: &Path, zoom: u32, bits: u32) -> Vec<String> {
    vec![
        "-i".into(), tool_path_arg(path),
        "--output-format".into(), "json".into(),
        "-z".into(), zoom.to_string(),
        "-b".into(), bits.to_string(),
        "-o".into(), "-".into(),
    ]
}

pub fn compute_peaks(
    runner: &dyn CommandRunner,
    program: &str,
    path: &Path,
    peak_count: usize,
    zoom: u32,
    bits: u32,
) -> Option<Vec<f32>> {
    let peak_count = peak_count.max(1);
    let result = runner
        .run(program, &tool_args(path, zoom, bits))
        .and_then(|output| output.into_success(program))
        .and_then(|output| peaks_from_json(&output.stdout, peak_count));

    match result {
        Ok(peaks) => Some(peaks),
        Err(err) => {
            log::warn!("{}: waveform tool failed: {}", path.display(), err);
            None
        }
    }
}

/// Parses the tool's JSON and downsamples its `data` to `peak_count` peaks.
pub fn peaks_from_json(json: &str, peak_count: usize) -> Result<Vec<f32>> {
    let doc: ToolWaveform =
        serde_json::from_str(json).map_err(|e| AnalysisError::Parse(format!("waveform JSON: {e}")))?;

    log::debug!(
        "waveform v{:?}: {:?} channel(s), {:?}Hz, {:?} samples/pixel, {:?} bits",
        doc.version,
        doc.channels,
        doc.sample_rate,
        doc.samples_per_pixel,
        doc.bits
    );

    let values: Vec<f64> = match doc.data {
        Some(serde_json::Value::Array(items)) => items.iter().filter_map(|v| v.as_f64()).collect(),
        Some(_) => return Err(AnalysisError::Parse("`data` is not an array".into())),
        None => return Err(AnalysisError::Parse("missing `data` field".into())),
    };
    if values.len() < 2 {
        return Err(AnalysisError::Parse(format!(
            "`data` has {} numeric entries, need at least 2",
            values.len()
        )));
    }

    downsample_pairs(&values, peak_count)
        .ok_or_else(|| AnalysisError::Parse("`data` holds no sample pairs".into()))
}

/// Max-pools interleaved `(min, max)` pairs into exactly `peak_count`
/// normalised peaks. A trailing unpaired value is ignored.
pub fn downsample_pairs(values: &[f64], peak_count: usize) -> Option<Vec<f32>> {
    let amplitudes: Vec<f64> = values
        .chunks_exact(2)
        .map(|pair| pair[0].abs().max(pair[1].abs()))
        .collect();
    if amplitudes.is_empty() {
        return None;
    }

    let max_amp = amplitudes.iter().copied().fold(MIN_AMPLITUDE, f64::max);
    let bucket_size = amplitudes.len().div_ceil(peak_count.max(1));

    let mut peaks: Vec<f32> = amplitudes
        .chunks(bucket_size)
        .take(peak_count)
        .map(|window| {
            let peak = window.iter().copied().fold(0.0, f64::max);
            round6(peak / max_amp)
        })
        .collect();

    fit_to_length(&mut peaks, peak_count);
    Some(peaks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::FakeRunner;

    const TOOL: &str = "audiowaveform";

    #[test]
    fn normalises_against_loudest_pair() {
        let values = [-10.0, 20.0, -64.0, 32.0, -5.0, 5.0, 0.0, 16.0];
        let peaks = downsample_pairs(&values, 4).unwrap();
        assert_eq!(peaks, vec![0.3125, 1.0, 0.078125, 0.25]);
    }

    #[test]
    fn max_pools_windows() {
        // 6 pairs into 3 peaks, 2 pairs per window
        let values = [-1.0, 1.0, -2.0, 2.0, -4.0, 1.0, 0.0, 3.0, -8.0, 8.0, -2.0, 0.0];
        let peaks = downsample_pairs(&values, 3).unwrap();
        assert_eq!(peaks, vec![0.25, 0.5, 1.0]);
    }

    #[test]
    fn few_pairs_are_zero_padded() {
        // k = 3 pairs, N = 10: bucket size 1, 3 real buckets then zeros
        let values = [-2.0, 4.0, -8.0, 1.0, 0.0, 2.0];
        let peaks = downsample_pairs(&values, 10).unwrap();
        assert_eq!(peaks.len(), 10);
        assert_eq!(&peaks[..3], &[0.5, 1.0, 0.25]);
        assert!(peaks[3..].iter().all(|&p| p == 0.0));
    }

    #[test]
    fn partial_last_window_zero_pads_remainder() {
        // 7 pairs, N = 4: bucket size 2, windows 2+2+2+1
        let values: Vec<f64> = (1..=7).flat_map(|i| [-(i as f64), i as f64]).collect();
        let peaks = downsample_pairs(&values, 4).unwrap();
        assert_eq!(peaks.len(), 4);
        assert_eq!(peaks[3], 1.0);
    }

    #[test]
    fn silent_input_stays_at_zero() {
        let peaks = downsample_pairs(&[0.0, 0.0, 0.0, 0.0], 3).unwrap();
        assert_eq!(peaks, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn every_peak_is_in_unit_range() {
        let values: Vec<f64> = (0..5000).map(|i| ((i * 37) % 255) as f64 - 127.0).collect();
        let peaks = downsample_pairs(&values, 1000).unwrap();
        assert_eq!(peaks.len(), 1000);
        assert!(peaks.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn parses_tool_document() {
        let json = r#"{"version":2,"channels":1,"sample_rate":44100,"samples_per_pixel":256,
            "bits":8,"length":2,"data":[-64,128,-32,"x",32]}"#;
        let peaks = peaks_from_json(json, 3).unwrap();
        assert_eq!(peaks, vec![1.0, 0.25, 0.0]);
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(peaks_from_json("not json", 10).is_err());
        assert!(peaks_from_json(r#"{"bits":8}"#, 10).is_err());
        assert!(peaks_from_json(r#"{"data":{"a":1}}"#, 10).is_err());
        assert!(peaks_from_json(r#"{"data":[5]}"#, 10).is_err());
        assert!(peaks_from_json(r#"{"data":["a","b",3]}"#, 10).is_err());
    }

    #[test]
    fn tool_exit_failure_is_none() {
        let runner = FakeRunner::new().output(TOOL, 1, r#"{"data":[1,2,3,4]}"#);
        assert!(compute_peaks(&runner, TOOL, Path::new("/a.mp3"), 10, 256, 8).is_none());
    }

    #[test]
    fn zero_peak_count_is_clamped_to_one() {
        let runner = FakeRunner::new().output(TOOL, 0, r#"{"data":[-1,1,-4,2]}"#);
        let peaks = compute_peaks(&runner, TOOL, Path::new("/a.mp3"), 0, 256, 8).unwrap();
        assert_eq!(peaks, vec![1.0]);
    }

    #[test]
    fn passes_zoom_and_bits() {
        let runner = FakeRunner::new().output(TOOL, 0, r#"{"data":[-1,1,-2,2]}"#);
        let peaks = compute_peaks(&runner, TOOL, Path::new("/a.mp3"), 2, 512, 16).unwrap();
        assert_eq!(peaks, vec![0.5, 1.0]);

        let args = runner.calls()[0].1.join(" ");
        assert!(args.contains("-z 512"));
        assert!(args.contains("-b 16"));
        assert!(args.contains("--output-format json"));
    }
}
