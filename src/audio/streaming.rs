//! Peaks computed by streaming raw PCM out of a decoder process.
//!
//! The decoder is asked for mono `f32le` at a fixed sample rate. Bucket size
//! is derived from the probed duration, so the decoder can be killed as soon
//! as enough buckets exist instead of decoding the tail of long files.

use std::io::ErrorKind;
use std::ops::ControlFlow;
use std::path::Path;

use super::bucket::BucketAccumulator;
use super::pcm::SampleAligner;
use super::tool_path_arg;
use crate::error::{AnalysisError, Result};
use crate::process::runner::{CommandRunner, OutputStream};

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Samples per bucket so that `duration_ms` of audio at `sample_rate`
/// fills `peak_count` buckets.
pub fn bucket_size_for(duration_ms: u64, sample_rate: u32, peak_count: usize) -> usize {
    let total_samples = ((duration_ms as f64 / 1000.0) * sample_rate as f64).floor() as u64;
    let total_samples = total_samples.max(1);
    let peak_count = peak_count.max(1) as u64;
    (total_samples.div_ceil(peak_count) as usize).max(1)
}

pub fn decoder_args(path: &Path, sample_rate: u32) -> Vec<String> {
    vec![
        "-v".into(), "error".into(),
        "-nostdin".into(),
        "-i".into(), tool_path_arg(path),
        "-vn".into(),
        "-ac".into(), "1".into(),
        "-ar".into(), sample_rate.to_string(),
        "-f".into(), "f32le".into(),
        "-acodec".into(), "pcm_f32le".into(),
        "pipe:1".into(),
    ]
}

pub fn compute_peaks(
    runner: &dyn CommandRunner,
    program: &str,
    path: &Path,
    duration_ms: u64,
    peak_count: usize,
    sample_rate: u32,
) -> Option<Vec<f32>> {
    let peak_count = peak_count.max(1);
    match try_compute(runner, program, path, duration_ms, peak_count, sample_rate) {
        Ok(peaks) => Some(peaks),
        Err(err) => {
            log::warn!("{}: streaming waveform failed: {}", path.display(), err);
            None
        }
    }
}

fn try_compute(
    runner: &dyn CommandRunner,
    program: &str,
    path: &Path,
    duration_ms: u64,
    peak_count: usize,
    sample_rate: u32,
) -> Result<Vec<f32>> {
    let bucket_size = bucket_size_for(duration_ms, sample_rate, peak_count);
    log::debug!(
        "{}: streaming decode at {}Hz, {} samples per bucket",
        path.display(),
        sample_rate,
        bucket_size
    );

    let mut stream = runner.stream(program, &decoder_args(path, sample_rate))?;
    let acc = BucketAccumulator::new(bucket_size, peak_count);
    let (acc, killed) = match consume(stream.as_mut(), acc) {
        Ok(done) => done,
        Err(err) => {
            let _ = stream.kill();
            let _ = stream.finish();
            return Err(err);
        }
    };
    let code = stream.finish()?;

    if acc.samples_seen() == 0 {
        if let Some(timeout) = stream.timed_out() {
            return Err(AnalysisError::Timeout {
                program: program.to_string(),
                timeout,
            });
        }
        if code != Some(0) {
            return Err(AnalysisError::ProcessExit {
                program: program.to_string(),
                code,
                stderr: String::new(),
            });
        }
        return Err(AnalysisError::NoSamples);
    }

    if killed {
        log::debug!(
            "{}: stopped decoder after {} samples, {} buckets complete",
            path.display(),
            acc.samples_seen(),
            acc.completed()
        );
    } else if code != Some(0) {
        log::warn!(
            "{}: {} exited with {:?} after {} samples, keeping partial peaks",
            path.display(),
            program,
            code,
            acc.samples_seen()
        );
    }

    Ok(acc.finish())
}

/// Reads the stream to EOF, killing the process once the accumulator is
/// full. Returns the accumulator and whether the early kill happened.
fn consume(
    stream: &mut dyn OutputStream,
    mut acc: BucketAccumulator,
) -> Result<(BucketAccumulator, bool)> {
    let mut aligner = SampleAligner::new();
    let mut buf = vec![0u8; READ_BUFFER_BYTES];

    if acc.is_full() {
        stop(stream);
        return Ok((acc, true));
    }

    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };

        let flow = aligner.feed(&buf[..n], |sample| {
            if acc.push(sample) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        if flow.is_break() {
            stop(stream);
            return Ok((acc, true));
        }
    }

    if aligner.leftover_len() > 0 {
        log::debug!("discarding {} trailing bytes of a partial sample", aligner.leftover_len());
    }
    Ok((acc, false))
}

fn stop(stream: &mut dyn OutputStream) {
    // The process may have exited on its own between the last read and now.
    if let Err(err) = stream.kill() {
        log::debug!("early kill failed: {}", err);
    }
}
