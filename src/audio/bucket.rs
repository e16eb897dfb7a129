/// Rounds to 6 decimal places, the precision peaks are reported with.
pub fn round6(value: f64) -> f32 {
    ((value * 1_000_000.0).round() / 1_000_000.0) as f32
}

/// Forces `peaks` to exactly `len` entries: truncate, then zero-pad.
pub fn fit_to_length(peaks: &mut Vec<f32>, len: usize) {
    peaks.truncate(len);
    peaks.resize(len, 0.0);
}

/// Max-abs bucketing of a sample stream into at most `target` peaks.
///
/// Samples are clamped to `[0, 1]` after taking the absolute value, and
/// non-finite samples are skipped, so every completed peak is a valid
/// envelope value.
#[derive(Debug, Clone)]
pub struct BucketAccumulator {
    bucket_size: usize,
    target: usize,
    current_peak: f32,
    current_count: usize,
    completed: Vec<f32>,
    samples_seen: u64,
}

impl BucketAccumulator {
    pub fn new(bucket_size: usize, target: usize) -> Self {
        Self {
            bucket_size: bucket_size.max(1),
            target,
            current_peak: 0.0,
            current_count: 0,
            completed: Vec::with_capacity(target),
            samples_seen: 0,
        }
    }

    /// Feeds one sample. Returns `true` once `target` buckets are complete,
    /// at which point the producer can stop.
    pub fn push(&mut self, sample: f32) -> bool {
        self.samples_seen += 1;
        let amplitude = sample.abs();
        if amplitude.is_finite() {
            self.current_peak = self.current_peak.max(amplitude.min(1.0));
        }
        self.current_count += 1;

        if self.current_count >= self.bucket_size {
            self.completed.push(round6(self.current_peak as f64));
            self.current_peak = 0.0;
            self.current_count = 0;
        }
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.completed.len() >= self.target
    }

    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    pub fn completed(&self) -> usize {
        self.completed.len()
    }

    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    /// Flushes a trailing partial bucket and returns exactly `target` peaks.
    pub fn finish(mut self) -> Vec<f32> {
        if self.current_count > 0 && self.completed.len() < self.target {
            self.completed.push(round6(self.current_peak as f64));
        }
        fit_to_length(&mut self.completed, self.target);
        self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_six_places() {
        assert_eq!(round6(0.123_456_78), 0.123_457);
        assert_eq!(round6(0.5), 0.5);
        assert_eq!(round6(0.0), 0.0);
    }

    #[test]
    fn fit_pads_and_truncates() {
        let mut short = vec![0.3, 0.4];
        fit_to_length(&mut short, 4);
        assert_eq!(short, vec![0.3, 0.4, 0.0, 0.0]);

        let mut long = vec![0.1, 0.2, 0.3];
        fit_to_length(&mut long, 2);
        assert_eq!(long, vec![0.1, 0.2]);
    }

    #[test]
    fn takes_max_abs_per_bucket() {
        let mut acc = BucketAccumulator::new(2, 3);
        for s in [0.1, -0.7, 0.2, 0.3, -0.05, 0.0] {
            acc.push(s);
        }
        assert_eq!(acc.completed(), 3);
        assert_eq!(acc.finish(), vec![0.7, 0.3, 0.05]);
    }

    #[test]
    fn signals_when_full() {
        let mut acc = BucketAccumulator::new(1, 2);
        assert!(!acc.push(0.2));
        assert!(acc.push(0.4));
        assert!(acc.is_full());
    }

    #[test]
    fn flushes_partial_bucket_and_pads() {
        let mut acc = BucketAccumulator::new(4, 3);
        for s in [0.25; 6] {
            acc.push(s);
        }
        // one full bucket, one partial of two samples, one padded
        assert_eq!(acc.finish(), vec![0.25, 0.25, 0.0]);
    }

    #[test]
    fn no_partial_flush_once_full() {
        let mut acc = BucketAccumulator::new(2, 2);
        for s in [0.5, 0.5, 0.5, 0.5, 0.9] {
            acc.push(s);
        }
        assert_eq!(acc.finish(), vec![0.5, 0.5]);
    }

    #[test]
    fn clamps_out_of_range_and_skips_non_finite() {
        let mut acc = BucketAccumulator::new(2, 2);
        acc.push(1.8);
        acc.push(0.1);
        acc.push(f32::NAN);
        acc.push(-0.4);
        assert_eq!(acc.finish(), vec![1.0, 0.4]);
    }

    #[test]
    fn zero_bucket_size_is_treated_as_one() {
        let acc = BucketAccumulator::new(0, 5);
        assert_eq!(acc.bucket_size(), 1);
    }
}
