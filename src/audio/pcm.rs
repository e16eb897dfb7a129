use std::ops::ControlFlow;

const SAMPLE_BYTES: usize = 4;

/// Splits an arbitrarily chunked byte stream into little-endian `f32`
/// samples, carrying the 0-3 bytes of a sample that straddles a chunk
/// boundary over to the next chunk.
#[derive(Debug, Default)]
pub struct SampleAligner {
    leftover: Vec<u8>,
}

impl SampleAligner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leftover_len(&self) -> usize {
        self.leftover.len()
    }

    /// Decodes every complete sample in `leftover ++ chunk` and hands it to
    /// `sink`. Stops early if `sink` breaks; the rest of the chunk is dropped.
    pub fn feed<F>(&mut self, chunk: &[u8], mut sink: F) -> ControlFlow<()>
    where
        F: FnMut(f32) -> ControlFlow<()>,
    {
        let mut rest = chunk;

        if !self.leftover.is_empty() {
            let needed = SAMPLE_BYTES - self.leftover.len();
            if rest.len() < needed {
                self.leftover.extend_from_slice(rest);
                return ControlFlow::Continue(());
            }
            self.leftover.extend_from_slice(&rest[..needed]);
            rest = &rest[needed..];
            let sample = decode(&self.leftover);
            self.leftover.clear();
            sink(sample)?;
        }

        let mut samples = rest.chunks_exact(SAMPLE_BYTES);
        for bytes in samples.by_ref() {
            sink(decode(bytes))?;
        }
        self.leftover.extend_from_slice(samples.remainder());
        ControlFlow::Continue(())
    }
}

fn decode(bytes: &[u8]) -> f32 {
    let mut raw = [0u8; SAMPLE_BYTES];
    raw.copy_from_slice(&bytes[..SAMPLE_BYTES]);
    f32::from_le_bytes(raw)
}
