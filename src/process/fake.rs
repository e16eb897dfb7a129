//! Scripted `CommandRunner` for exercising the computers without real tools.

use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::runner::{CommandOutput, CommandRunner, OutputStream};
use crate::error::{AnalysisError, Result};

#[derive(Clone)]
pub enum Script {
    Output { code: i32, stdout: String },
    Stream { chunks: Vec<Vec<u8>>, code: i32 },
    /// Serves `chunks`, then behaves as if the deadline killed the process.
    TimedOut { chunks: Vec<Vec<u8>>, timeout: Duration },
    Missing,
}

#[derive(Default)]
pub struct FakeRunner {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
    kills: Arc<AtomicUsize>,
    chunks_read: Arc<AtomicUsize>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, program: &str, script: Script) -> Self {
        self.scripts.insert(program.to_string(), script);
        self
    }

    pub fn output(self, program: &str, code: i32, stdout: &str) -> Self {
        self.with(
            program,
            Script::Output {
                code,
                stdout: stdout.to_string(),
            },
        )
    }

    pub fn pcm(self, program: &str, samples: &[f32], chunk_len: usize) -> Self {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let chunks = bytes.chunks(chunk_len.max(1)).map(<[u8]>::to_vec).collect();
        self.with(program, Script::Stream { chunks, code: 0 })
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn called(&self, program: &str) -> bool {
        self.calls().iter().any(|(p, _)| p == program)
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    pub fn chunks_read(&self) -> usize {
        self.chunks_read.load(Ordering::SeqCst)
    }

    fn script(&self, program: &str, args: &[String]) -> Result<Script> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((program.to_string(), args.to_vec()));
        }
        match self.scripts.get(program) {
            Some(Script::Missing) | None => Err(AnalysisError::Spawn {
                program: program.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
            Some(script) => Ok(script.clone()),
        }
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        match self.script(program, args)? {
            Script::Output { code, stdout } => Ok(CommandOutput {
                exit_code: Some(code),
                stdout,
                stderr: String::new(),
            }),
            Script::Stream { chunks, code } => Ok(CommandOutput {
                exit_code: Some(code),
                stdout: String::from_utf8_lossy(&chunks.concat()).into_owned(),
                stderr: String::new(),
            }),
            Script::TimedOut { timeout, .. } => Err(AnalysisError::Timeout {
                program: program.to_string(),
                timeout,
            }),
            Script::Missing => unreachable!(),
        }
    }

    fn stream(&self, program: &str, args: &[String]) -> Result<Box<dyn OutputStream>> {
        let (chunks, code, timeout) = match self.script(program, args)? {
            Script::Stream { chunks, code } => (chunks, code, None),
            Script::Output { code, stdout } => (vec![stdout.into_bytes()], code, None),
            Script::TimedOut { chunks, timeout } => (chunks, 0, Some(timeout)),
            Script::Missing => unreachable!(),
        };
        Ok(Box::new(FakeStream {
            pending: chunks.into_iter().collect(),
            current: VecDeque::new(),
            code,
            timeout,
            killed: false,
            kills: Arc::clone(&self.kills),
            chunks_read: Arc::clone(&self.chunks_read),
        }))
    }
}

struct FakeStream {
    pending: VecDeque<Vec<u8>>,
    current: VecDeque<u8>,
    code: i32,
    timeout: Option<Duration>,
    killed: bool,
    kills: Arc<AtomicUsize>,
    chunks_read: Arc<AtomicUsize>,
}

impl Read for FakeStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.killed {
            return Ok(0);
        }
        if self.current.is_empty() {
            match self.pending.pop_front() {
                Some(chunk) => {
                    self.chunks_read.fetch_add(1, Ordering::SeqCst);
                    self.current = chunk.into();
                }
                None => return Ok(0),
            }
        }
        // One scripted chunk per read at most, so chunk boundaries are preserved.
        let n = buf.len().min(self.current.len());
        for (slot, byte) in buf.iter_mut().zip(self.current.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl OutputStream for FakeStream {
    fn kill(&mut self) -> Result<()> {
        self.killed = true;
        self.kills.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<i32>> {
        Ok(if self.killed || self.timeout.is_some() { None } else { Some(self.code) })
    }

    fn timed_out(&self) -> Option<Duration> {
        self.timeout
    }
}
