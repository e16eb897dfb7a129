use std::io::{BufRead, BufReader, Read};
use std::process::{ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use super::watchdog::{lock, SharedChild, Watchdog};
use crate::error::{AnalysisError, Result};

const STDERR_TAIL_BYTES: usize = 2048;
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Result of running a utility to completion.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Converts a non-zero exit into `ProcessExit`.
    pub fn into_success(self, program: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(AnalysisError::ProcessExit {
                program: program.to_string(),
                code: self.exit_code,
                stderr: stderr_tail(&self.stderr),
            })
        }
    }
}

/// Live stdout of a running utility.
pub trait OutputStream: Read + Send {
    /// Terminates the process. Reads after a kill return EOF once the pipe drains.
    fn kill(&mut self) -> Result<()>;

    /// Waits for the process to exit and returns its exit code.
    fn finish(&mut self) -> Result<Option<i32>>;

    /// The deadline that killed the process, if it fired.
    fn timed_out(&self) -> Option<Duration> {
        None
    }
}

/// Spawns external utilities. Implementations must be shareable across
/// threads so independent files can be analysed concurrently.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;

    fn stream(&self, program: &str, args: &[String]) -> Result<Box<dyn OutputStream>>;
}

/// Runs real OS processes through `std::process`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemRunner {
    timeout: Option<Duration>,
    max_output_bytes: u64,
}

impl SystemRunner {
    pub fn new(timeout: Option<Duration>, max_output_bytes: u64) -> Self {
        Self {
            timeout,
            max_output_bytes,
        }
    }

    fn spawn(&self, program: &str, args: &[String]) -> Result<(SharedChild, ChildStdout, ChildStderr)> {
        log::debug!("spawning {} {}", program, args.join(" "));
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| AnalysisError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        match (stdout, stderr) {
            (Some(stdout), Some(stderr)) => Ok((Arc::new(Mutex::new(child)), stdout, stderr)),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                Err(AnalysisError::Io(std::io::Error::other(format!(
                    "{program} pipes were not captured"
                ))))
            }
        }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(120)), 64 * 1024 * 1024)
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let (child, stdout, stderr) = self.spawn(program, args)?;
        let mut watchdog = Watchdog::arm(program, Arc::clone(&child), self.timeout);

        let stderr_reader = std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = BufReader::new(stderr).read_to_end(&mut buf);
            buf
        });

        let mut out = Vec::new();
        let read = stdout.take(self.max_output_bytes.saturating_add(1)).read_to_end(&mut out);
        let overflowed = out.len() as u64 > self.max_output_bytes;
        if overflowed {
            let _ = lock(&child).kill();
        }

        let status = wait_polling(&child);
        let timed_out = watchdog.disarm();
        let err_bytes = stderr_reader.join().unwrap_or_default();

        read?;
        let status = status?;
        if timed_out {
            return Err(AnalysisError::Timeout {
                program: program.to_string(),
                timeout: self.timeout.unwrap_or_default(),
            });
        }
        if overflowed {
            return Err(AnalysisError::Parse(format!(
                "{} wrote more than {} bytes to stdout",
                program, self.max_output_bytes
            )));
        }

        Ok(CommandOutput {
            exit_code: status.code(),
            stdout: String::from_utf8_lossy(&out).into_owned(),
            stderr: String::from_utf8_lossy(&err_bytes).into_owned(),
        })
    }

    fn stream(&self, program: &str, args: &[String]) -> Result<Box<dyn OutputStream>> {
        let (child, stdout, stderr) = self.spawn(program, args)?;
        let watchdog = Watchdog::arm(program, Arc::clone(&child), self.timeout);

        let tag = program.to_string();
        let stderr_drain = std::thread::spawn(move || {
            for line in BufReader::new(stderr).split(b'\n') {
                match line {
                    Ok(line) => log::debug!("{}: {}", tag, String::from_utf8_lossy(&line).trim_end()),
                    Err(_) => break,
                }
            }
        });

        Ok(Box::new(SystemStream {
            child,
            timeout: self.timeout,
            stdout: Some(stdout),
            watchdog,
            stderr_drain: Some(stderr_drain),
            reaped: false,
        }))
    }
}

struct SystemStream {
    child: SharedChild,
    timeout: Option<Duration>,
    stdout: Option<ChildStdout>,
    watchdog: Watchdog,
    stderr_drain: Option<JoinHandle<()>>,
    reaped: bool,
}

impl Read for SystemStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.stdout.as_mut() {
            Some(stdout) => stdout.read(buf),
            None => Ok(0),
        }
    }
}

impl OutputStream for SystemStream {
    fn kill(&mut self) -> Result<()> {
        lock(&self.child).kill()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<i32>> {
        // Close our end so a child still writing gets EPIPE instead of blocking.
        self.stdout = None;
        let status = wait_polling(&self.child);
        self.reaped = true;
        self.watchdog.disarm();
        if let Some(drain) = self.stderr_drain.take() {
            let _ = drain.join();
        }
        Ok(status?.code())
    }

    fn timed_out(&self) -> Option<Duration> {
        self.timeout.filter(|_| self.watchdog.fired())
    }
}

impl Drop for SystemStream {
    fn drop(&mut self) {
        if !self.reaped {
            self.watchdog.disarm();
            let mut child = lock(&self.child);
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Waits without holding the child lock so the watchdog can still kill it.
fn wait_polling(child: &SharedChild) -> Result<ExitStatus> {
    loop {
        if let Some(status) = lock(child).try_wait()? {
            return Ok(status);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}
