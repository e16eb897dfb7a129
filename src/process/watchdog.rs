use std::process::Child;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

pub(crate) type SharedChild = Arc<Mutex<Child>>;

pub(crate) fn lock(child: &SharedChild) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Kills a child process if it is still running when the deadline passes.
///
/// Dropping or disarming the watchdog before the deadline leaves the child
/// alone. Without a deadline no thread is started.
pub(crate) struct Watchdog {
    disarm: Option<Sender<()>>,
    fired: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub fn arm(program: &str, child: SharedChild, timeout: Option<Duration>) -> Self {
        let fired = Arc::new(AtomicBool::new(false));
        let Some(timeout) = timeout else {
            return Self {
                disarm: None,
                fired,
                thread: None,
            };
        };

        let (tx, rx) = mpsc::channel::<()>();
        let flag = Arc::clone(&fired);
        let program = program.to_string();
        let thread = std::thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = rx.recv_timeout(timeout) {
                log::warn!("{} exceeded {}s deadline, killing it", program, timeout.as_secs());
                flag.store(true, Ordering::SeqCst);
                if let Err(err) = lock(&child).kill() {
                    log::debug!("kill after deadline failed for {}: {}", program, err);
                }
            }
        });

        Self {
            disarm: Some(tx),
            fired,
            thread: Some(thread),
        }
    }

    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Stops the timer and reports whether it had already fired.
    pub fn disarm(&mut self) -> bool {
        if let Some(tx) = self.disarm.take() {
            // A send error only means the timer thread already exited.
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        self.fired()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.disarm();
    }
}
