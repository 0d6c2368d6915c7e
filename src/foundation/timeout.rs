use crate::foundation::error::{LyricError, LyricResult};
use std::process::{Child, ExitStatus};
use std::sync::{Mutex, MutexGuard, PoisonError, mpsc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const POLL: Duration = Duration::from_millis(5);

/// Runs calls on helper threads under a deadline and keeps hold of the ones that overran.
///
/// A call that misses its deadline keeps running on its helper thread. The thread is
/// tracked by key: a later call with the same key waits for it rather than starting another
/// one, and dropping the tracker joins every helper still running.
pub(crate) struct CallTracker {
    what: &'static str,
    stragglers: Mutex<Vec<(u64, JoinHandle<()>)>>,
}

impl CallTracker {
    pub(crate) fn new(what: &'static str) -> Self {
        Self {
            what,
            stragglers: Mutex::new(Vec::new()),
        }
    }

    /// Run `f` on a helper thread and give up after `after`.
    pub(crate) fn call<T, F>(&self, key: u64, after: Duration, f: F) -> LyricResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> LyricResult<T> + Send + 'static,
    {
        self.settle(key, after)?;

        let (tx, rx) = mpsc::sync_channel(1);
        let handle = std::thread::Builder::new()
            .name(format!("lyricframe-{}", self.what))
            .spawn(move || {
                let _ = tx.send(f());
            })
            .map_err(|e| {
                LyricError::transient(format!("failed to spawn {} thread: {e}", self.what))
            })?;

        match rx.recv_timeout(after) {
            Ok(res) => {
                let _ = handle.join();
                res
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                self.lock().push((key, handle));
                Err(LyricError::Timeout {
                    what: self.what.to_owned(),
                    after,
                })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                Err(LyricError::render(format!("{} thread panicked", self.what)))
            }
        }
    }

    /// Number of overrun calls whose helper thread has not finished yet.
    pub(crate) fn running(&self) -> usize {
        self.reap();
        self.lock().len()
    }

    /// Block until every overrun call has finished.
    pub(crate) fn join_all(&self) {
        let pending = std::mem::take(&mut *self.lock());
        if pending.is_empty() {
            return;
        }
        tracing::debug!(
            what = self.what,
            count = pending.len(),
            "waiting for overrun calls to finish"
        );
        for (_, handle) in pending {
            let _ = handle.join();
        }
    }

    /// Wait up to `after` for an earlier overrun call with the same key.
    fn settle(&self, key: u64, after: Duration) -> LyricResult<()> {
        let deadline = Instant::now() + after;
        loop {
            self.reap();
            if !self.lock().iter().any(|(k, _)| *k == key) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(LyricError::Timeout {
                    what: format!("{} (earlier call still running)", self.what),
                    after,
                });
            }
            std::thread::sleep(POLL);
        }
    }

    fn reap(&self) {
        let done: Vec<_> = {
            let mut stragglers = self.lock();
            let (done, running) = std::mem::take(&mut *stragglers)
                .into_iter()
                .partition(|(_, h)| h.is_finished());
            *stragglers = running;
            done
        };
        for (_, handle) in done {
            let _ = handle.join();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(u64, JoinHandle<()>)>> {
        self.stragglers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CallTracker {
    fn drop(&mut self) {
        self.join_all();
    }
}

/// Wait for `child` to exit, killing it once `after` has passed.
pub(crate) fn wait_or_kill(
    child: &mut Child,
    after: Duration,
    what: &str,
) -> LyricResult<ExitStatus> {
    let deadline = Instant::now() + after;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(LyricError::Timeout {
                    what: what.to_owned(),
                    after,
                });
            }
            Ok(None) => std::thread::sleep(POLL),
            Err(e) => {
                return Err(LyricError::transient(format!(
                    "failed to wait for {what}: {e}"
                )));
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/timeout.rs"]
mod tests;
