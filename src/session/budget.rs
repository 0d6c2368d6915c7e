use crate::foundation::error::{LyricError, LyricResult};
use crate::session::cancel::CancelToken;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

const CANCEL_POLL: Duration = Duration::from_millis(20);

#[derive(Debug)]
struct BudgetState {
    available: usize,
    next_ticket: u64,
    queue: VecDeque<u64>,
}

/// Worker slots shared by every job in the process.
///
/// Jobs acquire permits before building their thread pool. Waiters are served strictly in
/// arrival order: a large request at the head of the queue is not overtaken by smaller ones.
#[derive(Debug)]
pub struct WorkerBudget {
    total: usize,
    state: Mutex<BudgetState>,
    freed: Condvar,
}

impl WorkerBudget {
    pub fn new(total: usize) -> LyricResult<Arc<Self>> {
        if total == 0 {
            return Err(LyricError::validation("worker budget must be >= 1"));
        }
        Ok(Arc::new(Self {
            total,
            state: Mutex::new(BudgetState {
                available: total,
                next_ticket: 0,
                queue: VecDeque::new(),
            }),
            freed: Condvar::new(),
        }))
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn available(&self) -> usize {
        self.lock().map_or(0, |s| s.available)
    }

    fn lock(&self) -> LyricResult<MutexGuard<'_, BudgetState>> {
        self.state
            .lock()
            .map_err(|_| LyricError::render("worker budget lock poisoned"))
    }

    /// Block until `want` permits (clamped to `1..=total`) are free and every earlier waiter
    /// has been served.
    pub fn acquire(
        self: &Arc<Self>,
        want: usize,
        cancel: &CancelToken,
    ) -> LyricResult<WorkerPermit> {
        let want = want.clamp(1, self.total);
        let mut state = self.lock()?;
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.queue.push_back(ticket);
        if state.queue.len() > 1 || state.available < want {
            tracing::debug!(
                want,
                available = state.available,
                waiting = state.queue.len() - 1,
                "queued for worker permits"
            );
        }

        loop {
            if cancel.is_cancelled() {
                state.queue.retain(|t| *t != ticket);
                drop(state);
                self.freed.notify_all();
                return Err(LyricError::Cancelled);
            }
            if state.queue.front() == Some(&ticket) && state.available >= want {
                state.queue.pop_front();
                state.available -= want;
                drop(state);
                self.freed.notify_all();
                return Ok(WorkerPermit {
                    budget: self.clone(),
                    count: want,
                });
            }
            state = self
                .freed
                .wait_timeout(state, CANCEL_POLL)
                .map_err(|_| LyricError::render("worker budget lock poisoned"))?
                .0;
        }
    }
}

/// Held worker slots; returned to the budget on drop.
#[derive(Debug)]
pub struct WorkerPermit {
    budget: Arc<WorkerBudget>,
    count: usize,
}

impl WorkerPermit {
    pub fn count(&self) -> usize {
        self.count
    }
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        if let Ok(mut state) = self.budget.state.lock() {
            state.available += self.count;
        }
        self.budget.freed.notify_all();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/budget.rs"]
mod tests;
