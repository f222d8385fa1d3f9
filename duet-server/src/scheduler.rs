use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use duet_types::RoomCode;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Answer window plus grace ran out
    QuestionTimeout,
    /// Result display is over, move to the next question or finish
    Advance,
    /// Announce the final score
    AnnounceFinish,
    /// Return a finished room to waiting
    AutoReset,
}

/// A deferred phase transition. `question_index` is the round the timer was
/// armed for; a room that has moved on ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimer {
    pub kind: TimerKind,
    pub question_index: usize,
}

impl PhaseTimer {
    pub fn new(kind: TimerKind, question_index: usize) -> Self {
        Self {
            kind,
            question_index,
        }
    }
}

struct PendingTimer {
    id: u64,
    handle: JoinHandle<()>,
}

/// At most one pending timer per room. Arming a new one aborts the old one.
#[derive(Clone, Default)]
pub struct PhaseScheduler {
    pending: Arc<DashMap<RoomCode, PendingTimer>>,
    next_id: Arc<AtomicU64>,
}

impl PhaseScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&self, code: &str, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let pending = self.pending.clone();
        let room_code = code.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Leave the map before running so a handler that re-arms the
            // room never aborts itself.
            pending.remove_if(&room_code, |_, timer| timer.id == id);
            task.await;
        });

        if let Some(previous) = self
            .pending
            .insert(code.to_string(), PendingTimer { id, handle })
        {
            debug!(room_code = %code, "Replacing pending room timer");
            previous.handle.abort();
        }
    }

    /// Best-effort cancellation. Returns whether a timer was pending.
    pub fn cancel(&self, code: &str) -> bool {
        match self.pending.remove(code) {
            Some((_, timer)) => {
                timer.handle.abort();
                debug!(room_code = %code, "Cancelled pending room timer");
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, code: &str) -> bool {
        self.pending
            .get(code)
            .is_some_and(|timer| !timer.handle.is_finished())
    }

    pub fn pending_count(&self) -> usize {
        self.pending
            .iter()
            .filter(|timer| !timer.handle.is_finished())
            .count()
    }
}
