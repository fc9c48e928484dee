//! Pause/abandon signalling between the queue and its worker
//!
//! The queue owns a [`QueueControl`]; the worker holds a [`PauseToken`]
//! and awaits [`PauseToken::checkpoint`] before every page. A checkpoint
//! returns immediately while the queue runs, parks while it is paused, and
//! reports [`Checkpoint::Abandoned`] once the queue has been cleared since
//! the token was issued.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ControlState {
    running: bool,
    /// Bumped by every clear; tokens from older epochs are abandoned
    epoch: u64,
}

/// Outcome of a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Continue,
    Abandoned,
}

/// Sender side, owned by the queue
#[derive(Debug)]
pub struct QueueControl {
    tx: watch::Sender<ControlState>,
}

impl QueueControl {
    pub fn new(running: bool) -> Self {
        let (tx, _rx) = watch::channel(ControlState { running, epoch: 0 });
        Self { tx }
    }

    pub fn set_running(&self, running: bool) {
        self.tx.send_if_modified(|state| {
            let changed = state.running != running;
            state.running = running;
            changed
        });
    }

    pub fn is_running(&self) -> bool {
        self.tx.borrow().running
    }

    pub fn epoch(&self) -> u64 {
        self.tx.borrow().epoch
    }

    /// Invalidate every outstanding token; returns the new epoch
    pub fn abandon(&self) -> u64 {
        let mut epoch = 0;
        self.tx.send_modify(|state| {
            state.epoch += 1;
            epoch = state.epoch;
        });
        epoch
    }

    /// Token bound to the current epoch
    pub fn token(&self) -> PauseToken {
        let rx = self.tx.subscribe();
        let epoch = rx.borrow().epoch;
        PauseToken { rx, epoch }
    }
}

/// Receiver side, held by the worker
#[derive(Debug, Clone)]
pub struct PauseToken {
    rx: watch::Receiver<ControlState>,
    epoch: u64,
}

impl PauseToken {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_abandoned(&self) -> bool {
        self.rx.borrow().epoch != self.epoch
    }

    /// Wait until the queue is running (or this token is abandoned)
    pub async fn checkpoint(&mut self) -> Checkpoint {
        loop {
            let state = *self.rx.borrow_and_update();
            if state.epoch != self.epoch {
                return Checkpoint::Abandoned;
            }
            if state.running {
                return Checkpoint::Continue;
            }
            if self.rx.changed().await.is_err() {
                // Queue dropped
                return Checkpoint::Abandoned;
            }
        }
    }
}
