//! Command/reply coordination: at most one caller may wait for the
//! asynchronous reply to a command it just sent.
//!
//! The slot lives behind the session mutex; the wake signal is a oneshot
//! channel so "mark received" and "wake the waiter" are observed atomically
//! by the waiting task. The timed wait itself happens at the call site with
//! `tokio::time::timeout` around the receiver.

use crate::error::TqError;
use crate::frame::CmdType;
use tokio::sync::oneshot;

#[derive(Debug)]
struct PendingReply {
    cmd_type: CmdType,
    cmd_id: u8,
    tx: oneshot::Sender<()>,
}

/// Holder for the single outstanding reply wait of a session.
#[derive(Debug, Default)]
pub struct ReplySlot {
    pending: Option<PendingReply>,
}

impl ReplySlot {
    /// Start waiting for the reply matching `cmd_type` and `cmd_id`.
    ///
    /// Fails with [`TqError::ReplyPending`] while another wait is
    /// outstanding.
    pub fn begin(&mut self, cmd_type: CmdType, cmd_id: u8) -> Result<oneshot::Receiver<()>, TqError> {
        if self.pending.is_some() {
            return Err(TqError::ReplyPending);
        }
        let (tx, rx) = oneshot::channel();
        self.pending = Some(PendingReply {
            cmd_type,
            cmd_id,
            tx,
        });
        Ok(rx)
    }

    /// Resolve the outstanding wait if both command type and id match.
    ///
    /// A non-matching frame leaves the slot untouched; the caller is free to
    /// dispatch it in other ways.
    pub fn complete(&mut self, cmd_type: CmdType, cmd_id: u8) -> bool {
        let matched = self
            .pending
            .as_ref()
            .is_some_and(|p| p.cmd_type == cmd_type && p.cmd_id == cmd_id);
        if matched {
            if let Some(pending) = self.pending.take() {
                let _ = pending.tx.send(());
            }
        }
        matched
    }

    /// Clear the outstanding wait, if any, without resolving it.
    ///
    /// A task already blocked on the receiver unblocks through its own
    /// timeout path.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }
}
