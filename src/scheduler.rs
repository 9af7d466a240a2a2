//! Background deadline sweep
//!
//! Periodically flips polls past their betting deadline to `voting_closed`
//! and refreshes their chat announcements. The sweep only ever changes poll
//! status; balances and bets are untouched.

use crate::notify::Notifier;
use crate::polls::PollEngine;
use std::sync::Arc;
use tokio::time::{interval, Duration};

pub struct Scheduler {
    polls: PollEngine,
    notifier: Notifier,
    tick: Duration,
}

impl Scheduler {
    pub fn new(polls: PollEngine, notifier: Notifier, tick_secs: u64) -> Self {
        Self {
            polls,
            notifier,
            tick: Duration::from_secs(tick_secs),
        }
    }

    /// Run the sweep loop until the process exits.
    pub async fn run(self: Arc<Self>) {
        tracing::info!(tick_secs = self.tick.as_secs(), "Starting deadline sweep");
        let mut ticker = interval(self.tick);

        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep().await {
                tracing::error!("deadline sweep failed: {}", e);
            }
        }
    }

    async fn sweep(&self) -> crate::error::Result<()> {
        let closed = self.polls.auto_close_due_polls().await?;
        for poll in closed {
            tracing::info!(poll_id = poll.id, "poll closed for betting");

            // Announcement refresh is best-effort.
            let Some(message_id) = poll.message_id else {
                continue;
            };
            match self.polls.poll_summary(poll.id).await {
                Ok(Some(summary)) => {
                    if let Err(e) = self.notifier.edit_message(message_id, &summary).await {
                        tracing::warn!(poll_id = poll.id, "failed to update announcement: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(poll_id = poll.id, "failed to build summary: {}", e);
                }
            }
        }
        Ok(())
    }
}
