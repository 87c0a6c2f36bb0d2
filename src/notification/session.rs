use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;
use tracing::trace;

use super::Grain;
use crate::metrics::GRAINS_DELIVERED;
use crate::utils::time::fire_at;
use crate::ChangeRecord;
use crate::ResourceKind;

/// Rate-limited delivery for one connection of one subscription.
///
/// Records arrive on `inbound` already filtered. They are sent at once when
/// the window since the last grain has passed, otherwise they join the
/// pending batch which is flushed when the window closes.
pub(crate) struct Session {
    pub source_id: String,
    pub subscription_id: String,
    pub kind: ResourceKind,
    pub min_interval: Duration,
    pub inbound: mpsc::UnboundedReceiver<Vec<ChangeRecord>>,
    pub outbound: mpsc::UnboundedSender<Grain>,
}

impl Session {
    /// Sends `initial` right away, then delivers until either side closes.
    pub async fn run(
        mut self,
        initial: Vec<ChangeRecord>,
    ) {
        let mut pending: Vec<ChangeRecord> = vec![];
        let mut flush_at: Option<Instant> = None;
        let mut last_sent = Instant::now();

        if !self.send(initial) {
            return;
        }

        loop {
            tokio::select! {
                records = self.inbound.recv() => {
                    let Some(records) = records else {
                        break;
                    };
                    pending.extend(records);

                    let window_ends = last_sent + self.min_interval;
                    if Instant::now() >= window_ends {
                        if !self.send(std::mem::take(&mut pending)) {
                            break;
                        }
                        last_sent = Instant::now();
                        flush_at = None;
                    } else if flush_at.is_none() {
                        trace!(subscription = %self.subscription_id, "Inside rate window, batching");
                        flush_at = Some(window_ends);
                    }
                }
                _ = fire_at(flush_at) => {
                    if !self.send(std::mem::take(&mut pending)) {
                        break;
                    }
                    last_sent = Instant::now();
                    flush_at = None;
                }
            }
        }
        debug!(subscription = %self.subscription_id, "Session ended");
    }

    /// False once the connection is gone.
    fn send(
        &self,
        data: Vec<ChangeRecord>,
    ) -> bool {
        let grain = Grain::event(&self.source_id, &self.subscription_id, self.kind, data);
        let size = grain.len();
        if self.outbound.send(grain).is_err() {
            return false;
        }
        GRAINS_DELIVERED.with_label_values(&[self.kind.path()]).inc();
        trace!(subscription = %self.subscription_id, records = size, "Grain sent");
        true
    }
}
