//! Debounced pending signaling
//!
//! A load that outlives the pending delay flips `is_pending`. With a minimum
//! configured, the load then cannot report completion until the minimum has
//! elapsed, so a spinner never flashes.

use crate::route_match::{MatchCell, RouteMatch};
use crate::state::MatchStatus;
use futures::FutureExt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

impl RouteMatch {
    /// Arm the pending timer
    ///
    /// No-op when a timer already exists, when the match is not loading, or
    /// when neither the route nor the router configures a pending delay.
    pub fn start_pending(&self) {
        let timing = self.route().options.timing;
        let options = self.router().options();
        let Some(delay) = timing.pending_ms(options) else {
            return;
        };
        let minimum = timing.pending_min_ms(options);

        let mut cell = self.lock();
        if cell.facet.pending_timer.is_some() || cell.state.status != MatchStatus::Loading {
            return;
        }

        let deadline = Instant::now() + delay;
        let this = self.clone();
        cell.facet.pending_timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            this.show_pending(minimum);
        }));
    }

    fn show_pending(&self, minimum: Option<Duration>) {
        {
            let mut cell = self.lock();
            // Cancelled while the timer was firing.
            if cell.facet.pending_timer.is_none() {
                return;
            }
            cell.state.is_pending = true;
            if let Some(minimum) = minimum {
                let stop = CancellationToken::new();
                let wait = {
                    let stop = stop.clone();
                    async move {
                        tokio::select! {
                            _ = tokio::time::sleep(minimum) => {}
                            _ = stop.cancelled() => {}
                        }
                    }
                };
                cell.facet.pending_min = Some(wait.boxed().shared());
                cell.facet.pending_min_stop = Some(stop);
            }
        }

        tracing::debug!(match_id = %self.match_id(), ?minimum, "match is pending");
        self.notify();
    }

    /// Clear `is_pending`, stop both timers and release the minimum wait
    ///
    /// Idempotent. Subscribers are notified when the match was pending.
    pub fn cancel_pending(&self) {
        let was_pending = self.lock().cancel_pending();
        if was_pending {
            self.notify();
        }
    }
}

impl MatchCell {
    /// Returns whether `is_pending` was set
    pub(crate) fn cancel_pending(&mut self) -> bool {
        let was_pending = std::mem::replace(&mut self.state.is_pending, false);
        if let Some(timer) = self.facet.pending_timer.take() {
            timer.abort();
        }
        // Waiters holding a clone of the minimum wait are released too.
        if let Some(stop) = self.facet.pending_min_stop.take() {
            stop.cancel();
        }
        self.facet.pending_min = None;
        was_pending
    }
}
