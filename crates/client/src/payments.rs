//! Payment-status polling with a hard wall-clock cutoff.
//!
//! The mobile-money flow completes out of band, so the client polls
//! `GET /payments/{id}` until the status turns terminal. Polling always
//! stops: either on a terminal status or when the cutoff elapses, and
//! the timer is released on both paths.

use std::time::Duration;

use ridelink_shared::PaymentStatus;

use crate::api::Api;

/// How often the payment status is re-fetched.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Wall-clock budget after which polling gives up.
pub const POLL_CUTOFF: Duration = Duration::from_secs(120);

/// Final outcome of a payment poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Completed,
    Failed,
    /// No terminal status arrived within the cutoff window.
    TimedOut,
}

/// Poll the payment status every [`POLL_INTERVAL`] until it is terminal
/// or [`POLL_CUTOFF`] has elapsed. Individual fetch errors are treated
/// as transient and retried on the next tick.
pub async fn await_payment(api: &dyn Api, payment_id: &str) -> PaymentOutcome {
    let deadline = tokio::time::Instant::now() + POLL_CUTOFF;
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        // The first tick fires immediately.
        let now = ticker.tick().await;
        if now >= deadline {
            tracing::warn!(payment = payment_id, "payment poll timed out");
            return PaymentOutcome::TimedOut;
        }

        match api.payment(payment_id).await {
            Ok(record) => match record.status {
                PaymentStatus::Completed => return PaymentOutcome::Completed,
                PaymentStatus::Failed => return PaymentOutcome::Failed,
                PaymentStatus::Pending => {}
            },
            Err(e) => {
                tracing::warn!(payment = payment_id, "payment status fetch failed: {e}");
            }
        }
    }
}
