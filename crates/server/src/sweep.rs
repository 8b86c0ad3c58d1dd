//! Proactive consent-expiry sweep.
//!
//! The lazy check (first access after the deadline) remains authoritative;
//! this task only keeps dashboards honest by forcing the same EXPIRED
//! transition for bookings nobody touched. Each overdue consent is expired in
//! its own transaction with the same ConsentLog semantics as the lazy path.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use lanehaul_db::BookingLifecycle;
use lanehaul_notify::DispatcherHandle;

use crate::fanout;

pub fn spawn(
    lifecycle: Arc<BookingLifecycle>,
    dispatcher: DispatcherHandle,
    interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            sweep_once(&lifecycle, &dispatcher).await;
        }
    })
}

pub async fn sweep_once(lifecycle: &BookingLifecycle, dispatcher: &DispatcherHandle) -> usize {
    match lifecycle.expire_overdue_consents(Utc::now()).await {
        Ok(expired) => {
            let count = expired.len();
            if count > 0 {
                info!(
                    event_name = "consent.sweep.expired",
                    expired_count = count,
                    "forced overdue consents to EXPIRED"
                );
            }
            for outcome in &expired {
                dispatcher.publish(fanout::expired_event(outcome));
            }
            count
        }
        Err(err) => {
            error!(
                event_name = "consent.sweep.failed",
                error = %err,
                "consent-expiry sweep failed"
            );
            0
        }
    }
}
