//! Periodic eviction of accessories that stopped advertising
use log::{debug, info};
use time::OffsetDateTime;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::controller::BridgeController;

/// Default tick of the reachability check.
pub const WATCHDOG_PERIOD: Duration = Duration::from_secs(1);

/// Tick period for a staleness timeout: one second, or the timeout itself
/// when it is shorter.
pub fn period_for(timeout: time::Duration) -> Duration {
    match Duration::try_from(timeout) {
        Ok(timeout) if !timeout.is_zero() => WATCHDOG_PERIOD.min(timeout),
        _ => WATCHDOG_PERIOD,
    }
}

/// Sweep the registry every `period` for the lifetime of the process.
pub async fn run(controller: BridgeController, period: Duration) {
    info!(
        "Reachability watchdog started (timeout {}s, period {:?})",
        controller.config().timeout,
        period
    );

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let evicted = controller.sweep(OffsetDateTime::now_utc()).await;
        if !evicted.is_empty() {
            debug!("Watchdog evicted {} accessories", evicted.len());
        }
    }
}
