//! The housekeeper: periodic lease expiry and subscription renewal.

use std::time::Instant;

use tokio::time::MissedTickBehavior;
use tracing::info;

use super::{lock, ControlPoint};
use crate::config::RENEWAL_HEADROOM;

impl ControlPoint {
    pub(crate) async fn housekeeping_loop(self) {
        let mut ticker = tokio::time::interval(self.inner.config.housekeeping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.housekeeping_pass();
        }
    }

    /// One expiry/renewal pass, normally driven by the periodic task.
    ///
    /// Works on snapshots of both tables, so devices added concurrently may
    /// or may not be seen this round; expiry is best-effort, not a strict
    /// once-per-device guarantee. Renewal is the engine's only automatic
    /// retry mechanism.
    pub fn housekeeping_pass(&self) {
        let now = Instant::now();

        let expired = lock(&self.inner.devices).expired(now);
        for uuid in expired {
            info!(%uuid, "lease expired twice over, removing device");
            self.remove_device_by_uuid(&uuid);
        }

        let due = lock(&self.inner.subscribers).due_for_renewal(now, RENEWAL_HEADROOM);
        for subscriber in due {
            self.renew_subscriber(subscriber);
        }
    }
}
