#[cfg(test)]
#[path = "sessions_poller_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::Result;
use tokio::time;
use tokio::time::MissedTickBehavior;

use super::SessionController;

/// Keeps the sidebar's session list fresh, independent of any chat stream.
pub struct SessionsPoller {}

impl SessionsPoller {
    pub async fn start(controller: SessionController, every: Duration) -> Result<()> {
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            controller.refresh_sessions().await;
        }
    }
}
