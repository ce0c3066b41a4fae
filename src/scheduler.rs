//! Naive polling scheduler.  Every tick, each plugin scans its own deadlines.

use crate::{event::Event, handler::Shared, log_internal};
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

pub fn start(shared: Arc<Shared>, discord_ctx: serenity::all::Context) -> JoinHandle<()> {
    tokio::spawn(async move {
        let seconds = shared.ctx(&discord_ctx).cfg.read().await.general.tick_seconds;
        let period = Duration::from_secs(seconds.max(1));

        let mut interval = tokio::time::interval(period);
        // A slow tick (e.g. a feed fetch with retries) shouldn't cause a burst of catch-up ticks.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log_internal!("Scheduler ticking every {}s", period.as_secs());
        loop {
            interval.tick().await;
            Event::Tick.handle(shared.ctx(&discord_ctx)).await;
        }
    })
}
