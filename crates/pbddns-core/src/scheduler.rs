//! Scheduler: drive the engine on two cadences from one task.
//!
//! * fast tick – detect the address, push it if it differs from the cache
//! * slow tick – detect, re-read the provider, reconcile (heals edits made
//!   outside pbddns)
//!
//! Ticks never overlap: each one is awaited to completion inside the select
//! loop, and every HTTP call carries its own client timeout.

use crate::{
    cfg::SchedulerCfg,
    detector::Detect,
    engine::{Action, Engine},
    error::CoreError,
};
use std::{future::Future, time::Duration};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

pub struct Scheduler<D> {
    engine: Engine,
    detector: D,
    fast: Duration,
    slow: Duration,
}

impl<D: Detect> Scheduler<D> {
    pub fn new(engine: Engine, detector: D, cfg: &SchedulerCfg) -> Self {
        Self {
            engine,
            detector,
            fast: cfg.fast(),
            slow: cfg.slow(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Start-up cycle. Failing to detect the address, or any critical
    /// provider error, is returned to the caller (which exits); a rejected
    /// update is left for the loop to retry.
    pub async fn prime(&mut self) -> Result<(), CoreError> {
        let host = self.engine.target().fqdn().to_owned();
        let ip = self.detector.detect().await?;
        info!("{host}: current IP address {ip}");

        match self.engine.full_cycle(ip).await {
            Ok(Action::NoOp) => info!("{host}: already up-to-date, skipping update"),
            Ok(Action::Apply { content }) => info!("{host}: successfully updated -> {content}"),
            Err(e) if e.is_critical() => return Err(e),
            Err(e) => warn!("{host}: initial update failed: {e}; retrying on next tick"),
        }
        Ok(())
    }

    /// Loop until `shutdown` resolves; returns the engine for inspection.
    pub async fn run<F>(mut self, shutdown: F) -> Engine
    where
        F: Future<Output = ()>,
    {
        let start = Instant::now();
        let mut fast = interval_at(start + self.fast, self.fast);
        fast.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut slow = interval_at(start + self.slow, self.slow);
        slow.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "{}: checking address every {:?}, provider every {:?}",
            self.engine.target(),
            self.fast,
            self.slow
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("{}: shutting down", self.engine.target());
                    break;
                }
                _ = slow.tick() => {
                    let res = self.slow_tick().await;
                    self.report("provider check", res);
                }
                _ = fast.tick() => {
                    let res = self.fast_tick().await;
                    self.report("address check", res);
                }
            }
        }
        self.engine
    }

    async fn fast_tick(&mut self) -> Result<Action, CoreError> {
        let ip = self.detector.detect().await?;
        self.engine.fast_cycle(ip).await
    }

    async fn slow_tick(&mut self) -> Result<Action, CoreError> {
        let ip = self.detector.detect().await?;
        self.engine.full_cycle(ip).await
    }

    fn report(&self, what: &str, res: Result<Action, CoreError>) {
        let host = self.engine.target();
        match res {
            Ok(Action::NoOp) => debug!("{host}: {what}: up-to-date"),
            Ok(Action::Apply { content }) => info!("{host}: {what}: updated -> {content}"),
            Err(e) if e.is_critical() => error!("{host}: {what} abandoned: {e}"),
            Err(e) => warn!("{host}: {what} failed: {e}"),
        }
    }
}
