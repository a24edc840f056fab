//! pbddns-core – keeps one Porkbun A record pointed at this machine

pub mod cfg;
pub mod detector;
pub mod engine;
pub mod error;
pub mod scheduler;

use anyhow::Result;
use cfg::AppConfig;
use detector::Detector;
use engine::{Engine, Target};
use pbddns_provider::DnsProvider;
use scheduler::Scheduler;
use std::{future::Future, sync::Arc};
use tracing::info;

/// Prime the record, then run the scheduler until `shutdown` resolves.
/// Errors only come from start-up; once the loop runs, failures are logged.
pub async fn bootstrap<F>(cfg: AppConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let provider = init_provider(&cfg)?;
    let target = Target::new(&cfg.target.domain, &cfg.target.subdomain);
    info!(
        "{} DynDNS service started for {target} ({:?} address)",
        provider.name(),
        cfg.detect.source
    );

    let engine = Engine::new(target, provider, cfg.porkbun.ttl);
    let detector = Detector::new(&cfg.detect)?;
    let mut sched = Scheduler::new(engine, detector, &cfg.scheduler);

    sched.prime().await?;
    sched.run(shutdown).await;
    Ok(())
}

#[cfg(feature = "pbddns-provider-porkbun")]
fn init_provider(cfg: &AppConfig) -> Result<Arc<dyn DnsProvider>> {
    use std::time::Duration;

    let p = &cfg.porkbun;
    Ok(Arc::new(pbddns_provider_porkbun::PorkbunProvider::new(
        &p.api_key,
        &p.secret_api_key,
        Some(&p.endpoint),
        Duration::from_secs(p.timeout_secs),
    )?))
}

#[cfg(not(feature = "pbddns-provider-porkbun"))]
fn init_provider(_cfg: &AppConfig) -> Result<Arc<dyn DnsProvider>> {
    anyhow::bail!("pbddns-core was built without a DNS provider")
}

pub use cfg::{Overrides, load_config};
