//! Reconciliation engine: compare the current address with the provider's A
//! record and push the minimal change.
//!
//! The engine owns [`EngineState`] exclusively. It is driven from a single
//! task (see [`crate::scheduler`]) so nothing here is synchronised.

use crate::error::CoreError;
use chrono::{DateTime, Utc};
use pbddns_provider::{DnsProvider, RecordSpec, RecordType, RemoteRecord};
use std::{fmt, net::Ipv4Addr, sync::Arc};
use tracing::{info, warn};

pub const DEFAULT_TTL: u32 = 600;

/// What is being kept in sync. `fqdn` is derived once in [`Target::new`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    domain: String,
    subdomain: String,
    fqdn: String,
}

impl Target {
    pub fn new(domain: &str, subdomain: &str) -> Self {
        let clean = |s: &str| s.trim().trim_matches('.').to_ascii_lowercase();
        let domain = clean(domain);
        let subdomain = clean(subdomain);
        let fqdn = if subdomain.is_empty() {
            domain.clone()
        } else {
            format!("{subdomain}.{domain}")
        };
        Self {
            domain,
            subdomain,
            fqdn,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn subdomain(&self) -> &str {
        &self.subdomain
    }

    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fqdn)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    NoOp,
    Apply { content: Ipv4Addr },
}

/// Decide whether `cached` has to be (re)written to hold `current`.
pub fn reconcile(current: Ipv4Addr, cached: Option<&RemoteRecord>) -> Action {
    match cached {
        Some(r) if r.content.trim().parse::<Ipv4Addr>() == Ok(current) => Action::NoOp,
        _ => Action::Apply { content: current },
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineState {
    /// `None` → not created yet, or vanished from the provider
    pub known_record_id: Option<String>,
    /// last address pushed, or last address seen on the provider's A record
    pub last_applied: Option<Ipv4Addr>,
    pub last_applied_at: Option<DateTime<Utc>>,
}

pub struct Engine {
    target: Target,
    provider: Arc<dyn DnsProvider>,
    ttl: u32,
    state: EngineState,
}

impl Engine {
    pub fn new(target: Target, provider: Arc<dyn DnsProvider>, ttl: u32) -> Self {
        Self {
            target,
            provider,
            ttl,
            state: EngineState::default(),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Fetch the listing, delete ALIAS / CNAME records that would shadow the
    /// A record, and return the first A record named like the target.
    pub async fn lookup(&self) -> Result<Option<RemoteRecord>, CoreError> {
        let records = self.provider.list_records(self.target.domain()).await?;

        let mut found = None;
        for record in records {
            if !record.name.eq_ignore_ascii_case(self.target.fqdn()) {
                continue;
            }
            if record.record_type.conflicts_with_a() {
                self.remove_conflict(&record).await?;
            } else if record.record_type == RecordType::A && found.is_none() {
                found = Some(record);
            }
        }
        Ok(found)
    }

    /// Best effort: only a critical failure aborts the lookup.
    async fn remove_conflict(&self, record: &RemoteRecord) -> Result<(), CoreError> {
        let host = self.target.fqdn();
        let kind = record.record_type.as_str();
        let Some(id) = record.id.as_deref() else {
            warn!("{host}: conflicting {kind} record has no id; cannot delete it");
            return Ok(());
        };

        match self.provider.delete_record(self.target.domain(), id).await {
            Ok(()) => {
                info!("{host}: deleted conflicting {kind} record id={id}");
                Ok(())
            }
            Err(e) if e.is_critical() => Err(e.into()),
            Err(e) => {
                warn!("{host}: could not delete conflicting {kind} record id={id}: {e}");
                Ok(())
            }
        }
    }

    /// Push `action`. Returns `true` when a mutation was made. State is only
    /// touched once the provider has accepted the change.
    pub async fn apply(&mut self, action: &Action) -> Result<bool, CoreError> {
        let Action::Apply { content } = *action else {
            return Ok(false);
        };
        let spec = RecordSpec::a(self.target.fqdn(), content, self.ttl);
        let domain = self.target.domain();

        match self.state.known_record_id.clone() {
            Some(id) => {
                self.provider.edit_record(domain, &id, &spec).await?;
                info!("{}: updated A record id={id} -> {content}", self.target);
            }
            None => {
                let id = self.provider.create_record(domain, &spec).await?;
                info!("{}: created A record id={id} -> {content}", self.target);
                self.state.known_record_id = Some(id);
            }
        }
        self.state.last_applied = Some(content);
        self.state.last_applied_at = Some(Utc::now());
        Ok(true)
    }

    /// Slow path: re-read the provider, adopt what it reports, then fix drift.
    pub async fn full_cycle(&mut self, current: Ipv4Addr) -> Result<Action, CoreError> {
        let record = self.lookup().await?;
        self.observe(record.as_ref());
        let action = reconcile(current, record.as_ref());
        self.apply(&action).await?;
        Ok(action)
    }

    /// Fast path: trust the cache, no listing.
    pub async fn fast_cycle(&mut self, current: Ipv4Addr) -> Result<Action, CoreError> {
        let action = if self.state.last_applied == Some(current) {
            Action::NoOp
        } else {
            Action::Apply { content: current }
        };
        self.apply(&action).await?;
        Ok(action)
    }

    fn observe(&mut self, record: Option<&RemoteRecord>) {
        match record {
            Some(r) => {
                if self.state.known_record_id.as_deref() != r.id.as_deref() {
                    info!(
                        "{}: found existing A record id={} -> {}",
                        self.target,
                        r.id.as_deref().unwrap_or("?"),
                        r.content
                    );
                }
                self.state.known_record_id = r.id.clone();
                self.state.last_applied = r.content.trim().parse().ok();
            }
            None => {
                if self.state.known_record_id.is_some() {
                    warn!("{}: A record disappeared from the provider", self.target);
                }
                self.state.known_record_id = None;
                self.state.last_applied = None;
            }
        }
    }
}
