//! Test doubles shared by the engine and scheduler tests.
//!
//! `MockProvider` keeps a tiny in-memory zone so create / edit / delete are
//! visible to the next listing, and records every call in order.

#![allow(dead_code)]

use async_trait::async_trait;
use pbddns_core::cfg::SchedulerCfg;
use pbddns_core::detector::Detect;
use pbddns_core::engine::{Engine, Target};
use pbddns_core::error::CoreError;
use pbddns_provider::{DnsProvider, ProviderError, RecordSpec, RecordType, RemoteRecord};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Create(RecordSpec),
    Edit(String, RecordSpec),
    Delete(String),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::List)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    List,
    Create,
    Edit,
    Delete,
}

pub struct MockProvider {
    records: Mutex<Vec<RemoteRecord>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<Vec<(Op, ProviderError)>>,
    next_id: AtomicUsize,
}

impl MockProvider {
    pub fn new(records: Vec<RemoteRecord>) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(records),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(100),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::new(Vec::new())
    }

    /// The next call of `op` fails with `err` (one-shot).
    pub fn fail_next(&self, op: Op, err: ProviderError) {
        self.failures.lock().unwrap().push((op, err));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn records(&self) -> Vec<RemoteRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Out-of-band change, as if someone used the provider's web UI.
    pub fn set_records(&self, records: Vec<RemoteRecord>) {
        *self.records.lock().unwrap() = records;
    }

    fn enter(&self, op: Op, call: Call) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().push(call);
        let mut failures = self.failures.lock().unwrap();
        match failures.iter().position(|(o, _)| *o == op) {
            Some(i) => Err(failures.remove(i).1),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DnsProvider for MockProvider {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn list_records(&self, _domain: &str) -> Result<Vec<RemoteRecord>, ProviderError> {
        self.enter(Op::List, Call::List)?;
        Ok(self.records())
    }

    async fn create_record(
        &self,
        _domain: &str,
        spec: &RecordSpec,
    ) -> Result<String, ProviderError> {
        self.enter(Op::Create, Call::Create(spec.clone()))?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.records.lock().unwrap().push(RemoteRecord {
            id: Some(id.clone()),
            name: spec.name.clone(),
            record_type: spec.record_type,
            content: spec.content.clone(),
            ttl: Some(spec.ttl.to_string()),
            priority: None,
        });
        Ok(id)
    }

    async fn edit_record(
        &self,
        _domain: &str,
        id: &str,
        spec: &RecordSpec,
    ) -> Result<(), ProviderError> {
        self.enter(Op::Edit, Call::Edit(id.to_owned(), spec.clone()))?;
        let mut records = self.records.lock().unwrap();
        let rec = records
            .iter_mut()
            .find(|r| r.id.as_deref() == Some(id))
            .ok_or_else(|| ProviderError::Api("Invalid record id.".into()))?;
        rec.content = spec.content.clone();
        rec.ttl = Some(spec.ttl.to_string());
        Ok(())
    }

    async fn delete_record(&self, _domain: &str, id: &str) -> Result<(), ProviderError> {
        self.enter(Op::Delete, Call::Delete(id.to_owned()))?;
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id.as_deref() != Some(id));
        if records.len() == before {
            return Err(ProviderError::Api("Invalid record id.".into()));
        }
        Ok(())
    }
}

pub fn record(id: &str, name: &str, record_type: RecordType, content: &str) -> RemoteRecord {
    RemoteRecord {
        id: Some(id.to_owned()),
        name: name.to_owned(),
        record_type,
        content: content.to_owned(),
        ttl: Some("600".to_owned()),
        priority: None,
    }
}

pub fn home_engine(provider: &Arc<MockProvider>) -> Engine {
    let dyn_provider: Arc<dyn DnsProvider> = provider.clone();
    Engine::new(Target::new("example.com", "home"), dyn_provider, 600)
}

pub fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

/// Detector whose answer the test can change while the scheduler owns it.
#[derive(Clone)]
pub struct SharedDetector {
    ip: Arc<Mutex<Ipv4Addr>>,
    failing: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl SharedDetector {
    pub fn new(initial: Ipv4Addr) -> Self {
        Self {
            ip: Arc::new(Mutex::new(initial)),
            failing: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set(&self, ip: Ipv4Addr) {
        *self.ip.lock().unwrap() = ip;
    }

    /// The next `n` detections fail critically.
    pub fn fail(&self, n: usize) {
        self.failing.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Detect for SharedDetector {
    async fn detect(&self) -> Result<Ipv4Addr, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing.store(failing - 1, Ordering::SeqCst);
            return Err(CoreError::Critical(anyhow::anyhow!("echo endpoint unreachable")));
        }
        Ok(*self.ip.lock().unwrap())
    }
}

pub fn intervals(fast: u64, slow: u64) -> SchedulerCfg {
    SchedulerCfg {
        fast_interval_secs: fast,
        slow_interval_secs: slow,
    }
}
