//! Test doubles and common utilities for reconciliation contract tests
//!
//! The doubles keep an in-memory "remote" record table and count every
//! call, so tests can assert on exactly which provider operations a cycle
//! performed.

#![allow(dead_code)]

use async_trait::async_trait;
use cfddns_core::config::{DdnsConfig, DomainEntry};
use cfddns_core::error::{Error, Result};
use cfddns_core::traits::{
    Credentials, DnsProvider, DnsProviderFactory, DnsRecord, IpDiscovery, RecordType, ZoneInfo,
};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type RecordKey = (RecordType, String);

/// Ordered log of provider calls, shared between providers
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// Arguments of one create/update call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCall {
    pub op: &'static str,
    pub record_type: RecordType,
    pub name: String,
    pub content: String,
    pub proxied: Option<bool>,
    pub ttl: Option<u32>,
    /// Record id the update was addressed to (None for creates)
    pub record_id: Option<String>,
}

/// An in-memory DnsProvider that tracks calls
pub struct MockDnsProvider {
    zone: ZoneInfo,
    /// What the provider "has"
    remote: Arc<Mutex<HashMap<RecordKey, DnsRecord>>>,
    /// What this client has seen
    cache: HashMap<RecordKey, DnsRecord>,
    lookup_count: Arc<AtomicUsize>,
    writes: Arc<Mutex<Vec<WriteCall>>>,
    delete_count: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    next_id: Arc<AtomicUsize>,
    journal: Journal,
}

impl MockDnsProvider {
    pub fn new(zone_id: &str) -> Self {
        Self {
            zone: ZoneInfo {
                id: zone_id.to_string(),
                name: "example.org".to_string(),
            },
            remote: Arc::new(Mutex::new(HashMap::new())),
            cache: HashMap::new(),
            lookup_count: Arc::new(AtomicUsize::new(0)),
            writes: Arc::new(Mutex::new(Vec::new())),
            delete_count: Arc::new(AtomicUsize::new(0)),
            failing: Arc::new(AtomicBool::new(false)),
            next_id: Arc::new(AtomicUsize::new(1)),
            journal: journal(),
        }
    }

    /// Log calls to a journal shared with other providers
    pub fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = Arc::clone(journal);
        self
    }

    /// Seed an existing record at the "provider"
    pub fn with_record(
        self,
        record_type: RecordType,
        name: &str,
        content: &str,
        proxied: bool,
    ) -> Self {
        let id = format!("seeded-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.remote.lock().unwrap().insert(
            (record_type, name.to_string()),
            DnsRecord {
                id,
                record_type,
                name: name.to_string(),
                content: content.to_string(),
                ttl: Some(1),
                proxied,
            },
        );
        self
    }

    /// Create a new MockDnsProvider that shares remote state and counters
    /// with an existing one (the local cache starts empty)
    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            zone: other.zone.clone(),
            remote: Arc::clone(&other.remote),
            cache: HashMap::new(),
            lookup_count: Arc::clone(&other.lookup_count),
            writes: Arc::clone(&other.writes),
            delete_count: Arc::clone(&other.delete_count),
            failing: Arc::clone(&other.failing),
            next_id: Arc::clone(&other.next_id),
            journal: Arc::clone(&other.journal),
        }
    }

    /// Make every following call fail with a provider error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookup_count.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.delete_count.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<WriteCall> {
        self.writes.lock().unwrap().clone()
    }

    pub fn create_count(&self) -> usize {
        self.writes().iter().filter(|w| w.op == "create").count()
    }

    pub fn update_count(&self) -> usize {
        self.writes().iter().filter(|w| w.op == "update").count()
    }

    /// Current record at the "provider"
    pub fn remote_record(&self, record_type: RecordType, name: &str) -> Option<DnsRecord> {
        self.remote
            .lock()
            .unwrap()
            .get(&(record_type, name.to_string()))
            .cloned()
    }

    /// Change a record behind the client's back
    pub fn set_remote_proxied(&self, record_type: RecordType, name: &str, proxied: bool) {
        if let Some(record) = self
            .remote
            .lock()
            .unwrap()
            .get_mut(&(record_type, name.to_string()))
        {
            record.proxied = proxied;
        }
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    fn log(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::provider("mock", "Internal server error"));
        }
        Ok(())
    }
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    fn zone(&self) -> &ZoneInfo {
        &self.zone
    }

    async fn lookup_record(
        &mut self,
        record_type: RecordType,
        name: &str,
    ) -> Result<Option<DnsRecord>> {
        self.lookup_count.fetch_add(1, Ordering::SeqCst);
        self.log(format!("lookup {} {}", record_type, name));
        self.check_failing()?;

        let key = (record_type, name.to_string());
        let found = self.remote.lock().unwrap().get(&key).cloned();
        if let Some(record) = &found {
            self.cache.insert(key, record.clone());
        }
        Ok(found)
    }

    async fn create_record(
        &mut self,
        record_type: RecordType,
        name: &str,
        content: &str,
        proxied: Option<bool>,
        ttl: Option<u32>,
    ) -> Result<DnsRecord> {
        self.writes.lock().unwrap().push(WriteCall {
            op: "create",
            record_type,
            name: name.to_string(),
            content: content.to_string(),
            proxied,
            ttl,
            record_id: None,
        });
        self.log(format!("create {} {} {}", record_type, name, content));
        self.check_failing()?;

        let record = DnsRecord {
            id: format!("created-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            record_type,
            name: name.to_string(),
            content: content.to_string(),
            ttl: Some(ttl.unwrap_or(1)),
            proxied: proxied == Some(true),
        };
        let key = (record_type, name.to_string());
        self.remote.lock().unwrap().insert(key.clone(), record.clone());
        self.cache.insert(key, record.clone());
        Ok(record)
    }

    async fn update_record(
        &mut self,
        record_type: RecordType,
        name: &str,
        content: &str,
        proxied: Option<bool>,
        ttl: Option<u32>,
    ) -> Result<DnsRecord> {
        let key = (record_type, name.to_string());
        let cached_id = self.cache.get(&key).map(|r| r.id.clone());

        self.writes.lock().unwrap().push(WriteCall {
            op: "update",
            record_type,
            name: name.to_string(),
            content: content.to_string(),
            proxied,
            ttl,
            record_id: cached_id.clone(),
        });
        self.log(format!("update {} {} {}", record_type, name, content));
        self.check_failing()?;

        let id = cached_id.ok_or_else(|| Error::record_not_cached(record_type.as_str(), name))?;
        let record = DnsRecord {
            id,
            record_type,
            name: name.to_string(),
            content: content.to_string(),
            ttl: Some(ttl.unwrap_or(1)),
            proxied: proxied == Some(true),
        };
        self.remote.lock().unwrap().insert(key.clone(), record.clone());
        self.cache.insert(key, record.clone());
        Ok(record)
    }

    async fn delete_record(&mut self, record_type: RecordType, name: &str) -> Result<String> {
        self.delete_count.fetch_add(1, Ordering::SeqCst);
        self.log(format!("delete {} {}", record_type, name));
        self.check_failing()?;

        let key = (record_type, name.to_string());
        let record = self
            .cache
            .remove(&key)
            .ok_or_else(|| Error::record_not_cached(record_type.as_str(), name))?;
        self.remote.lock().unwrap().remove(&key);
        Ok(record.id)
    }

    fn cached_record(&self, record_type: RecordType, name: &str) -> Option<&DnsRecord> {
        self.cache.get(&(record_type, name.to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Factory handing out prepared providers by domain
///
/// Domains without a prepared provider fail with `ZoneNotFound`, the way
/// an unknown zone does against the real API.
#[derive(Default)]
pub struct MockFactory {
    providers: Mutex<HashMap<String, MockDnsProvider>>,
    connect_count: AtomicUsize,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(self, domain: &str, provider: MockDnsProvider) -> Self {
        self.providers
            .lock()
            .unwrap()
            .insert(domain.to_string(), provider);
        self
    }

    pub fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsProviderFactory for MockFactory {
    async fn connect(
        &self,
        _credentials: &Credentials,
        entry: &DomainEntry,
    ) -> Result<Box<dyn DnsProvider>> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        match self.providers.lock().unwrap().remove(&entry.domain) {
            Some(provider) => Ok(Box::new(provider)),
            None => Err(Error::ZoneNotFound(entry.domain.clone())),
        }
    }
}

/// An IpDiscovery whose answer the test can change between cycles
pub struct ControlledIpDiscovery {
    ip: Arc<Mutex<IpAddr>>,
    call_count: Arc<AtomicUsize>,
}

impl ControlledIpDiscovery {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip: Arc::new(Mutex::new(ip)),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            ip: Arc::clone(&other.ip),
            call_count: Arc::clone(&other.call_count),
        }
    }

    pub fn set_ip(&self, ip: IpAddr) {
        *self.ip.lock().unwrap() = ip;
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpDiscovery for ControlledIpDiscovery {
    async fn discover(&self) -> Result<IpAddr> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok(*self.ip.lock().unwrap())
    }
}

/// An IpDiscovery where every source is down
pub struct FailingDiscovery;

#[async_trait]
impl IpDiscovery for FailingDiscovery {
    async fn discover(&self) -> Result<IpAddr> {
        Err(Error::DiscoveryExhausted { attempted: 3 })
    }
}

/// Helper to create a minimal DdnsConfig for testing
pub fn minimal_config(domains: &[&str]) -> DdnsConfig {
    DdnsConfig {
        email: "user@example.org".to_string(),
        api_key: "test-key".to_string(),
        periodicity: 60.0,
        record_type: RecordType::A,
        ip_sources: None,
        domains: domains.iter().map(|d| DomainEntry::new(*d, false)).collect(),
    }
}

pub fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
    IpAddr::from([a, b, c, d])
}
