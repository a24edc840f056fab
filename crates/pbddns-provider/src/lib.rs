//! Provider-neutral DNS types shared by the pbddns core and its providers.
//!
//! * [`DnsProvider`] – list / create / edit / delete records of one domain
//! * [`RemoteRecord`] – a record as the provider reports it
//! * [`ProviderError`] – split into critical (transport / contract) and
//!   non-critical (business rejection) failures

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Alias,
    Cname,
    /// MX, TXT, NS, ... – never touched by pbddns
    #[serde(other)]
    Other,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Alias => "ALIAS",
            RecordType::Cname => "CNAME",
            RecordType::Other => "OTHER",
        }
    }

    /// ALIAS and CNAME records shadow an A record of the same name.
    pub fn conflicts_with_a(&self) -> bool {
        matches!(self, RecordType::Alias | RecordType::Cname)
    }
}

/// A DNS record as seen from the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    #[serde(default, deserialize_with = "opt_string")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub content: String,
    #[serde(default, deserialize_with = "opt_string")]
    pub ttl: Option<String>,
    #[serde(default, rename = "prio", deserialize_with = "opt_string")]
    pub priority: Option<String>,
}

/// Fields pushed on create / edit. `name` is always fully qualified; providers
/// translate it to whatever their wire format expects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordSpec {
    pub name: String,
    pub record_type: RecordType,
    pub content: String,
    pub ttl: u32,
}

impl RecordSpec {
    pub fn a(name: &str, content: impl ToString, ttl: u32) -> Self {
        Self {
            name: name.to_owned(),
            record_type: RecordType::A,
            content: content.to_string(),
            ttl,
        }
    }
}

/// Accepts a JSON string or number (providers are inconsistent about ids and
/// TTLs); empty strings and `null` become `None`.
pub fn opt_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("record lookup refused: {0}")]
    LookupRejected(String),
    #[error("api error: {0}")]
    Api(String),
}

impl ProviderError {
    /// Critical errors mean the transport or the API contract is broken;
    /// only [`ProviderError::Api`] is an ordinary, recoverable rejection.
    pub fn is_critical(&self) -> bool {
        !matches!(self, ProviderError::Api(_))
    }
}

#[async_trait]
pub trait DnsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn list_records(&self, domain: &str) -> Result<Vec<RemoteRecord>, ProviderError>;

    /// Returns the id assigned by the provider.
    async fn create_record(&self, domain: &str, spec: &RecordSpec)
    -> Result<String, ProviderError>;

    async fn edit_record(
        &self,
        domain: &str,
        id: &str,
        spec: &RecordSpec,
    ) -> Result<(), ProviderError>;

    async fn delete_record(&self, domain: &str, id: &str) -> Result<(), ProviderError>;
}
