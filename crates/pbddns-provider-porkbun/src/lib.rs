//! Porkbun DNS provider
//!
//! * Talks to the Porkbun JSON API v3; every call is a `POST` whose body
//!   carries `apikey` / `secretapikey`.
//! * Record names are fully qualified on the [`DnsProvider`] side and
//!   relative to the domain on the wire (`home` for `home.example.com`).
//! * Failures are mapped to [`pbddns_provider::ProviderError`]; a well-formed
//!   `{"status":"ERROR"}` envelope on create / edit / delete is the only
//!   non-critical case.

use async_trait::async_trait;
use pbddns_provider::{DnsProvider, ProviderError, RecordSpec, RemoteRecord, opt_string};
use reqwest::{
    Client, StatusCode,
    header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

pub const API_ROOT: &str = "https://porkbun.com/api/json/v3";

/*──────── wire envelopes ────────*/

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    id: Option<String>,
}

impl Envelope {
    fn ok(&self) -> bool {
        self.status == "SUCCESS"
    }

    fn reason(self) -> String {
        self.message.unwrap_or(self.status)
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    records: Vec<RemoteRecord>,
}

/*──────── provider struct ────────*/

pub struct PorkbunProvider {
    api_key: String,
    secret_api_key: String,
    endpoint: String,
    client: Client,
}

impl PorkbunProvider {
    /// `endpoint` defaults to [`API_ROOT`]; `timeout` bounds every request.
    pub fn new(
        api_key: &str,
        secret_api_key: &str,
        endpoint: Option<&str>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut hdr = HeaderMap::new();
        hdr.insert(USER_AGENT, HeaderValue::from_static("pbddns (+github)"));
        hdr.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            api_key: api_key.to_owned(),
            secret_api_key: secret_api_key.to_owned(),
            endpoint: endpoint
                .unwrap_or(API_ROOT)
                .trim_end_matches('/')
                .to_owned(),
            client: Client::builder()
                .default_headers(hdr)
                .timeout(timeout)
                .build()?,
        })
    }

    /*──────── tiny HTTP wrapper ────────*/

    async fn post(
        &self,
        path: &str,
        mut body: Value,
    ) -> Result<(StatusCode, String), ProviderError> {
        body["apikey"] = json!(self.api_key);
        body["secretapikey"] = json!(self.secret_api_key);

        let url = format!("{}{path}", self.endpoint);
        debug!("Porkbun POST {url}");
        let resp = self.client.post(url).json(&body).send().await?;
        let status = resp.status();
        Ok((status, resp.text().await?))
    }

    /// Create / edit / delete share this envelope handling.
    async fn mutate(&self, path: &str, body: Value) -> Result<Envelope, ProviderError> {
        let (status, text) = self.post(path, body).await?;
        match serde_json::from_str::<Envelope>(&text) {
            Ok(env) if env.ok() && status.is_success() => Ok(env),
            Ok(env) if env.ok() => Err(ProviderError::Status(status)),
            Ok(env) => Err(ProviderError::Api(env.reason())),
            Err(_) if !status.is_success() => Err(ProviderError::Status(status)),
            Err(e) => Err(ProviderError::Malformed(e)),
        }
    }

    fn record_body(&self, domain: &str, spec: &RecordSpec) -> Value {
        json!({
            "name":    relative_name(&spec.name, domain),
            "type":    spec.record_type.as_str(),
            "content": spec.content,
            "ttl":     spec.ttl.to_string(),
        })
    }
}

/// `home.example.com` → `home`, `example.com` → `""`.
fn relative_name<'a>(fqdn: &'a str, domain: &str) -> &'a str {
    if fqdn == domain {
        return "";
    }
    fqdn.strip_suffix(domain)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(fqdn)
}

/*──────── DnsProvider impl ────────*/

#[async_trait]
impl DnsProvider for PorkbunProvider {
    fn name(&self) -> &'static str {
        "Porkbun"
    }

    async fn list_records(&self, domain: &str) -> Result<Vec<RemoteRecord>, ProviderError> {
        let (status, text) = self
            .post(&format!("/dns/retrieve/{domain}"), json!({ "domain": domain }))
            .await?;
        if !status.is_success() {
            return Err(ProviderError::Status(status));
        }
        let listing: Listing = serde_json::from_str(&text)?;
        if listing.status != "SUCCESS" {
            return Err(ProviderError::LookupRejected(
                listing.message.unwrap_or(listing.status),
            ));
        }
        debug!("Porkbun {domain}: {} records", listing.records.len());
        Ok(listing.records)
    }

    async fn create_record(
        &self,
        domain: &str,
        spec: &RecordSpec,
    ) -> Result<String, ProviderError> {
        let env = self
            .mutate(&format!("/dns/create/{domain}"), self.record_body(domain, spec))
            .await?;
        let id = env
            .id
            .ok_or_else(|| ProviderError::Api("create: missing id".into()))?;
        debug!("Porkbun created record id={id}");
        Ok(id)
    }

    async fn edit_record(
        &self,
        domain: &str,
        id: &str,
        spec: &RecordSpec,
    ) -> Result<(), ProviderError> {
        let mut body = self.record_body(domain, spec);
        body["id"] = json!(id);
        self.mutate(&format!("/dns/edit/{domain}/{id}"), body)
            .await?;
        debug!("Porkbun updated record id={id}");
        Ok(())
    }

    async fn delete_record(&self, domain: &str, id: &str) -> Result<(), ProviderError> {
        self.mutate(&format!("/dns/delete/{domain}/{id}"), json!({}))
            .await?;
        debug!("Porkbun deleted record id={id}");
        Ok(())
    }
}
