use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::rr::{RData, Record, RecordType};
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::{ResolveError, Resolver, TokioResolver};
use tracing::{debug, warn};

use crate::{
    app_error::{AppError, AppResult},
    application::ports::dns_resolver::{DnsAnswer, DnsResolver},
    domain::entities::audit::DnsRecordType,
};

pub struct HickoryDnsResolver {
    name: String,
    resolver: TokioResolver,
}

impl HickoryDnsResolver {
    /// Resolver using the system DNS configuration.
    pub fn system(timeout: Duration) -> AppResult<Self> {
        let resolver = TokioResolver::builder_tokio()
            .map_err(|e| AppError::Internal(format!("system resolver config: {e}")))?
            .with_options(uncached_opts(timeout))
            .build();
        Ok(Self {
            name: "system".to_string(),
            resolver,
        })
    }

    /// Resolver pinned to a single DNS server, e.g. a public resolver or a
    /// local CoreDNS in development.
    pub fn with_nameserver(addr: SocketAddr, timeout: Duration) -> Self {
        let mut config = ResolverConfig::new();
        config.add_name_server(NameServerConfig::new(addr, Protocol::Udp));

        let resolver = Resolver::builder_with_config(config, TokioConnectionProvider::default())
            .with_options(uncached_opts(timeout))
            .build();
        Self {
            name: addr.to_string(),
            resolver,
        }
    }
}

/// Every probe must see the live answer, so caching is off.
fn uncached_opts(timeout: Duration) -> ResolverOpts {
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    opts.attempts = 1;
    opts.cache_size = 0;
    opts
}

fn to_fqdn(hostname: &str) -> String {
    if hostname.ends_with('.') {
        hostname.to_string()
    } else {
        format!("{hostname}.")
    }
}

fn record_type(record_type: DnsRecordType) -> RecordType {
    match record_type {
        DnsRecordType::Cname => RecordType::CNAME,
        DnsRecordType::A => RecordType::A,
        DnsRecordType::Aaaa => RecordType::AAAA,
        DnsRecordType::Txt => RecordType::TXT,
    }
}

fn record_value(data: &RData) -> Option<String> {
    if let Some(cname) = data.as_cname() {
        return Some(cname.to_string().trim_end_matches('.').to_string());
    }
    if let Some(a) = data.as_a() {
        return Some(a.to_string());
    }
    if let Some(aaaa) = data.as_aaaa() {
        return Some(aaaa.to_string());
    }
    data.as_txt().map(|txt| {
        txt.txt_data()
            .iter()
            .map(|d| String::from_utf8_lossy(d))
            .collect()
    })
}

/// Only records owned by the queried name count. A lookup that followed a
/// CNAME chain also returns the target's records, which are not conflicts.
fn owned_by(record: &Record, fqdn: &str, wanted: RecordType) -> bool {
    record.record_type() == wanted && record.name().to_string().eq_ignore_ascii_case(fqdn)
}

/// NXDOMAIN and empty NOERROR answers are absence of records, not failures.
fn is_no_records(err: &ResolveError) -> bool {
    err.is_no_records_found() || err.is_nx_domain()
}

#[async_trait]
impl DnsResolver for HickoryDnsResolver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, hostname: &str, kind: DnsRecordType) -> DnsAnswer {
        let fqdn = to_fqdn(hostname);
        let wanted = record_type(kind);

        match self.resolver.lookup(fqdn.as_str(), wanted).await {
            Ok(lookup) => {
                let values: Vec<String> = lookup
                    .records()
                    .iter()
                    .filter(|r| owned_by(r, &fqdn, wanted))
                    .filter_map(|r| record_value(r.data()))
                    .collect();
                debug!(
                    resolver = %self.name,
                    hostname = %hostname,
                    record_type = %kind,
                    found = values.len(),
                    "DNS lookup"
                );
                if values.is_empty() {
                    DnsAnswer::NoRecords
                } else {
                    DnsAnswer::Records(values)
                }
            }
            Err(e) if is_no_records(&e) => DnsAnswer::NoRecords,
            Err(e) => {
                let msg = e.to_string();
                warn!(
                    resolver = %self.name,
                    hostname = %hostname,
                    record_type = %kind,
                    error = %msg,
                    "DNS lookup failed"
                );
                DnsAnswer::Error(msg)
            }
        }
    }
}
