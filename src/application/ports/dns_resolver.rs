//! DNS lookup capability.
//!
//! Implementations never fail: "no such record" and transport errors are both
//! answers, so a probe can always be recorded.

use async_trait::async_trait;

use crate::domain::entities::audit::DnsRecordType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsAnswer {
    /// Values owned by the queried name, without trailing dots.
    Records(Vec<String>),
    /// NXDOMAIN or NOERROR with an empty answer.
    NoRecords,
    /// Timeout, SERVFAIL, refused, or anything else that is not an answer.
    Error(String),
}

#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Label used in diagnostics, e.g. "system" or "1.1.1.1:53".
    fn name(&self) -> &str;

    async fn lookup(&self, hostname: &str, record_type: DnsRecordType) -> DnsAnswer;
}
