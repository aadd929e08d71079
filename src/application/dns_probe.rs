//! CNAME challenge probing.
//!
//! Every lookup is bounded by a per-resolver timeout and every failure is
//! folded into the returned report, so callers always have something to
//! record in the audit trail.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::{
    application::ports::dns_resolver::{DnsAnswer, DnsResolver},
    domain::entities::audit::{ConflictingRecord, DnsRecordType},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CnameResolution {
    pub found: bool,
    pub actual_targets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    pub has_conflicts: bool,
    pub records: Vec<ConflictingRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverState {
    Resolved,
    Pending,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolverReport {
    pub resolver: String,
    pub state: ResolverState,
    pub answers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary across the consistency resolvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Propagation {
    /// Every resolver sees the expected CNAME.
    Complete,
    /// Some resolvers see it, others do not yet.
    Propagating,
    /// Resolvers answered but none sees the expected CNAME.
    NotConfigured,
    /// No resolver gave a usable answer.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropagationReport {
    pub state: Propagation,
    pub resolvers: Vec<ResolverReport>,
}

impl PropagationReport {
    fn from_resolvers(resolvers: Vec<ResolverReport>) -> Self {
        let total = resolvers.len();
        let resolved = count(&resolvers, ResolverState::Resolved);
        let pending = count(&resolvers, ResolverState::Pending);

        let state = if total == 0 {
            Propagation::Unknown
        } else if resolved == total {
            Propagation::Complete
        } else if resolved > 0 {
            Propagation::Propagating
        } else if pending > 0 {
            Propagation::NotConfigured
        } else {
            Propagation::Unknown
        };

        Self { state, resolvers }
    }
}

fn count(resolvers: &[ResolverReport], state: ResolverState) -> usize {
    resolvers.iter().filter(|r| r.state == state).count()
}

/// Everything one verification check learned about a hostname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub expected_target: String,
    pub cname: CnameResolution,
    pub conflicts: ConflictReport,
    pub propagation: PropagationReport,
}

#[derive(Clone)]
pub struct DnsProbe {
    primary: Arc<dyn DnsResolver>,
    consistency_resolvers: Vec<Arc<dyn DnsResolver>>,
    timeout: Duration,
}

impl DnsProbe {
    pub fn new(
        primary: Arc<dyn DnsResolver>,
        consistency_resolvers: Vec<Arc<dyn DnsResolver>>,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            consistency_resolvers,
            timeout,
        }
    }

    /// Run the CNAME check, conflict check and cross-resolver check together.
    pub async fn probe(&self, hostname: &str, expected_target: &str) -> ProbeReport {
        let (cname, conflicts, propagation) = tokio::join!(
            self.resolve_cname(hostname, expected_target),
            self.check_conflicts(hostname),
            self.check_cross_resolver_consistency(hostname, expected_target),
        );

        debug!(
            hostname = %hostname,
            found = cname.found,
            has_conflicts = conflicts.has_conflicts,
            propagation = ?propagation.state,
            "DNS probe finished"
        );

        ProbeReport {
            expected_target: normalize_target(expected_target),
            cname,
            conflicts,
            propagation,
        }
    }

    /// Exact-match CNAME check against the primary resolver.
    pub async fn resolve_cname(&self, hostname: &str, expected_target: &str) -> CnameResolution {
        let answer = bounded_lookup(
            self.primary.as_ref(),
            hostname,
            DnsRecordType::Cname,
            self.timeout,
        )
        .await;

        match answer {
            DnsAnswer::Records(values) => {
                let actual_targets: Vec<String> =
                    values.iter().map(|v| normalize_target(v)).collect();
                let found = matches_target(&actual_targets, expected_target);
                CnameResolution {
                    found,
                    actual_targets,
                    error: None,
                }
            }
            DnsAnswer::NoRecords => CnameResolution {
                found: false,
                actual_targets: vec![],
                error: None,
            },
            DnsAnswer::Error(e) => CnameResolution {
                found: false,
                actual_targets: vec![],
                error: Some(e),
            },
        }
    }

    /// A, AAAA and TXT records at the hostname itself. A failed lookup counts
    /// as no record.
    pub async fn check_conflicts(&self, hostname: &str) -> ConflictReport {
        let resolver = self.primary.as_ref();
        let (a, aaaa, txt) = tokio::join!(
            bounded_lookup(resolver, hostname, DnsRecordType::A, self.timeout),
            bounded_lookup(resolver, hostname, DnsRecordType::Aaaa, self.timeout),
            bounded_lookup(resolver, hostname, DnsRecordType::Txt, self.timeout),
        );

        let records: Vec<ConflictingRecord> = DnsRecordType::conflict_types()
            .iter()
            .zip([a, aaaa, txt])
            .filter_map(|(record_type, answer)| match answer {
                DnsAnswer::Records(values) if !values.is_empty() => Some(ConflictingRecord {
                    record_type: *record_type,
                    values,
                }),
                _ => None,
            })
            .collect();

        ConflictReport {
            has_conflicts: !records.is_empty(),
            records,
        }
    }

    /// Repeat the CNAME lookup against each independent resolver in parallel.
    pub async fn check_cross_resolver_consistency(
        &self,
        hostname: &str,
        expected_target: &str,
    ) -> PropagationReport {
        let mut set = JoinSet::new();
        for (idx, resolver) in self.consistency_resolvers.iter().enumerate() {
            let resolver = Arc::clone(resolver);
            let hostname = hostname.to_string();
            let expected = expected_target.to_string();
            let timeout = self.timeout;
            set.spawn(async move {
                let answer =
                    bounded_lookup(resolver.as_ref(), &hostname, DnsRecordType::Cname, timeout)
                        .await;
                (idx, resolver_report(resolver.name(), answer, &expected))
            });
        }

        let mut reports: Vec<(usize, ResolverReport)> = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => warn!(error = %e, "Consistency lookup task failed"),
            }
        }
        reports.sort_by_key(|(idx, _)| *idx);

        PropagationReport::from_resolvers(reports.into_iter().map(|(_, r)| r).collect())
    }
}

async fn bounded_lookup(
    resolver: &dyn DnsResolver,
    hostname: &str,
    record_type: DnsRecordType,
    timeout: Duration,
) -> DnsAnswer {
    match tokio::time::timeout(timeout, resolver.lookup(hostname, record_type)).await {
        Ok(answer) => answer,
        Err(_) => {
            warn!(
                resolver = %resolver.name(),
                hostname = %hostname,
                record_type = %record_type,
                "DNS lookup timed out"
            );
            DnsAnswer::Error(format!("timed out after {}ms", timeout.as_millis()))
        }
    }
}

fn resolver_report(name: &str, answer: DnsAnswer, expected_target: &str) -> ResolverReport {
    match answer {
        DnsAnswer::Records(values) => {
            let answers: Vec<String> = values.iter().map(|v| normalize_target(v)).collect();
            let state = if matches_target(&answers, expected_target) {
                ResolverState::Resolved
            } else {
                ResolverState::Pending
            };
            ResolverReport {
                resolver: name.to_string(),
                state,
                answers,
                error: None,
            }
        }
        DnsAnswer::NoRecords => ResolverReport {
            resolver: name.to_string(),
            state: ResolverState::Pending,
            answers: vec![],
            error: None,
        },
        DnsAnswer::Error(e) => ResolverReport {
            resolver: name.to_string(),
            state: ResolverState::Failed,
            answers: vec![],
            error: Some(e),
        },
    }
}

fn normalize_target(target: &str) -> String {
    target.trim().trim_end_matches('.').to_lowercase()
}

/// Whole-name comparison only: no wildcard or suffix matching.
fn matches_target(actual: &[String], expected: &str) -> bool {
    let expected = normalize_target(expected);
    actual.iter().any(|a| *a == expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockDnsResolver;

    const HOST: &str = "booking.example.com";
    const TARGET: &str = "verify-0123456789abcdef0123456789abcdef.platform.example";

    fn probe_with(primary: MockDnsResolver, others: Vec<MockDnsResolver>) -> DnsProbe {
        DnsProbe::new(
            Arc::new(primary),
            others
                .into_iter()
                .map(|r| Arc::new(r) as Arc<dyn DnsResolver>)
                .collect(),
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn cname_exact_match_is_found() {
        let primary = MockDnsResolver::named("primary").with_cname(HOST, &format!("{TARGET}."));
        let result = probe_with(primary, vec![]).resolve_cname(HOST, TARGET).await;
        assert!(result.found);
        assert_eq!(result.actual_targets, vec![TARGET.to_string()]);
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn cname_match_ignores_case() {
        let primary =
            MockDnsResolver::named("primary").with_cname(HOST, &TARGET.to_uppercase());
        let result = probe_with(primary, vec![]).resolve_cname(HOST, TARGET).await;
        assert!(result.found);
    }

    #[tokio::test]
    async fn cname_suffix_is_not_a_match() {
        let primary = MockDnsResolver::named("primary")
            .with_cname(HOST, &format!("evil.{TARGET}"));
        let result = probe_with(primary, vec![]).resolve_cname(HOST, TARGET).await;
        assert!(!result.found);
        assert_eq!(result.actual_targets, vec![format!("evil.{TARGET}")]);
    }

    #[tokio::test]
    async fn cname_other_host_reports_actual_target() {
        let primary = MockDnsResolver::named("primary").with_cname(HOST, "other-host.com");
        let result = probe_with(primary, vec![]).resolve_cname(HOST, TARGET).await;
        assert!(!result.found);
        assert_eq!(result.actual_targets, vec!["other-host.com".to_string()]);
    }

    #[tokio::test]
    async fn cname_lookup_error_is_captured() {
        let primary = MockDnsResolver::named("primary").with_error(
            HOST,
            DnsRecordType::Cname,
            "SERVFAIL",
        );
        let result = probe_with(primary, vec![]).resolve_cname(HOST, TARGET).await;
        assert!(!result.found);
        assert_eq!(result.error.as_deref(), Some("SERVFAIL"));
    }

    #[tokio::test]
    async fn slow_resolver_times_out_into_diagnostic() {
        let primary = MockDnsResolver::named("primary")
            .with_cname(HOST, TARGET)
            .with_delay(Duration::from_secs(5));
        let result = probe_with(primary, vec![]).resolve_cname(HOST, TARGET).await;
        assert!(!result.found);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn conflicts_collect_a_aaaa_txt() {
        let primary = MockDnsResolver::named("primary")
            .with_records(HOST, DnsRecordType::A, &["192.0.2.10"])
            .with_records(HOST, DnsRecordType::Txt, &["v=spf1 -all"])
            .with_error(HOST, DnsRecordType::Aaaa, "SERVFAIL");
        let report = probe_with(primary, vec![]).check_conflicts(HOST).await;
        assert!(report.has_conflicts);
        assert_eq!(
            report.records,
            vec![
                ConflictingRecord {
                    record_type: DnsRecordType::A,
                    values: vec!["192.0.2.10".into()],
                },
                ConflictingRecord {
                    record_type: DnsRecordType::Txt,
                    values: vec!["v=spf1 -all".into()],
                },
            ]
        );
    }

    #[tokio::test]
    async fn no_conflicts_when_nothing_resolves() {
        let primary = MockDnsResolver::named("primary").with_cname(HOST, TARGET);
        let report = probe_with(primary, vec![]).check_conflicts(HOST).await;
        assert!(!report.has_conflicts);
        assert!(report.records.is_empty());
    }

    #[tokio::test]
    async fn resolver_disagreement_is_propagating() {
        let a = MockDnsResolver::named("1.1.1.1:53").with_cname(HOST, TARGET);
        let b = MockDnsResolver::named("8.8.8.8:53");
        let report = probe_with(MockDnsResolver::named("primary"), vec![a, b])
            .check_cross_resolver_consistency(HOST, TARGET)
            .await;
        assert_eq!(report.state, Propagation::Propagating);
        assert_eq!(report.resolvers[0].resolver, "1.1.1.1:53");
        assert_eq!(report.resolvers[0].state, ResolverState::Resolved);
        assert_eq!(report.resolvers[1].state, ResolverState::Pending);
    }

    #[tokio::test]
    async fn all_resolvers_agree_is_complete() {
        let a = MockDnsResolver::named("a").with_cname(HOST, TARGET);
        let b = MockDnsResolver::named("b").with_cname(HOST, TARGET);
        let report = probe_with(MockDnsResolver::named("primary"), vec![a, b])
            .check_cross_resolver_consistency(HOST, TARGET)
            .await;
        assert_eq!(report.state, Propagation::Complete);
    }

    #[tokio::test]
    async fn no_resolver_sees_record_is_not_configured() {
        let a = MockDnsResolver::named("a");
        let b = MockDnsResolver::named("b").with_error(HOST, DnsRecordType::Cname, "refused");
        let report = probe_with(MockDnsResolver::named("primary"), vec![a, b])
            .check_cross_resolver_consistency(HOST, TARGET)
            .await;
        assert_eq!(report.state, Propagation::NotConfigured);
        assert_eq!(report.resolvers[1].state, ResolverState::Failed);
    }

    #[tokio::test]
    async fn all_resolvers_failing_is_unknown() {
        let a = MockDnsResolver::named("a").with_error(HOST, DnsRecordType::Cname, "timeout");
        let report = probe_with(MockDnsResolver::named("primary"), vec![a])
            .check_cross_resolver_consistency(HOST, TARGET)
            .await;
        assert_eq!(report.state, Propagation::Unknown);
    }

    #[tokio::test]
    async fn full_probe_serializes_for_audit() {
        let primary = MockDnsResolver::named("primary").with_cname(HOST, "other-host.com");
        let report = probe_with(primary, vec![MockDnsResolver::named("a")])
            .probe(HOST, TARGET)
            .await;
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["cname"]["found"], false);
        assert_eq!(json["cname"]["actual_targets"][0], "other-host.com");
        assert_eq!(json["propagation"]["state"], "not_configured");
    }
}
