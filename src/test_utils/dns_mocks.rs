//! Scripted DNS resolver.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    application::ports::dns_resolver::{DnsAnswer, DnsResolver},
    domain::entities::audit::DnsRecordType,
};

/// Answers from a fixed table keyed by (hostname, type). Unknown keys answer
/// `NoRecords`. Answers can be changed while a use case holds the resolver.
pub struct MockDnsResolver {
    name: String,
    answers: Mutex<HashMap<(String, DnsRecordType), DnsAnswer>>,
    delay: Option<Duration>,
}

impl MockDnsResolver {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            answers: Mutex::new(HashMap::new()),
            delay: None,
        }
    }

    pub fn with_cname(self, hostname: &str, target: &str) -> Self {
        self.set_cname(hostname, target);
        self
    }

    pub fn with_records(self, hostname: &str, record_type: DnsRecordType, values: &[&str]) -> Self {
        self.set_records(hostname, record_type, values);
        self
    }

    pub fn with_error(self, hostname: &str, record_type: DnsRecordType, message: &str) -> Self {
        self.set_answer(hostname, record_type, DnsAnswer::Error(message.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_cname(&self, hostname: &str, target: &str) {
        self.set_records(hostname, DnsRecordType::Cname, &[target]);
    }

    pub fn set_records(&self, hostname: &str, record_type: DnsRecordType, values: &[&str]) {
        let values = values.iter().map(|v| v.to_string()).collect();
        self.set_answer(hostname, record_type, DnsAnswer::Records(values));
    }

    pub fn set_answer(&self, hostname: &str, record_type: DnsRecordType, answer: DnsAnswer) {
        self.answers
            .lock()
            .unwrap()
            .insert((hostname.to_lowercase(), record_type), answer);
    }
}

#[async_trait]
impl DnsResolver for MockDnsResolver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, hostname: &str, record_type: DnsRecordType) -> DnsAnswer {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answers
            .lock()
            .unwrap()
            .get(&(hostname.to_lowercase(), record_type))
            .cloned()
            .unwrap_or(DnsAnswer::NoRecords)
    }
}
