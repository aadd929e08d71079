//! Test data factories. Each returns a complete, valid fixture; the closure
//! overrides individual fields.

use chrono::{Duration, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::domain::entities::domain_record::{DomainRecord, DomainStatus, SslStatus};

pub const TEST_PLATFORM_DOMAIN: &str = "platform.example";
pub const TEST_INGRESS_DOMAIN: &str = "ingress.platform.example";
pub const TEST_TOKEN: &str = "0123456789abcdef0123456789abcdef";

pub fn test_target() -> String {
    format!("verify-{TEST_TOKEN}.{TEST_PLATFORM_DOMAIN}")
}

/// A pending record for `booking.example.com`, issued a minute ago.
pub fn create_test_record(overrides: impl FnOnce(&mut DomainRecord)) -> DomainRecord {
    let issued_at = test_now() - Duration::minutes(1);
    let mut record = DomainRecord {
        tenant_id: Uuid::new_v4(),
        hostname: "booking.example.com".to_string(),
        apex_domain: "example.com".to_string(),
        subdomain: "booking".to_string(),
        verification_token: TEST_TOKEN.to_string(),
        verification_target: test_target(),
        token_issued_at: issued_at,
        token_expires_at: issued_at + Duration::hours(24),
        attempts: 0,
        last_check_at: None,
        domain_status: DomainStatus::Pending,
        ssl_status: SslStatus::Pending,
        verified_at: None,
        activated_at: None,
        version: 0,
        created_at: Some(issued_at),
        updated_at: Some(issued_at),
    };
    overrides(&mut record);
    record
}

pub fn test_now() -> NaiveDateTime {
    Utc::now().naive_utc()
}
