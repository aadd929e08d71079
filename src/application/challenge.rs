use chrono::{Duration, NaiveDateTime};
use rand::RngCore;

use crate::domain::entities::domain_record::{Challenge, TOKEN_TTL_HOURS};

/// 16 bytes = 128 bits of entropy, 32 hex chars.
const TOKEN_BYTES: usize = 16;

/// Issues CNAME challenges under the platform's verification zone.
#[derive(Debug, Clone)]
pub struct ChallengeIssuer {
    platform_domain: String,
}

impl ChallengeIssuer {
    pub fn new(platform_domain: impl Into<String>) -> Self {
        Self {
            platform_domain: platform_domain.into(),
        }
    }

    pub fn issue(&self, now: NaiveDateTime) -> Challenge {
        let token = generate_token();
        Challenge {
            target: self.target_for(&token),
            token,
            issued_at: now,
            expires_at: now + Duration::hours(TOKEN_TTL_HOURS),
        }
    }

    pub fn target_for(&self, token: &str) -> String {
        format!("verify-{}.{}", token, self.platform_domain)
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
