use crate::app_error::{AppError, AppResult};

pub const MAX_HOSTNAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// A hostname that passed format and apex checks, split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedHostname {
    pub hostname: String,
    pub apex_domain: String,
    pub subdomain: String,
}

/// Lowercase, trim whitespace and drop a trailing root dot.
pub fn normalize_hostname(input: &str) -> String {
    input.trim().trim_end_matches('.').to_lowercase()
}

/// Checks `label(.label)+`: at least two labels, each 1-63 ASCII
/// alphanumerics or hyphens without a leading or trailing hyphen.
pub fn is_valid_hostname(hostname: &str) -> bool {
    if hostname.is_empty() || hostname.len() > MAX_HOSTNAME_LEN {
        return false;
    }
    let labels: Vec<&str> = hostname.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| is_valid_label(l))
}

fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return false;
    }
    if label.starts_with('-') || label.ends_with('-') {
        return false;
    }
    label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// True when the requested hostname would be the apex itself.
pub fn is_apex_attempt(subdomain: &str, apex_domain: &str) -> bool {
    subdomain.is_empty() || subdomain == "@" || format!("{subdomain}.{apex_domain}") == apex_domain
}

pub fn apex_suggestion(default_subdomain: &str, apex_domain: &str) -> String {
    format!("{default_subdomain}.{apex_domain}")
}

/// Normalize and validate the parts of a custom hostname. Never touches the
/// store or the network.
pub fn validate_hostname_parts(
    apex_domain: &str,
    subdomain: &str,
    default_subdomain: &str,
) -> AppResult<ValidatedHostname> {
    let apex = normalize_hostname(apex_domain);
    let sub = normalize_hostname(subdomain);

    if !is_valid_hostname(&apex) {
        return Err(AppError::InvalidHostname(format!(
            "'{apex_domain}' is not a valid domain"
        )));
    }

    if is_apex_attempt(&sub, &apex) {
        return Err(AppError::ApexDomainRejected {
            suggestion: apex_suggestion(default_subdomain, &apex),
        });
    }

    let hostname = format!("{sub}.{apex}");
    if !is_valid_hostname(&hostname) {
        return Err(AppError::InvalidHostname(format!(
            "'{hostname}' is not a valid hostname"
        )));
    }

    Ok(ValidatedHostname {
        hostname,
        apex_domain: apex,
        subdomain: sub,
    })
}
