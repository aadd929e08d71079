pub mod app_error;
pub mod audit_trail;
pub mod challenge;
pub mod dns_probe;
pub mod hostname;
pub mod ports;
pub mod use_cases;
