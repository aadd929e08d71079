//! Test utilities.
//!
//! - In-memory repositories mirroring the Postgres adapters' semantics
//! - A scripted DNS resolver and a recording SSL provisioner
//! - Factories for valid fixtures and builders wiring them into use cases

mod app_state_builder;
mod dns_mocks;
mod domain_mocks;
mod factories;
mod ssl_mocks;

pub use app_state_builder::*;
pub use dns_mocks::*;
pub use domain_mocks::*;
pub use factories::*;
pub use ssl_mocks::*;
