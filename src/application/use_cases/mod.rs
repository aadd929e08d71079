pub mod activation;
pub mod verification;
