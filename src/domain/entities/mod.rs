pub mod audit;
pub mod domain_record;
