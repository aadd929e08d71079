pub mod dns_resolver;
pub mod ssl_provisioner;
