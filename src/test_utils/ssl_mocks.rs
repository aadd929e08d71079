//! SSL provisioner that records every signal.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::ssl_provisioner::SslProvisioner,
    domain::entities::domain_record::SslStatus,
};

pub struct RecordingSslProvisioner {
    pub requested: Mutex<Vec<String>>,
    pub polled: Mutex<Vec<String>>,
    /// `None` makes `request_certificate` fail.
    request_result: Mutex<Option<SslStatus>>,
    status: Mutex<Option<SslStatus>>,
}

impl Default for RecordingSslProvisioner {
    fn default() -> Self {
        Self {
            requested: Mutex::new(vec![]),
            polled: Mutex::new(vec![]),
            request_result: Mutex::new(Some(SslStatus::Provisioned)),
            status: Mutex::new(Some(SslStatus::Provisioned)),
        }
    }
}

impl RecordingSslProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(&self, status: SslStatus) {
        *self.request_result.lock().unwrap() = Some(status);
    }

    pub fn fail_requests(&self) {
        *self.request_result.lock().unwrap() = None;
    }

    pub fn report(&self, status: Option<SslStatus>) {
        *self.status.lock().unwrap() = status;
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    pub fn polled(&self) -> Vec<String> {
        self.polled.lock().unwrap().clone()
    }
}

#[async_trait]
impl SslProvisioner for RecordingSslProvisioner {
    async fn request_certificate(&self, hostname: &str) -> AppResult<SslStatus> {
        self.requested.lock().unwrap().push(hostname.to_string());
        let result = *self.request_result.lock().unwrap();
        result.ok_or_else(|| AppError::Internal("provisioner unavailable".into()))
    }

    async fn certificate_status(&self, hostname: &str) -> AppResult<Option<SslStatus>> {
        self.polled.lock().unwrap().push(hostname.to_string());
        Ok(*self.status.lock().unwrap())
    }
}
