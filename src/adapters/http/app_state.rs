use std::sync::Arc;

use crate::{
    infra::config::AppConfig,
    use_cases::{activation::ActivationUseCases, verification::VerificationUseCases},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub verification_use_cases: Arc<VerificationUseCases>,
    pub activation_use_cases: Arc<ActivationUseCases>,
}
