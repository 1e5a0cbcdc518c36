//! Model service handles built once at startup

use std::sync::Arc;
use std::time::Duration;
use vri_common::config::ServicesConfig;

use super::{HttpClassifier, HttpCompletionService, HttpZeroShotScorer};
use crate::types::{Classifier, CompletionService, ServiceError, ZeroShotScorer};

/// Shared handles to the three model services
#[derive(Clone)]
pub struct ServiceRegistry {
    pub classifier: Arc<dyn Classifier>,
    pub zero_shot: Arc<dyn ZeroShotScorer>,
    pub completion: Arc<dyn CompletionService>,
}

impl ServiceRegistry {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        zero_shot: Arc<dyn ZeroShotScorer>,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        Self {
            classifier,
            zero_shot,
            completion,
        }
    }

    /// HTTP clients for the configured endpoints
    pub fn from_config(
        services: &ServicesConfig,
        api_token: Option<String>,
    ) -> Result<Self, ServiceError> {
        let timeout = Duration::from_secs(services.request_timeout_secs);

        let classifier = HttpClassifier::new(&services.classifier_url, timeout, api_token.clone())?;
        let zero_shot = HttpZeroShotScorer::new(&services.zero_shot_url, timeout, api_token.clone())?;
        let completion = HttpCompletionService::new(
            &services.completion_url,
            &services.completion_model,
            timeout,
            services.requests_per_second,
            api_token,
        )?;

        tracing::info!(
            classifier = %services.classifier_url,
            zero_shot = %services.zero_shot_url,
            completion = %services.completion_url,
            model = %services.completion_model,
            "Model service clients initialized"
        );

        Ok(Self::new(
            Arc::new(classifier),
            Arc::new(zero_shot),
            Arc::new(completion),
        ))
    }
}
