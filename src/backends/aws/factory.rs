//! Builds AWS clients for a region/profile target.

use super::{SecretsManagerStore, SsmParameterStore};
use crate::backend::{ParameterStore, SecretStore};
use crate::client::ClientFactory;
use crate::{ConnectionOptions, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use std::sync::Arc;

/// [`ClientFactory`] for AWS Secrets Manager and SSM.
///
/// Region and profile come from the target; unset fields fall through to
/// the SDK's default provider chains.
#[derive(Debug, Clone, Default)]
pub struct AwsClientFactory {
    endpoint: Option<String>,
}

impl AwsClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends every request to a custom endpoint (for LocalStack testing).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    async fn sdk_config(&self, target: &ConnectionOptions) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(ref region) = target.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(ref profile) = target.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(ref endpoint) = self.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        loader.load().await
    }
}

#[async_trait]
impl ClientFactory for AwsClientFactory {
    async fn secret_store(&self, target: &ConnectionOptions) -> Result<Arc<dyn SecretStore>> {
        let config = self.sdk_config(target).await;
        Ok(Arc::new(SecretsManagerStore::new(
            aws_sdk_secretsmanager::Client::new(&config),
        )))
    }

    async fn parameter_store(&self, target: &ConnectionOptions) -> Result<Arc<dyn ParameterStore>> {
        let config = self.sdk_config(target).await;
        Ok(Arc::new(SsmParameterStore::new(aws_sdk_ssm::Client::new(&config))))
    }
}
