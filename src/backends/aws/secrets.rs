//! AWS Secrets Manager store.

use super::classify;
use crate::backend::{DeletionMode, Page, SecretStore, SecretSummary, Tags};
use crate::{Result, SenvarError};
use async_trait::async_trait;
use aws_sdk_secretsmanager::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_secretsmanager::types::{Filter, FilterNameStringType, Tag};
use aws_sdk_secretsmanager::Client;

const EXISTS: &[&str] = &["ResourceExistsException"];
const MISSING: &[&str] = &["ResourceNotFoundException"];

/// Page size requested from `ListSecrets`.
const LIST_PAGE_SIZE: i32 = 50;

/// Maps an SDK failure for `name` onto the crate taxonomy.
fn sdk_error<E, R>(name: &str, err: SdkError<E, R>) -> SenvarError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    classify(name, err.code(), DisplayErrorContext(&err).to_string(), EXISTS, MISSING)
}

/// [`SecretStore`] backed by AWS Secrets Manager.
#[derive(Clone)]
pub struct SecretsManagerStore {
    client: Client,
}

impl SecretsManagerStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    fn name(&self) -> &str {
        "secretsmanager"
    }

    async fn create_secret(&self, name: &str, value: &str, tags: &Tags) -> Result<()> {
        let tags: Vec<Tag> = tags
            .iter()
            .map(|(key, value)| Tag::builder().key(key).value(value).build())
            .collect();

        self.client
            .create_secret()
            .name(name)
            .secret_string(value)
            .set_tags((!tags.is_empty()).then_some(tags))
            .send()
            .await
            .map_err(|e| sdk_error(name, e))?;

        Ok(())
    }

    async fn put_secret_value(&self, name: &str, value: &str) -> Result<()> {
        self.client
            .put_secret_value()
            .secret_id(name)
            .secret_string(value)
            .send()
            .await
            .map_err(|e| sdk_error(name, e))?;

        Ok(())
    }

    async fn get_secret_value(&self, name: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|e| sdk_error(name, e))?;

        Ok(response.secret_string().map(str::to_string))
    }

    async fn delete_secret(&self, name: &str, mode: DeletionMode) -> Result<()> {
        let request = self.client.delete_secret().secret_id(name);
        let request = match mode {
            DeletionMode::Immediate => request.force_delete_without_recovery(true),
            DeletionMode::Recoverable { window_days } => {
                request.recovery_window_in_days(window_days)
            }
        };

        request
            .send()
            .await
            .map_err(|e| sdk_error(name, e))?;

        Ok(())
    }

    async fn list_secrets(
        &self,
        tag_keys: &[String],
        next_token: Option<&str>,
    ) -> Result<Page<SecretSummary>> {
        let mut request = self.client.list_secrets().max_results(LIST_PAGE_SIZE);

        if !tag_keys.is_empty() {
            request = request.filters(
                Filter::builder()
                    .key(FilterNameStringType::TagKey)
                    .set_values(Some(tag_keys.to_vec()))
                    .build(),
            );
        }
        if let Some(token) = next_token {
            request = request.next_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| sdk_error("*", e))?;

        let items = response
            .secret_list()
            .iter()
            .filter_map(|secret| {
                let name = secret.name()?;
                let tags = secret
                    .tags()
                    .iter()
                    .filter_map(|tag| Some((tag.key()?.to_string(), tag.value()?.to_string())))
                    .collect();
                Some(SecretSummary {
                    name: name.to_string(),
                    tags,
                })
            })
            .collect();

        Ok(Page {
            items,
            next_token: response.next_token().map(str::to_string),
        })
    }
}
