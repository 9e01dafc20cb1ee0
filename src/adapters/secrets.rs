//! Secret-store adapter.

use crate::backend::{DeletionMode, SecretStore, Tags, RECOVERY_WINDOW_DAYS};
use crate::retry::RetryPolicy;
use crate::{Result, SenvarError};
use std::sync::Arc;
use tracing::debug;

/// Initial value written when a secret is created without a value.
pub const PLACEHOLDER_VALUE: &str = "PLACEHOLDER_VALUE_REPLACE_ME";

/// Maps ensure/get/set/delete/list onto a [`SecretStore`].
///
/// Tags can only be attached when a secret is created; value updates leave
/// them untouched.
#[derive(Clone)]
pub struct SecretAdapter {
    store: Arc<dyn SecretStore>,
    retry: RetryPolicy,
}

impl SecretAdapter {
    pub fn new(store: Arc<dyn SecretStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    fn context(&self, operation: &str, item: &str, err: SenvarError) -> SenvarError {
        SenvarError::backend_op(self.store.name(), operation, item, err)
    }

    /// Creates the secret with a placeholder value and `tags`.
    ///
    /// An existing secret counts as success and keeps its value.
    pub async fn ensure_secret(&self, name: &str, tags: &Tags) -> Result<()> {
        debug!(name, "create_secret");
        let created = self
            .retry
            .retry_if(
                "create_secret",
                || self.store.create_secret(name, PLACEHOLDER_VALUE, tags),
                SenvarError::is_transient,
            )
            .await;

        match created {
            Ok(()) => Ok(()),
            Err(err) if err.is_already_exists() => {
                debug!(name, "Secret already exists");
                Ok(())
            }
            Err(err) => Err(self.context("create", name, err)),
        }
    }

    /// Writes a new value to an existing secret.
    ///
    /// # Errors
    ///
    /// Fails with `NotFound` when the secret was never created.
    pub async fn set_secret_value(&self, name: &str, value: &str) -> Result<()> {
        debug!(name, "put_secret_value");
        self.retry
            .retry_if(
                "put_secret_value",
                || self.store.put_secret_value(name, value),
                SenvarError::is_transient,
            )
            .await
            .map_err(|e| self.context("put", name, e))
    }

    /// Reads the current value.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the secret does not exist
    /// - `EmptyValue` when the backend returned no value
    pub async fn get_secret_value(&self, name: &str) -> Result<String> {
        debug!(name, "get_secret_value");
        let value = self
            .retry
            .retry_if(
                "get_secret_value",
                || self.store.get_secret_value(name),
                SenvarError::is_transient,
            )
            .await
            .map_err(|e| self.context("get", name, e))?;

        value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| SenvarError::EmptyValue(format!("secret \"{}\"", name)))
    }

    /// Deletes a secret.
    ///
    /// Without `force` the deletion is scheduled with a
    /// [`RECOVERY_WINDOW_DAYS`] recovery window; with `force` it is
    /// immediate and irrecoverable.
    pub async fn delete_secret(&self, name: &str, force: bool) -> Result<()> {
        let mode = if force {
            DeletionMode::Immediate
        } else {
            DeletionMode::Recoverable {
                window_days: RECOVERY_WINDOW_DAYS,
            }
        };

        debug!(name, ?mode, "delete_secret");
        self.retry
            .retry_if(
                "delete_secret",
                || self.store.delete_secret(name, mode),
                SenvarError::is_transient,
            )
            .await
            .map_err(|e| self.context("delete", name, e))
    }

    /// Lists secret names starting with `prefix` and carrying every tag in
    /// `tags` with exactly the given value.
    ///
    /// The backend narrows by tag key only; value equality and the prefix
    /// are checked here.
    pub async fn list_secrets(&self, prefix: Option<&str>, tags: &Tags) -> Result<Vec<String>> {
        let tag_keys: Vec<String> = tags.keys().cloned().collect();
        let item = prefix.unwrap_or("*");

        let mut names = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            debug!(prefix = item, ?tag_keys, "list_secrets");
            let page = self
                .retry
                .retry_if(
                    "list_secrets",
                    || self.store.list_secrets(&tag_keys, next_token.as_deref()),
                    SenvarError::is_transient,
                )
                .await
                .map_err(|e| self.context("list", item, e))?;

            names.extend(
                page.items
                    .into_iter()
                    .filter(|secret| tags.iter().all(|(k, v)| secret.tags.get(k) == Some(v)))
                    .map(|secret| secret.name)
                    .filter(|name| prefix.map_or(true, |p| name.starts_with(p))),
            );

            next_token = page.next_token;
            if next_token.is_none() {
                break;
            }
        }

        Ok(names)
    }
}
