//! Parameter-store adapter.

use crate::backend::{
    ParameterFilter, ParameterStore, ParameterType, PutParameterRequest, Tags,
};
use crate::retry::RetryPolicy;
use crate::{Result, SenvarError};
use std::sync::Arc;
use tracing::debug;

/// Options for [`ParameterAdapter::put_parameter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    /// Store as an encrypted `SecureString` (default) or a plaintext `String`.
    pub secure: bool,
    /// Update an existing parameter instead of creating a new one.
    pub overwrite: bool,
    pub tags: Tags,
}

impl Default for PutOptions {
    fn default() -> Self {
        Self {
            secure: true,
            overwrite: false,
            tags: Tags::new(),
        }
    }
}

impl PutOptions {
    /// Create-only write carrying `tags`.
    pub fn create(tags: Tags) -> Self {
        Self {
            tags,
            ..Default::default()
        }
    }

    /// Overwriting write; `tags` are attached by a follow-up call.
    pub fn overwrite(tags: Tags) -> Self {
        Self {
            overwrite: true,
            tags,
            ..Default::default()
        }
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }
}

/// Maps put/get/delete/list onto a [`ParameterStore`].
#[derive(Clone)]
pub struct ParameterAdapter {
    store: Arc<dyn ParameterStore>,
    retry: RetryPolicy,
}

impl ParameterAdapter {
    pub fn new(store: Arc<dyn ParameterStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    fn context(&self, operation: &str, item: &str, err: SenvarError) -> SenvarError {
        SenvarError::backend_op(self.store.name(), operation, item, err)
    }

    /// Writes a parameter value.
    ///
    /// The backend refuses tags on an overwriting write, so a create sends
    /// the tags with the value, while an overwrite writes the value first
    /// and then attaches the tags with a separate call. The two calls are
    /// not atomic: if the second one fails the value is updated and the
    /// tags are stale, and the tagging error is returned.
    ///
    /// # Errors
    ///
    /// Fails with `AlreadyExists` when `overwrite` is false and the
    /// parameter exists.
    pub async fn put_parameter(
        &self,
        name: &str,
        value: &str,
        options: &PutOptions,
    ) -> Result<()> {
        let request = PutParameterRequest {
            name: name.to_string(),
            value: value.to_string(),
            kind: ParameterType::from_secure(options.secure),
            overwrite: options.overwrite,
            tags: if options.overwrite {
                Tags::new()
            } else {
                options.tags.clone()
            },
        };

        debug!(name, kind = %request.kind, overwrite = request.overwrite, "put_parameter");
        self.retry
            .retry_if(
                "put_parameter",
                || self.store.put_parameter(&request),
                SenvarError::is_transient,
            )
            .await
            .map_err(|e| self.context("put", name, e))?;

        if options.overwrite && !options.tags.is_empty() {
            debug!(name, "add_tags_to_resource");
            self.retry
                .retry_if(
                    "add_tags_to_resource",
                    || self.store.add_tags_to_resource(name, &options.tags),
                    SenvarError::is_transient,
                )
                .await
                .map_err(|e| self.context("tag", name, e))?;
        }

        Ok(())
    }

    /// Reads a parameter value, always decrypted.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the parameter does not exist
    /// - `EmptyValue` when the backend returned no value
    pub async fn get_parameter(&self, name: &str) -> Result<String> {
        debug!(name, "get_parameter");
        let value = self
            .retry
            .retry_if(
                "get_parameter",
                || self.store.get_parameter(name, true),
                SenvarError::is_transient,
            )
            .await
            .map_err(|e| self.context("get", name, e))?;

        value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| SenvarError::EmptyValue(format!("parameter \"{}\"", name)))
    }

    /// Deletes a parameter immediately. There is no recovery window.
    pub async fn delete_parameter(&self, name: &str) -> Result<()> {
        debug!(name, "delete_parameter");
        self.retry
            .retry_if(
                "delete_parameter",
                || self.store.delete_parameter(name),
                SenvarError::is_transient,
            )
            .await
            .map_err(|e| self.context("delete", name, e))
    }

    /// Lists parameter names.
    ///
    /// A prefix is matched server-side and takes precedence; `tags` are
    /// only used when no prefix is given, as exact server-side matches.
    pub async fn list_parameters(
        &self,
        prefix: Option<&str>,
        tags: &Tags,
    ) -> Result<Vec<String>> {
        let filters: Vec<ParameterFilter> = match prefix {
            Some(prefix) => vec![ParameterFilter::NameBeginsWith(prefix.to_string())],
            None => tags
                .iter()
                .map(|(key, value)| ParameterFilter::TagEquals {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        };
        let item = prefix.unwrap_or("*");

        let mut names = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            debug!(prefix = item, ?filters, "describe_parameters");
            let page = self
                .retry
                .retry_if(
                    "describe_parameters",
                    || self.store.describe_parameters(&filters, next_token.as_deref()),
                    SenvarError::is_transient,
                )
                .await
                .map_err(|e| self.context("list", item, e))?;

            names.extend(page.items);
            next_token = page.next_token;
            if next_token.is_none() {
                break;
            }
        }

        Ok(names)
    }
}
