//! Store traits for the two supported backends.
//!
//! This module defines [`SecretStore`] and [`ParameterStore`], thin views of
//! the native request shapes of a versioned secret store and a hierarchical
//! parameter store. The adapters in [`crate::adapters`] turn the logical
//! operations (ensure, get, set, delete, list) into call sequences against
//! these traits; implementations only translate requests and errors.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag map attached to backend entries.
pub type Tags = BTreeMap<String, String>;

/// Recovery window used when a secret is deleted without `force`.
pub const RECOVERY_WINDOW_DAYS: i64 = 7;

/// How a secret deletion is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionMode {
    /// Schedule the deletion; the secret can be restored within the window.
    Recoverable {
        /// Days before the deletion becomes final
        window_days: i64,
    },
    /// Delete immediately and irrecoverably.
    Immediate,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// A final page.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// Listing entry returned by the secret store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSummary {
    pub name: String,
    pub tags: Tags,
}

/// Storage type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    /// Plaintext value
    String,
    /// Value encrypted at rest by the backend
    SecureString,
}

impl ParameterType {
    pub fn from_secure(secure: bool) -> Self {
        if secure {
            Self::SecureString
        } else {
            Self::String
        }
    }
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "String"),
            Self::SecureString => write!(f, "SecureString"),
        }
    }
}

/// A single put-parameter request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutParameterRequest {
    pub name: String,
    pub value: String,
    pub kind: ParameterType,
    /// Replace an existing value instead of failing with `AlreadyExists`.
    pub overwrite: bool,
    /// Tags sent with the write. The backend rejects non-empty tags
    /// together with `overwrite`.
    pub tags: Tags,
}

/// Server-side filter for parameter listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterFilter {
    /// Name starts with the given path prefix.
    NameBeginsWith(String),
    /// Tag `key` is present with exactly `value`.
    TagEquals { key: String, value: String },
}

/// A secret store with create/update split semantics and soft deletion.
///
/// All implementations must be `Send + Sync` so one handle can be shared
/// across concurrent tasks.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the backend name used in error context (e.g., "secretsmanager").
    fn name(&self) -> &str;

    /// Creates a secret with an initial value. Tags can only be attached here.
    ///
    /// # Errors
    ///
    /// - [`SenvarError::AlreadyExists`](crate::SenvarError::AlreadyExists):
    ///   a secret with this name exists
    async fn create_secret(&self, name: &str, value: &str, tags: &Tags) -> Result<()>;

    /// Writes a new value to an existing secret.
    ///
    /// # Errors
    ///
    /// - [`SenvarError::NotFound`](crate::SenvarError::NotFound):
    ///   the secret does not exist
    async fn put_secret_value(&self, name: &str, value: &str) -> Result<()>;

    /// Reads the current value. `Ok(None)` means the secret has no string value.
    ///
    /// # Errors
    ///
    /// - [`SenvarError::NotFound`](crate::SenvarError::NotFound):
    ///   the secret does not exist
    async fn get_secret_value(&self, name: &str) -> Result<Option<String>>;

    /// Deletes a secret, either scheduled or immediate.
    async fn delete_secret(&self, name: &str, mode: DeletionMode) -> Result<()>;

    /// Lists secrets carrying any of `tag_keys` (all secrets when empty).
    ///
    /// The backend cannot match tag values, only tag key presence.
    async fn list_secrets(
        &self,
        tag_keys: &[String],
        next_token: Option<&str>,
    ) -> Result<Page<SecretSummary>>;
}

/// A hierarchical parameter store with plaintext and encrypted values.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Returns the backend name used in error context (e.g., "ssm").
    fn name(&self) -> &str;

    /// Writes a parameter value.
    ///
    /// # Errors
    ///
    /// - [`SenvarError::AlreadyExists`](crate::SenvarError::AlreadyExists):
    ///   `overwrite` is false and the parameter exists
    async fn put_parameter(&self, request: &PutParameterRequest) -> Result<()>;

    /// Adds (or replaces) tags on an existing parameter.
    async fn add_tags_to_resource(&self, name: &str, tags: &Tags) -> Result<()>;

    /// Reads a parameter value. `Ok(None)` means the backend returned no value.
    ///
    /// # Errors
    ///
    /// - [`SenvarError::NotFound`](crate::SenvarError::NotFound):
    ///   the parameter does not exist
    async fn get_parameter(&self, name: &str, with_decryption: bool) -> Result<Option<String>>;

    /// Deletes a parameter immediately.
    async fn delete_parameter(&self, name: &str) -> Result<()>;

    /// Lists parameter names matching all `filters`.
    async fn describe_parameters(
        &self,
        filters: &[ParameterFilter],
        next_token: Option<&str>,
    ) -> Result<Page<String>>;
}
