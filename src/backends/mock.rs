//! Mock backends for testing.
//!
//! In-memory stores that reproduce the behaviour the adapters depend on:
//! create-vs-update split for secrets, scheduled deletion with a recovery
//! window, key-only tag filtering on secret listings, and the parameter
//! store's refusal of tags on an overwriting write. Every request is
//! recorded so tests can assert call sequences. Failures can be injected
//! for the next few requests or for one kind of request.

use crate::backend::{
    DeletionMode, Page, ParameterFilter, ParameterStore, ParameterType, PutParameterRequest,
    SecretStore, SecretSummary, Tags,
};
use crate::client::ClientFactory;
use crate::{ConnectionOptions, Result, SenvarError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockWriteGuard};

const DEFAULT_PAGE_SIZE: usize = 50;

/// A request received by one of the mock stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    CreateSecret {
        name: String,
        tags: Tags,
    },
    PutSecretValue {
        name: String,
    },
    GetSecretValue {
        name: String,
    },
    DeleteSecret {
        name: String,
        mode: DeletionMode,
    },
    ListSecrets {
        tag_keys: Vec<String>,
    },
    PutParameter {
        name: String,
        kind: ParameterType,
        overwrite: bool,
        tagged: bool,
    },
    AddTagsToResource {
        name: String,
    },
    GetParameter {
        name: String,
        with_decryption: bool,
    },
    DeleteParameter {
        name: String,
    },
    DescribeParameters {
        filters: Vec<ParameterFilter>,
    },
}

/// Kind of request, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    CreateSecret,
    PutSecretValue,
    GetSecretValue,
    DeleteSecret,
    ListSecrets,
    PutParameter,
    AddTagsToResource,
    GetParameter,
    DeleteParameter,
    DescribeParameters,
}

impl MockCall {
    pub fn op(&self) -> MockOp {
        match self {
            Self::CreateSecret { .. } => MockOp::CreateSecret,
            Self::PutSecretValue { .. } => MockOp::PutSecretValue,
            Self::GetSecretValue { .. } => MockOp::GetSecretValue,
            Self::DeleteSecret { .. } => MockOp::DeleteSecret,
            Self::ListSecrets { .. } => MockOp::ListSecrets,
            Self::PutParameter { .. } => MockOp::PutParameter,
            Self::AddTagsToResource { .. } => MockOp::AddTagsToResource,
            Self::GetParameter { .. } => MockOp::GetParameter,
            Self::DeleteParameter { .. } => MockOp::DeleteParameter,
            Self::DescribeParameters { .. } => MockOp::DescribeParameters,
        }
    }
}

/// Pending injected failures for one store.
#[derive(Default)]
struct Faults {
    next: u32,
    by_op: HashMap<MockOp, String>,
}

impl Faults {
    /// Error for a request of kind `op`, if one is due.
    ///
    /// Count-based failures are consumed; per-operation failures persist
    /// until cleared.
    fn take(&mut self, op: MockOp) -> Option<SenvarError> {
        if self.next > 0 {
            self.next -= 1;
            return Some(SenvarError::Backend(
                "ThrottlingException: rate exceeded (injected)".to_string(),
            ));
        }
        self.by_op.get(&op).map(|message| SenvarError::Backend(message.clone()))
    }
}

fn page_of<T>(items: Vec<T>, page_size: usize, next_token: Option<&str>) -> Result<Page<T>> {
    let start = match next_token {
        Some(token) => token
            .parse::<usize>()
            .map_err(|_| SenvarError::Backend(format!("InvalidNextTokenException: {}", token)))?,
        None => 0,
    };
    let total = items.len();
    let end = (start + page_size.max(1)).min(total);
    let items: Vec<T> = items.into_iter().skip(start).take(end.saturating_sub(start)).collect();

    Ok(Page {
        items,
        next_token: (end < total).then(|| end.to_string()),
    })
}

#[derive(Debug, Clone)]
struct MockSecret {
    value: Option<String>,
    tags: Tags,
    version_id: String,
    deletion_date: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct SecretState {
    secrets: BTreeMap<String, MockSecret>,
    calls: Vec<MockCall>,
    faults: Faults,
}

/// In-memory secret store.
///
/// Clones share the same underlying data.
///
/// # Example
///
/// ```
/// use senvar::backend::{SecretStore, Tags};
/// use senvar::backends::mock::MockSecretStore;
///
/// #[tokio::main]
/// async fn main() -> senvar::Result<()> {
///     let store = MockSecretStore::new();
///     store.insert("/senvar/shop/prod/apiKey", "sk_live", Tags::new()).await;
///
///     // Simulate throttling on the next call
///     store.fail_next(1).await;
///
///     assert!(store.get_secret_value("/senvar/shop/prod/apiKey").await.is_err());
///     assert!(store.get_secret_value("/senvar/shop/prod/apiKey").await.is_ok());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct MockSecretStore {
    state: Arc<RwLock<SecretState>>,
    page_size: usize,
}

impl MockSecretStore {
    /// Creates a new mock store with empty storage.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SecretState::default())),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets how many entries a listing page holds.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Pre-populates the store with a secret.
    pub async fn insert(&self, name: impl Into<String>, value: impl Into<String>, tags: Tags) {
        let mut state = self.state.write().await;
        state.secrets.insert(
            name.into(),
            MockSecret {
                value: Some(value.into()),
                tags,
                version_id: uuid::Uuid::new_v4().to_string(),
                deletion_date: None,
            },
        );
    }

    /// Pre-populates the store with a secret that has no string value.
    pub async fn insert_without_value(&self, name: impl Into<String>) {
        let mut state = self.state.write().await;
        state.secrets.insert(
            name.into(),
            MockSecret {
                value: None,
                tags: Tags::new(),
                version_id: uuid::Uuid::new_v4().to_string(),
                deletion_date: None,
            },
        );
    }

    /// Makes the next `count` requests fail with a transient error.
    pub async fn fail_next(&self, count: u32) {
        self.state.write().await.faults.next = count;
    }

    /// Makes every `op` request fail with a backend error carrying
    /// `message`, until [`clear_failures`](Self::clear_failures).
    pub async fn fail_on(&self, op: MockOp, message: impl Into<String>) {
        self.state.write().await.faults.by_op.insert(op, message.into());
    }

    pub async fn clear_failures(&self) {
        self.state.write().await.faults = Faults::default();
    }

    /// Requests received so far, in order.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.state.read().await.calls.clone()
    }

    /// Tags of a live or scheduled-for-deletion secret.
    pub async fn tags_of(&self, name: &str) -> Option<Tags> {
        self.state.read().await.secrets.get(name).map(|s| s.tags.clone())
    }

    /// Current version id of a secret.
    pub async fn version_of(&self, name: &str) -> Option<String> {
        self.state.read().await.secrets.get(name).map(|s| s.version_id.clone())
    }

    /// True when the secret is scheduled for deletion and can still be restored.
    pub async fn is_recoverable(&self, name: &str) -> bool {
        self.state
            .read()
            .await
            .secrets
            .get(name)
            .is_some_and(|s| s.deletion_date.is_some())
    }

    /// Records `call` and consumes one injected failure, if any.
    async fn begin(&self, call: MockCall) -> Result<RwLockWriteGuard<'_, SecretState>> {
        let mut state = self.state.write().await;
        let op = call.op();
        state.calls.push(call);
        if let Some(err) = state.faults.take(op) {
            return Err(err);
        }
        Ok(state)
    }
}

impl Default for MockSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

fn live_secret<'a>(state: &'a mut SecretState, name: &str) -> Result<&'a mut MockSecret> {
    let secret = state
        .secrets
        .get_mut(name)
        .ok_or_else(|| SenvarError::NotFound(name.to_string()))?;
    if secret.deletion_date.is_some() {
        return Err(SenvarError::Backend(format!(
            "InvalidRequestException: {} is marked for deletion",
            name
        )));
    }
    Ok(secret)
}

#[async_trait]
impl SecretStore for MockSecretStore {
    fn name(&self) -> &str {
        "mock-secrets"
    }

    async fn create_secret(&self, name: &str, value: &str, tags: &Tags) -> Result<()> {
        let mut state = self
            .begin(MockCall::CreateSecret {
                name: name.to_string(),
                tags: tags.clone(),
            })
            .await?;

        if let Some(existing) = state.secrets.get(name) {
            if existing.deletion_date.is_some() {
                return Err(SenvarError::Backend(format!(
                    "InvalidRequestException: {} is scheduled for deletion",
                    name
                )));
            }
            return Err(SenvarError::AlreadyExists(name.to_string()));
        }

        state.secrets.insert(
            name.to_string(),
            MockSecret {
                value: Some(value.to_string()),
                tags: tags.clone(),
                version_id: uuid::Uuid::new_v4().to_string(),
                deletion_date: None,
            },
        );
        Ok(())
    }

    async fn put_secret_value(&self, name: &str, value: &str) -> Result<()> {
        let mut state = self
            .begin(MockCall::PutSecretValue {
                name: name.to_string(),
            })
            .await?;

        let secret = live_secret(&mut state, name)?;
        secret.value = Some(value.to_string());
        secret.version_id = uuid::Uuid::new_v4().to_string();
        Ok(())
    }

    async fn get_secret_value(&self, name: &str) -> Result<Option<String>> {
        let mut state = self
            .begin(MockCall::GetSecretValue {
                name: name.to_string(),
            })
            .await?;

        Ok(live_secret(&mut state, name)?.value.clone())
    }

    async fn delete_secret(&self, name: &str, mode: DeletionMode) -> Result<()> {
        let mut state = self
            .begin(MockCall::DeleteSecret {
                name: name.to_string(),
                mode,
            })
            .await?;

        match mode {
            DeletionMode::Immediate => {
                state
                    .secrets
                    .remove(name)
                    .ok_or_else(|| SenvarError::NotFound(name.to_string()))?;
            }
            DeletionMode::Recoverable { window_days } => {
                let secret = live_secret(&mut state, name)?;
                secret.deletion_date = Some(Utc::now() + Duration::days(window_days));
            }
        }
        Ok(())
    }

    async fn list_secrets(
        &self,
        tag_keys: &[String],
        next_token: Option<&str>,
    ) -> Result<Page<SecretSummary>> {
        let state = self
            .begin(MockCall::ListSecrets {
                tag_keys: tag_keys.to_vec(),
            })
            .await?;

        let matching: Vec<SecretSummary> = state
            .secrets
            .iter()
            .filter(|(_, s)| s.deletion_date.is_none())
            .filter(|(_, s)| tag_keys.is_empty() || tag_keys.iter().any(|k| s.tags.contains_key(k)))
            .map(|(name, s)| SecretSummary {
                name: name.clone(),
                tags: s.tags.clone(),
            })
            .collect();

        page_of(matching, self.page_size, next_token)
    }
}

#[derive(Debug, Clone)]
struct MockParameter {
    value: Option<String>,
    kind: ParameterType,
    tags: Tags,
    version: u64,
}

#[derive(Default)]
struct ParameterState {
    parameters: BTreeMap<String, MockParameter>,
    calls: Vec<MockCall>,
    faults: Faults,
}

/// In-memory parameter store.
///
/// Clones share the same underlying data.
#[derive(Clone)]
pub struct MockParameterStore {
    state: Arc<RwLock<ParameterState>>,
    page_size: usize,
}

impl MockParameterStore {
    /// Creates a new mock store with empty storage.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ParameterState::default())),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets how many entries a listing page holds.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Pre-populates the store with a parameter.
    pub async fn insert(
        &self,
        name: impl Into<String>,
        value: impl Into<String>,
        kind: ParameterType,
        tags: Tags,
    ) {
        let mut state = self.state.write().await;
        state.parameters.insert(
            name.into(),
            MockParameter {
                value: Some(value.into()),
                kind,
                tags,
                version: 1,
            },
        );
    }

    /// Pre-populates the store with a parameter whose response carries no value.
    pub async fn insert_without_value(&self, name: impl Into<String>) {
        let mut state = self.state.write().await;
        state.parameters.insert(
            name.into(),
            MockParameter {
                value: None,
                kind: ParameterType::SecureString,
                tags: Tags::new(),
                version: 1,
            },
        );
    }

    pub async fn value_of(&self, name: &str) -> Option<String> {
        self.state
            .read()
            .await
            .parameters
            .get(name)
            .and_then(|p| p.value.clone())
    }

    /// Makes the next `count` requests fail with a transient error.
    pub async fn fail_next(&self, count: u32) {
        self.state.write().await.faults.next = count;
    }

    /// Makes every `op` request fail with a backend error carrying
    /// `message`, until [`clear_failures`](Self::clear_failures).
    pub async fn fail_on(&self, op: MockOp, message: impl Into<String>) {
        self.state.write().await.faults.by_op.insert(op, message.into());
    }

    pub async fn clear_failures(&self) {
        self.state.write().await.faults = Faults::default();
    }

    /// Requests received so far, in order.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.state.read().await.calls.clone()
    }

    pub async fn tags_of(&self, name: &str) -> Option<Tags> {
        self.state.read().await.parameters.get(name).map(|p| p.tags.clone())
    }

    pub async fn kind_of(&self, name: &str) -> Option<ParameterType> {
        self.state.read().await.parameters.get(name).map(|p| p.kind)
    }

    pub async fn version_of(&self, name: &str) -> Option<u64> {
        self.state.read().await.parameters.get(name).map(|p| p.version)
    }

    async fn begin(&self, call: MockCall) -> Result<RwLockWriteGuard<'_, ParameterState>> {
        let mut state = self.state.write().await;
        let op = call.op();
        state.calls.push(call);
        if let Some(err) = state.faults.take(op) {
            return Err(err);
        }
        Ok(state)
    }
}

impl Default for MockParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

fn filter_matches(filter: &ParameterFilter, name: &str, parameter: &MockParameter) -> bool {
    match filter {
        ParameterFilter::NameBeginsWith(prefix) => name.starts_with(prefix.as_str()),
        ParameterFilter::TagEquals { key, value } => parameter.tags.get(key) == Some(value),
    }
}

#[async_trait]
impl ParameterStore for MockParameterStore {
    fn name(&self) -> &str {
        "mock-parameters"
    }

    async fn put_parameter(&self, request: &PutParameterRequest) -> Result<()> {
        let mut state = self
            .begin(MockCall::PutParameter {
                name: request.name.clone(),
                kind: request.kind,
                overwrite: request.overwrite,
                tagged: !request.tags.is_empty(),
            })
            .await?;

        if request.overwrite && !request.tags.is_empty() {
            return Err(SenvarError::Backend(
                "ValidationException: tags and overwrite can't be used together".to_string(),
            ));
        }
        if request.value.is_empty() {
            return Err(SenvarError::Backend(
                "ValidationException: value must have length at least 1".to_string(),
            ));
        }

        if let Some(existing) = state.parameters.get_mut(&request.name) {
            if !request.overwrite {
                return Err(SenvarError::AlreadyExists(request.name.clone()));
            }
            existing.value = Some(request.value.clone());
            existing.kind = request.kind;
            existing.version += 1;
            return Ok(());
        }

        state.parameters.insert(
            request.name.clone(),
            MockParameter {
                value: Some(request.value.clone()),
                kind: request.kind,
                tags: request.tags.clone(),
                version: 1,
            },
        );
        Ok(())
    }

    async fn add_tags_to_resource(&self, name: &str, tags: &Tags) -> Result<()> {
        let mut state = self
            .begin(MockCall::AddTagsToResource {
                name: name.to_string(),
            })
            .await?;

        let parameter = state
            .parameters
            .get_mut(name)
            .ok_or_else(|| SenvarError::NotFound(name.to_string()))?;
        parameter
            .tags
            .extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn get_parameter(&self, name: &str, with_decryption: bool) -> Result<Option<String>> {
        let state = self
            .begin(MockCall::GetParameter {
                name: name.to_string(),
                with_decryption,
            })
            .await?;

        let parameter = state
            .parameters
            .get(name)
            .ok_or_else(|| SenvarError::NotFound(name.to_string()))?;

        if parameter.kind == ParameterType::SecureString && !with_decryption {
            return Ok(Some("<encrypted>".to_string()));
        }
        Ok(parameter.value.clone())
    }

    async fn delete_parameter(&self, name: &str) -> Result<()> {
        let mut state = self
            .begin(MockCall::DeleteParameter {
                name: name.to_string(),
            })
            .await?;

        state
            .parameters
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SenvarError::NotFound(name.to_string()))
    }

    async fn describe_parameters(
        &self,
        filters: &[ParameterFilter],
        next_token: Option<&str>,
    ) -> Result<Page<String>> {
        let state = self
            .begin(MockCall::DescribeParameters {
                filters: filters.to_vec(),
            })
            .await?;

        let matching: Vec<String> = state
            .parameters
            .iter()
            .filter(|(name, p)| filters.iter().all(|f| filter_matches(f, name, p)))
            .map(|(name, _)| name.clone())
            .collect();

        page_of(matching, self.page_size, next_token)
    }
}

/// [`ClientFactory`] handing out fresh handles onto shared mock stores.
///
/// Every build returns a new handle, so identity reuse observed through
/// [`ClientCache`](crate::ClientCache) comes from the cache itself.
pub struct MockFactory {
    secrets: MockSecretStore,
    parameters: MockParameterStore,
    secret_builds: AtomicUsize,
    parameter_builds: AtomicUsize,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::with_stores(MockSecretStore::new(), MockParameterStore::new())
    }

    pub fn with_stores(secrets: MockSecretStore, parameters: MockParameterStore) -> Self {
        Self {
            secrets,
            parameters,
            secret_builds: AtomicUsize::new(0),
            parameter_builds: AtomicUsize::new(0),
        }
    }

    pub fn secrets(&self) -> &MockSecretStore {
        &self.secrets
    }

    pub fn parameters(&self) -> &MockParameterStore {
        &self.parameters
    }

    /// How many secret-store handles were built.
    pub fn secret_stores_built(&self) -> usize {
        self.secret_builds.load(Ordering::SeqCst)
    }

    /// How many parameter-store handles were built.
    pub fn parameter_stores_built(&self) -> usize {
        self.parameter_builds.load(Ordering::SeqCst)
    }
}

impl Default for MockFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClientFactory for MockFactory {
    async fn secret_store(&self, _target: &ConnectionOptions) -> Result<Arc<dyn SecretStore>> {
        // Give concurrent callers a chance to interleave.
        tokio::task::yield_now().await;
        self.secret_builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.secrets.clone()))
    }

    async fn parameter_store(
        &self,
        _target: &ConnectionOptions,
    ) -> Result<Arc<dyn ParameterStore>> {
        tokio::task::yield_now().await;
        self.parameter_builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.parameters.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_secret_create_and_get() {
        let store = MockSecretStore::new();
        store.create_secret("key", "value", &Tags::new()).await.unwrap();

        let value = store.get_secret_value("key").await.unwrap();
        assert_eq!(value.as_deref(), Some("value"));
    }

    #[tokio::test]
    async fn test_secret_duplicate_create() {
        let store = MockSecretStore::new();
        store.create_secret("key", "a", &Tags::new()).await.unwrap();

        let result = store.create_secret("key", "b", &Tags::new()).await;
        assert!(matches!(result, Err(SenvarError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_put_changes_version() {
        let store = MockSecretStore::new();
        store.insert("key", "a", Tags::new()).await;
        let before = store.version_of("key").await;

        store.put_secret_value("key", "b").await.unwrap();
        assert_ne!(store.version_of("key").await, before);
    }

    #[tokio::test]
    async fn test_scheduled_deletion_blocks_access() {
        let store = MockSecretStore::new();
        store.insert("key", "a", Tags::new()).await;
        store
            .delete_secret("key", DeletionMode::Recoverable { window_days: 7 })
            .await
            .unwrap();

        assert!(store.is_recoverable("key").await);
        assert!(store.get_secret_value("key").await.unwrap_err().is_transient());
        assert!(store.list_secrets(&[], None).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_parameter_overwrite_with_tags_rejected() {
        let store = MockParameterStore::new();
        let mut tags = Tags::new();
        tags.insert("app".into(), "shop".into());

        let result = store
            .put_parameter(&PutParameterRequest {
                name: "p".into(),
                value: "v".into(),
                kind: ParameterType::String,
                overwrite: true,
                tags,
            })
            .await;
        assert!(result.unwrap_err().to_string().contains("ValidationException"));
    }

    #[tokio::test]
    async fn test_parameter_secure_string_needs_decryption() {
        let store = MockParameterStore::new();
        store.insert("p", "plain", ParameterType::SecureString, Tags::new()).await;

        let raw = store.get_parameter("p", false).await.unwrap();
        assert_eq!(raw.as_deref(), Some("<encrypted>"));
        let decrypted = store.get_parameter("p", true).await.unwrap();
        assert_eq!(decrypted.as_deref(), Some("plain"));
    }

    #[tokio::test]
    async fn test_paging() {
        let store = MockParameterStore::new().with_page_size(2);
        for i in 0..3 {
            store.insert(format!("/p{}", i), "v", ParameterType::String, Tags::new()).await;
        }

        let first = store.describe_parameters(&[], None).await.unwrap();
        assert_eq!(first.items, vec!["/p0", "/p1"]);
        let second = store
            .describe_parameters(&[], first.next_token.as_deref())
            .await
            .unwrap();
        assert_eq!(second.items, vec!["/p2"]);
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn test_error_injection() {
        let store = MockParameterStore::new();
        store.insert("p", "v", ParameterType::String, Tags::new()).await;
        store.fail_next(1).await;

        assert!(store.get_parameter("p", true).await.is_err());
        assert!(store.get_parameter("p", true).await.is_ok());
        assert_eq!(store.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_targets_one_operation() {
        let store = MockParameterStore::new();
        store.insert("p", "v", ParameterType::String, Tags::new()).await;
        store.fail_on(MockOp::AddTagsToResource, "AccessDeniedException").await;

        assert!(store.get_parameter("p", true).await.is_ok());
        for _ in 0..2 {
            let err = store.add_tags_to_resource("p", &Tags::new()).await.unwrap_err();
            assert!(err.to_string().contains("AccessDeniedException"));
        }

        store.clear_failures().await;
        assert!(store.add_tags_to_resource("p", &Tags::new()).await.is_ok());
    }
}
