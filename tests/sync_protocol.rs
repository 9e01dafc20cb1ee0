//! End-to-end synchronization behaviour against the in-memory stores.
//!
//! Every test asserts on the requests the mock stores received, so the
//! ordering of multi-step writes is checked as well as the end state.

#![cfg(feature = "mock")]

use senvar::adapters::PLACEHOLDER_VALUE;
use senvar::backend::{DeletionMode, ParameterType, Tags};
use senvar::backends::mock::{MockCall, MockFactory, MockOp, MockSecretStore};
use senvar::{
    list_variables, Address, ClientCache, ConnectionOptions, ListRequest, Parameter, RetryPolicy,
    Secret, SenvarError, Variable, VariableKind, VariableOptions,
};
use std::sync::Arc;
use std::time::Duration;

fn fast_retry() -> RetryPolicy {
    RetryPolicy::default()
        .with_base_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(4))
}

fn setup() -> (Arc<MockFactory>, Arc<ClientCache>) {
    let factory = Arc::new(MockFactory::new());
    let clients = ClientCache::new(factory.clone())
        .with_defaults(ConnectionOptions::default())
        .with_retry_policy(fast_retry());
    (factory, Arc::new(clients))
}

fn shop_prod() -> VariableOptions {
    VariableOptions::new()
        .with_app("shop")
        .with_stage("prod")
        .with_tag("owner", "payments")
}

fn expected_tags() -> Tags {
    [("app", "shop"), ("stage", "prod"), ("owner", "payments")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_names_round_trip() {
    for (app, stage, name) in [("shop", "prod", "dbPassword"), ("x", "y", "z-1")] {
        let address = Address::new(app, stage, name).unwrap();
        let parsed = Address::parse(&address.full_name()).unwrap();
        assert_eq!(
            (parsed.app.as_str(), parsed.stage.as_str(), parsed.name.as_str()),
            (app, stage, name)
        );
    }

    let legacy = Address::parse("app-stage-a-b-c").unwrap();
    assert_eq!(legacy, Address::new("app", "stage", "a-b-c").unwrap());
}

#[tokio::test]
async fn test_secret_set_on_new_variable() {
    let (factory, clients) = setup();
    let secret = Secret::new("dbPassword", shop_prod(), clients).unwrap();
    assert_eq!(secret.full_name(), "/senvar/shop/prod/dbPassword");

    secret.set("p@ss1").await.unwrap();
    assert_eq!(secret.get().await.unwrap(), "p@ss1");

    let name = "/senvar/shop/prod/dbPassword".to_string();
    assert_eq!(
        factory.secrets().calls().await,
        vec![
            MockCall::CreateSecret {
                name: name.clone(),
                tags: expected_tags(),
            },
            MockCall::PutSecretValue { name: name.clone() },
            MockCall::GetSecretValue { name },
        ]
    );
}

#[tokio::test]
async fn test_ensure_twice_keeps_value() {
    let (_factory, clients) = setup();
    let secret = Secret::new("apiKey", shop_prod(), clients.clone()).unwrap();
    let parameter = Parameter::new("apiUrl", shop_prod(), clients).unwrap();

    for variable in [&secret as &dyn Variable, &parameter as &dyn Variable] {
        variable.ensure().await.unwrap();
        assert_eq!(variable.get().await.unwrap(), PLACEHOLDER_VALUE);

        variable.set("real").await.unwrap();
        variable.ensure().await.unwrap();
        assert_eq!(variable.get().await.unwrap(), "real", "{}", variable.full_name());
    }
}

#[tokio::test]
async fn test_parameter_update_reconciles_tags_after_value() {
    let (factory, clients) = setup();
    let store = factory.parameters();
    let name = "/senvar/shop/prod/apiUrl";

    // Created out of band without tags.
    store
        .insert(name, "old", ParameterType::SecureString, Tags::new())
        .await;

    let parameter = Parameter::new("apiUrl", shop_prod(), clients).unwrap();
    parameter.set("new").await.unwrap();

    let calls = store.calls().await;
    let value_write = calls
        .iter()
        .position(|c| matches!(c, MockCall::PutParameter { overwrite: true, tagged: false, .. }))
        .unwrap();
    let tag_write = calls
        .iter()
        .position(|c| matches!(c, MockCall::AddTagsToResource { .. }))
        .unwrap();
    assert!(value_write < tag_write);

    assert_eq!(store.tags_of(name).await.unwrap(), expected_tags());
    assert_eq!(parameter.get().await.unwrap(), "new");
}

#[tokio::test]
async fn test_parameter_tag_failure_leaves_value_updated() {
    let (factory, clients) = setup();
    let store = factory.parameters();
    let name = "/senvar/shop/prod/apiUrl";

    store
        .insert(name, "old", ParameterType::SecureString, Tags::new())
        .await;
    store
        .fail_on(MockOp::AddTagsToResource, "AccessDeniedException: not authorized")
        .await;

    let parameter = Parameter::new("apiUrl", shop_prod(), clients).unwrap();
    let err = parameter.set("new").await.unwrap_err();
    assert!(err.to_string().contains("AccessDeniedException"), "{}", err);

    // The value write is not undone and the tags stay as they were.
    assert_eq!(store.value_of(name).await.as_deref(), Some("new"));
    assert_eq!(store.tags_of(name).await, Some(Tags::new()));

    // Once tagging works again, the next set converges.
    store.clear_failures().await;
    parameter.set("new").await.unwrap();
    assert_eq!(store.tags_of(name).await.unwrap(), expected_tags());
}

#[tokio::test]
async fn test_rotate_without_prior_value() {
    let (factory, clients) = setup();
    let secret = Secret::new("token", shop_prod(), clients).unwrap();

    let handler = |current: Option<String>| async move {
        match current {
            None => Ok("first".to_string()),
            Some(_) => Err(SenvarError::Configuration("expected no value".to_string())),
        }
    };
    let next = secret
        .rotate(&handler, &ConnectionOptions::default())
        .await
        .unwrap();

    assert_eq!(next, "first");
    assert_eq!(secret.get().await.unwrap(), "first");
    assert!(matches!(
        factory.secrets().calls().await.first(),
        Some(MockCall::GetSecretValue { .. })
    ));
}

#[tokio::test]
async fn test_soft_and_permanent_delete_differ() {
    let (factory, clients) = setup();
    let soft = Secret::new("soft", shop_prod(), clients.clone()).unwrap();
    let hard = Secret::new("hard", shop_prod(), clients).unwrap();
    soft.set("a").await.unwrap();
    hard.set("b").await.unwrap();

    soft.delete(false).await.unwrap();
    hard.delete(true).await.unwrap();

    let store = factory.secrets();
    assert!(store.is_recoverable("/senvar/shop/prod/soft").await);
    assert!(store.version_of("/senvar/shop/prod/hard").await.is_none());

    let modes: Vec<DeletionMode> = store
        .calls()
        .await
        .into_iter()
        .filter_map(|c| match c {
            MockCall::DeleteSecret { mode, .. } => Some(mode),
            _ => None,
        })
        .collect();
    assert_eq!(
        modes,
        vec![
            DeletionMode::Recoverable { window_days: 7 },
            DeletionMode::Immediate
        ]
    );

    // A soft-deleted secret is no longer readable.
    assert!(soft.get().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_retried_with_growing_delay() {
    let factory = Arc::new(MockFactory::new());
    let clients = Arc::new(
        ClientCache::new(factory.clone())
            .with_defaults(ConnectionOptions::default())
            .with_retry_policy(RetryPolicy::default()),
    );

    let secret = Secret::new("dbPassword", shop_prod(), clients).unwrap();
    factory
        .secrets()
        .insert(secret.full_name(), "v", Tags::new())
        .await;
    factory.secrets().fail_next(2).await;

    let started = tokio::time::Instant::now();
    assert_eq!(secret.get().await.unwrap(), "v");
    let elapsed = started.elapsed();

    let gets = factory
        .secrets()
        .calls()
        .await
        .into_iter()
        .filter(|c| matches!(c, MockCall::GetSecretValue { .. }))
        .count();
    assert_eq!(gets, 3);
    // 200..=400ms then 400..=600ms
    assert!(elapsed >= Duration::from_millis(600), "{:?}", elapsed);
    assert!(elapsed <= Duration::from_millis(1000), "{:?}", elapsed);
}

#[tokio::test]
async fn test_listing_applies_prefix_and_tags() {
    let (factory, clients) = setup();
    let secrets: &MockSecretStore = factory.secrets();
    let tags = |app: &str, stage: &str| -> Tags {
        [("app", app), ("stage", stage)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    };

    // Matches prefix and tags.
    secrets.insert("/senvar/shop/prod/a", "1", tags("shop", "prod")).await;
    // Matches tags only.
    secrets.insert("/other/shop/prod/b", "2", tags("shop", "prod")).await;
    // Matches prefix only.
    secrets.insert("/senvar/shop/prod/c", "3", tags("shop", "dev")).await;

    let request = ListRequest::new().with_kind(VariableKind::Secret);
    let listing = list_variables(&clients, &shop_prod(), &request).await.unwrap();

    let names: Vec<&str> = listing.secrets.iter().map(|v| v.full_name.as_str()).collect();
    assert_eq!(names, vec!["/senvar/shop/prod/a"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_variables_share_one_client() {
    let (factory, clients) = setup();

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let clients = clients.clone();
            tokio::spawn(async move {
                let secret = Secret::new(&format!("s{}", i), shop_prod(), clients).unwrap();
                secret.set("v").await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(factory.secret_stores_built(), 1);
    assert_eq!(clients.len().await, 1);
}
