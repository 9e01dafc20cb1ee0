//! Credential rotation example.
//!
//! Rotates an API key stored as a secret, using a handler registered in a
//! static registry, and lists the stage afterwards. Runs against the
//! in-memory stores, so no AWS account is needed.
//!
//! Run with: cargo run --example credential_rotation

use chrono::Utc;
use senvar::backends::mock::MockFactory;
use senvar::rotation::{HandlerRegistry, StaticRegistry};
use senvar::{
    define_parameter, define_secret, list_variables, ClientCache, ConnectionOptions, ListRequest,
    SenvarError, Variable, VariableOptions,
};
use std::sync::Arc;

fn generate_api_key() -> String {
    format!("api_key_{}", uuid::Uuid::new_v4().simple())
}

#[tokio::main]
async fn main() -> senvar::Result<()> {
    println!("=== Credential Rotation Example ===\n");

    let clients = Arc::new(
        ClientCache::new(Arc::new(MockFactory::new())).with_defaults(ConnectionOptions::default()),
    );
    let options = VariableOptions::new()
        .with_app("shop")
        .with_stage("prod")
        .with_tag("owner", "payments");

    let api_key = define_secret(&clients, "apiKey", options.clone())?;
    let rotated_at = define_parameter(&clients, "apiKeyRotatedAt", options.clone())?;

    let registry =
        StaticRegistry::new().with_handler("apiKey", |current: Option<String>| async move {
            match current {
                Some(old) => println!("   retiring {}", old),
                None => println!("   no previous key"),
            }
            Ok::<_, SenvarError>(generate_api_key())
        });

    println!("1. First rotation (secret does not exist yet)...");
    let handler = registry
        .load_handler(api_key.descriptor().address())
        .await?
        .ok_or_else(|| SenvarError::NotFound(api_key.full_name()))?;
    let first = api_key
        .rotate(handler.as_ref(), &ConnectionOptions::default())
        .await?;
    rotated_at.set(&Utc::now().to_rfc3339()).await?;
    println!("   ✓ {} = {}", api_key.full_name(), first);

    println!("\n2. Second rotation...");
    let second = api_key
        .rotate(handler.as_ref(), &ConnectionOptions::default())
        .await?;
    rotated_at.set(&Utc::now().to_rfc3339()).await?;
    println!("   ✓ {} = {}", api_key.full_name(), second);

    assert_ne!(first, second);
    assert_eq!(api_key.get().await?, second);

    println!("\n3. Listing shop/prod...");
    let listing = list_variables(&clients, &options, &ListRequest::new()).await?;
    for variable in listing.parameters.iter().chain(&listing.secrets) {
        println!("   - [{}] {}: {}", variable.kind, variable.full_name, variable.value);
    }

    println!("\n4. Retiring the key (recoverable for 7 days)...");
    api_key.delete(false).await?;
    rotated_at.delete(false).await?;
    println!("   ✓ Done");

    Ok(())
}
