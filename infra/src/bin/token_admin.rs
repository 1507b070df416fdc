//! Operator tool for refresh tokens
//!
//! ```text
//! token_admin refresh <user-id>...   rotate the tokens of the given users
//! token_admin inspect <token>        print header and claims without verifying
//! token_admin verify <token>         verify a token with the configured key
//! ```
//!
//! Configuration comes from the file named by `TOKENFLOW_CONFIG`, or from
//! `TOKENFLOW_*` environment variables when that is unset.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::json;

use tf_core::domain::UserRef;
use tf_core::services::token::{ClaimsCodec, KeySource, LifecycleConfig, TokenLifecycleManager};
use tf_infra::database::{DatabasePool, MySqlTokenStore};
use tf_shared::config::TokenFlowConfig;

const USAGE: &str = "usage: token_admin <refresh <user-id>... | inspect <token> | verify <token>>";

fn load_config() -> Result<TokenFlowConfig> {
    match std::env::var("TOKENFLOW_CONFIG") {
        Ok(path) => TokenFlowConfig::load(&path)
            .with_context(|| format!("failed to load configuration from {}", path)),
        Err(_) => TokenFlowConfig::from_env().context("invalid configuration in environment"),
    }
}

async fn refresh(config: &TokenFlowConfig, user_ids: &[String]) -> Result<()> {
    if user_ids.is_empty() {
        bail!("refresh needs at least one user id\n{}", USAGE);
    }

    let pool = DatabasePool::new(config.database.clone())
        .await
        .context("failed to connect to the token database")?;
    let manager = TokenLifecycleManager::from_config(
        MySqlTokenStore::new(pool.get_pool().clone()),
        config,
    );

    let users: Vec<UserRef> = user_ids.iter().map(|id| UserRef::from_id(id.as_str())).collect();
    let report = manager.batch_refresh(&users).await;

    for record in &report.records {
        println!("refreshed {}", record.user_id);
    }
    for failure in &report.failures {
        eprintln!("failed {}: {}", failure.label, failure.error);
    }
    println!("{}", report.summary());
    println!("{}", pool.get_statistics());

    pool.close().await;

    if !report.is_success() {
        bail!("{} of {} refreshes failed", report.failed(), users.len());
    }
    Ok(())
}

fn inspect(token: &str) -> Result<()> {
    let (header, claims) = ClaimsCodec::inspect(token).context("cannot decode token")?;
    let decoded = json!({ "header": header, "claims": claims });
    println!("{}", serde_json::to_string_pretty(&decoded)?);
    Ok(())
}

fn verify(config: &TokenFlowConfig, token: &str) -> Result<()> {
    let key = KeySource::new(config.key.clone())
        .resolve_key()
        .context("cannot resolve signing key")?;
    let lifecycle = LifecycleConfig::from(&config.token);
    let codec = ClaimsCodec::from_config(&lifecycle);

    match codec.verify(token, &key, Utc::now(), lifecycle.allowed_skew_seconds) {
        Ok(claims) => {
            println!(
                "valid: uid={} expires={}",
                claims.uid,
                claims
                    .expires_at()
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string())
            );
            Ok(())
        }
        Err(e) if e.is_validation_outcome() => bail!("invalid: {}", e),
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    tf_shared::logging::init(&config.logging)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.split_first() {
        Some((command, rest)) => match (command.as_str(), rest) {
            ("refresh", user_ids) => refresh(&config, user_ids).await,
            ("inspect", [token]) => inspect(token),
            ("verify", [token]) => verify(&config, token),
            _ => bail!(USAGE),
        },
        None => bail!(USAGE),
    }
}
