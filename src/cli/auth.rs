//! Handlers for `login`, `status` and `logout`.

use std::sync::Arc;

use crate::auth::{
    AuthError, DeviceAuthorizationFlow, DeviceAuthorizationObserver, DeviceCodeSession,
    FileTokenStore, FlowOptions, TokenStore,
};
use crate::config::ClientConfig;
use crate::oauth2::OAuth2Client;

use super::LoginArgs;

/// Prints the verification prompt when a session opens.
struct TerminalPrompt;

impl DeviceAuthorizationObserver for TerminalPrompt {
    fn context_received(&self, context: &DeviceCodeSession) {
        println!("🔗 Visit: {}", context.verification_uri);
        println!("📋 Enter code: {}", context.user_code);
        println!("   Or open: {}", context.verification_uri_complete);
        println!("⏳ Waiting for authorization...");
    }
}

/// Handle `device-grant login`.
pub async fn handle_login(
    config: &ClientConfig,
    profile: &str,
    args: &LoginArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(FileTokenStore::default());
    let options = FlowOptions::builder()
        .client_id(config.client_id.clone())
        .scopes(args.scopes.clone().unwrap_or_else(|| config.scopes.clone()))
        .slow_down_increment(config.slow_down_increment)
        .enforce_expiry(args.enforce_expiry || config.enforce_expiry)
        .token_store(store)
        .profile(profile)
        .build();
    let flow = DeviceAuthorizationFlow::new(OAuth2Client::from_config(config)?, options);
    flow.add_observer(Arc::new(TerminalPrompt));

    let interrupt = flow.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let session = flow.resume().await?;
    match flow.resume_with(session).await {
        Ok(token) => {
            println!("✅ Login successful!");
            if let Some(scope) = &token.scope {
                println!("   Scopes: {scope}");
            }
            Ok(())
        }
        Err(AuthError::Cancelled) => {
            eprintln!("❌ Login cancelled");
            std::process::exit(1);
        }
        Err(err) if err.is_access_denied() => {
            eprintln!("❌ Authorization denied");
            std::process::exit(1);
        }
        Err(err) if err.is_expired() => {
            eprintln!("❌ Device code expired, please try again");
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}

/// Handle `device-grant status`.
pub async fn handle_status(
    config: &ClientConfig,
    profile: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileTokenStore::default();

    println!("🔐 Authentication Status\n");
    println!("  Issuer: {}", config.issuer);
    println!("  Client: {} ({profile})", config.client_id);

    let status = match store.load(&config.client_id, profile) {
        Ok(Some(token)) => match token.expires_at() {
            Some(expires) if token.is_expired() => format!(
                "⚠️  Token expired at {}",
                expires.format("%Y-%m-%d %H:%M")
            ),
            Some(expires) => format!("✅ Logged in (expires {})", expires.format("%Y-%m-%d %H:%M")),
            None => "✅ Logged in".to_string(),
        },
        Ok(None) => "❌ Not logged in".to_string(),
        Err(e) => format!("⚠️  Error: {e}"),
    };
    println!("  Token: {status}");

    let others: Vec<String> = store
        .profiles(&config.client_id)?
        .into_iter()
        .filter(|name| name != profile)
        .collect();
    if !others.is_empty() {
        println!("  Other profiles: {}", others.join(", "));
    }
    Ok(())
}

/// Handle `device-grant logout`.
pub async fn handle_logout(
    config: &ClientConfig,
    profile: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileTokenStore::default();
    if store.load(&config.client_id, profile)?.is_none() {
        return Err(AuthError::NotLoggedIn.into());
    }
    store.clear(&config.client_id, profile)?;
    println!("✅ Logged out of {} ({profile})", config.client_id);
    Ok(())
}
