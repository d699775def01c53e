use anyhow::{Context, Result};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use shoplink::api::{
    create_accounts_router, create_auth_router, create_link_router, AccountsAppState,
    AuthAppState, LinkAppState,
};
use shoplink::config::{load_config, ShoplinkConfig};
use shoplink::external::ShopClient;
use shoplink::linked::LinkedAccountStore;
use shoplink::token::TokenSigner;
use shoplink::users::UserStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shoplink=info".into()),
        )
        .init();

    info!("Shoplink starting...");

    // Optional config file; defaults cover local use
    let config = match std::env::var("SHOPLINK_CONFIG") {
        Ok(path) => load_config(&path)
            .map_err(|e| anyhow::anyhow!("Failed to load config from {}: {}", path, e))?,
        Err(_) => ShoplinkConfig::default(),
    };

    // Secrets come from env, never from the config file
    let token_secret = std::env::var("SHOPLINK_TOKEN_SECRET")
        .context("SHOPLINK_TOKEN_SECRET environment variable not set")?;
    let encryption_key = std::env::var("SHOPLINK_ENCRYPTION_KEY")
        .context("SHOPLINK_ENCRYPTION_KEY environment variable not set")?;

    // Explicitly constructed storage handles, passed into router state
    let users = Arc::new(
        UserStore::new(&config.storage.db_path).context("Failed to open user store")?,
    );
    let linked = Arc::new(
        LinkedAccountStore::new(&config.storage.db_path, &encryption_key)
            .context("Failed to open linked-account store")?,
    );
    let signer = Arc::new(TokenSigner::new(
        &token_secret,
        config.auth.token_ttl_minutes,
    ));
    let shop = Arc::new(ShopClient::with_base_urls(
        config.external.auth_base_url.clone(),
        config.external.profile_url.clone(),
        config.external.ip_echo_url.clone(),
    ));

    let app = create_auth_router(AuthAppState {
        users: users.clone(),
        signer: signer.clone(),
    })
    .merge(create_accounts_router(AccountsAppState {
        users: users.clone(),
        signer: signer.clone(),
        linked: linked.clone(),
    }))
    .merge(create_link_router(LinkAppState {
        users,
        signer,
        linked,
        shop,
    }))
    .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    info!(bind = %config.server.bind, "Listening");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
