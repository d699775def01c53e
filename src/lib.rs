// Bearer token extraction
pub mod auth;

// Signed access tokens
pub mod token;

// User accounts and session audit
pub mod users;

// Linked external accounts
pub mod linked;

// External platform client
pub mod external;

// HTTP API routers
pub mod api;

// TOML configuration
pub mod config;
