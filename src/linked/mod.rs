//! Linked external-platform accounts.
//!
//! Each record associates an external e-commerce profile (and the
//! session cookies captured during QR login) with the application user
//! who linked it. Cookies are platform session credentials, so they
//! are encrypted at rest with AES-256-GCM and never serialized into
//! API responses — the public [`LinkedAccountSummary`] type simply has
//! no cookie, ip, or owner fields.
//!
//! # Security
//!
//! - Cookie bags encrypted at rest with AES-256-GCM, unique nonce per
//!   write
//! - Master key must be 32 bytes (256 bits), base64, from env
//! - Authenticated encryption (tampering detected)
//! - SQLite UNIQUE constraint on the external userid makes the
//!   link-completion upsert atomic

mod encryption;
mod store;

pub use store::{LinkOutcome, LinkedAccount, LinkedAccountStore, LinkedAccountSummary};
