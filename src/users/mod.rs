//! Application user accounts and login sessions.
//!
//! This module provides SQLite-backed storage for registered users
//! (salted, stretched password hashes) and the session audit trail
//! written whenever a token is issued.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       UserStore                          │
//! │  - register / verify_login / find        │
//! │  - session audit records                 │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       SQLite Database                    │
//! │  - users (unique username, salted hash)  │
//! │  - sessions (append-only audit)          │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Security
//!
//! - Passwords are stored as iterated SHA-256 (100k rounds) with a
//!   per-user random salt
//! - Hash comparison is constant-time
//! - Unknown-user logins run a dummy hash so the two failure paths
//!   take comparable time

mod store;

pub use store::{User, UserStore, UserStoreError};
