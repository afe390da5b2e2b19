//! # gather-gateway
//!
//! REST gateway for shared social events: random secret-friend draws and a
//! pooled supply/contribution ledger whose read aggregates are cached and
//! invalidated over a message transport.
//!
//! Users, groups and authentication are owned elsewhere; this service
//! trusts the caller id the upstream gateway puts in `x-user-id`.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── EventRegistry · ParticipantDirectory
//!     ├── MatchEngine · SupplyLedger (service/)
//!     │        │
//!     │        └── CacheCoordinator (cache/) ──► EventBus ──► InvalidationListener
//!     │
//!     └── Store (persistence/): MemoryStore | PostgreSQL
//! ```

pub mod api;
pub mod app_state;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
