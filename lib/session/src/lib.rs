//! Store-backed, service-scoped sessions for linkgate.
//!
//! This crate provides:
//! - The `Session` record and its opaque `SessionToken`
//! - `SessionManager` for create, verify, grant, revoke, sweep and listing
//! - `ServiceAuthorizer` for per-service scope checks
//! - Store traits (`SessionStore`, `IdentityStore`, `AuthLogSink`) and an
//!   in-memory implementation of all three
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use linkgate_core::{IdentityId, ServiceName};
//! use linkgate_session::{
//!     InMemoryStore, ProfileSnapshot, ServiceAuthorizer, SessionManager, SessionMetadata,
//!     SessionPolicy,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let manager = SessionManager::new(Arc::new(InMemoryStore::new()), SessionPolicy::default());
//!
//! let session = manager
//!     .create(
//!         &IdentityId::new("U123"),
//!         ServiceName::MyPage,
//!         ProfileSnapshot::default(),
//!         SessionMetadata::default(),
//!     )
//!     .await
//!     .unwrap();
//! assert!(!ServiceAuthorizer::is_authorized(&session, ServiceName::MyMile));
//!
//! manager.grant_service(session.token(), "mymile").await.unwrap();
//! let session = manager.verify(session.token()).await.unwrap().unwrap();
//! assert!(ServiceAuthorizer::is_authorized(&session, ServiceName::MyMile));
//! # }
//! ```

pub mod authorizer;
pub mod error;
pub mod identity;
pub mod manager;
pub mod memory;
pub mod session;
pub mod store;
pub mod sweep;
pub mod token;

pub use authorizer::ServiceAuthorizer;
pub use error::{AuthorizationError, SessionError, StoreError};
pub use identity::{AuthLogEntry, AuthMethod, IdentityRecord, ProfileRefresh, ServiceLogin};
pub use manager::{
    DEFAULT_SESSION_TTL_HOURS, MAX_SESSION_TTL_HOURS, SessionManager, SessionPolicy,
};
pub use memory::InMemoryStore;
pub use session::{
    DEFAULT_DISPLAY_NAME, DEFAULT_LANGUAGE, ProfileSnapshot, Session, SessionMetadata, SessionState,
};
pub use store::{AuthLogSink, IdentityStore, SessionStore};
pub use sweep::spawn_sweeper;
pub use token::{SESSION_TOKEN_BYTES, SessionToken};
