//! Core domain types and utilities for linkgate.
//!
//! This crate provides the foundational types shared by the link-token and
//! session crates: identity ids, the service catalog, the clock abstraction
//! and the `Result` alias.

pub mod clock;
pub mod error;
pub mod id;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::Result;
pub use id::{IdentityId, ParseIdError};
pub use service::{ServiceName, UnknownServiceError};
