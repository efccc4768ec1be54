// SPDX-License-Identifier: MIT OR Apache-2.0

//! udash - user directory dashboard core
//!
//! Cached record store, search index and engine, debounced query handling and
//! pagination. Presentation layers drive everything through [`dashboard`].

pub mod api;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod debounce;
pub mod errors;
pub mod index;
pub mod output;
pub mod pagination;
pub mod persist;
pub mod record;
pub mod search;
pub mod store;

pub use errors::{FetchError, PersistError};
pub use record::User;
