//! Client-side session logic for the feedback improvement service.
//!
//! A user submits free-text feedback plus formatting preferences, the remote
//! service rewrites it, and the result can be edited, copied, and recalled
//! from a context-scoped history. The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (request options, the request
//!   session state machine, artifacts, the editable working copy). No I/O.
//! - **[`io`]**: Side-effecting adapters (configuration, key-value storage,
//!   the history store and its change channel, the HTTP service client,
//!   clipboard, storage watching).
//!
//! [`controller`] composes both into the per-view [`SessionController`].

pub mod controller;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use controller::{Completion, ControllerError, SessionController, Submission, ViewSnapshot};
