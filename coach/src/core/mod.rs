//! Deterministic, pure logic for feedback sessions.
//!
//! Core modules are free of I/O side effects. Anything that needs a clock,
//! randomness, storage, or the network receives its inputs from callers.

pub mod artifact;
pub mod editable;
pub mod error;
pub mod request;
pub mod session;
pub mod wire;
