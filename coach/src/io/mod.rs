//! I/O adapters for coach sessions.

pub mod clipboard;
pub mod clock;
pub mod config;
pub mod history_store;
pub mod init;
pub mod service;
pub mod storage;
pub mod watch;
