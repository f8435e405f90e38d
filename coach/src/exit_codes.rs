//! Stable exit codes for coach CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid input, configuration, or any other local error.
pub const INVALID: i32 = 1;
/// The improvement service reported a failure or could not be reached.
pub const SERVICE_FAILED: i32 = 2;
/// The requested history entry does not exist.
pub const NOT_FOUND: i32 = 3;
