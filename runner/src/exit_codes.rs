//! Stable exit codes for runner CLI commands.

/// Command succeeded, or there was nothing to resolve.
pub const OK: i32 = 0;
/// Invalid config, tracker document or working tree, or any other error.
pub const INVALID: i32 = 1;
/// The agent failed or its output was rejected.
pub const FAILED: i32 = 2;
/// The agent reported `blocked` or `failed`; the outcome was committed.
pub const STOPPED: i32 = 3;
