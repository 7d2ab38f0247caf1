//! Stable exit codes for zup CLI commands.

/// Command succeeded; for `zup run`, every step succeeded.
pub const OK: i32 = 0;
/// Invalid step file, config, or other errors before steps ran.
pub const INVALID: i32 = 1;
/// `zup run` finished with at least one step that ultimately failed.
pub const STEPS_FAILED: i32 = 2;
