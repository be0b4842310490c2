//! Process exit codes.

/// Full success.
pub const SUCCESS: i32 = 0;
/// A stage failed terminally.
pub const BUILD_FAILED: i32 = 1;
/// The configuration could not be loaded or is invalid.
pub const INVALID_CONFIG: i32 = 2;
/// The run was cancelled by the operator.
pub const CANCELLED: i32 = 130;
/// The async runtime could not be created.
pub const RUNTIME_ERROR: i32 = 70;
