//! Stable exit codes for harness binaries.

/// Every selected scenario passed.
pub const OK: i32 = 0;
/// Invalid config or suite, or a failure that ended the run early.
pub const INVALID: i32 = 1;
/// At least one scenario failed.
pub const FAILED: i32 = 2;
