//! Process exit codes. Part of the CLI contract.

pub const SUCCESS: i32 = 0;
pub const DENIED: i32 = 1; // Denied, not found or invalid argument
pub const INTERNAL_ERROR: i32 = 2; // Config or storage failure
