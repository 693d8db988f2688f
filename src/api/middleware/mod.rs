//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Rate limiter: reject early, save resources
//! 2. Auth validator: bearer credential → `CallerContext`
//! 3. Audit logger: logs after auth, knows the caller

pub mod audit;
pub mod auth;
pub mod rate;
