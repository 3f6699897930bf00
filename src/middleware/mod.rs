pub mod access;
pub mod guard;
pub mod response;

pub use access::{AccessChecker, Action, HttpAccessChecker, PermissionSet};
pub use guard::{evaluate, route_guard, GuardDecision, GuardState};
pub use response::{ApiResponse, ApiResult};
