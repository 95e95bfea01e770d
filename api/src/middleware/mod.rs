pub mod auth;
pub mod rbac;

pub use auth::auth_middleware;
pub use rbac::rbac_middleware;
