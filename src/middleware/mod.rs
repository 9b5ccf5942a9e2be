pub mod auth_gate;
pub mod principal;
pub mod rbac;
