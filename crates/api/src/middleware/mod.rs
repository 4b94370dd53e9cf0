pub mod auth;
pub mod ip_guard;
