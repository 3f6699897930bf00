pub mod access;
pub mod auth;
pub mod browse;
pub mod list;
pub mod upload;
