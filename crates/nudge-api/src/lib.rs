pub mod auth;
pub mod devices;
pub mod error;
pub mod middleware;
