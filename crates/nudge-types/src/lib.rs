pub mod api;
pub mod push;
