//! HTTP endpoints for the plugin and administrative protocols.

pub mod admin;
pub mod server;
