//! # silo-common
//!
//! Shared types for the Silo volume plugin.
//!
//! This crate provides the error taxonomy used across all Silo crates.
//! Every request-path failure is a returned [`SiloError`] value; nothing in
//! a request path panics.

#![warn(missing_docs)]

pub mod error;

pub use error::{SiloError, SiloResult};
