//! OpenWebIf HTTP API
//!
//! - client: `DeviceClient`, its options and error type
//! - responses: payload schemas for each endpoint

pub mod client;
mod responses;

pub use client::{ClientOptions, DeviceClient, OpenWebIfError, Result, DEFAULT_PORT};
