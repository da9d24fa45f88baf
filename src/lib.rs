//! openwebif - client for Enigma2 receivers running OpenWebIf
//!
//! Query standby state, current channel and volume, send remote-control
//! commands, switch channels, manage power (including Wake-on-LAN) and find a
//! picon or screen grab for whatever is playing.
//!
//! # Modules
//!
//! - `api` - HTTP client for the receiver
//! - `picon` - picon naming rules and service-reference helpers
//! - `models` - device state, bouquets, command enums
//! - `config` - config file for the command-line tool
//! - `cli` - command-line definitions

pub mod api;
pub mod cli;
pub mod config;
pub mod models;
pub mod picon;

// Re-export commonly used types
pub use models::{
    Bouquet, DeviceInfo, DeviceState, MessageType, NetworkInterface, PlaybackType, PowerState,
    RemoteControlCode, Service, Source, SourceList,
};

pub use api::{ClientOptions, DeviceClient, OpenWebIfError};
