//! Data structures shared by the device client and the CLI
//!
//! Organized by domain:
//! - **State**: mirrored power/playback state of the receiver
//! - **Bouquets**: bouquet descriptors, sources and services
//! - **Device**: about info and network interfaces
//! - **Commands**: power states, remote-control codes, message severities

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// State Models
// =============================================================================

/// What the receiver is currently playing back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackType {
    /// A live broadcast service
    Live,
    /// A recording played back from disk
    Recording,
}

impl fmt::Display for PlaybackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackType::Live => write!(f, "live"),
            PlaybackType::Recording => write!(f, "recording"),
        }
    }
}

/// Local mirror of the receiver's state, updated by `DeviceClient::refresh_state`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub in_standby: bool,
    pub is_offline: bool,
    /// Normalized to 0.0 - 1.0
    pub volume: Option<f32>,
    pub muted: bool,
    pub current_service_ref: Option<String>,
    pub current_channel_name: Option<String>,
    pub current_programme_name: Option<String>,
    pub picon_url: Option<String>,
    pub playback_type: Option<PlaybackType>,
    /// A timer recording is running on the receiver
    pub is_recording: bool,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            in_standby: true,
            is_offline: false,
            volume: None,
            muted: false,
            current_service_ref: None,
            current_channel_name: None,
            current_programme_name: None,
            picon_url: None,
            playback_type: None,
            is_recording: false,
        }
    }
}

impl DeviceState {
    /// Reset everything describing playback, keeping the power and
    /// connectivity flags untouched.
    pub fn clear_playback(&mut self) {
        self.volume = None;
        self.muted = false;
        self.current_service_ref = None;
        self.current_channel_name = None;
        self.current_programme_name = None;
        self.picon_url = None;
        self.playback_type = None;
        self.is_recording = false;
    }

    /// Device is on, reachable and tuned to something
    pub fn is_playing(&self) -> bool {
        !self.in_standby && !self.is_offline && self.current_service_ref.is_some()
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_offline {
            return write!(f, "offline");
        }
        if self.in_standby {
            return write!(f, "standby");
        }

        let channel = self.current_channel_name.as_deref().unwrap_or("-");
        let programme = self.current_programme_name.as_deref().unwrap_or("");
        let volume = self
            .volume
            .map(|v| format!("{:.0}%", v * 100.0))
            .unwrap_or_else(|| "?".to_string());
        let muted = if self.muted { " (muted)" } else { "" };

        if programme.is_empty() {
            write!(f, "{} - vol {}{}", channel, volume, muted)
        } else {
            write!(f, "{}: {} - vol {}{}", channel, programme, volume, muted)
        }
    }
}

// =============================================================================
// Bouquet Models
// =============================================================================

/// A user-configured channel list on the receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bouquet {
    pub service_ref: String,
    pub name: String,
}

impl fmt::Display for Bouquet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A channel inside a bouquet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub service_ref: String,
}

/// Channel name to service reference table, in bouquet order.
///
/// Names are unique: a repeated name keeps its first position but takes
/// the later service reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceList {
    sources: Vec<Source>,
}

impl SourceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the reference for `name`
    pub fn insert(&mut self, name: impl Into<String>, service_ref: impl Into<String>) {
        let name = name.into();
        let service_ref = service_ref.into();

        match self.sources.iter_mut().find(|s| s.name == name) {
            Some(existing) => existing.service_ref = service_ref,
            None => self.sources.push(Source { name, service_ref }),
        }
    }

    /// Look up a service reference by channel name.
    ///
    /// Exact matches win over case-insensitive ones.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.sources
            .iter()
            .find(|s| s.name == name)
            .or_else(|| {
                self.sources
                    .iter()
                    .find(|s| s.name.eq_ignore_ascii_case(name))
            })
            .map(|s| s.service_ref.as_str())
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Source> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl FromIterator<Source> for SourceList {
    fn from_iter<I: IntoIterator<Item = Source>>(iter: I) -> Self {
        let mut list = SourceList::new();
        for source in iter {
            list.insert(source.name, source.service_ref);
        }
        list
    }
}

impl<'a> IntoIterator for &'a SourceList {
    type Item = &'a Source;
    type IntoIter = std::slice::Iter<'a, Source>;

    fn into_iter(self) -> Self::IntoIter {
        self.sources.iter()
    }
}

/// An entry of the receiver's full service listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub service_ref: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subservices: Vec<Service>,
}

// =============================================================================
// Device Models
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub mac: Option<String>,
    pub ip: Option<String>,
}

/// Parsed `/api/about` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub webif_version: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub image_version: Option<String>,
    pub network_interfaces: Vec<NetworkInterface>,
}

impl DeviceInfo {
    /// MAC of the first wired interface. Wake-on-LAN doesn't work over wireless.
    pub fn wired_mac(&self) -> Option<&str> {
        self.network_interfaces
            .iter()
            .filter(|iface| iface.name.starts_with("eth"))
            .find_map(|iface| iface.mac.as_deref().filter(|mac| !mac.is_empty()))
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let brand = self.brand.as_deref().unwrap_or("");
        let model = self.model.as_deref().unwrap_or("unknown model");
        write!(f, "{} {} - OpenWebIf {}", brand, model, self.webif_version)?;
        if let Some(image) = &self.image_version {
            write!(f, " ({})", image)?;
        }
        Ok(())
    }
}

// =============================================================================
// Command Models
// =============================================================================

/// Values accepted by `/api/powerstate?newstate=`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    ToggleStandby,
    DeepStandby,
    Reboot,
    RestartEnigma,
    Wakeup,
    Standby,
}

impl PowerState {
    pub fn code(self) -> u8 {
        match self {
            PowerState::ToggleStandby => 0,
            PowerState::DeepStandby => 1,
            PowerState::Reboot => 2,
            PowerState::RestartEnigma => 3,
            PowerState::Wakeup => 4,
            PowerState::Standby => 5,
        }
    }

    /// Transitions after which the receiver may drop the connection before
    /// answering. A connection failure then confirms the transition.
    pub fn is_power_down(self) -> bool {
        matches!(
            self,
            PowerState::Standby
                | PowerState::DeepStandby
                | PowerState::Reboot
                | PowerState::RestartEnigma
        )
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PowerState::ToggleStandby => "toggle standby",
            PowerState::DeepStandby => "deep standby",
            PowerState::Reboot => "reboot",
            PowerState::RestartEnigma => "restart enigma",
            PowerState::Wakeup => "wake up",
            PowerState::Standby => "standby",
        };
        write!(f, "{}", name)
    }
}

/// Key codes understood by `/api/remotecontrol`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteControlCode {
    ChannelUp,
    ChannelDown,
    PlayPause,
    Stop,
}

impl RemoteControlCode {
    pub fn code(self) -> u16 {
        match self {
            RemoteControlCode::ChannelUp => 402,
            RemoteControlCode::ChannelDown => 403,
            RemoteControlCode::PlayPause => 207,
            RemoteControlCode::Stop => 128,
        }
    }
}

/// Severity of an on-screen message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    YesNo,
    #[default]
    Info,
    Warning,
    Error,
}

impl MessageType {
    pub fn code(self) -> u8 {
        match self {
            MessageType::YesNo => 0,
            MessageType::Info => 1,
            MessageType::Warning => 2,
            MessageType::Error => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_standby() {
        let state = DeviceState::default();
        assert!(state.in_standby);
        assert!(!state.is_offline);
        assert!(!state.is_playing());
        assert_eq!(state.to_string(), "standby");
    }

    #[test]
    fn test_clear_playback_keeps_power_flags() {
        let mut state = DeviceState {
            in_standby: false,
            is_offline: false,
            volume: Some(0.5),
            muted: true,
            current_service_ref: Some("1:0:19:2887:40F:1:C00000:0:0:0:".into()),
            current_channel_name: Some("BBC One".into()),
            current_programme_name: Some("News".into()),
            picon_url: Some("http://box/picon/bbcone.png".into()),
            playback_type: Some(PlaybackType::Live),
            is_recording: true,
        };

        state.clear_playback();

        assert!(!state.in_standby);
        assert_eq!(state.volume, None);
        assert!(!state.muted);
        assert_eq!(state.current_channel_name, None);
        assert_eq!(state.playback_type, None);
        assert!(!state.is_recording);
    }

    #[test]
    fn test_state_display() {
        let state = DeviceState {
            in_standby: false,
            volume: Some(0.25),
            current_service_ref: Some("1:0:1".into()),
            current_channel_name: Some("RTE One".into()),
            current_programme_name: Some("The News".into()),
            ..DeviceState::default()
        };
        assert_eq!(state.to_string(), "RTE One: The News - vol 25%");
    }

    #[test]
    fn test_source_list_lookup() {
        let sources: SourceList = vec![
            Source {
                name: "BBC One".into(),
                service_ref: "1:0:1:1".into(),
            },
            Source {
                name: "bbc one".into(),
                service_ref: "1:0:1:2".into(),
            },
        ]
        .into_iter()
        .collect();

        assert_eq!(sources.get("BBC One"), Some("1:0:1:1"));
        assert_eq!(sources.get("bbc one"), Some("1:0:1:2"));
        assert_eq!(sources.get("BBC ONE"), Some("1:0:1:1"));
        assert_eq!(sources.get("ITV"), None);
    }

    #[test]
    fn test_source_list_duplicate_name_takes_last_ref() {
        let mut sources = SourceList::new();
        sources.insert("One", "1:a");
        sources.insert("Two", "1:b");
        sources.insert("One", "1:c");

        assert_eq!(sources.len(), 2);
        assert_eq!(sources.names(), vec!["One", "Two"]);
        assert_eq!(sources.get("One"), Some("1:c"));
    }

    #[test]
    fn test_wired_mac_skips_wireless() {
        let info = DeviceInfo {
            webif_version: "OWIF 1.3.6".into(),
            brand: None,
            model: None,
            image_version: None,
            network_interfaces: vec![
                NetworkInterface {
                    name: "wlan0".into(),
                    mac: Some("00:11:22:33:44:55".into()),
                    ip: None,
                },
                NetworkInterface {
                    name: "eth0".into(),
                    mac: Some("00:1d:ec:01:02:03".into()),
                    ip: Some("192.168.1.10".into()),
                },
            ],
        };
        assert_eq!(info.wired_mac(), Some("00:1d:ec:01:02:03"));
    }

    #[test]
    fn test_power_down_states() {
        assert!(PowerState::DeepStandby.is_power_down());
        assert!(PowerState::Standby.is_power_down());
        assert!(!PowerState::Wakeup.is_power_down());
        assert!(!PowerState::ToggleStandby.is_power_down());
        assert_eq!(PowerState::Wakeup.code(), 4);
        assert_eq!(PowerState::DeepStandby.code(), 1);
    }

    #[test]
    fn test_remote_codes() {
        assert_eq!(RemoteControlCode::ChannelUp.code(), 402);
        assert_eq!(RemoteControlCode::ChannelDown.code(), 403);
        assert_eq!(RemoteControlCode::PlayPause.code(), 207);
        assert_eq!(RemoteControlCode::Stop.code(), 128);
    }
}
