//! OpenWebIf device client
//!
//! Wraps the HTTP API of an Enigma2 receiver running the OpenWebIf plugin:
//! status polling, remote control, power management, bouquet listing and
//! picon lookup. API docs: https://github.com/E2OpenPlugins/e2openplugin-OpenWebif

use std::collections::HashSet;
use std::time::Duration;

use log::{debug, error, info, warn};
use rand::Rng;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use wol::send_wol;

use super::responses::{
    AboutResponse, AllServicesResponse, BouquetsResponse, CommandResponse, EpgNowResponse,
    StatusInfoResponse, VolumeXml,
};
use crate::models::{
    Bouquet, DeviceInfo, DeviceState, MessageType, PlaybackType, PowerState, RemoteControlCode,
    Service, SourceList,
};
use crate::picon;

// =============================================================================
// Endpoints
// =============================================================================

const URL_ABOUT: &str = "/api/about";
const URL_STATUS_INFO: &str = "/api/statusinfo";
const URL_TOGGLE_VOLUME_MUTE: &str = "/web/vol?set=mute";
const URL_SET_VOLUME: &str = "/api/vol?set=set";
const URL_POWERSTATE_BASE: &str = "/api/powerstate?newstate=";
const URL_REMOTE_CONTROL: &str = "/api/remotecontrol?command=";
const URL_GET_ALL_BOUQUETS: &str = "/api/bouquets";
const URL_EPG_NOW: &str = "/api/epgnow?bRef=";
const URL_GET_ALL_SERVICES: &str = "/api/getallservices";
const URL_ZAP_TO_SOURCE: &str = "/api/zap?sRef=";
const URL_MESSAGE: &str = "/api/message?text=";
const URL_GRAB_720: &str = "/grab?format=jpg&r=720&mode=all&T=";

pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Prefix for the programme name while a recording plays back
const RECORDING_MARKER: &str = "🔴";

// =============================================================================
// Errors
// =============================================================================

/// OpenWebIf client error types
#[derive(Error, Debug)]
pub enum OpenWebIfError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Device unreachable at {url}: {source}")]
    DeviceUnreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected HTTP {status} from {url}")]
    Communication { url: String, status: u16 },

    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("Wake-on-LAN failed: {0}")]
    WakeOnLan(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OpenWebIfError>;

// =============================================================================
// Options
// =============================================================================

/// Connection and behaviour settings for a [`DeviceClient`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// IP or hostname of the receiver
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_https: bool,
    /// Only ever return picons, never fall back to a screen grab
    pub prefer_picon: bool,
    /// Used for Wake-on-LAN; discovered from the receiver when not given
    pub mac_address: Option<String>,
    /// `turn_off` goes to deep standby instead of standby
    pub turn_off_to_deep: bool,
    /// Bouquet reference to load sources from (first bouquet when `None`)
    pub source_bouquet: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientOptions {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_https(mut self, use_https: bool) -> Self {
        self.use_https = use_https;
        self
    }

    pub fn with_prefer_picon(mut self, prefer_picon: bool) -> Self {
        self.prefer_picon = prefer_picon;
        self
    }

    pub fn with_mac_address(mut self, mac_address: impl Into<String>) -> Self {
        self.mac_address = Some(mac_address.into());
        self
    }

    pub fn with_turn_off_to_deep(mut self, turn_off_to_deep: bool) -> Self {
        self.turn_off_to_deep = turn_off_to_deep;
        self
    }

    pub fn with_source_bouquet(mut self, bouquet: impl Into<String>) -> Self {
        self.source_bouquet = Some(bouquet.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            use_https: false,
            prefer_picon: false,
            mac_address: None,
            turn_off_to_deep: false,
            source_bouquet: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Client for one OpenWebIf receiver.
///
/// Holds a mirror of the receiver's state which [`DeviceClient::refresh_state`]
/// updates. Every stateful operation takes `&mut self`; share an instance
/// across tasks only behind a lock.
pub struct DeviceClient {
    base_url: String,
    client: reqwest::Client,
    username: Option<String>,
    password: Option<String>,
    prefer_picon: bool,
    mac_address: Option<String>,
    turn_off_to_deep: bool,
    source_bouquet: Option<String>,
    state: DeviceState,
    sources: SourceList,
    /// URLs confirmed to exist by a HEAD probe; never invalidated
    cached_urls_which_exist: HashSet<String>,
}

impl DeviceClient {
    /// Build a client without touching the network
    pub fn new(options: ClientOptions) -> Result<Self> {
        let host = options.host.trim();
        if host.is_empty() {
            error!("Missing OpenWebIf host");
            return Err(OpenWebIfError::Configuration(
                "a host is required to reach OpenWebIf".into(),
            ));
        }

        if let Some(mac) = &options.mac_address {
            if mac.parse::<wol::MacAddr>().is_err() {
                return Err(OpenWebIfError::Configuration(format!(
                    "invalid MAC address: {}",
                    mac
                )));
            }
        }

        let scheme = if options.use_https { "https" } else { "http" };
        let base_url = format!("{}://{}:{}", scheme, host, options.port);

        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| {
                OpenWebIfError::Configuration(format!("cannot build HTTP client: {}", e))
            })?;

        Ok(Self {
            base_url,
            client,
            username: options.username,
            password: options.password,
            prefer_picon: options.prefer_picon,
            mac_address: options.mac_address,
            turn_off_to_deep: options.turn_off_to_deep,
            source_bouquet: options.source_bouquet.filter(|b| !b.trim().is_empty()),
            state: DeviceState::default(),
            sources: SourceList::new(),
            cached_urls_which_exist: HashSet::new(),
        })
    }

    /// Build a client, probe the receiver and load the source list.
    ///
    /// Fails with [`OpenWebIfError::DeviceUnreachable`] when the receiver
    /// can't be reached.
    pub async fn connect(options: ClientOptions) -> Result<Self> {
        let mut client = Self::new(options)?;

        debug!("Going to probe device to test connection");
        match client.fetch_about().await? {
            Some(info) => {
                debug!("Connected OK, OpenWebIf version {}", info.webif_version);
                client.remember_mac(&info);
            }
            None => warn!("Connected, but could not read device info"),
        }

        client.load_sources().await?;
        Ok(client)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn sources(&self) -> &SourceList {
        &self.sources
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.names()
    }

    pub fn mac_address(&self) -> Option<&str> {
        self.mac_address.as_deref()
    }

    pub fn is_offline(&self) -> bool {
        self.state.is_offline
    }

    pub fn playback_type(&self) -> Option<PlaybackType> {
        self.state.playback_type
    }

    // -------------------------------------------------------------------------
    // State
    // -------------------------------------------------------------------------

    /// Refresh the mirrored state from `/api/statusinfo`.
    ///
    /// An unreachable receiver is not an error: the client goes offline and
    /// the state falls back to standby defaults.
    pub async fn refresh_state(&mut self) -> Result<()> {
        let result = self.get_json::<StatusInfoResponse>(URL_STATUS_INFO).await;

        let status = match self.absorb_unreachable(result)? {
            Some(Some(status)) => status,
            Some(None) => {
                self.state.in_standby = true;
                self.state.clear_playback();
                return Ok(());
            }
            None => return Ok(()),
        };

        if let Some(in_standby) = status.in_standby {
            self.state.in_standby = in_standby;
        }

        if self.state.in_standby {
            self.state.clear_playback();
            return Ok(());
        }

        self.apply_status(status).await;

        if self.mac_address.is_none() {
            if let Err(e) = self.get_about().await {
                debug!("Could not refresh device info: {}", e);
            }
        }

        Ok(())
    }

    async fn apply_status(&mut self, status: StatusInfoResponse) {
        let service_ref = status.currservice_serviceref.filter(|s| !s.is_empty());
        let playback_type = service_ref.as_deref().map(picon::playback_type);
        let programme = status.currservice_name.unwrap_or_default();

        let (channel_name, programme_name) = match (&service_ref, playback_type) {
            (Some(sref), Some(PlaybackType::Recording)) => (
                picon::channel_name_from_service_ref(sref),
                format!("{} {}", RECORDING_MARKER, programme),
            ),
            _ => {
                let programme = if programme == "N/A" {
                    String::new()
                } else {
                    programme
                };
                (status.currservice_station.unwrap_or_default(), programme)
            }
        };

        let picon_url = self
            .resolve_picon_url(&channel_name, service_ref.as_deref().unwrap_or(""))
            .await;

        self.state.current_service_ref = service_ref;
        self.state.playback_type = playback_type;
        self.state.current_channel_name = Some(channel_name);
        self.state.current_programme_name = Some(programme_name);
        self.state.muted = status.muted;
        self.state.volume = status.volume.map(normalize_volume);
        self.state.is_recording = status.is_recording;
        self.state.picon_url = picon_url;
    }

    // -------------------------------------------------------------------------
    // Picons
    // -------------------------------------------------------------------------

    /// Resolve an image URL for a channel.
    ///
    /// With `prefer_picon` this tries the picon by channel name, the non-HD
    /// variant of that name, then the service-reference file name, and gives
    /// up after that. Without it a live screen grab is returned instead.
    pub async fn resolve_picon_url(
        &mut self,
        channel_name: &str,
        service_ref: &str,
    ) -> Option<String> {
        let channel_name = match picon::playback_type(service_ref) {
            PlaybackType::Recording => picon::channel_name_from_service_ref(service_ref),
            PlaybackType::Live => channel_name.to_string(),
        };

        if self.prefer_picon {
            let found = self.find_picon(&channel_name, service_ref).await;
            if found.is_none() {
                debug!("Could not find picon for: {}", channel_name);
            }
            return found;
        }

        debug!(
            "prefer_picon is false, returning screen grab of channel: {}",
            channel_name
        );

        // Random token so nothing between us and the receiver caches the image.
        // Each URL is used once, so it stays out of the existence cache.
        let token: u64 = rand::thread_rng().gen_range(1_000_000_000..=9_999_999_999);
        let url = format!("{}{}{}", self.base_url, URL_GRAB_720, token);
        if self.head_ok(&url).await {
            return Some(url);
        }

        None
    }

    async fn find_picon(&mut self, channel_name: &str, service_ref: &str) -> Option<String> {
        let mut name = channel_name.to_string();

        loop {
            let token = picon::picon_name(&name);
            if !token.is_empty() {
                let url = self.picon_url(&token);
                debug!("Trying picon url (by channel name): {}", url);
                if self.url_exists(&url).await {
                    return Some(url);
                }
            }

            match picon::strip_hd_suffix(&name) {
                Some(shorter) => {
                    debug!("Going to look for non HD picon for: {}", shorter);
                    name = shorter;
                }
                None => break,
            }
        }

        // Older picon sets are named after the service reference
        let token = picon::service_ref_token(service_ref);
        if token.is_empty() {
            return None;
        }

        let url = self.picon_url(&token);
        debug!("Trying picon url (with service ref): {}", url);
        if self.url_exists(&url).await {
            return Some(url);
        }

        None
    }

    fn picon_url(&self, token: &str) -> String {
        format!("{}/picon/{}.png", self.base_url, urlencoding::encode(token))
    }

    /// Check whether a URL answers a HEAD request with 200.
    ///
    /// Positive answers are cached for the lifetime of the client.
    pub async fn url_exists(&mut self, url: &str) -> bool {
        if self.cached_urls_which_exist.contains(url) {
            debug!("Url already tested: {}", url);
            return true;
        }

        if self.head_ok(url).await {
            self.cached_urls_which_exist.insert(url.to_string());
            return true;
        }

        false
    }

    async fn head_ok(&self, url: &str) -> bool {
        match self.request(Method::HEAD, url).send().await {
            Ok(response) if response.status() == StatusCode::OK => true,
            Ok(response) => {
                debug!("Url at {} does not exist ({})", url, response.status());
                false
            }
            Err(e) => {
                debug!("Url at {} could not be probed: {}", url, e);
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // Volume
    // -------------------------------------------------------------------------

    /// Toggle mute. The receiver's new mute flag is copied into the state.
    pub async fn toggle_mute(&mut self) -> Result<bool> {
        let result = self.get_response(URL_TOGGLE_VOLUME_MUTE).await;
        let body = match self.absorb_unreachable(result)? {
            Some((StatusCode::OK, body)) => body,
            Some((status, _)) => {
                debug!("Mute toggle answered {}, not confirmed", status);
                return Ok(false);
            }
            None => return Ok(false),
        };

        match VolumeXml::parse(&body) {
            Ok(volume) => {
                if let Some(muted) = volume.is_muted() {
                    self.state.muted = muted;
                }
                if let Some(current) = volume.current() {
                    self.state.volume = Some(normalize_volume(current));
                }
                Ok(volume.result())
            }
            Err(e) => {
                // The receiver answered 200; the body is informational only
                debug!("Could not parse mute response: {}", e);
                Ok(true)
            }
        }
    }

    /// Set the volume, 0 to 100
    pub async fn set_volume(&mut self, level: i32) -> Result<bool> {
        if !(0..=100).contains(&level) {
            return Err(OpenWebIfError::Validation(format!(
                "volume must be between 0 and 100, got {}",
                level
            )));
        }

        self.send_command(&format!("{}{}", URL_SET_VOLUME, level), false)
            .await
    }

    // -------------------------------------------------------------------------
    // Remote control
    // -------------------------------------------------------------------------

    pub async fn send_remote_control(&mut self, code: RemoteControlCode) -> Result<bool> {
        self.send_command(&format!("{}{}", URL_REMOTE_CONTROL, code.code()), false)
            .await
    }

    pub async fn channel_up(&mut self) -> Result<bool> {
        self.send_remote_control(RemoteControlCode::ChannelUp).await
    }

    pub async fn channel_down(&mut self) -> Result<bool> {
        self.send_remote_control(RemoteControlCode::ChannelDown)
            .await
    }

    pub async fn toggle_play_pause(&mut self) -> Result<bool> {
        self.send_remote_control(RemoteControlCode::PlayPause).await
    }

    pub async fn stop(&mut self) -> Result<bool> {
        self.send_remote_control(RemoteControlCode::Stop).await
    }

    // -------------------------------------------------------------------------
    // Power
    // -------------------------------------------------------------------------

    pub async fn set_power_state(&mut self, power_state: PowerState) -> Result<bool> {
        let path = format!("{}{}", URL_POWERSTATE_BASE, power_state.code());
        debug!("Requesting power state '{}'", power_state);
        self.send_command(&path, power_state.is_power_down()).await
    }

    /// Take the box out of standby, sending Wake-on-LAN first if it's offline
    pub async fn turn_on(&mut self) -> Result<bool> {
        if self.state.is_offline {
            debug!("Box is offline, going to try wake on lan");
            if let Err(e) = self.wake_up() {
                warn!("{}", e);
            }
        }

        self.set_power_state(PowerState::Wakeup).await
    }

    /// Put the box into standby, or deep standby if so configured
    pub async fn turn_off(&mut self) -> Result<bool> {
        if self.turn_off_to_deep {
            return self.deep_standby().await;
        }

        self.set_power_state(PowerState::Standby).await
    }

    pub async fn deep_standby(&mut self) -> Result<bool> {
        self.set_power_state(PowerState::DeepStandby).await
    }

    pub async fn toggle_standby(&mut self) -> Result<bool> {
        self.set_power_state(PowerState::ToggleStandby).await
    }

    pub async fn reboot(&mut self) -> Result<bool> {
        self.set_power_state(PowerState::Reboot).await
    }

    pub async fn restart_enigma(&mut self) -> Result<bool> {
        self.set_power_state(PowerState::RestartEnigma).await
    }

    /// Send a Wake-on-LAN packet to the receiver's MAC address.
    ///
    /// Returns `Ok(false)` when no MAC address is known.
    pub fn wake_up(&self) -> Result<bool> {
        let mac_address = match &self.mac_address {
            Some(mac) => mac,
            None => {
                warn!("Cannot wake up host as mac_address is not known");
                return Ok(false);
            }
        };

        let mac = mac_address.parse::<wol::MacAddr>().map_err(|_| {
            OpenWebIfError::Configuration(format!("invalid MAC address: {}", mac_address))
        })?;

        send_wol(mac, None, None)?;
        debug!("Sent WOL magic packet to {}", mac_address);
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Channels
    // -------------------------------------------------------------------------

    /// Zap to a service reference
    pub async fn select_source(&mut self, service_ref: &str) -> Result<bool> {
        let path = format!("{}{}", URL_ZAP_TO_SOURCE, urlencoding::encode(service_ref));
        self.send_command(&path, false).await
    }

    /// Zap to a channel from the loaded source list
    pub async fn select_source_by_name(&mut self, name: &str) -> Result<bool> {
        let service_ref = self
            .sources
            .get(name)
            .map(str::to_string)
            .ok_or_else(|| OpenWebIfError::Validation(format!("unknown source: {}", name)))?;

        self.select_source(&service_ref).await
    }

    /// Show a message on the TV screen, optionally closing it after `timeout` seconds
    pub async fn send_message(
        &mut self,
        text: &str,
        message_type: MessageType,
        timeout: Option<u32>,
    ) -> Result<bool> {
        let mut path = format!(
            "{}{}&type={}",
            URL_MESSAGE,
            urlencoding::encode(text),
            message_type.code()
        );
        if let Some(secs) = timeout {
            path.push_str(&format!("&timeout={}", secs));
        }

        self.send_command(&path, false).await
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// OpenWebIf version string, e.g. "OWIF 1.3.6"
    pub async fn get_version(&mut self) -> Result<Option<String>> {
        Ok(self.get_about().await?.map(|info| info.webif_version))
    }

    /// Device info from `/api/about`; also discovers the MAC address when unknown
    pub async fn get_about(&mut self) -> Result<Option<DeviceInfo>> {
        let result = self.fetch_about().await;
        let info = self.absorb_unreachable(result)?.flatten();

        if let Some(info) = &info {
            self.remember_mac(info);
        }

        Ok(info)
    }

    pub async fn get_all_bouquets(&mut self) -> Result<Vec<Bouquet>> {
        let result = self.get_json::<BouquetsResponse>(URL_GET_ALL_BOUQUETS).await;
        Ok(self
            .absorb_unreachable(result)?
            .flatten()
            .map(BouquetsResponse::into_bouquets)
            .unwrap_or_default())
    }

    /// Channels of `bouquet`, or of the configured/first bouquet when `None`
    pub async fn get_bouquet_sources(&mut self, bouquet: Option<&str>) -> Result<SourceList> {
        let bouquet = match bouquet
            .filter(|b| !b.trim().is_empty())
            .map(str::to_string)
            .or_else(|| self.source_bouquet.clone())
        {
            Some(bouquet) => bouquet,
            None => return Ok(SourceList::new()),
        };

        let path = format!("{}{}", URL_EPG_NOW, urlencoding::encode(&bouquet));
        let result = self.get_json::<EpgNowResponse>(&path).await;
        let sources = self
            .absorb_unreachable(result)?
            .flatten()
            .map(EpgNowResponse::into_sources)
            .unwrap_or_default();

        debug!("Sources: {:?}", sources.names());
        Ok(sources)
    }

    pub async fn get_all_services(&mut self) -> Result<Vec<Service>> {
        let result = self.get_json::<AllServicesResponse>(URL_GET_ALL_SERVICES).await;
        Ok(self
            .absorb_unreachable(result)?
            .flatten()
            .map(AllServicesResponse::into_services)
            .unwrap_or_default())
    }

    /// Pick the source bouquet (first one unless configured) and load its channels
    pub async fn load_sources(&mut self) -> Result<&SourceList> {
        if self.source_bouquet.is_none() {
            let bouquets = self.get_all_bouquets().await?;
            if let Some(first) = bouquets.into_iter().next() {
                debug!("First bouquet name is: '{}'", first.name);
                self.source_bouquet = Some(first.service_ref);
            }
        }

        self.sources = self.get_bouquet_sources(None).await?;
        Ok(&self.sources)
    }

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------

    async fn fetch_about(&self) -> Result<Option<DeviceInfo>> {
        Ok(self
            .get_json::<AboutResponse>(URL_ABOUT)
            .await?
            .map(AboutResponse::into_device_info))
    }

    fn remember_mac(&mut self, info: &DeviceInfo) {
        if self.mac_address.is_some() {
            return;
        }
        match info.wired_mac() {
            Some(mac) if mac.parse::<wol::MacAddr>().is_ok() => {
                debug!("Discovered mac_address: {}", mac);
                self.mac_address = Some(mac.to_string());
            }
            Some(mac) => debug!("Ignoring unusable mac_address from device: {}", mac),
            None => {}
        }
    }

    async fn send_command(&mut self, path: &str, power_down: bool) -> Result<bool> {
        let result = self.get_response(path).await;

        if power_down {
            if let Err(OpenWebIfError::DeviceUnreachable { url, .. }) = &result {
                debug!("{} dropped the connection, power transition under way", url);
                return Ok(true);
            }
        }

        let body = match self.absorb_unreachable(result)? {
            Some((StatusCode::OK, body)) => body,
            Some((status, _)) => {
                debug!("{} answered {}, command not confirmed", path, status);
                return Ok(false);
            }
            None => return Ok(false),
        };

        match parse_json::<CommandResponse>(path, &body) {
            Some(response) => {
                if let Some(message) = &response.message {
                    debug!("{}: {}", path, message);
                }
                Ok(response.result)
            }
            None => Ok(false),
        }
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_ref()),
            None => builder,
        }
    }

    /// GET a path. Any 2xx gives its status and body; other statuses are
    /// `Communication` errors.
    async fn get_response(&self, path: &str) -> Result<(StatusCode, String)> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|source| OpenWebIfError::DeviceUnreachable {
                url: url.clone(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => {
                let body = response
                    .text()
                    .await
                    .map_err(|source| OpenWebIfError::DeviceUnreachable { url, source })?;
                Ok((status, body))
            }
            StatusCode::UNAUTHORIZED => {
                error!(
                    "Failed to authenticate with OpenWebIf at {}, check your username and password",
                    url
                );
                Err(OpenWebIfError::Communication { url, status: 401 })
            }
            StatusCode::NOT_FOUND => {
                error!(
                    "Got a 404 from {}. Do you have the OpenWebIf plugin installed?",
                    url
                );
                Err(OpenWebIfError::Communication { url, status: 404 })
            }
            status => {
                error!("Invalid response from OpenWebIf: {} {}", status, url);
                Err(OpenWebIfError::Communication {
                    url,
                    status: status.as_u16(),
                })
            }
        }
    }

    /// GET and decode JSON. A body that doesn't match `T` gives `Ok(None)`.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let (_, body) = self.get_response(path).await?;
        Ok(parse_json(path, &body))
    }

    /// Turn a transport failure into the offline state. Any answer from the
    /// receiver, even an error status, means it is online.
    fn absorb_unreachable<T>(&mut self, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => {
                self.mark_online();
                Ok(Some(value))
            }
            Err(e @ OpenWebIfError::DeviceUnreachable { .. }) => {
                self.mark_offline(&e);
                Ok(None)
            }
            Err(e) => {
                if matches!(e, OpenWebIfError::Communication { .. }) {
                    self.mark_online();
                }
                Err(e)
            }
        }
    }

    fn mark_offline(&mut self, cause: &OpenWebIfError) {
        // A box in deep standby fails every call; only report the transition
        if !self.state.is_offline {
            warn!("{} is unreachable: {}", self.base_url, cause);
        }
        self.state.is_offline = true;
        self.state.in_standby = true;
        self.state.clear_playback();
    }

    fn mark_online(&mut self) {
        if self.state.is_offline {
            info!("{} is reachable again", self.base_url);
            self.state.is_offline = false;
        }
    }
}

fn parse_json<T: DeserializeOwned>(path: &str, body: &str) -> Option<T> {
    match serde_json::from_str(body) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Unexpected payload from {}: {}", path, e);
            None
        }
    }
}

fn normalize_volume(level: u32) -> f32 {
    level.min(100) as f32 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_host_is_configuration_error() {
        let err = DeviceClient::new(ClientOptions::default()).err().unwrap();
        assert!(matches!(err, OpenWebIfError::Configuration(_)));

        let err = DeviceClient::new(ClientOptions::new("   ")).err().unwrap();
        assert!(matches!(err, OpenWebIfError::Configuration(_)));
    }

    #[test]
    fn test_invalid_mac_is_configuration_error() {
        let options = ClientOptions::new("vusolo2").with_mac_address("not-a-mac");
        let err = DeviceClient::new(options).err().unwrap();
        assert!(matches!(err, OpenWebIfError::Configuration(_)));
    }

    #[test]
    fn test_base_url() {
        let client = DeviceClient::new(ClientOptions::new("vusolo2")).unwrap();
        assert_eq!(client.base_url(), "http://vusolo2:80");

        let client =
            DeviceClient::new(ClientOptions::new("10.0.0.5").with_port(8443).with_https(true))
                .unwrap();
        assert_eq!(client.base_url(), "https://10.0.0.5:8443");
    }

    #[test]
    fn test_new_client_starts_in_standby() {
        let client = DeviceClient::new(ClientOptions::new("vusolo2")).unwrap();
        assert!(client.state().in_standby);
        assert!(!client.is_offline());
        assert!(client.sources().is_empty());
    }

    #[test]
    fn test_wake_up_without_mac() {
        let client = DeviceClient::new(ClientOptions::new("vusolo2")).unwrap();
        assert!(!client.wake_up().unwrap());
    }

    #[test]
    fn test_wake_up_with_configured_mac() {
        let options = ClientOptions::new("vusolo2").with_mac_address("00:1d:ec:01:02:03");
        let client = DeviceClient::new(options).unwrap();

        // The broadcast itself may be refused by the host network
        match client.wake_up() {
            Ok(sent) => assert!(sent),
            Err(OpenWebIfError::WakeOnLan(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    #[test]
    fn test_eui64_mac_is_configuration_error() {
        let options = ClientOptions::new("vusolo2").with_mac_address("00:1d:ec:ff:fe:01:02:03");
        let err = DeviceClient::new(options).err().unwrap();
        assert!(matches!(err, OpenWebIfError::Configuration(_)));
    }

    #[test]
    fn test_blank_source_bouquet_is_ignored() {
        let options = ClientOptions::new("vusolo2").with_source_bouquet("  ");
        let client = DeviceClient::new(options).unwrap();
        assert_eq!(client.source_bouquet, None);
    }

    #[tokio::test]
    async fn test_screen_grabs_stay_out_of_url_cache() {
        let mut server = mockito::Server::new_async().await;
        let grab = server
            .mock("HEAD", "/grab")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .expect(20)
            .create_async()
            .await;

        let addr = server.socket_address();
        let options = ClientOptions::new(addr.ip().to_string()).with_port(addr.port());
        let mut client = DeviceClient::new(options).unwrap();

        for _ in 0..20 {
            let url = client
                .resolve_picon_url("BBC One", "1:0:19:2887:40F:1:C00000:0:0:0:")
                .await;
            assert!(url.is_some());
        }

        grab.assert_async().await;
        assert!(client.cached_urls_which_exist.is_empty());
    }

    #[test]
    fn test_normalize_volume() {
        assert_eq!(normalize_volume(0), 0.0);
        assert_eq!(normalize_volume(50), 0.5);
        assert_eq!(normalize_volume(100), 1.0);
        assert_eq!(normalize_volume(250), 1.0);
    }
}
