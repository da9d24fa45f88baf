//! Payload schemas for the OpenWebIf endpoints
//!
//! Each endpoint gets an explicit schema. Fields the receiver may omit are
//! defaulted; a payload that doesn't fit its schema at all is treated by the
//! client as an empty result.

use serde::{Deserialize, Deserializer};

use crate::models::{Bouquet, DeviceInfo, NetworkInterface, Service, Source, SourceList};

// =============================================================================
// Lenient scalars
// =============================================================================

/// OpenWebIf reports some flags as JSON booleans and others as "true"/"false"
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseBool {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl LooseBool {
    fn value(self) -> bool {
        match self {
            LooseBool::Bool(b) => b,
            LooseBool::Int(i) => i != 0,
            LooseBool::Str(s) => s.trim().eq_ignore_ascii_case("true"),
        }
    }
}

fn loose_bool<'de, D>(d: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<LooseBool>::deserialize(d)?
        .map(LooseBool::value)
        .unwrap_or(false))
}

fn loose_bool_opt<'de, D>(d: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<LooseBool>::deserialize(d)?.map(LooseBool::value))
}

// =============================================================================
// /api/statusinfo
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct StatusInfoResponse {
    #[serde(rename = "inStandby", deserialize_with = "loose_bool_opt")]
    pub in_standby: Option<bool>,
    #[serde(rename = "isRecording", deserialize_with = "loose_bool")]
    pub is_recording: bool,
    #[serde(deserialize_with = "loose_bool")]
    pub muted: bool,
    pub volume: Option<u32>,
    pub currservice_serviceref: Option<String>,
    pub currservice_name: Option<String>,
    pub currservice_station: Option<String>,
}

// =============================================================================
// Command results (/api/powerstate, /api/remotecontrol, /api/zap, ...)
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CommandResponse {
    #[serde(deserialize_with = "loose_bool")]
    pub result: bool,
    pub message: Option<String>,
}

// =============================================================================
// /web/vol (XML)
// =============================================================================

/// `<e2volume>` document returned by the legacy web API
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct VolumeXml {
    e2result: Option<String>,
    e2current: Option<String>,
    e2ismuted: Option<String>,
}

impl VolumeXml {
    pub fn parse(body: &str) -> Result<Self, quick_xml::de::DeError> {
        quick_xml::de::from_str(body)
    }

    pub fn result(&self) -> bool {
        self.e2result
            .as_deref()
            .map(|r| r.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn is_muted(&self) -> Option<bool> {
        self.e2ismuted
            .as_deref()
            .map(|m| m.trim().eq_ignore_ascii_case("true"))
    }

    pub fn current(&self) -> Option<u32> {
        self.e2current.as_deref().and_then(|c| c.trim().parse().ok())
    }
}

// =============================================================================
// /api/about
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct AboutResponse {
    info: AboutInfo,
}

#[derive(Debug, Deserialize)]
struct AboutInfo {
    webifver: String,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    imagever: Option<String>,
    #[serde(default)]
    ifaces: Vec<InterfaceRaw>,
}

#[derive(Debug, Deserialize)]
struct InterfaceRaw {
    name: String,
    #[serde(default)]
    mac: Option<String>,
    #[serde(default)]
    ip: Option<String>,
}

impl AboutResponse {
    pub fn into_device_info(self) -> DeviceInfo {
        DeviceInfo {
            webif_version: self.info.webifver,
            brand: self.info.brand,
            model: self.info.model,
            image_version: self.info.imagever,
            network_interfaces: self
                .info
                .ifaces
                .into_iter()
                .map(|i| NetworkInterface {
                    name: i.name,
                    mac: i.mac,
                    ip: i.ip,
                })
                .collect(),
        }
    }
}

// =============================================================================
// /api/bouquets
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct BouquetsResponse {
    /// Each entry is `[service_ref, name]`
    bouquets: Vec<Vec<String>>,
}

impl BouquetsResponse {
    pub fn into_bouquets(self) -> Vec<Bouquet> {
        self.bouquets
            .into_iter()
            .filter_map(|entry| {
                let mut parts = entry.into_iter();
                match (parts.next(), parts.next()) {
                    (Some(service_ref), Some(name)) => Some(Bouquet { service_ref, name }),
                    _ => None,
                }
            })
            .collect()
    }
}

// =============================================================================
// /api/epgnow
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct EpgNowResponse {
    events: Vec<EpgEventRaw>,
}

#[derive(Debug, Deserialize)]
struct EpgEventRaw {
    sname: String,
    sref: String,
}

impl EpgNowResponse {
    pub fn into_sources(self) -> SourceList {
        self.events
            .into_iter()
            .map(|e| Source {
                name: e.sname,
                service_ref: e.sref,
            })
            .collect()
    }
}

// =============================================================================
// /api/getallservices
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AllServicesResponse {
    services: Vec<ServiceRaw>,
}

#[derive(Debug, Deserialize)]
struct ServiceRaw {
    servicename: String,
    servicereference: String,
    #[serde(default)]
    subservices: Vec<ServiceRaw>,
}

impl ServiceRaw {
    fn into_service(self) -> Service {
        Service {
            name: self.servicename,
            service_ref: self.servicereference,
            subservices: self
                .subservices
                .into_iter()
                .map(ServiceRaw::into_service)
                .collect(),
        }
    }
}

impl AllServicesResponse {
    pub fn into_services(self) -> Vec<Service> {
        self.services
            .into_iter()
            .map(ServiceRaw::into_service)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_info_string_flags() {
        let body = r#"{
            "inStandby": "false",
            "isRecording": "true",
            "muted": false,
            "volume": 44,
            "currservice_serviceref": "1:0:19:2887:40F:1:C00000:0:0:0:",
            "currservice_name": "News at Six",
            "currservice_station": "BBC One HD"
        }"#;

        let status: StatusInfoResponse = serde_json::from_str(body).unwrap();
        assert_eq!(status.in_standby, Some(false));
        assert!(status.is_recording);
        assert!(!status.muted);
        assert_eq!(status.volume, Some(44));
        assert_eq!(status.currservice_station.as_deref(), Some("BBC One HD"));
    }

    #[test]
    fn test_status_info_missing_fields() {
        let status: StatusInfoResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(status.in_standby, None);
        assert!(!status.muted);
        assert_eq!(status.volume, None);
    }

    #[test]
    fn test_command_result() {
        let ok: CommandResponse =
            serde_json::from_str(r#"{"result": true, "message": "done"}"#).unwrap();
        assert!(ok.result);

        let missing: CommandResponse = serde_json::from_str(r#"{"instandby": false}"#).unwrap();
        assert!(!missing.result);
    }

    #[test]
    fn test_volume_xml() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<e2volume>
    <e2result>True</e2result>
    <e2resulttext>Mute toggled</e2resulttext>
    <e2current>44</e2current>
    <e2ismuted>True</e2ismuted>
</e2volume>"#;

        let volume = VolumeXml::parse(body).unwrap();
        assert!(volume.result());
        assert_eq!(volume.is_muted(), Some(true));
        assert_eq!(volume.current(), Some(44));
    }

    #[test]
    fn test_bouquets_skip_short_entries() {
        let body = r#"{"bouquets": [
            ["1:7:1:0:0:0:0:0:0:0:FROM BOUQUET \"userbouquet.favourites.tv\" ORDER BY bouquet", "Favourites (TV)"],
            ["broken"]
        ]}"#;

        let bouquets = serde_json::from_str::<BouquetsResponse>(body)
            .unwrap()
            .into_bouquets();
        assert_eq!(bouquets.len(), 1);
        assert_eq!(bouquets[0].name, "Favourites (TV)");
    }

    #[test]
    fn test_about_interfaces() {
        let body = r#"{"info": {
            "webifver": "OWIF 1.3.6",
            "brand": "Vu+",
            "model": "Solo2",
            "ifaces": [{"name": "eth0", "mac": "00:1d:ec:0a:0b:0c", "ip": "192.168.1.20"}]
        }}"#;

        let info = serde_json::from_str::<AboutResponse>(body)
            .unwrap()
            .into_device_info();
        assert_eq!(info.webif_version, "OWIF 1.3.6");
        assert_eq!(info.wired_mac(), Some("00:1d:ec:0a:0b:0c"));
    }

    #[test]
    fn test_all_services_nesting() {
        let body = r#"{"services": [{
            "servicename": "Favourites (TV)",
            "servicereference": "1:7:1:0:0:0:0:0:0:0:",
            "subservices": [
                {"servicename": "RTE One", "servicereference": "1:0:1:1:1:1:1:0:0:0:"}
            ]
        }]}"#;

        let services = serde_json::from_str::<AllServicesResponse>(body)
            .unwrap()
            .into_services();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].subservices[0].name, "RTE One");
    }
}
