//! Records exchanged with a service discovery collaborator.
//!
//! Publishing and browsing are out of scope; a discovery layer hands the
//! controller a [`ServiceRecord`] and the controller connects to its
//! endpoint.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// DNS-SD service type devices advertise under.
pub const SERVICE_TYPE: &str = "_fixa._tcp";

pub const TXT_DEVICE_NAME: &str = "deviceName";
pub const TXT_APP_NAME: &str = "appName";

const UNKNOWN_DEVICE: &str = "Unknown device";
const UNKNOWN_APP: &str = "Unknown app";

/// One discoverable device endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub device_name: String,
    pub app_name: String,
    pub endpoint: SocketAddr,
}

impl ServiceRecord {
    pub fn new(
        device_name: impl Into<String>,
        app_name: impl Into<String>,
        endpoint: SocketAddr,
    ) -> Self {
        Self {
            device_name: device_name.into(),
            app_name: app_name.into(),
            endpoint,
        }
    }

    /// Advertised instance name, `"<app> - <device>"`.
    pub fn service_name(&self) -> String {
        format!("{} - {}", self.app_name, self.device_name)
    }

    pub fn txt_record(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (TXT_DEVICE_NAME.to_string(), self.device_name.clone()),
            (TXT_APP_NAME.to_string(), self.app_name.clone()),
        ])
    }

    /// Build a record from browsed TXT data. Missing names fall back to
    /// placeholders; other keys are ignored.
    pub fn from_txt_record(txt: &BTreeMap<String, String>, endpoint: SocketAddr) -> Self {
        let field = |key: &str, fallback: &str| {
            txt.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| fallback.to_string())
        };
        Self {
            device_name: field(TXT_DEVICE_NAME, UNKNOWN_DEVICE),
            app_name: field(TXT_APP_NAME, UNKNOWN_APP),
            endpoint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> SocketAddr {
        "192.168.1.20:51234".parse().unwrap()
    }

    #[test]
    fn service_name_is_app_then_device() {
        let record = ServiceRecord::new("Pixel 9", "Sketchpad", endpoint());
        assert_eq!(record.service_name(), "Sketchpad - Pixel 9");
    }

    #[test]
    fn txt_roundtrip() {
        let record = ServiceRecord::new("Pixel 9", "Sketchpad", endpoint());
        let txt = record.txt_record();
        assert_eq!(txt["deviceName"], "Pixel 9");
        assert_eq!(ServiceRecord::from_txt_record(&txt, endpoint()), record);
    }

    #[test]
    fn missing_txt_keys_use_placeholders() {
        let mut txt = BTreeMap::new();
        txt.insert("appName".to_string(), String::new());
        txt.insert("other".to_string(), "ignored".to_string());

        let record = ServiceRecord::from_txt_record(&txt, endpoint());
        assert_eq!(record.device_name, "Unknown device");
        assert_eq!(record.app_name, "Unknown app");
    }

    #[test]
    fn serializes_camel_case() {
        let record = ServiceRecord::new("d", "a", endpoint());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["deviceName"], "d");
        assert_eq!(json["endpoint"], "192.168.1.20:51234");
    }
}
