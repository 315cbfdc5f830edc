use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared source of an inbound request, taken verbatim from the `Origin` header.
///
/// Used as the trust key. Comparison is exact: no case folding, no trailing
/// slash handling, no default-port normalization.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A hardware device located by its master key fingerprint.
///
/// Handles are resolved per request and never cached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHandle {
    pub fingerprint: String,
    pub device_type: String,
    pub path: String,
    pub model: Option<String>,
}

impl DeviceHandle {
    pub fn new(
        fingerprint: impl Into<String>,
        device_type: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            device_type: device_type.into(),
            path: path.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model {
            Some(model) => write!(f, "{model} ({}) at {}", self.fingerprint, self.path),
            None => write!(f, "{} ({}) at {}", self.device_type, self.fingerprint, self.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_is_case_sensitive() {
        assert_ne!(
            Origin::new("https://Wallet.example"),
            Origin::new("https://wallet.example")
        );
        assert_ne!(
            Origin::new("https://wallet.example"),
            Origin::new("https://wallet.example/")
        );
    }

    #[test]
    fn origin_serializes_as_plain_string() {
        let origin = Origin::new("http://localhost:3000");
        assert_eq!(
            serde_json::to_value(&origin).unwrap(),
            serde_json::json!("http://localhost:3000")
        );
    }

    #[test]
    fn device_display_prefers_model() {
        let device = DeviceHandle::new("deadbeef", "trezor", "webusb:001:4");
        assert_eq!(device.to_string(), "trezor (deadbeef) at webusb:001:4");
        let device = device.with_model("trezor_t");
        assert_eq!(device.to_string(), "trezor_t (deadbeef) at webusb:001:4");
    }
}
