// Wire types for the Zinguo cloud API.
//
// The device record itself stays loosely typed (`RawDeviceRecord`): its
// field set varies by model and firmware, and normalization lives in
// `zinguo-core`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw `getDeviceByMac` response, keyed by vendor field names.
pub type RawDeviceRecord = Map<String, Value>;

/// Body of `POST /customer/login`.
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub account: &'a str,
    /// SHA-1 hex digest, never the clear-text password.
    pub password: String,
}

/// Successful login body. Only the token is needed; everything else is ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub token: Option<String>,
}

/// One entry of `GET /customer/devices`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSummary {
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Empty when the server omits it.
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Vendor reports `1` for online.
    #[serde(default)]
    pub online: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceSummary {
    pub fn is_online(&self) -> bool {
        self.online.as_ref().and_then(Value::as_i64) == Some(1)
    }
}
