use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// Top-level envelope. `data` is an object on success and a plain message
/// string when `status` is `"error"`.
#[derive(Deserialize, Debug)]
pub struct AqicnResponse {
    pub status: String,
    pub data: Value,
}

#[derive(Deserialize, Debug)]
pub struct AqicnFeed {
    pub city: AqicnCity,
    /// Individual pollutant readings keyed by field name (`pm25`, `median`, ...).
    #[serde(default)]
    pub iaqi: IndexMap<String, AqicnValue>,
    pub time: AqicnTime,
}

#[derive(Deserialize, Debug)]
pub struct AqicnCity {
    pub name: String,
    #[serde(default)]
    pub geo: Vec<f64>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct AqicnValue {
    pub v: f64,
}

#[derive(Deserialize, Debug)]
pub struct AqicnTime {
    /// Local measurement time, `YYYY-MM-DD HH:MM:SS`.
    pub s: String,
}
