use indexmap::IndexMap;
use serde::Deserialize;

/// A multi-coordinate request yields a JSON array; a single one an object.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum OpenMeteoResponse {
    Many(Vec<OpenMeteoLocation>),
    One(OpenMeteoLocation),
}

impl OpenMeteoResponse {
    pub fn into_locations(self) -> Vec<OpenMeteoLocation> {
        match self {
            OpenMeteoResponse::Many(v) => v,
            OpenMeteoResponse::One(l) => vec![l],
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct OpenMeteoLocation {
    pub daily: OpenMeteoDaily,
}

#[derive(Deserialize, Debug)]
pub struct OpenMeteoDaily {
    /// Day starts as unix seconds (GMT).
    pub time: Vec<i64>,
    /// One column per requested variable; `null` where the model has no value.
    #[serde(flatten)]
    pub series: IndexMap<String, Vec<Option<f64>>>,
}

/// Error payload returned with HTTP 400.
#[derive(Deserialize, Debug)]
pub struct OpenMeteoError {
    pub reason: String,
}
