use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    #[serde(default)]
    pub anime: Option<String>,
}

/// Wire shape shared by every failure response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "Error")]
    pub error: String,
    #[serde(rename = "Details", skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
