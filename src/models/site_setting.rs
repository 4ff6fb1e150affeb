use serde::{Deserialize, Serialize};

/// Public site configuration entry (hero copy, contact details, feature toggles).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSetting {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSiteSetting {
    pub value: serde_json::Value,
}
