//! Collected post records returned by `/process_data` and `/data`.

use serde::{Deserialize, Deserializer, Serialize};

/// One collected blog post.
///
/// Every field tolerates absence and `null`: the backend omits `date` and
/// `"광고"` on some paths and database rows may carry NULL columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(deserialize_with = "nullable_string")]
    pub title: String,
    #[serde(deserialize_with = "nullable_string")]
    pub writer: String,
    #[serde(deserialize_with = "nullable_string")]
    pub date: String,
    #[serde(deserialize_with = "nullable_string")]
    pub content: String,
    /// Comma-joined tag list.
    #[serde(deserialize_with = "nullable_string")]
    pub tags: String,
    /// Sympathy ("like") count.
    #[serde(deserialize_with = "lenient_count")]
    pub sympathy: i64,
    #[serde(deserialize_with = "nullable_string")]
    pub post_url: String,
    /// Comma-joined ad image URLs.
    #[serde(deserialize_with = "nullable_string")]
    pub ad_images: String,
    #[serde(rename = "광고")]
    pub ad_status: AdStatus,
}

impl Record {
    pub fn tag_list(&self) -> Vec<&str> {
        split_joined(&self.tags)
    }

    pub fn ad_image_urls(&self) -> Vec<&str> {
        split_joined(&self.ad_images)
    }
}

/// Ad-detection flag carried under the `"광고"` key.
///
/// The crawler writes `"O"` when ad images were found and `"X"` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum AdStatus {
    Detected,
    Clean,
    /// Missing or unrecognized value, kept verbatim.
    Unknown(String),
}

impl Default for AdStatus {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl From<Option<String>> for AdStatus {
    fn from(raw: Option<String>) -> Self {
        match raw.as_deref().map(str::trim) {
            Some("O") => Self::Detected,
            Some("X") => Self::Clean,
            Some(other) => Self::Unknown(other.to_string()),
            None => Self::default(),
        }
    }
}

impl From<AdStatus> for Option<String> {
    fn from(status: AdStatus) -> Self {
        match status {
            AdStatus::Detected => Some("O".to_string()),
            AdStatus::Clean => Some("X".to_string()),
            AdStatus::Unknown(raw) if raw.is_empty() => None,
            AdStatus::Unknown(raw) => Some(raw),
        }
    }
}

impl std::fmt::Display for AdStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detected => write!(f, "O"),
            Self::Clean => write!(f, "X"),
            Self::Unknown(raw) if raw.is_empty() => write!(f, "-"),
            Self::Unknown(raw) => write!(f, "{raw}"),
        }
    }
}

fn split_joined(joined: &str) -> Vec<&str> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts an integer, a float, a numeric string or null. Anything
/// unparseable counts as zero, matching how the crawler records it.
fn lenient_count<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let count = match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        serde_json::Value::String(s) => s.trim().replace(',', "").parse().unwrap_or(0),
        _ => 0,
    };
    Ok(count)
}
