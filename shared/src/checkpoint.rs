use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::dates::parse_local_date;

/// One checkpoint as served by the record source. Field names follow the source's columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CheckpointRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "State", default, deserialize_with = "null_as_empty")]
    pub state: String,
    #[serde(rename = "County", default)]
    pub county: Option<String>,
    #[serde(rename = "City", default)]
    pub city: Option<String>,
    #[serde(rename = "Location", default, deserialize_with = "null_as_empty")]
    pub location: String,
    #[serde(rename = "Description", default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(rename = "Date", default)]
    pub date: Option<String>,
    #[serde(rename = "Time", default, deserialize_with = "null_as_empty")]
    pub time: String,
    #[serde(rename = "Source", default, deserialize_with = "null_as_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapurl: Option<String>,
}

impl CheckpointRecord {
    /// Trimmed city, `None` when absent or blank.
    pub fn city_name(&self) -> Option<&str> {
        non_blank(self.city.as_deref())
    }

    /// Trimmed county, `None` when absent or blank.
    pub fn county_name(&self) -> Option<&str> {
        non_blank(self.county.as_deref())
    }

    pub fn state_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        non_blank(Some(self.state.as_str())).unwrap_or(fallback)
    }

    /// The record's date as a local calendar day.
    pub fn local_date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_local_date)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Signed(n) => n.to_string(),
        RawId::Unsigned(n) => n.to_string(),
    })
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointResponse {
    pub success: bool,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub checkpoints: Vec<CheckpointRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointError {
    pub error: String,
    #[serde(default)]
    pub details: Option<String>,
}
