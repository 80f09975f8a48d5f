//! JSON Resource Descriptor (RFC 7033 §4.4), the normalized document every
//! lookup produces.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::WebFingerError;

/// Title key used for titles that carry no language tag.
pub const DEFAULT_TITLE_LANG: &str = "default";

/// Property map. A key mapped to `None` is an explicit JSON `null`, which is
/// distinct from the key being absent.
pub type Properties = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub subject: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default, deserialize_with = "nullable")]
    pub rel: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,

    /// Titles keyed by language tag; untagged titles live under `"default"`.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub titles: BTreeMap<String, String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,

    /// URL template with a `{uri}` placeholder (legacy LRDD discovery).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// Result of a property lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property<'a> {
    Value(&'a str),
    /// The key is present with a `null` value.
    Null,
    Absent,
}

impl<'a> Property<'a> {
    /// The value, or `""` for null and absent properties.
    pub fn as_str(self) -> &'a str {
        match self {
            Property::Value(v) => v,
            Property::Null | Property::Absent => "",
        }
    }

    pub fn is_present(self) -> bool {
        !matches!(self, Property::Absent)
    }
}

fn lookup<'a>(properties: &'a Properties, uri: &str) -> Property<'a> {
    match properties.get(uri) {
        Some(Some(value)) => Property::Value(value),
        Some(None) => Property::Null,
        None => Property::Absent,
    }
}

impl Descriptor {
    /// First link with the given relation type.
    pub fn link_by_rel(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.rel == rel)
    }

    pub fn links_by_rel<'a>(&'a self, rel: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |link| link.rel == rel)
    }

    pub fn property(&self, uri: &str) -> Property<'_> {
        lookup(&self.properties, uri)
    }

    /// Property value as a string; null and absent both read as `""`.
    pub fn property_str(&self, uri: &str) -> &str {
        self.property(uri).as_str()
    }

    /// `expires` as an RFC 3339 timestamp. `None` if missing or malformed.
    pub fn expires_at(&self) -> Option<DateTime<FixedOffset>> {
        self.expires
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
    }
}

impl Link {
    pub fn property(&self, uri: &str) -> Property<'_> {
        lookup(&self.properties, uri)
    }

    pub fn property_str(&self, uri: &str) -> &str {
        self.property(uri).as_str()
    }

    /// Title for `lang`, falling back to the untagged title.
    pub fn title(&self, lang: &str) -> Option<&str> {
        self.titles
            .get(lang)
            .or_else(|| self.titles.get(DEFAULT_TITLE_LANG))
            .map(String::as_str)
    }

    /// Template with no placeholder text counts as missing.
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref().filter(|t| !t.is_empty())
    }
}

/// Parse a JRD document.
pub fn parse_jrd(blob: &[u8]) -> Result<Descriptor, WebFingerError> {
    Ok(serde_json::from_slice(blob)?)
}

// JRD producers commonly emit `null` for empty members.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
