//! The presence payload pushed to the channel.

use serde::Serialize;

const LOGO_TEMPLATE: &str =
    "https://a.espncdn.com/combiner/i?img=/i/teamlogos/mlb/500/{code}.png&h=64&w=64";

/// Logo URL for a team's logo code.
pub fn logo_url(code: &str) -> String {
    LOGO_TEMPLATE.replace("{code}", &code.to_lowercase())
}

/// An image with its hover label. Both halves are always present together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub image: String,
    pub text: String,
}

/// Status record shown by the presence channel.
///
/// `details` and `state` are never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresencePayload {
    pub details: String,
    pub state: String,
    pub large: Option<Asset>,
    pub small: Option<Asset>,
}

/// Flat wire form, as accepted by the Discord activity and the HTTP bridge.
#[derive(Debug, Serialize)]
pub struct FlatPayload<'a> {
    pub details: &'a str,
    pub state: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_text: Option<&'a str>,
}

impl PresencePayload {
    /// Build a payload, substituting placeholders for empty lines.
    pub fn new(details: impl Into<String>, state: impl Into<String>) -> Self {
        let details = details.into();
        let state = state.into();
        Self {
            details: non_empty(details, "MLB"),
            state: non_empty(state, "No game data"),
            large: None,
            small: None,
        }
    }

    pub fn with_large(mut self, image: String, text: String) -> Self {
        self.large = Some(Asset { image, text });
        self
    }

    pub fn with_small(mut self, image: String, text: String) -> Self {
        self.small = Some(Asset { image, text });
        self
    }

    pub fn flat(&self) -> FlatPayload<'_> {
        FlatPayload {
            details: &self.details,
            state: &self.state,
            large_image: self.large.as_ref().map(|a| a.image.as_str()),
            large_text: self.large.as_ref().map(|a| a.text.as_str()),
            small_image: self.small.as_ref().map(|a| a.image.as_str()),
            small_text: self.small.as_ref().map(|a| a.text.as_str()),
        }
    }
}

fn non_empty(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}
