//! Provider-facing data types.
//!
//! Public types are what services and the API layer consume. The `Raw*`
//! types mirror the provider's JSON and are reshaped before leaving this
//! module.

use serde::{Deserialize, Serialize};

/// Result of an OAuth token grant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Present when the provider issues or rotates a refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds.
    pub expires_in: u64,
}

/// A playback device selectable for a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
}

/// A search hit reshaped for clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackSummary {
    pub id: String,
    pub uri: String,
    pub title: String,
    /// First artist's name.
    pub description: String,
    /// First album image url.
    pub image: String,
    /// Duration in milliseconds.
    pub length: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct RawProfile {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDeviceList {
    #[serde(default)]
    pub devices: Vec<RawDevice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDevice {
    /// Null for devices the provider won't let us target.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub is_restricted: bool,
}

impl RawDevice {
    /// Converts to a selectable [`Device`], or `None` if restricted or unaddressable.
    pub(crate) fn into_selectable(self) -> Option<Device> {
        if self.is_restricted {
            return None;
        }
        Some(Device {
            id: self.id?,
            name: self.name,
            device_type: self.device_type,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSearchResponse {
    pub tracks: RawPage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPage {
    #[serde(default)]
    pub items: Vec<RawTrack>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTrack {
    pub id: String,
    pub uri: String,
    pub name: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub artists: Vec<RawArtist>,
    #[serde(default)]
    pub album: Option<RawAlbum>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawArtist {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAlbum {
    #[serde(default)]
    pub images: Vec<RawImage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawImage {
    pub url: String,
}

impl From<RawTrack> for TrackSummary {
    fn from(track: RawTrack) -> Self {
        let description = track
            .artists
            .into_iter()
            .next()
            .map(|a| a.name)
            .unwrap_or_default();
        let image = track
            .album
            .and_then(|album| album.images.into_iter().next())
            .map(|img| img.url)
            .unwrap_or_default();
        Self {
            id: track.id,
            uri: track.uri,
            title: track.name,
            description,
            image,
            length: track.duration_ms,
        }
    }
}
