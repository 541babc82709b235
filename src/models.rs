//! Core value types shared by the cache, the lookup index and the cascade.

use serde::{Deserialize, Serialize};

/// Size label of the original upload
pub const FULL_SIZE: &str = "full";

/// Size label stored with hotlink sentinels
pub const HOTLINK_SIZE: &str = "none";

/// Owner used when a caller does not name one
pub const DEFAULT_OWNER_ID: u64 = 1;

/// The resolved identity of an image
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaReference {
    pub media_id: u64,
    pub owner_id: u64,
    pub size_variant: String,
}

impl MediaReference {
    pub fn new(media_id: u64, owner_id: u64, size_variant: impl Into<String>) -> Self {
        Self {
            media_id,
            owner_id,
            size_variant: size_variant.into(),
        }
    }

    /// The `{0, 0}` reference reported for external URLs
    pub fn hotlink() -> Self {
        Self::new(0, 0, HOTLINK_SIZE)
    }

    /// Whether this is the terminal hotlink sentinel
    pub fn is_hotlink(&self) -> bool {
        self.media_id == 0
    }
}

/// Outcome of a cache read or a full cascade run.
///
/// `Hotlink` is a cacheable negative result; `Miss` never is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Resolution {
    Resolved(MediaReference),
    Hotlink,
    Miss,
}

impl Resolution {
    /// Build from a stored reference, mapping the sentinel back to `Hotlink`
    pub fn from_reference(reference: MediaReference) -> Self {
        if reference.is_hotlink() {
            Resolution::Hotlink
        } else {
            Resolution::Resolved(reference)
        }
    }

    /// Reference as seen by callers; hotlinks surface as `{0, 0}`
    pub fn reference(&self) -> Option<MediaReference> {
        match self {
            Resolution::Resolved(reference) => Some(reference.clone()),
            Resolution::Hotlink => Some(MediaReference::hotlink()),
            Resolution::Miss => None,
        }
    }

    /// Reference of a real library item, if any
    pub fn media(&self) -> Option<&MediaReference> {
        match self {
            Resolution::Resolved(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Resolution::Miss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_maps_to_hotlink() {
        assert_eq!(
            Resolution::from_reference(MediaReference::hotlink()),
            Resolution::Hotlink
        );
        assert_eq!(
            Resolution::Hotlink.reference(),
            Some(MediaReference::new(0, 0, HOTLINK_SIZE))
        );
        assert!(Resolution::Hotlink.media().is_none());
    }

    #[test]
    fn test_resolved_reference() {
        let reference = MediaReference::new(42, 3, "thumbnail");
        let resolution = Resolution::from_reference(reference.clone());
        assert_eq!(resolution.media(), Some(&reference));
        assert!(!resolution.is_miss());
        assert!(Resolution::Miss.reference().is_none());
    }

    #[test]
    fn test_resolution_json_shape() {
        let json = serde_json::to_string(&Resolution::Hotlink).unwrap();
        assert_eq!(json, r#"{"status":"hotlink"}"#);
    }
}
