//! Public value types returned by the runtime facade.

use std::fmt;

use capsule_shared::errors::{CapsuleError, CapsuleResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DIGEST_PREFIX: &str = "sha256:";
const DIGEST_HEX_LEN: usize = 64;
const SHORT_ID_LEN: usize = 12;

// ============================================================================
// IMAGE ID
// ============================================================================

/// Content-derived image identifier (`sha256:<64 hex>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageId(String);

impl ImageId {
    /// Build an id from a lowercase hex sha256 digest.
    pub fn from_hex(hex: &str) -> CapsuleResult<Self> {
        if hex.len() != DIGEST_HEX_LEN || !is_lower_hex(hex) {
            return Err(CapsuleError::InvalidArgument(format!(
                "invalid image digest: {hex}"
            )));
        }
        Ok(Self(format!("{DIGEST_PREFIX}{hex}")))
    }

    /// Parse `sha256:<hex>`.
    pub fn parse(value: &str) -> CapsuleResult<Self> {
        let hex = value.strip_prefix(DIGEST_PREFIX).ok_or_else(|| {
            CapsuleError::InvalidArgument(format!("image id must start with {DIGEST_PREFIX}: {value}"))
        })?;
        Self::from_hex(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digest without the algorithm prefix.
    pub fn hex(&self) -> &str {
        &self.0[DIGEST_PREFIX.len()..]
    }

    /// First 12 hex characters, as shown in listings.
    pub fn short(&self) -> &str {
        &self.hex()[..SHORT_ID_LEN]
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ImageId {
    type Error = CapsuleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ImageId> for String {
    fn from(id: ImageId) -> Self {
        id.0
    }
}

pub(crate) fn is_lower_hex(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

// ============================================================================
// INSTANCE ID
// ============================================================================

/// Identifier of one launch (one container instance).
///
/// ULID: sortable by start time, 26 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// LISTINGS
// ============================================================================

/// One row of `capsule images`.
#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo {
    pub id: ImageId,
    /// Tag references pointing at this image (e.g. `giftbot:1.0`); empty when untagged.
    pub tags: Vec<String>,
    /// Base runtime the image was built from.
    pub base: String,
    pub created_at: DateTime<Utc>,
    /// Total size of the image directory in bytes.
    pub size: u64,
}

/// One row of `capsule runtime ls`.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeInfo {
    pub reference: String,
    pub interpreter: String,
    /// Number of package versions in the runtime's index.
    pub packages: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn test_image_id_round_trip() {
        let id = ImageId::from_hex(HEX).unwrap();
        assert_eq!(id.as_str(), format!("sha256:{HEX}"));
        assert_eq!(id.hex(), HEX);
        assert_eq!(id.short(), "0123456789ab");
        assert_eq!(ImageId::parse(id.as_str()).unwrap(), id);
    }

    #[test]
    fn test_image_id_rejects_malformed() {
        assert!(ImageId::from_hex("abc").is_err());
        assert!(ImageId::from_hex(&HEX.to_uppercase()).is_err());
        assert!(ImageId::parse(HEX).is_err());
        assert!(ImageId::parse("md5:0123").is_err());
    }

    #[test]
    fn test_image_id_serde() {
        let id = ImageId::from_hex(HEX).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"sha256:{HEX}\""));

        let back: ImageId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<ImageId>("\"sha256:nothex\"").is_err());
    }

    #[test]
    fn test_instance_ids_are_unique_ulids() {
        let a = InstanceId::generate();
        let b = InstanceId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 26);
    }
}
