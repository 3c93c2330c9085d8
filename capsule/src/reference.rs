//! `name:tag` references for base runtimes and output images.
//!
//! Both kinds share one grammar:
//! - name: one or more `/`-separated components of `[a-z0-9]` with single
//!   `.`, `_` or `-` separators inside a component
//! - tag: `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`
//!
//! Base runtime references must carry a pinned tag (never `latest`); image
//! tags default to `latest` when omitted.

use std::fmt;
use std::str::FromStr;

use capsule_shared::errors::{CapsuleError, CapsuleResult};
use serde::{Deserialize, Serialize};

use crate::runtime::constants::references::{DEFAULT_IMAGE_TAG, FLOATING_TAG};

const MAX_TAG_LEN: usize = 128;

/// A parsed `name:tag` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Reference {
    name: String,
    tag: String,
}

impl Reference {
    /// Parse a base runtime reference. The tag is mandatory and pinned.
    pub fn parse_pinned(value: &str) -> CapsuleResult<Self> {
        let (name, tag) = split(value);
        let tag = tag.ok_or_else(|| {
            CapsuleError::BaseImageUnavailable(format!(
                "{value}: base runtime must be pinned to an explicit version tag"
            ))
        })?;
        if tag == FLOATING_TAG {
            return Err(CapsuleError::BaseImageUnavailable(format!(
                "{value}: '{FLOATING_TAG}' is not a pinned version tag"
            )));
        }

        validate_name(name).map_err(|reason| {
            CapsuleError::BaseImageUnavailable(format!("{value}: {reason}"))
        })?;
        validate_tag(tag).map_err(|reason| {
            CapsuleError::BaseImageUnavailable(format!("{value}: {reason}"))
        })?;

        Ok(Self {
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Parse an image tag reference; a missing tag becomes `latest`.
    pub fn parse_image_tag(value: &str) -> CapsuleResult<Self> {
        let (name, tag) = split(value);
        let tag = tag.unwrap_or(DEFAULT_IMAGE_TAG);

        validate_name(name)
            .and_then(|_| validate_tag(tag))
            .map_err(|reason| CapsuleError::InvalidArgument(format!("{value}: {reason}")))?;

        Ok(Self {
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

impl FromStr for Reference {
    type Err = CapsuleError;

    /// Parses the strict `name:tag` form without defaults.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, tag) = split(s);
        let tag = tag.ok_or_else(|| CapsuleError::InvalidArgument(format!("{s}: missing tag")))?;
        validate_name(name)
            .and_then(|_| validate_tag(tag))
            .map_err(|reason| CapsuleError::InvalidArgument(format!("{s}: {reason}")))?;
        Ok(Self {
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }
}

impl TryFrom<String> for Reference {
    type Error = CapsuleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Reference> for String {
    fn from(reference: Reference) -> Self {
        reference.to_string()
    }
}

/// Split at the last `:` that is not part of the name path.
fn split(value: &str) -> (&str, Option<&str>) {
    match value.rfind(':') {
        Some(pos) if !value[pos + 1..].contains('/') => (&value[..pos], Some(&value[pos + 1..])),
        _ => (value, None),
    }
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name must not be empty".into());
    }
    for component in name.split('/') {
        if component.is_empty() {
            return Err("name has an empty path component".into());
        }
        let bytes = component.as_bytes();
        let is_alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
        let is_sep = |b: u8| matches!(b, b'.' | b'_' | b'-');

        if !is_alnum(bytes[0]) || !is_alnum(bytes[bytes.len() - 1]) {
            return Err(format!(
                "component '{component}' must start and end with [a-z0-9]"
            ));
        }
        if let Some(bad) = bytes.iter().find(|b| !is_alnum(**b) && !is_sep(**b)) {
            return Err(format!(
                "component '{component}' contains forbidden character {:?}",
                *bad as char
            ));
        }
        if bytes.windows(2).any(|w| is_sep(w[0]) && is_sep(w[1])) {
            return Err(format!("component '{component}' has consecutive separators"));
        }
    }
    Ok(())
}

fn validate_tag(tag: &str) -> Result<(), String> {
    if tag.is_empty() {
        return Err("tag must not be empty".into());
    }
    if tag.len() > MAX_TAG_LEN {
        return Err(format!("tag is longer than {MAX_TAG_LEN} characters"));
    }
    let mut chars = tag.chars();
    let first = chars.next().unwrap_or('.');
    if !(first.is_ascii_alphanumeric() || first == '_') {
        return Err(format!("tag '{tag}' must start with [A-Za-z0-9_]"));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))) {
        return Err(format!("tag '{tag}' contains forbidden character {bad:?}"));
    }
    Ok(())
}
