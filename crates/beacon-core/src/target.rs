//! The beacon being searched for and the rule that matches sightings against it.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{MatchedBy, Sighting};

/// The beacon to detect, by advertised name and/or MAC address.
///
/// Matching is permissive: a sighting matches if either configured field is equal
/// to the corresponding sighting field. Comparison is exact and case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "LibraryBeacon",
    "address": "AA:BB:CC:11:22:33"
}))]
pub struct Target {
    /// Advertised device name to match.
    #[schema(example = "LibraryBeacon")]
    #[serde(default)]
    pub name: Option<String>,

    /// Bluetooth MAC address to match.
    #[schema(example = "AA:BB:CC:11:22:33")]
    #[serde(default)]
    pub address: Option<String>,
}

impl Target {
    /// Target matching on advertised name only.
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: None,
        }
    }

    /// Target matching on MAC address only.
    pub fn by_address(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: Some(address.into()),
        }
    }

    /// Target matching on either name or address.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: Some(address.into()),
        }
    }

    /// Treat empty strings as unset.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.filter(|n| !n.is_empty()),
            address: self.address.filter(|a| !a.is_empty()),
        }
    }

    /// Returns `true` if neither field is set to a non-empty value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.as_deref().map_or(true, str::is_empty)
            && self.address.as_deref().map_or(true, str::is_empty)
    }

    /// Evaluate a sighting against this target.
    ///
    /// Returns which field(s) matched, or `None` if the sighting is not the beacon.
    #[must_use]
    pub fn matches(&self, sighting: &Sighting) -> Option<MatchedBy> {
        let by_name = match (self.name.as_deref(), sighting.device_name.as_deref()) {
            (Some(wanted), Some(seen)) => !wanted.is_empty() && wanted == seen,
            _ => false,
        };
        let by_address = self
            .address
            .as_deref()
            .is_some_and(|wanted| !wanted.is_empty() && wanted == sighting.device_address);

        match (by_name, by_address) {
            (true, true) => Some(MatchedBy::NameAndAddress),
            (true, false) => Some(MatchedBy::Name),
            (false, true) => Some(MatchedBy::Address),
            (false, false) => None,
        }
    }
}
