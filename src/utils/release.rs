//! Publication channel selection for release artifacts.
//!
//! The repository endpoints come from the `[publish]` section of the TOML
//! configuration. The defaults below are placeholders, since nothing ties the
//! crate to a particular Maven-style repository host.

use std::fmt;

pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

pub const DEFAULT_RELEASES_URL: &str = "https://repo.example.com/releases/";
pub const DEFAULT_SNAPSHOTS_URL: &str = "https://repo.example.com/snapshots/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishTarget {
    Releases,
    Snapshots,
}

impl fmt::Display for PublishTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PublishTarget::Releases => "releases",
            PublishTarget::Snapshots => "snapshots",
        })
    }
}

/// Release and snapshot repository endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repositories {
    pub releases: String,
    pub snapshots: String,
}

impl Default for Repositories {
    fn default() -> Self {
        Self {
            releases: DEFAULT_RELEASES_URL.to_string(),
            snapshots: DEFAULT_SNAPSHOTS_URL.to_string(),
        }
    }
}

impl Repositories {
    pub fn url(&self, target: PublishTarget) -> &str {
        match target {
            PublishTarget::Releases => &self.releases,
            PublishTarget::Snapshots => &self.snapshots,
        }
    }

    /// Repository URL for a build with the given version string.
    pub fn url_for(&self, version: &str) -> &str {
        self.url(publish_target(version))
    }
}

/// Picks the repository a build with the given version string is published to.
pub fn publish_target(version: &str) -> PublishTarget {
    if version.ends_with(SNAPSHOT_SUFFIX) {
        PublishTarget::Snapshots
    } else {
        PublishTarget::Releases
    }
}
