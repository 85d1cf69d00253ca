// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Project manifest layout.
//!
//! Every application managed by refit carries a manifest file at the
//! top-level of its working copy. The manifest is a flat listing of
//! `key = "value"` pairs naming the project, its version, and optionally the
//! service unit that runs it and the path used to launch it. The format is a
//! strict subset of TOML, so parsing is delegated to [`toml`].
//!
//! The manifest is read-only metadata. Refit never writes it; the file is
//! tracked in the application's own repository and travels with the code it
//! describes.

use serde::Deserialize;
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Default manifest filename at the working copy's top-level.
pub const MANIFEST_FILE: &str = "refit.toml";

/// Project metadata for the managed application.
///
/// `name` and `version` are mandatory. No script is allowed to proceed
/// without them, because every user-facing message and every refresh
/// confirmation is phrased in terms of them. The service unit name and
/// launch path are optional operational settings.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ProjectManifest {
    /// Name of the managed application.
    pub name: String,

    /// Version string of the currently deployed code.
    pub version: String,

    /// Systemd unit that runs the application, if any.
    pub service_name: Option<String>,

    /// Path used by the process supervisor to launch the application.
    pub launch_path: Option<PathBuf>,
}

impl ProjectManifest {
    /// Load manifest from file.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::ConfigMissing`] if the file cannot be read.
    /// - Return [`ManifestError::FieldMissing`] if a mandatory field is
    ///   absent or empty.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = read_to_string(path.as_ref()).map_err(|err| ManifestError::ConfigMissing {
            path: path.as_ref().to_path_buf(),
            source: err,
        })?;

        data.parse()
    }
}

impl FromStr for ProjectManifest {
    type Err = ManifestError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let raw: RawManifest = toml::de::from_str(data).map_err(ManifestError::Deserialize)?;

        let name = raw
            .name
            .filter(|name| !name.is_empty())
            .ok_or(ManifestError::FieldMissing("name"))?;
        let version = raw
            .version
            .filter(|version| !version.is_empty())
            .ok_or(ManifestError::FieldMissing("version"))?;

        // INVARIANT: Perform shell expansion on launch path field.
        let launch_path = match raw.launch_path {
            Some(path) => Some(PathBuf::from(
                shellexpand::full(path.as_str())
                    .map_err(ManifestError::ShellExpansion)?
                    .into_owned(),
            )),
            None => None,
        };

        Ok(Self {
            name,
            version,
            service_name: raw.service_name.filter(|service| !service.is_empty()),
            launch_path,
        })
    }
}

/// Raw deserialization target before mandatory-field validation.
#[derive(Default, Debug, Deserialize)]
struct RawManifest {
    name: Option<String>,
    version: Option<String>,
    service_name: Option<String>,
    launch_path: Option<String>,
}

/// Manifest error types.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Manifest file absent or unreadable.
    #[error("cannot read manifest file {path:?}")]
    ConfigMissing {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to deserialize manifest.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Mandatory field absent or empty.
    #[error("manifest field {0:?} is missing or empty")]
    FieldMissing(&'static str),

    /// Failed to perform shell expansion on manifest.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

/// Friendly result alias :3
type Result<T, E = ManifestError> = std::result::Result<T, E>;
