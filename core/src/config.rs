//! Connection settings for a `SnapdClient`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_SOCKET_PATH: &str = "/run/snapd.socket";
pub const DEFAULT_API_VERSION: &str = "2";

/// Where snapd lives and how requests to it are framed.
///
/// Fixed once handed to a client. Deserializable so it can be embedded in a
/// larger configuration file; missing keys fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClientConfig {
    socket_path: PathBuf,
    version: String,
    allow_interaction: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            version: DEFAULT_API_VERSION.to_string(),
            allow_interaction: false,
        }
    }
}

impl ClientConfig {
    pub fn with_socket_path(mut self, socket_path: impl Into<PathBuf>) -> Self {
        self.socket_path = socket_path.into();
        self
    }

    pub fn with_version(mut self, version: impl ToString) -> Self {
        self.version = version.to_string();
        self
    }

    /// Whether snapd may prompt the user (e.g. for polkit authorization)
    /// while serving a request. Sent as `X-Allow-Interaction`.
    pub fn with_allow_interaction(mut self, allow: bool) -> Self {
        self.allow_interaction = allow;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn allow_interaction(&self) -> bool {
        self.allow_interaction
    }
}
