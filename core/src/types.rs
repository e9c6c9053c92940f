//! Typed inputs for the shorthand operations.
//!
//! # Design
//! Option structs serialize straight into request bodies: absent optional
//! fields and `false` flags are skipped rather than sent as `null`/`false`.
//! Query-only options are turned into parameters by the client instead.

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};

fn is_false(value: &bool) -> bool {
    !*value
}

/// A parameter that accepts either a single value or an ordered sequence.
///
/// A single value becomes a one-element sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OneOrMany<T>(Vec<T>);

impl<T> OneOrMany<T> {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<T> {
        self.0
    }
}

impl<T: AsRef<str>> OneOrMany<T> {
    /// Comma-joined form used in query strings.
    pub fn joined(&self) -> String {
        self.0
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(values: Vec<T>) -> Self {
        Self(values)
    }
}

impl From<&str> for OneOrMany<String> {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for OneOrMany<String> {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<&str>> for OneOrMany<String> {
    fn from(values: Vec<&str>) -> Self {
        Self(values.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for OneOrMany<String> {
    fn from(values: &[&str]) -> Self {
        Self(values.iter().map(|v| v.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for OneOrMany<String> {
    fn from(values: [&str; N]) -> Self {
        Self(values.iter().map(|v| v.to_string()).collect())
    }
}

impl From<Slot> for OneOrMany<Slot> {
    fn from(value: Slot) -> Self {
        Self(vec![value])
    }
}

impl From<Plug> for OneOrMany<Plug> {
    fn from(value: Plug) -> Self {
        Self(vec![value])
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OneOrMany<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr<T> {
            Many(Vec<T>),
            One(T),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Many(values) => Self(values),
            Repr::One(value) => Self(vec![value]),
        })
    }
}

/// The slot side of an interface connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub snap: String,
    pub slot: String,
}

impl Slot {
    pub fn new(snap: impl Into<String>, slot: impl Into<String>) -> Self {
        Self {
            snap: snap.into(),
            slot: slot.into(),
        }
    }
}

/// The plug side of an interface connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plug {
    pub snap: String,
    pub plug: String,
}

impl Plug {
    pub fn new(snap: impl Into<String>, plug: impl Into<String>) -> Self {
        Self {
            snap: snap.into(),
            plug: plug.into(),
        }
    }
}

/// A local `.snap` file to sideload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapFile {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

impl SnapFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type: "application/octet-stream".to_string(),
            data: data.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// Query options for `find`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FindOptions {
    /// Free-text search, sent as `q`.
    pub query: Option<String>,
    /// Exact snap name.
    pub name: Option<String>,
    pub section: Option<String>,
    /// `refresh` or `private`.
    pub select: Option<String>,
    /// `wide` searches all architectures/channels.
    pub scope: Option<String>,
    pub common_id: Option<String>,
}

/// Query options for `list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListOptions {
    /// Restrict the listing to these snaps.
    pub snaps: OneOrMany<String>,
    /// `all` includes disabled revisions.
    pub select: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InstallOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub classic: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub devmode: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub jailmode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cohort_key: Option<String>,
}

/// Flags for sideloading a snap file. Each flag is only sent when set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SideloadOptions {
    pub devmode: bool,
    pub dangerous: bool,
    pub classic: bool,
    pub jailmode: bool,
    /// Path of the snap on the daemon's filesystem, for try-mode installs.
    pub snap_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RemoveOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Skip the automatic snapshot of the snap's data.
    #[serde(skip_serializing_if = "is_false")]
    pub purge: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RefreshOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub classic: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub devmode: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub jailmode: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub ignore_validation: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RevertOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub classic: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub devmode: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub jailmode: bool,
}

/// Extra flags for `start`/`stop`/`restart`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOptions {
    /// With `start`: also enable the services at boot.
    #[serde(skip_serializing_if = "is_false")]
    pub enable: bool,
    /// With `stop`: also disable the services at boot.
    #[serde(skip_serializing_if = "is_false")]
    pub disable: bool,
    /// With `restart`: reload instead of restarting where supported.
    #[serde(skip_serializing_if = "is_false")]
    pub reload: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogsOptions {
    /// Number of lines; `-1` for everything.
    pub n: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterfacesSelect {
    All,
    Connected,
}

impl InterfacesSelect {
    pub fn as_str(self) -> &'static str {
        match self {
            InterfacesSelect::All => "all",
            InterfacesSelect::Connected => "connected",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InterfacesOptions {
    pub select: Option<InterfacesSelect>,
    pub slots: bool,
    pub plugs: bool,
    pub doc: bool,
    /// Restrict to these interface names.
    pub interfaces: OneOrMany<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangesSelect {
    All,
    InProgress,
    Ready,
}

impl ChangesSelect {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangesSelect::All => "all",
            ChangesSelect::InProgress => "in-progress",
            ChangesSelect::Ready => "ready",
        }
    }
}

/// Filters for listing changes. Ignored when a single change is requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChangesOptions {
    pub select: Option<ChangesSelect>,
    /// Only changes affecting this snap; sent as `for`.
    pub snap: Option<String>,
}
