//! Async client for the snapd REST API.
//!
//! # Overview
//! snapd listens on a Unix domain socket (`/run/snapd.socket`) and speaks
//! HTTP/1.1 with JSON bodies framed in a `{type, result}` envelope.
//! `SnapdClient` exposes one method per endpoint: system info, store search,
//! snap listing and lifecycle, interfaces, services, logs, configuration and
//! changes.
//!
//! # Design
//! - `SnapdClient` holds an immutable `ClientConfig` and a `Transport`.
//! - Each operation is split into `build_*` (produces an `HttpRequest`, no
//!   I/O) and an async method that dispatches it, so request shapes can be
//!   tested without a daemon.
//! - Responses come back as an `Envelope` holding the daemon's JSON
//!   unchanged; error envelopes become `SnapdError::Daemon`.
//!
//! ```no_run
//! # async fn demo() -> Result<(), snapd_core::SnapdError> {
//! use snapd_core::{ClientConfig, InstallOptions, SnapdClient};
//!
//! let client = SnapdClient::new(ClientConfig::default());
//! let change = client.install("hello", &InstallOptions::default()).await?;
//! println!("started change {:?}", change.change());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod multipart;
pub mod transport;
pub mod types;

pub use client::SnapdClient;
pub use config::ClientConfig;
pub use envelope::{Envelope, ResponseType};
pub use error::{SnapdError, TransportError};
pub use crate::http::{HttpMethod, HttpRequest, HttpResponse, RequestBody};
pub use multipart::{FilePart, MultipartForm};
pub use transport::{Transport, UnixSocketTransport};
pub use types::{
    ChangesOptions, ChangesSelect, FindOptions, InstallOptions, InterfacesOptions,
    InterfacesSelect, ListOptions, LogsOptions, OneOrMany, Plug, RefreshOptions, RemoveOptions,
    RevertOptions, ServiceOptions, SideloadOptions, Slot, SnapFile,
};
