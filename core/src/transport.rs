//! Transports that carry an `HttpRequest` to snapd and bring back the
//! buffered `HttpResponse`.
//!
//! # Design
//! `UnixSocketTransport` opens one connection per request, runs a single
//! HTTP/1.1 exchange over it with hyper and drops it afterwards. There is no
//! pooling, retrying or timeout; callers wrap the future themselves if they
//! need one.

use std::future::Future;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use ::http::Request;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tracing::{debug, trace};

use crate::error::{SnapdError, TransportError};
use crate::http::{HttpRequest, HttpResponse, RequestBody};

/// Executes a request against snapd.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, SnapdError>> + Send;
}

/// HTTP over the snapd Unix domain socket.
#[derive(Debug, Clone)]
pub struct UnixSocketTransport {
    socket_path: PathBuf,
}

impl UnixSocketTransport {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Transport for UnixSocketTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SnapdError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| TransportError::Connect {
                socket: self.socket_path.clone(),
                source,
            })?;

        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(TransportError::Handshake)?;

        tokio::spawn(async move {
            if let Err(error) = connection.await {
                trace!(%error, "snapd connection closed with an error");
            }
        });

        let response = sender
            .send_request(into_hyper_request(request)?)
            .await
            .map_err(TransportError::Request)?;

        let status = response.status().as_u16();

        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(TransportError::Body)?
            .to_bytes();

        debug!(status, bytes = body.len(), "received snapd response");

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

fn into_hyper_request(request: HttpRequest) -> Result<Request<Full<Bytes>>, TransportError> {
    let mut builder = Request::builder()
        .method(request.method.as_str())
        .uri(request.target());

    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let body = match request.body {
        None => Bytes::new(),
        Some(RequestBody::Json(json)) => Bytes::from(json),
        Some(RequestBody::Multipart(form)) => form.encode(),
    };

    builder
        .body(Full::new(body))
        .map_err(TransportError::InvalidRequest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::multipart::MultipartForm;

    fn request(body: Option<RequestBody>) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            version: "2".to_string(),
            path: "snaps".to_string(),
            query: vec![("select".to_string(), "all".to_string())],
            headers: vec![
                ("Host".to_string(), String::new()),
                ("X-Allow-Interaction".to_string(), "false".to_string()),
            ],
            body,
        }
    }

    #[test]
    fn hyper_request_carries_target_and_headers() {
        let req = into_hyper_request(request(Some(RequestBody::Json("{}".to_string())))).unwrap();

        assert_eq!(req.method(), ::http::Method::POST);
        assert_eq!(req.uri(), "/v2/snaps?select=all");
        assert_eq!(req.headers()["host"], "");
        assert_eq!(req.headers()["x-allow-interaction"], "false");
    }

    #[tokio::test]
    async fn multipart_body_is_encoded() {
        let form = MultipartForm::with_boundary("B").text("action", "install");
        let expected = form.encode();

        let req = into_hyper_request(request(Some(RequestBody::Multipart(form)))).unwrap();
        let body = req.into_body().collect().await.unwrap().to_bytes();

        assert_eq!(body, expected);
    }

    #[tokio::test]
    async fn missing_socket_is_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let transport = UnixSocketTransport::new(dir.path().join("absent.socket"));

        let err = transport.send(request(None)).await.unwrap_err();

        assert!(matches!(
            err,
            SnapdError::Transport(TransportError::Connect { .. })
        ));
        assert!(err.is_daemon_unavailable());
    }
}
