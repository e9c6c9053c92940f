//! Request builder, dispatcher and shorthand operations for the snapd API.
//!
//! # Design
//! `SnapdClient` holds an immutable `ClientConfig` and a `Transport`. Each
//! operation is split in two: a pure `build_*` method that produces an
//! `HttpRequest`, and an async method of the same name that builds, sends
//! the request through `dispatch` and interprets the envelope. The builders
//! never touch the socket, so every request shape is testable without a
//! daemon.

use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::config::ClientConfig;
use crate::envelope::Envelope;
use crate::error::SnapdError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, RequestBody};
use crate::multipart::{FilePart, MultipartForm};
use crate::transport::{Transport, UnixSocketTransport};
use crate::types::{
    ChangesOptions, FindOptions, InstallOptions, InterfacesOptions, ListOptions, LogsOptions,
    OneOrMany, Plug, RefreshOptions, RemoveOptions, RevertOptions, ServiceOptions,
    SideloadOptions, Slot, SnapFile,
};

/// Client for the snapd REST API.
#[derive(Debug, Clone)]
pub struct SnapdClient<T = UnixSocketTransport> {
    config: ClientConfig,
    transport: T,
}

impl SnapdClient {
    /// Creates a client talking to the socket named in `config`.
    pub fn new(config: ClientConfig) -> Self {
        let transport = UnixSocketTransport::new(config.socket_path());
        Self { config, transport }
    }
}

impl Default for SnapdClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

/// `{"action": ..., <options>}` bodies for `POST snaps/<name>`.
#[derive(Serialize)]
struct SnapAction<'a, O> {
    action: &'static str,
    #[serde(flatten)]
    options: &'a O,
}

#[derive(Serialize)]
struct ConnectionAction<'a> {
    action: &'static str,
    slots: &'a [Slot],
    plugs: &'a [Plug],
}

#[derive(Serialize)]
struct AppsAction<'a> {
    action: &'static str,
    names: &'a [String],
    #[serde(flatten)]
    options: &'a ServiceOptions,
}

impl<T> SnapdClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// A bodiless request for `path` carrying the fixed snapd headers.
    ///
    /// Entry point for endpoints without a dedicated shorthand.
    pub fn request(&self, method: HttpMethod, path: impl Into<String>) -> HttpRequest {
        let path = path.into();

        HttpRequest {
            method,
            version: self.config.version().to_string(),
            path: path.trim_start_matches('/').to_string(),
            query: Vec::new(),
            headers: vec![
                ("Host".to_string(), String::new()),
                (
                    "X-Allow-Interaction".to_string(),
                    self.config.allow_interaction().to_string(),
                ),
            ],
            body: None,
        }
    }

    fn json_request<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: impl Into<String>,
        body: &B,
    ) -> Result<HttpRequest, SnapdError> {
        let body = serde_json::to_string(body).map_err(SnapdError::Serialize)?;

        let mut req = self.request(method, path);
        req.headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        req.body = Some(RequestBody::Json(body));

        Ok(req)
    }

    fn snap_action<O: Serialize>(
        &self,
        snap: &str,
        action: &'static str,
        options: &O,
    ) -> Result<HttpRequest, SnapdError> {
        self.json_request(
            HttpMethod::Post,
            format!("snaps/{snap}"),
            &SnapAction { action, options },
        )
    }

    // -----------------------------------------------------------------------
    // Builders
    // -----------------------------------------------------------------------

    pub fn build_system_info(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "system-info")
    }

    pub fn build_find(&self, options: &FindOptions) -> HttpRequest {
        let mut req = self.request(HttpMethod::Get, "find");

        let params = [
            ("q", &options.query),
            ("name", &options.name),
            ("section", &options.section),
            ("select", &options.select),
            ("scope", &options.scope),
            ("common-id", &options.common_id),
        ];

        for (key, value) in params {
            if let Some(value) = value {
                req.set_query(key, value.as_str());
            }
        }

        req
    }

    pub fn build_list(&self, options: &ListOptions) -> HttpRequest {
        let mut req = self.request(HttpMethod::Get, "snaps");

        if !options.snaps.is_empty() {
            req.set_query("snaps", options.snaps.joined());
        }
        if let Some(select) = &options.select {
            req.set_query("select", select.as_str());
        }

        req
    }

    /// Inspects one installed snap. An empty name lists them all, like
    /// `build_list` without options.
    pub fn build_info(&self, snap: &str) -> HttpRequest {
        if snap.is_empty() {
            return self.request(HttpMethod::Get, "snaps");
        }

        self.request(HttpMethod::Get, format!("snaps/{snap}"))
    }

    /// Installs `snap` from the store.
    pub fn build_install(
        &self,
        snap: &str,
        options: &InstallOptions,
    ) -> Result<HttpRequest, SnapdError> {
        self.snap_action(snap, "install", options)
    }

    /// Sideloads a local snap file as a multipart upload.
    pub fn build_install_file(&self, file: SnapFile, options: &SideloadOptions) -> HttpRequest {
        let flags = [
            ("devmode", options.devmode),
            ("dangerous", options.dangerous),
            ("classic", options.classic),
            ("jailmode", options.jailmode),
        ];

        let mut form = MultipartForm::new().text("action", "install");

        for (flag, set) in flags {
            if set {
                form = form.text(flag, "true");
            }
        }

        if let Some(snap_path) = &options.snap_path {
            form = form.text("snap-path", snap_path.as_str());
        }

        let form = form.file(FilePart {
            name: "snap".to_string(),
            filename: file.filename,
            content_type: file.content_type,
            data: file.data,
        });

        let mut req = self.request(HttpMethod::Post, "snaps");
        req.headers
            .push(("Content-Type".to_string(), form.content_type()));
        req.body = Some(RequestBody::Multipart(form));
        req
    }

    pub fn build_remove(
        &self,
        snap: &str,
        options: &RemoveOptions,
    ) -> Result<HttpRequest, SnapdError> {
        self.snap_action(snap, "remove", options)
    }

    pub fn build_refresh(
        &self,
        snap: &str,
        options: &RefreshOptions,
    ) -> Result<HttpRequest, SnapdError> {
        self.snap_action(snap, "refresh", options)
    }

    pub fn build_revert(
        &self,
        snap: &str,
        options: &RevertOptions,
    ) -> Result<HttpRequest, SnapdError> {
        self.snap_action(snap, "revert", options)
    }

    pub fn build_enable(&self, snap: &str) -> Result<HttpRequest, SnapdError> {
        self.snap_action(snap, "enable", &json!({}))
    }

    pub fn build_disable(&self, snap: &str) -> Result<HttpRequest, SnapdError> {
        self.snap_action(snap, "disable", &json!({}))
    }

    pub fn build_interfaces(&self, options: &InterfacesOptions) -> HttpRequest {
        let mut req = self.request(HttpMethod::Get, "interfaces");

        if let Some(select) = options.select {
            req.set_query("select", select.as_str());
        }

        for (flag, set) in [
            ("slots", options.slots),
            ("plugs", options.plugs),
            ("doc", options.doc),
        ] {
            if set {
                req.set_query(flag, "true");
            }
        }

        if !options.interfaces.is_empty() {
            req.set_query("interfaces", options.interfaces.joined());
        }

        req
    }

    pub fn build_connect(
        &self,
        slots: impl Into<OneOrMany<Slot>>,
        plugs: impl Into<OneOrMany<Plug>>,
    ) -> Result<HttpRequest, SnapdError> {
        self.connection_action("connect", slots.into(), plugs.into())
    }

    pub fn build_disconnect(
        &self,
        slots: impl Into<OneOrMany<Slot>>,
        plugs: impl Into<OneOrMany<Plug>>,
    ) -> Result<HttpRequest, SnapdError> {
        self.connection_action("disconnect", slots.into(), plugs.into())
    }

    fn connection_action(
        &self,
        action: &'static str,
        slots: OneOrMany<Slot>,
        plugs: OneOrMany<Plug>,
    ) -> Result<HttpRequest, SnapdError> {
        self.json_request(
            HttpMethod::Post,
            "interfaces",
            &ConnectionAction {
                action,
                slots: slots.as_slice(),
                plugs: plugs.as_slice(),
            },
        )
    }

    /// Lists services; all of them when `names` is empty.
    pub fn build_services(&self, names: impl Into<OneOrMany<String>>) -> HttpRequest {
        let names = names.into();
        let mut req = self.request(HttpMethod::Get, "apps");

        req.set_query("select", "service");
        if !names.is_empty() {
            req.set_query("names", names.joined());
        }

        req
    }

    pub fn build_start(
        &self,
        names: impl Into<OneOrMany<String>>,
        options: &ServiceOptions,
    ) -> Result<HttpRequest, SnapdError> {
        self.apps_action("start", names.into(), options)
    }

    pub fn build_stop(
        &self,
        names: impl Into<OneOrMany<String>>,
        options: &ServiceOptions,
    ) -> Result<HttpRequest, SnapdError> {
        self.apps_action("stop", names.into(), options)
    }

    pub fn build_restart(
        &self,
        names: impl Into<OneOrMany<String>>,
        options: &ServiceOptions,
    ) -> Result<HttpRequest, SnapdError> {
        self.apps_action("restart", names.into(), options)
    }

    fn apps_action(
        &self,
        action: &'static str,
        names: OneOrMany<String>,
        options: &ServiceOptions,
    ) -> Result<HttpRequest, SnapdError> {
        self.json_request(
            HttpMethod::Post,
            "apps",
            &AppsAction {
                action,
                names: names.as_slice(),
                options,
            },
        )
    }

    pub fn build_logs(
        &self,
        names: impl Into<OneOrMany<String>>,
        options: &LogsOptions,
    ) -> HttpRequest {
        let names = names.into();
        let mut req = self.request(HttpMethod::Get, "logs");

        if !names.is_empty() {
            req.set_query("names", names.joined());
        }
        if let Some(n) = options.n {
            req.set_query("n", n.to_string());
        }

        req
    }

    /// Reads configuration of `snap`; the whole document when `keys` is
    /// empty.
    pub fn build_get(&self, snap: &str, keys: impl Into<OneOrMany<String>>) -> HttpRequest {
        let keys = keys.into();
        let mut req = self.request(HttpMethod::Get, format!("snaps/{snap}/conf"));

        if !keys.is_empty() {
            req.set_query("keys", keys.joined());
        }

        req
    }

    /// Applies `patch`, a JSON object of key to value, to the configuration
    /// of `snap`.
    pub fn build_set<P: Serialize + ?Sized>(
        &self,
        snap: &str,
        patch: &P,
    ) -> Result<HttpRequest, SnapdError> {
        self.json_request(HttpMethod::Put, format!("snaps/{snap}/conf"), patch)
    }

    /// Lists changes, or fetches a single one when `id` is given.
    pub fn build_changes(&self, id: Option<&str>, options: &ChangesOptions) -> HttpRequest {
        match id {
            Some(id) => self.request(HttpMethod::Get, format!("changes/{id}")),
            None => {
                let mut req = self.request(HttpMethod::Get, "changes");

                if let Some(select) = options.select {
                    req.set_query("select", select.as_str());
                }
                if let Some(snap) = &options.snap {
                    req.set_query("for", snap.as_str());
                }

                req
            }
        }
    }

    pub fn build_abort_change(&self, id: &str) -> Result<HttpRequest, SnapdError> {
        self.json_request(
            HttpMethod::Post,
            format!("changes/{id}"),
            &json!({ "action": "abort" }),
        )
    }

    // -----------------------------------------------------------------------
    // Response handling
    // -----------------------------------------------------------------------

    /// Decodes the envelope, failing on `"type": "error"`.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Envelope, SnapdError> {
        Envelope::from_response(&response)
    }
}

impl<T: Transport> SnapdClient<T> {
    /// Sends `request` and interprets the response.
    pub async fn dispatch(&self, request: HttpRequest) -> Result<Envelope, SnapdError> {
        debug!(
            method = request.method.as_str(),
            target = %request.target(),
            "dispatching snapd request"
        );

        let response = self.transport.send(request).await?;
        self.parse_response(response)
    }

    pub async fn system_info(&self) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_system_info()).await
    }

    pub async fn find(&self, options: &FindOptions) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_find(options)).await
    }

    pub async fn list(&self, options: &ListOptions) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_list(options)).await
    }

    pub async fn info(&self, snap: &str) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_info(snap)).await
    }

    pub async fn install(
        &self,
        snap: &str,
        options: &InstallOptions,
    ) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_install(snap, options)?).await
    }

    pub async fn install_file(
        &self,
        file: SnapFile,
        options: &SideloadOptions,
    ) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_install_file(file, options)).await
    }

    pub async fn remove(
        &self,
        snap: &str,
        options: &RemoveOptions,
    ) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_remove(snap, options)?).await
    }

    pub async fn refresh(
        &self,
        snap: &str,
        options: &RefreshOptions,
    ) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_refresh(snap, options)?).await
    }

    pub async fn revert(
        &self,
        snap: &str,
        options: &RevertOptions,
    ) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_revert(snap, options)?).await
    }

    pub async fn enable(&self, snap: &str) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_enable(snap)?).await
    }

    pub async fn disable(&self, snap: &str) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_disable(snap)?).await
    }

    pub async fn interfaces(&self, options: &InterfacesOptions) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_interfaces(options)).await
    }

    pub async fn connect(
        &self,
        slots: impl Into<OneOrMany<Slot>>,
        plugs: impl Into<OneOrMany<Plug>>,
    ) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_connect(slots, plugs)?).await
    }

    pub async fn disconnect(
        &self,
        slots: impl Into<OneOrMany<Slot>>,
        plugs: impl Into<OneOrMany<Plug>>,
    ) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_disconnect(slots, plugs)?).await
    }

    pub async fn services(
        &self,
        names: impl Into<OneOrMany<String>>,
    ) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_services(names)).await
    }

    pub async fn start(
        &self,
        names: impl Into<OneOrMany<String>>,
        options: &ServiceOptions,
    ) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_start(names, options)?).await
    }

    pub async fn stop(
        &self,
        names: impl Into<OneOrMany<String>>,
        options: &ServiceOptions,
    ) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_stop(names, options)?).await
    }

    pub async fn restart(
        &self,
        names: impl Into<OneOrMany<String>>,
        options: &ServiceOptions,
    ) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_restart(names, options)?).await
    }

    pub async fn logs(
        &self,
        names: impl Into<OneOrMany<String>>,
        options: &LogsOptions,
    ) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_logs(names, options)).await
    }

    pub async fn get(
        &self,
        snap: &str,
        keys: impl Into<OneOrMany<String>>,
    ) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_get(snap, keys)).await
    }

    pub async fn set<P: Serialize + ?Sized>(
        &self,
        snap: &str,
        patch: &P,
    ) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_set(snap, patch)?).await
    }

    pub async fn changes(
        &self,
        id: Option<&str>,
        options: &ChangesOptions,
    ) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_changes(id, options)).await
    }

    pub async fn abort_change(&self, id: &str) -> Result<Envelope, SnapdError> {
        self.dispatch(self.build_abort_change(id)?).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;
    use rstest::rstest;
    use serde_json::Value;

    use super::*;
    use crate::envelope::ResponseType;

    fn client() -> SnapdClient {
        SnapdClient::default()
    }

    fn json_body(req: &HttpRequest) -> Value {
        serde_json::from_str(req.json_body().unwrap()).unwrap()
    }

    /// Records requests and answers each with the same canned body.
    struct CannedTransport {
        body: &'static str,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl CannedTransport {
        fn new(body: &'static str) -> Self {
            Self {
                body,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for CannedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SnapdError> {
            self.seen.lock().unwrap().push(request);

            Ok(HttpResponse {
                status: 200,
                headers: vec![("content-type".to_string(), "application/json".to_string())],
                body: self.body.as_bytes().to_vec(),
            })
        }
    }

    #[test]
    fn every_request_carries_fixed_headers() {
        let req = client().build_system_info();

        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.target(), "/v2/system-info");
        assert_eq!(req.header("host"), Some(""));
        assert_eq!(req.header("x-allow-interaction"), Some("false"));
        assert!(req.body.is_none());
    }

    #[test]
    fn configuration_shapes_target_and_interaction_header() {
        let client = SnapdClient::new(
            ClientConfig::default()
                .with_version(3)
                .with_allow_interaction(true),
        );
        let req = client.build_info("hello");

        assert_eq!(req.target(), "/v3/snaps/hello");
        assert_eq!(req.header("x-allow-interaction"), Some("true"));
    }

    #[test]
    fn leading_slash_is_stripped() {
        let req = client().request(HttpMethod::Get, "/snaps");
        assert_eq!(req.target(), "/v2/snaps");
    }

    #[test]
    fn info_without_name_lists_snaps() {
        let c = client();

        assert_eq!(c.build_info("").target(), "/v2/snaps");
        assert_eq!(c.build_info("hello").target(), "/v2/snaps/hello");
    }

    #[test]
    fn changes_without_id_omits_segment() {
        let c = client();

        assert_eq!(c.build_changes(None, &Default::default()).path, "changes");
        assert_eq!(
            c.build_changes(Some("0"), &Default::default()).path,
            "changes/0"
        );
    }

    #[test]
    fn changes_filters_apply_to_listing() {
        let options = ChangesOptions {
            select: Some(crate::types::ChangesSelect::InProgress),
            snap: Some("hello".to_string()),
        };
        let req = client().build_changes(None, &options);

        assert_eq!(req.target(), "/v2/changes?select=in-progress&for=hello");
    }

    #[test]
    fn list_joins_snaps_with_commas() {
        let options = ListOptions {
            snaps: vec!["a", "b"].into(),
            ..Default::default()
        };
        let req = client().build_list(&options);

        assert_eq!(req.path, "snaps");
        assert_eq!(req.query_value("snaps"), Some("a,b"));
    }

    #[test]
    fn list_without_snaps_has_no_query() {
        let req = client().build_list(&ListOptions::default());
        assert!(req.query.is_empty());
    }

    #[test]
    fn install_from_store_sends_json_action() {
        let options = InstallOptions {
            channel: Some("stable".to_string()),
            ..Default::default()
        };
        let req = client().build_install("foo", &options).unwrap();

        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "snaps/foo");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(
            json_body(&req),
            json!({"action": "install", "channel": "stable"})
        );
    }

    #[test]
    fn install_file_sends_only_set_flags() {
        let options = SideloadOptions {
            devmode: true,
            ..Default::default()
        };
        let file = SnapFile::new("hello_1.0_amd64.snap", Bytes::from_static(b"hsqs"));
        let req = client().build_install_file(file, &options);

        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "snaps");
        assert!(req.json_body().is_none());

        let form = req.form().unwrap();
        assert_eq!(req.header("content-type"), Some(form.content_type().as_str()));
        assert_eq!(form.field("action"), Some("install"));
        assert_eq!(form.field("devmode"), Some("true"));
        assert_eq!(form.field("dangerous"), None);
        assert_eq!(form.field("classic"), None);
        assert_eq!(form.field("jailmode"), None);
        assert_eq!(form.field("snap-path"), None);

        let [file] = form.files() else {
            panic!("expected exactly one file part");
        };
        assert_eq!(file.name, "snap");
        assert_eq!(file.filename, "hello_1.0_amd64.snap");
        assert_eq!(file.content_type, "application/octet-stream");
        assert_eq!(file.data, Bytes::from_static(b"hsqs"));
    }

    #[test]
    fn remove_refresh_revert_carry_action() {
        let c = client();

        let remove = c
            .build_remove(
                "foo",
                &RemoveOptions {
                    purge: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(json_body(&remove), json!({"action": "remove", "purge": true}));

        let refresh = c.build_refresh("foo", &RefreshOptions::default()).unwrap();
        assert_eq!(json_body(&refresh), json!({"action": "refresh"}));

        let revert = c
            .build_revert(
                "foo",
                &RevertOptions {
                    revision: Some("3".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(json_body(&revert), json!({"action": "revert", "revision": "3"}));
    }

    #[test]
    fn enable_and_disable_send_bare_action() {
        let c = client();

        assert_eq!(json_body(&c.build_enable("foo").unwrap()), json!({"action": "enable"}));
        assert_eq!(
            json_body(&c.build_disable("foo").unwrap()),
            json!({"action": "disable"})
        );
    }

    #[test]
    fn connect_wraps_single_slot_and_plug() {
        let req = client()
            .build_connect(Slot::new("core", "network"), Plug::new("hello", "network"))
            .unwrap();

        assert_eq!(req.path, "interfaces");
        assert_eq!(
            json_body(&req),
            json!({
                "action": "connect",
                "slots": [{"snap": "core", "slot": "network"}],
                "plugs": [{"snap": "hello", "plug": "network"}],
            })
        );
    }

    #[rstest]
    #[case::connect("connect")]
    #[case::disconnect("disconnect")]
    fn scalar_endpoints_match_one_element_sequences(#[case] action: &str) {
        let c = client();
        let slot = Slot::new("core", "home");
        let plug = Plug::new("hello", "home");

        let (scalar, sequence) = match action {
            "connect" => (
                c.build_connect(slot.clone(), plug.clone()),
                c.build_connect(vec![slot], vec![plug]),
            ),
            _ => (
                c.build_disconnect(slot.clone(), plug.clone()),
                c.build_disconnect(vec![slot], vec![plug]),
            ),
        };

        assert_eq!(scalar.unwrap(), sequence.unwrap());
    }

    #[rstest]
    #[case::start("start")]
    #[case::stop("stop")]
    #[case::restart("restart")]
    fn scalar_service_name_matches_one_element_sequence(#[case] action: &str) {
        let c = client();
        let options = ServiceOptions::default();

        let build = |names: OneOrMany<String>| match action {
            "start" => c.build_start(names, &options),
            "stop" => c.build_stop(names, &options),
            _ => c.build_restart(names, &options),
        };

        let scalar = build("hello.daemon".into()).unwrap();
        let sequence = build(vec!["hello.daemon"].into()).unwrap();

        assert_eq!(scalar, sequence);
        assert_eq!(
            json_body(&scalar),
            json!({"action": action, "names": ["hello.daemon"]})
        );
    }

    #[test]
    fn service_options_are_sent_when_set() {
        let options = ServiceOptions {
            enable: true,
            ..Default::default()
        };
        let req = client().build_start(["a.svc", "b.svc"], &options).unwrap();

        assert_eq!(
            json_body(&req),
            json!({"action": "start", "names": ["a.svc", "b.svc"], "enable": true})
        );
    }

    #[test]
    fn services_selects_services_only() {
        let c = client();

        let all = c.build_services(OneOrMany::<String>::empty());
        assert_eq!(all.target(), "/v2/apps?select=service");

        let some = c.build_services(["a", "b"]);
        assert_eq!(some.query_value("names"), Some("a,b"));
    }

    #[test]
    fn logs_query() {
        let req = client().build_logs("hello", &LogsOptions { n: Some(-1) });

        assert_eq!(req.path, "logs");
        assert_eq!(req.query_value("names"), Some("hello"));
        assert_eq!(req.query_value("n"), Some("-1"));
    }

    #[test]
    fn get_joins_keys() {
        let c = client();

        let req = c.build_get("foo", ["k1", "k2"]);
        assert_eq!(req.path, "snaps/foo/conf");
        assert_eq!(req.query_value("keys"), Some("k1,k2"));

        let req = c.build_get("foo", OneOrMany::<String>::empty());
        assert_eq!(req.query_value("keys"), None);
    }

    #[test]
    fn set_puts_patch() {
        let req = client()
            .build_set("foo", &json!({"port": 8080, "debug": null}))
            .unwrap();

        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.path, "snaps/foo/conf");
        assert_eq!(json_body(&req), json!({"port": 8080, "debug": null}));
    }

    #[test]
    fn find_omits_absent_parameters() {
        let options = FindOptions {
            query: Some("hello".to_string()),
            scope: Some("wide".to_string()),
            ..Default::default()
        };
        let req = client().build_find(&options);

        assert_eq!(req.target(), "/v2/find?q=hello&scope=wide");
    }

    #[test]
    fn interfaces_query_flags() {
        let options = InterfacesOptions {
            select: Some(crate::types::InterfacesSelect::Connected),
            plugs: true,
            interfaces: "network".into(),
            ..Default::default()
        };
        let req = client().build_interfaces(&options);

        assert_eq!(
            req.target(),
            "/v2/interfaces?select=connected&plugs=true&interfaces=network"
        );
    }

    #[test]
    fn abort_change_posts_action() {
        let req = client().build_abort_change("7").unwrap();

        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "changes/7");
        assert_eq!(json_body(&req), json!({"action": "abort"}));
    }

    #[tokio::test]
    async fn dispatch_returns_whole_envelope() {
        let body = r#"{"type":"sync","status-code":200,"result":{"version":"2.61"}}"#;
        let client = SnapdClient::with_transport(ClientConfig::default(), CannedTransport::new(body));

        let envelope = client.system_info().await.unwrap();

        assert_eq!(envelope.kind(), ResponseType::Sync);
        assert_eq!(
            envelope.into_value(),
            serde_json::from_str::<Value>(body).unwrap()
        );

        let seen = client.transport().seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].path, "system-info");
    }

    #[tokio::test]
    async fn dispatch_fails_on_error_envelope() {
        let client = SnapdClient::with_transport(
            ClientConfig::default(),
            CannedTransport::new(r#"{"type":"error","result":{"message":"X"}}"#),
        );

        let err = client.info("missing").await.unwrap_err();

        assert!(matches!(err, SnapdError::Daemon { .. }));
        assert_eq!(err.to_string(), "X");
    }

    #[tokio::test]
    async fn dispatch_fails_on_malformed_body() {
        let client = SnapdClient::with_transport(
            ClientConfig::default(),
            CannedTransport::new("{\"type\":"),
        );

        let err = client.list(&ListOptions::default()).await.unwrap_err();
        assert!(matches!(err, SnapdError::Decode(_)));
    }
}
