//! In-memory stand-in for snapd, served over a Unix socket.
//!
//! Emulates enough of the `/v2` API for the client to be exercised end to
//! end: a small store catalogue, installed snaps with their services,
//! per-snap configuration, interface connections and a change log. Every
//! state-changing request completes immediately and is recorded as a `Done`
//! change.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::UnixListener, sync::RwLock};
use tracing::{debug, info};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct App {
    pub snap: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daemon: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Snap {
    pub name: String,
    pub version: String,
    pub revision: String,
    pub channel: String,
    pub confinement: String,
    pub devmode: bool,
    pub status: String,
    pub apps: Vec<App>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Change {
    pub id: String,
    pub kind: String,
    pub summary: String,
    pub status: String,
    pub ready: bool,
    pub snap_names: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotRef {
    pub snap: String,
    pub slot: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlugRef {
    pub snap: String,
    pub plug: String,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Connection {
    pub slot: SlotRef,
    pub plug: PlugRef,
}

#[derive(Debug, Default)]
pub struct SnapdState {
    pub store: BTreeMap<String, Snap>,
    pub installed: BTreeMap<String, Snap>,
    pub config: BTreeMap<String, Map<String, Value>>,
    pub connections: Vec<Connection>,
    pub changes: BTreeMap<u64, Change>,
    next_change: u64,
}

impl SnapdState {
    /// A store with `hello-world` and `lxd`, and `core22` preinstalled.
    pub fn seeded() -> Self {
        let mut state = Self::default();

        for snap in [
            snap("hello-world", "6.4", "29", vec![snap_app("hello-world", "hello-world", None)]),
            snap(
                "lxd",
                "5.21.1",
                "28373",
                vec![
                    snap_app("lxd", "lxc", None),
                    snap_app("lxd", "daemon", Some("simple")),
                    snap_app("lxd", "user-daemon", Some("simple")),
                ],
            ),
            snap("core22", "20240111", "1122", Vec::new()),
        ] {
            state.store.insert(snap.name.clone(), snap);
        }

        if let Some(core) = state.store.get("core22").cloned() {
            state.installed.insert(core.name.clone(), core);
        }

        state
    }

    fn record_change(&mut self, kind: &str, summary: String, snaps: &[&str]) -> String {
        self.next_change += 1;
        let id = self.next_change.to_string();

        debug!(%id, kind, %summary, "recording change");

        self.changes.insert(
            self.next_change,
            Change {
                id: id.clone(),
                kind: kind.to_string(),
                summary,
                status: "Done".to_string(),
                ready: true,
                snap_names: snaps.iter().map(|s| s.to_string()).collect(),
            },
        );

        id
    }
}

fn snap(name: &str, version: &str, revision: &str, apps: Vec<App>) -> Snap {
    Snap {
        name: name.to_string(),
        version: version.to_string(),
        revision: revision.to_string(),
        channel: "latest/stable".to_string(),
        confinement: "strict".to_string(),
        devmode: false,
        status: "available".to_string(),
        apps,
    }
}

fn snap_app(snap: &str, name: &str, daemon: Option<&str>) -> App {
    App {
        snap: snap.to_string(),
        name: name.to_string(),
        daemon: daemon.map(str::to_string),
        enabled: daemon.is_some(),
        active: daemon.is_some(),
    }
}

pub type Db = Arc<RwLock<SnapdState>>;

pub fn app_with_state(state: SnapdState) -> Router {
    let db: Db = Arc::new(RwLock::new(state));
    Router::new()
        .route("/v2/system-info", get(system_info))
        .route("/v2/find", get(find))
        .route("/v2/snaps", get(list_snaps).post(sideload))
        .route("/v2/snaps/{name}", get(snap_info).post(snap_action))
        .route("/v2/snaps/{name}/conf", get(get_conf).put(set_conf))
        .route("/v2/interfaces", get(interfaces).post(interfaces_action))
        .route("/v2/apps", get(apps).post(apps_action))
        .route("/v2/logs", get(logs))
        .route("/v2/changes", get(list_changes))
        .route("/v2/changes/{id}", get(change).post(change_action))
        .fallback(not_found)
        .layer(middleware::from_fn(log_request))
        .with_state(db)
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();

    let response = next.run(req).await;
    debug!(%method, %uri, status = response.status().as_u16(), "handled request");
    response
}

pub fn app() -> Router {
    app_with_state(SnapdState::seeded())
}

pub async fn run(listener: UnixListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

fn sync(result: impl Serialize) -> Response {
    Json(json!({
        "type": "sync",
        "status-code": 200,
        "status": "OK",
        "result": result,
    }))
    .into_response()
}

fn accepted(change: String) -> Response {
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "type": "async",
            "status-code": 202,
            "status": "Accepted",
            "result": null,
            "change": change,
        })),
    )
        .into_response()
}

fn error(status: StatusCode, kind: Option<&str>, message: impl Into<String>) -> Response {
    let mut result = json!({ "message": message.into() });
    if let Some(kind) = kind {
        result["kind"] = json!(kind);
    }

    (
        status,
        Json(json!({
            "type": "error",
            "status-code": status.as_u16(),
            "status": status.canonical_reason().unwrap_or_default(),
            "result": result,
        })),
    )
        .into_response()
}

fn not_installed(name: &str) -> Response {
    error(
        StatusCode::NOT_FOUND,
        Some("snap-not-found"),
        format!("snap \"{name}\" is not installed"),
    )
}

async fn not_found() -> Response {
    error(StatusCode::NOT_FOUND, None, "not found")
}

fn comma_list(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn system_info() -> Response {
    sync(json!({
        "series": "16",
        "version": "2.61-mock",
        "os-release": {"id": "ubuntu", "version-id": "22.04"},
        "on-classic": true,
        "managed": false,
        "kernel-version": "6.8.0",
    }))
}

async fn find(State(db): State<Db>, Query(params): Query<HashMap<String, String>>) -> Response {
    let state = db.read().await;

    if let Some(name) = params.get("name") {
        return match state.store.get(name) {
            Some(snap) => sync(vec![snap]),
            None => error(
                StatusCode::NOT_FOUND,
                Some("snap-not-found"),
                format!("snap \"{name}\" not found"),
            ),
        };
    }

    let query = params.get("q").map(String::as_str).unwrap_or_default();
    let found: Vec<&Snap> = state
        .store
        .values()
        .filter(|snap| snap.name.contains(query))
        .collect();

    sync(found)
}

async fn list_snaps(
    State(db): State<Db>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let state = db.read().await;
    let wanted = comma_list(params.get("snaps"));

    let snaps: Vec<&Snap> = state
        .installed
        .values()
        .filter(|snap| wanted.is_empty() || wanted.contains(&snap.name))
        .collect();

    sync(snaps)
}

async fn snap_info(State(db): State<Db>, Path(name): Path<String>) -> Response {
    match db.read().await.installed.get(&name) {
        Some(snap) => sync(snap),
        None => not_installed(&name),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SnapActionBody {
    action: String,
    channel: Option<String>,
    revision: Option<String>,
    #[serde(default)]
    devmode: bool,
    #[serde(default)]
    classic: bool,
}

async fn snap_action(
    State(db): State<Db>,
    Path(name): Path<String>,
    Json(body): Json<SnapActionBody>,
) -> Response {
    let mut state = db.write().await;

    match body.action.as_str() {
        "install" => {
            if state.installed.contains_key(&name) {
                return error(
                    StatusCode::BAD_REQUEST,
                    Some("snap-already-installed"),
                    format!("snap \"{name}\" is already installed"),
                );
            }
            let Some(mut snap) = state.store.get(&name).cloned() else {
                return error(
                    StatusCode::NOT_FOUND,
                    Some("snap-not-found"),
                    format!("snap \"{name}\" not found"),
                );
            };
            if let Some(channel) = body.channel {
                snap.channel = channel;
            }
            if let Some(revision) = body.revision {
                snap.revision = revision;
            }
            snap.devmode = body.devmode;
            if body.classic {
                snap.confinement = "classic".to_string();
            }
            snap.status = "active".to_string();
            state.installed.insert(name.clone(), snap);

            let id = state.record_change(
                "install-snap",
                format!("Install \"{name}\" snap"),
                &[name.as_str()],
            );
            accepted(id)
        }
        "remove" => {
            if state.installed.remove(&name).is_none() {
                return not_installed(&name);
            }
            state.config.remove(&name);
            state
                .connections
                .retain(|c| c.plug.snap != name && c.slot.snap != name);

            let id = state.record_change(
                "remove-snap",
                format!("Remove \"{name}\" snap"),
                &[name.as_str()],
            );
            accepted(id)
        }
        "refresh" | "revert" | "enable" | "disable" => {
            let Some(snap) = state.installed.get_mut(&name) else {
                return not_installed(&name);
            };

            match body.action.as_str() {
                "refresh" => {
                    if let Some(channel) = body.channel {
                        snap.channel = channel;
                    }
                    if let Some(revision) = body.revision {
                        snap.revision = revision;
                    }
                }
                "revert" => match body.revision {
                    Some(revision) => snap.revision = revision,
                    None => {
                        return error(
                            StatusCode::BAD_REQUEST,
                            None,
                            format!("no revision to revert to for \"{name}\""),
                        )
                    }
                },
                "enable" => snap.status = "active".to_string(),
                _ => snap.status = "installed".to_string(),
            }

            let kind = format!("{}-snap", body.action);
            let summary = format!("{} \"{name}\" snap", capitalize(&body.action));
            let id = state.record_change(&kind, summary, &[name.as_str()]);
            accepted(id)
        }
        other => error(
            StatusCode::BAD_REQUEST,
            None,
            format!("unknown action \"{other}\""),
        ),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

async fn sideload(State(db): State<Db>, mut multipart: Multipart) -> Response {
    let mut fields = HashMap::new();
    let mut upload: Option<(String, Bytes)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return error(StatusCode::BAD_REQUEST, None, err.to_string()),
        };

        let name = field.name().unwrap_or_default().to_string();

        if name == "snap" {
            let filename = field.file_name().unwrap_or_default().to_string();
            match field.bytes().await {
                Ok(data) => upload = Some((filename, data)),
                Err(err) => return error(StatusCode::BAD_REQUEST, None, err.to_string()),
            }
        } else {
            match field.text().await {
                Ok(value) => {
                    fields.insert(name, value);
                }
                Err(err) => return error(StatusCode::BAD_REQUEST, None, err.to_string()),
            }
        }
    }

    if fields.get("action").map(String::as_str) != Some("install") {
        return error(StatusCode::BAD_REQUEST, None, "expected action \"install\"");
    }

    let Some((filename, data)) = upload else {
        return error(
            StatusCode::BAD_REQUEST,
            None,
            "cannot find \"snap\" file field in provided multipart/form-data payload",
        );
    };

    let flag = |key: &str| fields.get(key).map(String::as_str) == Some("true");

    if !flag("dangerous") && !flag("devmode") {
        return error(
            StatusCode::BAD_REQUEST,
            None,
            "cannot find signatures with metadata for snap",
        );
    }

    let name = filename
        .trim_end_matches(".snap")
        .split('_')
        .next()
        .unwrap_or_default()
        .to_string();

    info!(%name, bytes = data.len(), "sideloading snap");

    let mut snap = snap(&name, "local", "x1", Vec::new());
    snap.channel = String::new();
    snap.devmode = flag("devmode");
    snap.status = "active".to_string();
    if flag("classic") {
        snap.confinement = "classic".to_string();
    }

    let mut state = db.write().await;
    state.installed.insert(name.clone(), snap);

    let id = state.record_change(
        "install-snap",
        format!("Install \"{name}\" snap from file \"{filename}\""),
        &[name.as_str()],
    );
    accepted(id)
}

async fn get_conf(
    State(db): State<Db>,
    Path(name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let state = db.read().await;

    if !state.installed.contains_key(&name) {
        return not_installed(&name);
    }

    let conf = state.config.get(&name).cloned().unwrap_or_default();
    let keys = comma_list(params.get("keys"));

    if keys.is_empty() {
        return sync(conf);
    }

    let mut result = Map::new();
    for key in keys {
        match conf.get(&key) {
            Some(value) => {
                result.insert(key, value.clone());
            }
            None => {
                return error(
                    StatusCode::BAD_REQUEST,
                    Some("option-not-found"),
                    format!("snap \"{name}\" has no \"{key}\" configuration option"),
                )
            }
        }
    }

    sync(result)
}

async fn set_conf(
    State(db): State<Db>,
    Path(name): Path<String>,
    Json(patch): Json<Map<String, Value>>,
) -> Response {
    let mut state = db.write().await;

    if !state.installed.contains_key(&name) {
        return not_installed(&name);
    }

    let conf = state.config.entry(name.clone()).or_default();
    for (key, value) in patch {
        if value.is_null() {
            conf.remove(&key);
        } else {
            conf.insert(key, value);
        }
    }

    let id = state.record_change(
        "configure-snap",
        format!("Change configuration of \"{name}\" snap"),
        &[name.as_str()],
    );
    accepted(id)
}

async fn interfaces(State(db): State<Db>) -> Response {
    let state = db.read().await;

    let plugs: Vec<Value> = state
        .connections
        .iter()
        .map(|c| json!({"snap": c.plug.snap, "plug": c.plug.plug, "connections": [c.slot]}))
        .collect();
    let slots: Vec<Value> = state
        .connections
        .iter()
        .map(|c| json!({"snap": c.slot.snap, "slot": c.slot.slot, "connections": [c.plug]}))
        .collect();

    sync(json!({ "plugs": plugs, "slots": slots }))
}

#[derive(Deserialize)]
struct InterfacesActionBody {
    action: String,
    #[serde(default)]
    slots: Vec<SlotRef>,
    #[serde(default)]
    plugs: Vec<PlugRef>,
}

async fn interfaces_action(
    State(db): State<Db>,
    Json(body): Json<InterfacesActionBody>,
) -> Response {
    let mut state = db.write().await;

    if body.slots.len() != body.plugs.len() || body.plugs.is_empty() {
        return error(
            StatusCode::BAD_REQUEST,
            None,
            "expected one slot for each plug",
        );
    }

    let pairs: Vec<Connection> = body
        .slots
        .into_iter()
        .zip(body.plugs)
        .map(|(slot, plug)| Connection { slot, plug })
        .collect();

    for pair in &pairs {
        if !state.installed.contains_key(&pair.plug.snap) {
            return not_installed(&pair.plug.snap);
        }
    }

    let kind = match body.action.as_str() {
        "connect" => {
            for pair in &pairs {
                if !state.connections.contains(pair) {
                    state.connections.push(pair.clone());
                }
            }
            "connect-snap"
        }
        "disconnect" => {
            let before = state.connections.len();
            state.connections.retain(|c| !pairs.contains(c));
            if state.connections.len() == before {
                return error(
                    StatusCode::BAD_REQUEST,
                    Some("interfaces-unchanged"),
                    "nothing to disconnect",
                );
            }
            "disconnect-snap"
        }
        other => {
            return error(
                StatusCode::BAD_REQUEST,
                None,
                format!("unsupported interface action: \"{other}\""),
            )
        }
    };

    let summary = format!("{} {} interface(s)", capitalize(&body.action), pairs.len());
    let snaps: Vec<String> = pairs.iter().map(|p| p.plug.snap.clone()).collect();
    let refs: Vec<&str> = snaps.iter().map(String::as_str).collect();
    let id = state.record_change(kind, summary, &refs);
    accepted(id)
}

/// Resolves `snap` or `snap.app` names to installed apps.
fn select_apps<'a>(state: &'a SnapdState, names: &[String]) -> Result<Vec<&'a App>, Response> {
    let all = state.installed.values().flat_map(|snap| snap.apps.iter());

    if names.is_empty() {
        return Ok(all.collect());
    }

    let mut selected = Vec::new();
    for name in names {
        let (snap, app) = match name.split_once('.') {
            Some((snap, app)) => (snap, Some(app)),
            None => (name.as_str(), None),
        };

        let Some(installed) = state.installed.get(snap) else {
            return Err(not_installed(snap));
        };

        let matching: Vec<&App> = installed
            .apps
            .iter()
            .filter(|a| app.is_none_or(|app| a.name == app))
            .collect();

        if matching.is_empty() {
            return Err(error(
                StatusCode::NOT_FOUND,
                Some("app-not-found"),
                format!("snap \"{snap}\" has no app \"{}\"", app.unwrap_or_default()),
            ));
        }

        selected.extend(matching);
    }

    Ok(selected)
}

async fn apps(State(db): State<Db>, Query(params): Query<HashMap<String, String>>) -> Response {
    let state = db.read().await;
    let names = comma_list(params.get("names"));
    let services_only = params.get("select").map(String::as_str) == Some("service");

    match select_apps(&state, &names) {
        Ok(apps) => sync(
            apps.into_iter()
                .filter(|app| !services_only || app.daemon.is_some())
                .collect::<Vec<_>>(),
        ),
        Err(response) => response,
    }
}

#[derive(Deserialize)]
struct AppsActionBody {
    action: String,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    enable: bool,
    #[serde(default)]
    disable: bool,
}

async fn apps_action(State(db): State<Db>, Json(body): Json<AppsActionBody>) -> Response {
    let mut state = db.write().await;

    let targets: Vec<(String, String)> = match select_apps(&state, &body.names) {
        Ok(apps) => apps
            .into_iter()
            .filter(|app| app.daemon.is_some())
            .map(|app| (app.snap.clone(), app.name.clone()))
            .collect(),
        Err(response) => return response,
    };

    if !matches!(body.action.as_str(), "start" | "stop" | "restart") {
        return error(
            StatusCode::BAD_REQUEST,
            None,
            format!("unknown action \"{}\"", body.action),
        );
    }

    for (snap, name) in &targets {
        let Some(app) = state
            .installed
            .get_mut(snap)
            .and_then(|s| s.apps.iter_mut().find(|a| &a.name == name))
        else {
            continue;
        };

        match body.action.as_str() {
            "start" => {
                app.active = true;
                app.enabled |= body.enable;
            }
            "stop" => {
                app.active = false;
                app.enabled &= !body.disable;
            }
            _ => app.active = true,
        }
    }

    let snaps: Vec<String> = targets.iter().map(|(snap, _)| snap.clone()).collect();
    let refs: Vec<&str> = snaps.iter().map(String::as_str).collect();
    let summary = format!("Running service command \"{}\"", body.action);
    let id = state.record_change(&body.action, summary, &refs);
    accepted(id)
}

/// Answers in `application/json-seq`, one record per service line.
async fn logs(State(db): State<Db>, Query(params): Query<HashMap<String, String>>) -> Response {
    let state = db.read().await;
    let names = comma_list(params.get("names"));
    let limit: usize = params
        .get("n")
        .and_then(|n| n.parse::<i64>().ok())
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(10);

    let apps = match select_apps(&state, &names) {
        Ok(apps) => apps,
        Err(response) => return response,
    };

    let mut body = Vec::new();
    for app in apps.into_iter().filter(|app| app.daemon.is_some()).take(limit) {
        let record = json!({
            "timestamp": "2024-01-01T00:00:00Z",
            "message": format!("{}.{} started", app.snap, app.name),
            "sid": format!("{}.{}", app.snap, app.name),
            "pid": "1",
        });
        body.push(0x1e);
        body.extend_from_slice(record.to_string().as_bytes());
        body.push(b'\n');
    }

    ([(header::CONTENT_TYPE, "application/json-seq")], body).into_response()
}

async fn list_changes(
    State(db): State<Db>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let state = db.read().await;
    let select = params.get("select").map(String::as_str).unwrap_or("in-progress");
    let snap = params.get("for");

    let changes: Vec<&Change> = state
        .changes
        .values()
        .filter(|c| match select {
            "all" => true,
            "ready" => c.ready,
            _ => !c.ready,
        })
        .filter(|c| snap.is_none_or(|snap| c.snap_names.contains(snap)))
        .collect();

    sync(changes)
}

fn find_change<'a>(state: &'a SnapdState, id: &str) -> Result<&'a Change, Response> {
    id.parse::<u64>()
        .ok()
        .and_then(|key| state.changes.get(&key))
        .ok_or_else(|| {
            error(
                StatusCode::NOT_FOUND,
                None,
                format!("cannot find change with id \"{id}\""),
            )
        })
}

async fn change(State(db): State<Db>, Path(id): Path<String>) -> Response {
    let state = db.read().await;

    match find_change(&state, &id) {
        Ok(change) => sync(change),
        Err(response) => response,
    }
}

#[derive(Deserialize)]
struct ChangeActionBody {
    action: String,
}

async fn change_action(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(body): Json<ChangeActionBody>,
) -> Response {
    let state = db.read().await;

    let change = match find_change(&state, &id) {
        Ok(change) => change,
        Err(response) => return response,
    };

    if body.action != "abort" {
        return error(
            StatusCode::BAD_REQUEST,
            None,
            format!("change action \"{}\" is unsupported", body.action),
        );
    }

    if change.ready {
        return error(
            StatusCode::BAD_REQUEST,
            None,
            format!("cannot abort change {id} with nothing pending"),
        );
    }

    sync(change)
}
