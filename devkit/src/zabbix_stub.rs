/*!
Stub Zabbix server for tests without a real installation

Serves `POST /api_jsonrpc.php` on an ephemeral local port, keeps host
groups, templates, hosts, interfaces, triggers, items and dashboards in
memory, and records every call for assertions.
*/

use crate::state::{new_state, RecordedCall, Shared, StubState};
use anyhow::Result;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

/// JSON-RPC error as Zabbix reports it
#[derive(Debug, Clone)]
pub struct StubError {
    pub code: i64,
    pub message: String,
    pub data: String,
}

impl StubError {
    fn invalid_params(data: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: "Invalid params.".into(),
            data: data.into(),
        }
    }

    fn application(data: impl Into<String>) -> Self {
        Self {
            code: -32500,
            message: "Application error.".into(),
            data: data.into(),
        }
    }
}

type RpcResult = std::result::Result<Value, StubError>;

const NO_SUCH_OBJECT: &str = "No permissions to referred object or it does not exist!";

#[derive(Clone)]
pub struct ZabbixStub {
    state: Shared<StubState>,
}

impl ZabbixStub {
    /// Zabbix 7.0 with the default `Admin`/`zabbix` account
    pub fn new() -> Self {
        Self::with_version("7.0.5")
    }

    pub fn with_version(version: &str) -> Self {
        Self {
            state: new_state(StubState::new(version)),
        }
    }

    /// Start serving; returns the base URL (`http://127.0.0.1:<port>`)
    pub async fn start(&self) -> Result<String> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = Router::new()
            .route("/api_jsonrpc.php", post(handle_rpc))
            .with_state(self.clone());

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("[stub] server stopped: {}", e);
            }
        });
        log::info!("[stub] Zabbix stub listening on http://{}", addr);
        Ok(format!("http://{addr}"))
    }

    // ----- seeding -----

    pub fn add_group(&self, name: &str) -> String {
        let mut state = self.state.lock();
        let id = state.next_id();
        state.insert("hostgroups", json!({"groupid": id, "name": name}));
        id
    }

    pub fn add_template(&self, name: &str) -> String {
        let mut state = self.state.lock();
        let id = state.next_id();
        state.insert("templates", json!({"templateid": id, "name": name}));
        id
    }

    /// Host with an optional main agent interface
    pub fn add_host(&self, name: &str, interface_ip: Option<&str>) -> String {
        let mut state = self.state.lock();
        let id = state.next_id();
        state.insert(
            "hosts",
            json!({"hostid": id, "host": name, "groups": [], "parentTemplates": []}),
        );
        if let Some(ip) = interface_ip {
            let interface_id = state.next_id();
            state.insert(
                "hostinterfaces",
                json!({
                    "interfaceid": interface_id,
                    "hostid": id,
                    "main": "1",
                    "type": "1",
                    "useip": "1",
                    "ip": ip,
                    "dns": "",
                    "port": "10050"
                }),
            );
        }
        id
    }

    pub fn add_trigger(&self, host_id: &str, description: &str) -> String {
        let mut state = self.state.lock();
        let id = state.next_id();
        state.insert(
            "triggers",
            json!({
                "triggerid": id,
                "hostid": host_id,
                "description": description,
                "expression": "",
                "priority": "3"
            }),
        );
        id
    }

    pub fn add_item(&self, host_id: &str, key: &str, name: &str) -> String {
        let mut state = self.state.lock();
        let id = state.next_id();
        state.insert(
            "items",
            json!({"itemid": id, "hostid": host_id, "key_": key, "name": name, "value_type": "4"}),
        );
        id
    }

    /// Dashboard with raw pages; page and widget ids must already be present
    pub fn add_dashboard(&self, name: &str, pages: Value) -> String {
        let mut state = self.state.lock();
        let id = state.next_id();
        state.insert("dashboards", json!({"dashboardid": id, "name": name, "pages": pages}));
        id
    }

    // ----- failure injection -----

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Make `method` answer with an application error
    pub fn fail_method(&self, method: &str, data: &str) {
        self.state
            .lock()
            .failing
            .insert(method.to_string(), data.to_string());
    }

    /// Make `method` succeed with a canned `result`, whatever its params
    pub fn respond_with(&self, method: &str, result: Value) {
        self.state
            .lock()
            .canned
            .insert(method.to_string(), result);
    }

    // ----- inspection -----

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.method == method).collect()
    }

    pub fn write_calls(&self) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(RecordedCall::is_write).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Snapshot of a collection (`hostgroups`, `hosts`, `items`, `dashboards`...)
    pub fn objects(&self, collection: &str) -> Vec<Value> {
        self.state.lock().collection(collection).to_vec()
    }

    pub fn dashboard(&self, name: &str) -> Option<Value> {
        self.objects("dashboards")
            .into_iter()
            .find(|d| d["name"] == name)
    }
}

impl Default for ZabbixStub {
    fn default() -> Self {
        Self::new()
    }
}

async fn handle_rpc(State(stub): State<ZabbixStub>, headers: HeaderMap, body: String) -> Response {
    let request: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            let err = json!({
                "jsonrpc": "2.0",
                "error": {"code": -32700, "message": "Parse error.", "data": e.to_string()},
                "id": null
            });
            return (StatusCode::OK, Json(err)).into_response();
        }
    };

    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = request.get("params").cloned().unwrap_or(Value::Null);
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    let auth_field = request.get("auth").and_then(Value::as_str).map(str::to_string);

    let mut state = stub.state.lock();
    state.calls.push(RecordedCall {
        method: method.clone(),
        params: params.clone(),
        bearer: bearer.clone(),
        auth_field: auth_field.clone(),
    });

    if state.unavailable {
        return (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response();
    }

    let outcome = dispatch(&mut state, &method, &params, bearer.or(auth_field));
    drop(state);

    let envelope = match outcome {
        Ok(result) => json!({"jsonrpc": "2.0", "result": result, "id": id}),
        Err(e) => {
            log::debug!("[stub] {} -> error {}", method, e.data);
            json!({
                "jsonrpc": "2.0",
                "error": {"code": e.code, "message": e.message, "data": e.data},
                "id": id
            })
        }
    };
    (StatusCode::OK, Json(envelope)).into_response()
}

fn dispatch(
    state: &mut StubState,
    method: &str,
    params: &Value,
    token: Option<String>,
) -> RpcResult {
    if let Some(data) = state.failing.get(method) {
        return Err(StubError::application(data.clone()));
    }
    if let Some(result) = state.canned.get(method) {
        return Ok(result.clone());
    }

    match method {
        "apiinfo.version" => {
            if token.is_some() {
                return Err(StubError::invalid_params(
                    "The \"apiinfo.version\" method must be called without authorization.",
                ));
            }
            Ok(json!(state.version))
        }
        "user.login" => login(state, params),
        _ => {
            match token {
                Some(t) if state.tokens.contains(&t) => {}
                _ => return Err(StubError::invalid_params("Not authorised.")),
            }
            authorised(state, method, params)
        }
    }
}

fn version_at_least(version: &str, major: u32, minor: u32) -> bool {
    let mut parts = version.split('.').map(|p| p.parse::<u32>().unwrap_or(0));
    let found = (parts.next().unwrap_or(0), parts.next().unwrap_or(0));
    found >= (major, minor)
}

fn login(state: &mut StubState, params: &Value) -> RpcResult {
    // 5.4 renamed "user" to "username"
    let field = if version_at_least(&state.version, 5, 4) { "username" } else { "user" };
    let username = params[field].as_str().unwrap_or_default();
    let password = params["password"].as_str().unwrap_or_default();

    let known = state
        .users
        .iter()
        .any(|u| u["username"] == username && u["password"] == password);
    if !known {
        return Err(StubError::invalid_params(
            "Incorrect user name or password or account is temporarily blocked.",
        ));
    }
    let token = format!("stub-token-{}", state.next_id());
    state.tokens.push(token.clone());
    Ok(json!(token))
}

fn authorised(state: &mut StubState, method: &str, params: &Value) -> RpcResult {
    match method {
        "user.get" => {
            let mut view = StubState::new(&state.version);
            view.collections.insert("users", state.users.clone());
            Ok(json!(view.select("users", params)))
        }
        "hostgroup.get" => Ok(json!(state.select("hostgroups", params))),
        "template.get" => Ok(json!(state.select("templates", params))),
        "host.get" => Ok(json!(state.select("hosts", params))),
        "hostinterface.get" => Ok(json!(state.select("hostinterfaces", params))),
        "trigger.get" => Ok(json!(state.select("triggers", params))),
        "item.get" => Ok(json!(state.select("items", params))),
        "dashboard.get" => Ok(json!(state.select("dashboards", params))),
        "hostgroup.create" => create_group(state, params),
        "host.create" => create_host(state, params),
        "trigger.create" => create_trigger(state, params),
        "item.create" => create_item(state, params),
        "dashboard.create" => create_dashboard(state, params),
        "dashboard.update" => update_dashboard(state, params),
        other => Err(StubError::invalid_params(format!("Incorrect method \"{other}\"."))),
    }
}

fn exists(state: &StubState, collection: &str, field: &str, value: &str) -> bool {
    state.collection(collection).iter().any(|o| o[field] == value)
}

fn create_group(state: &mut StubState, params: &Value) -> RpcResult {
    let name = params["name"].as_str().unwrap_or_default();
    if exists(state, "hostgroups", "name", name) {
        return Err(StubError::invalid_params(format!("Host group \"{name}\" already exists.")));
    }
    let id = state.next_id();
    state.insert("hostgroups", json!({"groupid": id, "name": name}));
    Ok(json!({"groupids": [id]}))
}

fn create_host(state: &mut StubState, params: &Value) -> RpcResult {
    let host = params["host"].as_str().unwrap_or_default();
    if exists(state, "hosts", "host", host) {
        return Err(StubError::invalid_params(format!(
            "Host with the same name \"{host}\" already exists."
        )));
    }
    let id = state.next_id();
    state.insert(
        "hosts",
        json!({
            "hostid": id,
            "host": host,
            "groups": params["groups"],
            "parentTemplates": params["templates"]
        }),
    );
    for interface in params["interfaces"].as_array().cloned().unwrap_or_default() {
        let interface_id = state.next_id();
        let mut stored = interface;
        stored["interfaceid"] = json!(interface_id);
        stored["hostid"] = json!(id);
        for key in ["main", "type", "useip"] {
            if let Some(n) = stored[key].as_u64() {
                stored[key] = json!(n.to_string());
            }
        }
        state.insert("hostinterfaces", stored);
    }
    Ok(json!({"hostids": [id]}))
}

fn create_trigger(state: &mut StubState, params: &Value) -> RpcResult {
    let expression = params["expression"].as_str().unwrap_or_default();
    // last(/<host>/<key>)<25
    let host = expression
        .split_once("(/")
        .and_then(|(_, rest)| rest.split_once('/'))
        .map(|(host, _)| host)
        .unwrap_or_default();
    let Some(host_id) = state
        .collection("hosts")
        .iter()
        .find(|h| h["host"] == host)
        .map(|h| h["hostid"].clone())
    else {
        return Err(StubError::invalid_params(format!(
            "Incorrect trigger expression. Host \"{host}\" does not exist."
        )));
    };
    let id = state.next_id();
    let mut stored = params.clone();
    stored["triggerid"] = json!(id);
    stored["hostid"] = host_id;
    state.insert("triggers", stored);
    Ok(json!({"triggerids": [id]}))
}

fn create_item(state: &mut StubState, params: &Value) -> RpcResult {
    let host_id = params["hostid"].as_str().unwrap_or_default();
    let key = params["key_"].as_str().unwrap_or_default();
    if !exists(state, "hosts", "hostid", host_id) {
        return Err(StubError::invalid_params(NO_SUCH_OBJECT));
    }
    if key.is_empty() {
        return Err(StubError::invalid_params(
            "Invalid parameter \"/1\": the parameter \"key_\" is missing.",
        ));
    }
    let duplicate = state
        .collection("items")
        .iter()
        .any(|i| i["hostid"] == host_id && i["key_"] == key);
    if duplicate {
        return Err(StubError::invalid_params(format!(
            "An item with key \"{key}\" already exists on the host."
        )));
    }
    let id = state.next_id();
    let mut stored = params.clone();
    stored["itemid"] = json!(id);
    state.insert("items", stored);
    Ok(json!({"itemids": [id]}))
}

fn assign_widget_ids(state: &mut StubState, widgets: &Value) -> Value {
    let mut widgets = widgets.as_array().cloned().unwrap_or_default();
    for widget in widgets.iter_mut() {
        if widget.get("widgetid").is_none() {
            widget["widgetid"] = json!(state.next_id());
        }
    }
    Value::Array(widgets)
}

fn create_dashboard(state: &mut StubState, params: &Value) -> RpcResult {
    let name = params["name"].as_str().unwrap_or_default();
    if exists(state, "dashboards", "name", name) {
        return Err(StubError::invalid_params(format!("Dashboard \"{name}\" already exists.")));
    }
    let id = state.next_id();
    let mut pages = Vec::new();
    for page in params["pages"].as_array().cloned().unwrap_or_default() {
        let page_id = state.next_id();
        let widgets = assign_widget_ids(state, &page["widgets"]);
        pages.push(json!({"dashboard_pageid": page_id, "name": page["name"], "widgets": widgets}));
    }
    state.insert(
        "dashboards",
        json!({
            "dashboardid": id,
            "name": name,
            "display_period": params["display_period"],
            "auto_start": params["auto_start"],
            "users": params["users"],
            "pages": pages
        }),
    );
    Ok(json!({"dashboardids": [id]}))
}

fn update_dashboard(state: &mut StubState, params: &Value) -> RpcResult {
    let id = params["dashboardid"].as_str().unwrap_or_default().to_string();
    let Some(position) = state
        .collection("dashboards")
        .iter()
        .position(|d| d["dashboardid"] == id.as_str())
    else {
        return Err(StubError::invalid_params(NO_SUCH_OBJECT));
    };

    let mut dashboard = state.collection("dashboards")[position].clone();
    for page in params["pages"].as_array().cloned().unwrap_or_default() {
        let widgets = assign_widget_ids(state, &page["widgets"]);
        let stored_pages = dashboard["pages"].as_array_mut();
        let Some(stored_pages) = stored_pages else { continue };
        match stored_pages
            .iter_mut()
            .find(|p| p["dashboard_pageid"] == page["dashboard_pageid"])
        {
            Some(stored) => stored["widgets"] = widgets,
            None => {
                return Err(StubError::invalid_params(format!(
                    "Dashboard page {} does not exist.",
                    page["dashboard_pageid"]
                )))
            }
        }
    }
    state.collection_mut("dashboards")[position] = dashboard;
    Ok(json!({"dashboardids": [id]}))
}
