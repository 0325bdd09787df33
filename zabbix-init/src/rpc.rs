//! JSON-RPC 2.0 transport over HTTP(S)
//!
//! One POST per call to `<base>/api_jsonrpc.php`. After login the session
//! token rides along either as a bearer header or as the envelope's `auth`
//! member, depending on the server generation.

use crate::config::{AuthMode, Settings};
use crate::error::{Result, ZabbixError};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Token placement once resolved against the server version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPlacement {
    Header,
    Field,
}

/// Authenticated session state. Lives for one run.
#[derive(Clone)]
pub struct Session {
    pub token: String,
    pub placement: TokenPlacement,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("placement", &self.placement)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a P,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth: Option<&'a str>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcErrorBody {
    fn data_text(&self) -> Option<String> {
        match &self.data {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

pub struct RpcClient {
    http: reqwest::Client,
    endpoint: String,
    session: Option<Session>,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .danger_accept_invalid_certs(settings.allow_insecure_tls)
            .user_agent(concat!("zabbix-init/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ZabbixError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: settings.api_endpoint(),
            session: None,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    /// Authenticated call, decoded into `R`
    pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let value = self.send(method, params, self.session.as_ref()).await?;
        serde_json::from_value(value).map_err(|e| ZabbixError::decode(method, e))
    }

    /// Call without any token (`apiinfo.version`, `user.login`)
    pub async fn call_anonymous<P, R>(&self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let value = self.send(method, params, None).await?;
        serde_json::from_value(value).map_err(|e| ZabbixError::decode(method, e))
    }

    async fn send<P: Serialize>(
        &self,
        method: &str,
        params: &P,
        session: Option<&Session>,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = build_envelope(method, params, session, id);

        let mut request = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(&envelope);
        if let Some(Session { token, placement: TokenPlacement::Header }) = session {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        debug!(method, id, "rpc call");
        let response = request
            .send()
            .await
            .map_err(|e| ZabbixError::transport(method, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ZabbixError::transport(method, e))?;

        if !status.is_success() {
            return Err(ZabbixError::Transport {
                method: method.to_string(),
                status: Some(status.as_u16()),
                detail: transport_detail(&body),
            });
        }

        let decoded: RpcResponse =
            serde_json::from_str(&body).map_err(|e| ZabbixError::decode(method, e))?;
        into_result(method, decoded)
    }
}

fn build_envelope<'a, P: Serialize>(
    method: &'a str,
    params: &'a P,
    session: Option<&'a Session>,
    id: u64,
) -> RpcRequest<'a, P> {
    let auth = match session {
        Some(Session { token, placement: TokenPlacement::Field }) => Some(token.as_str()),
        _ => None,
    };
    RpcRequest {
        jsonrpc: "2.0",
        method,
        params,
        auth,
        id,
    }
}

fn into_result(method: &str, response: RpcResponse) -> Result<Value> {
    if let Some(err) = response.error {
        return Err(ZabbixError::Api {
            method: method.to_string(),
            code: err.code,
            data: err.data_text(),
            message: err.message,
        });
    }
    Ok(response.result.unwrap_or(Value::Null))
}

/// Prefer the structured `error.data` of an error body, else the raw text
fn transport_detail(body: &str) -> String {
    serde_json::from_str::<RpcResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .and_then(|e| e.data_text().or(Some(e.message)).filter(|s| !s.is_empty()))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "empty response body".to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        })
}

/// Resolve the configured auth mode against the server version
pub fn token_placement(mode: AuthMode, version: &ApiVersion) -> TokenPlacement {
    match mode {
        AuthMode::Header => TokenPlacement::Header,
        AuthMode::Field => TokenPlacement::Field,
        AuthMode::Auto if version.at_least(6, 4) => TokenPlacement::Header,
        AuthMode::Auto => TokenPlacement::Field,
    }
}

/// `apiinfo.version` answer, e.g. "7.0.5"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ApiVersion {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split('.').map(|p| {
            let digits: String = p.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<u32>().ok()
        });
        let major = parts.next()??;
        let minor = parts.next().flatten().unwrap_or(0);
        let patch = parts.next().flatten().unwrap_or(0);
        Some(Self { major, minor, patch })
    }

    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
