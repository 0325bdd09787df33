//! Typed request/response payloads for the Zabbix API methods we use
//!
//! Zabbix returns ids and most integers as JSON strings ("15", "0"); the
//! deserializers here accept both strings and numbers.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Server-assigned object id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Ok(Self(s)),
            Raw::Number(n) => Ok(Self(n.to_string())),
        }
    }
}

/// Integer that may arrive as a number or a decimal string
pub(crate) fn flex_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Common query pieces

/// `output` parameter: either "extend" or an explicit field list
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Output {
    Fields(Vec<&'static str>),
    Extend(&'static str),
}

impl Output {
    pub fn fields(fields: &[&'static str]) -> Self {
        Self::Fields(fields.to_vec())
    }

    pub fn extend() -> Self {
        Self::Extend("extend")
    }
}

/// Generic `*.get` request: exact `filter`, substring `search`, host scoping
#[derive(Debug, Clone, Serialize)]
pub struct GetRequest {
    pub output: Output,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostids: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<serde_json::Value>,
    #[serde(rename = "searchByAny", skip_serializing_if = "Option::is_none")]
    pub search_by_any: Option<bool>,
    #[serde(rename = "selectPages", skip_serializing_if = "Option::is_none")]
    pub select_pages: Option<Output>,
}

impl GetRequest {
    pub fn new(output: Output) -> Self {
        Self {
            output,
            hostids: None,
            filter: None,
            search: None,
            search_by_any: None,
            select_pages: None,
        }
    }
}

/// `*.create` results: `{"groupids": ["7"]}`, `{"hostids": [...]}`...
#[derive(Debug, Deserialize)]
pub struct CreatedIds(pub HashMap<String, Vec<ObjectId>>);

impl CreatedIds {
    pub fn first(&self, key: &str) -> Option<&ObjectId> {
        self.0.get(key).and_then(|ids| ids.first())
    }
}

// ---------------------------------------------------------------------------
// Authentication

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    /// `username` on 5.4+, `user` before
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<&'a str>,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserRef {
    pub userid: ObjectId,
}

// ---------------------------------------------------------------------------
// Host groups, templates, hosts

#[derive(Debug, Clone, Deserialize)]
pub struct HostGroup {
    pub groupid: ObjectId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostGroupCreate<'a> {
    pub name: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Template {
    pub templateid: ObjectId,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostRef {
    pub hostid: ObjectId,
}

/// Interface type 1 = Zabbix agent
pub const INTERFACE_TYPE_AGENT: u8 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceCreate {
    #[serde(rename = "type")]
    pub kind: u8,
    pub main: u8,
    pub useip: u8,
    pub ip: String,
    pub dns: String,
    pub port: String,
}

impl InterfaceCreate {
    pub fn agent(ip: &str, port: u16) -> Self {
        Self {
            kind: INTERFACE_TYPE_AGENT,
            main: 1,
            useip: 1,
            ip: ip.to_string(),
            dns: String::new(),
            port: port.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupLink {
    pub groupid: ObjectId,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateLink {
    pub templateid: ObjectId,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostCreate {
    pub host: String,
    pub groups: Vec<GroupLink>,
    pub interfaces: Vec<InterfaceCreate>,
    pub templates: Vec<TemplateLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostInterface {
    pub interfaceid: ObjectId,
    #[serde(default, deserialize_with = "flex_u32")]
    pub main: u32,
}

// ---------------------------------------------------------------------------
// Triggers and items

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerRef {
    pub triggerid: ObjectId,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerCreate {
    pub description: String,
    pub expression: String,
    pub priority: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemRef {
    pub itemid: ObjectId,
}

/// Item value types as encoded by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Float,
    Char,
    Log,
    Unsigned,
    Text,
}

impl ValueType {
    pub fn code(self) -> u8 {
        match self {
            Self::Float => 0,
            Self::Char => 1,
            Self::Log => 2,
            Self::Unsigned => 3,
            Self::Text => 4,
        }
    }
}

impl Serialize for ValueType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Item type 0 = Zabbix agent (passive)
pub const ITEM_TYPE_AGENT: u8 = 0;

#[derive(Debug, Clone, Serialize)]
pub struct ItemCreate {
    pub hostid: ObjectId,
    pub name: String,
    pub key_: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub value_type: ValueType,
    pub interfaceid: ObjectId,
    pub delay: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

// ---------------------------------------------------------------------------
// Dashboards

/// Widget field types used by our widgets
pub mod field_type {
    pub const INTEGER: u32 = 0;
    pub const STRING: u32 = 1;
    pub const HOST_GROUP: u32 = 2;
    pub const ITEM: u32 = 4;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetField {
    #[serde(rename = "type", deserialize_with = "flex_u32")]
    pub kind: u32,
    pub name: String,
    pub value: serde_json::Value,
}

impl WidgetField {
    pub fn integer(name: &str, value: i64) -> Self {
        Self {
            kind: field_type::INTEGER,
            name: name.to_string(),
            value: value.into(),
        }
    }

    pub fn string(name: &str, value: &str) -> Self {
        Self {
            kind: field_type::STRING,
            name: name.to_string(),
            value: value.into(),
        }
    }

    pub fn host_group(name: &str, group_id: &ObjectId) -> Self {
        // groupids are sent as integers
        let value = group_id
            .as_str()
            .parse::<i64>()
            .map(serde_json::Value::from)
            .unwrap_or_else(|_| group_id.as_str().into());
        Self {
            kind: field_type::HOST_GROUP,
            name: name.to_string(),
            value,
        }
    }

    pub fn item(name: &str, item_id: &ObjectId) -> Self {
        Self {
            kind: field_type::ITEM,
            name: name.to_string(),
            value: item_id.as_str().into(),
        }
    }
}

fn default_width() -> u32 {
    6
}

fn default_height() -> u32 {
    4
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widgetid: Option<ObjectId>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "flex_u32")]
    pub x: u32,
    #[serde(default, deserialize_with = "flex_u32")]
    pub y: u32,
    #[serde(default = "default_width", deserialize_with = "flex_u32")]
    pub width: u32,
    #[serde(default = "default_height", deserialize_with = "flex_u32")]
    pub height: u32,
    #[serde(default, deserialize_with = "flex_u32")]
    pub view_mode: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<WidgetField>>,
}

impl Widget {
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardPage {
    pub dashboard_pageid: ObjectId,
    #[serde(default)]
    pub widgets: Vec<Widget>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dashboard {
    pub dashboardid: ObjectId,
    #[serde(default)]
    pub pages: Vec<DashboardPage>,
}

/// Permission 3 = read-write
pub const PERMISSION_READ_WRITE: u8 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardUser {
    pub userid: ObjectId,
    pub permission: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPage {
    pub name: String,
    pub widgets: Vec<Widget>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardCreate {
    pub name: String,
    pub display_period: u32,
    pub auto_start: u8,
    pub pages: Vec<NewPage>,
    pub users: Vec<DashboardUser>,
    #[serde(rename = "userGroups")]
    pub user_groups: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageUpdate {
    pub dashboard_pageid: ObjectId,
    pub widgets: Vec<Widget>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardUpdate {
    pub dashboardid: ObjectId,
    pub pages: Vec<PageUpdate>,
}
