/*!
In-memory object store of the stub server

Objects are kept as JSON with string ids, the way Zabbix returns them.
Queries understand the `*.get` subset used by zabbix-init: `output`,
`filter` (exact), `search` (substring, `searchByAny`), `hostids` and
`selectPages`.
*/

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// One call as received by the stub
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub params: Value,
    /// Token from `Authorization: Bearer ...`
    pub bearer: Option<String>,
    /// Token from the envelope `auth` member
    pub auth_field: Option<String>,
}

impl RecordedCall {
    /// create/update/delete
    pub fn is_write(&self) -> bool {
        [".create", ".update", ".delete"]
            .iter()
            .any(|suffix| self.method.ends_with(suffix))
    }
}

pub struct StubState {
    pub version: String,
    pub users: Vec<Value>,
    pub tokens: Vec<String>,
    pub collections: HashMap<&'static str, Vec<Value>>,
    pub calls: Vec<RecordedCall>,
    /// Answer every request with HTTP 503
    pub unavailable: bool,
    /// method -> error `data` returned instead of a result
    pub failing: HashMap<String, String>,
    /// method -> `result` returned as is
    pub canned: HashMap<String, Value>,
    next_id: u64,
}

impl StubState {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            users: vec![serde_json::json!({
                "userid": "1",
                "username": "Admin",
                "password": "zabbix"
            })],
            tokens: Vec::new(),
            collections: HashMap::new(),
            calls: Vec::new(),
            unavailable: false,
            failing: HashMap::new(),
            canned: HashMap::new(),
            next_id: 100,
        }
    }

    pub fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    pub fn collection(&self, name: &str) -> &[Value] {
        self.collections.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn collection_mut(&mut self, name: &'static str) -> &mut Vec<Value> {
        self.collections.entry(name).or_default()
    }

    pub fn insert(&mut self, name: &'static str, object: Value) {
        self.collection_mut(name).push(object);
    }

    /// `*.get` over a collection
    pub fn select(&self, name: &str, params: &Value) -> Vec<Value> {
        self.collection(name)
            .iter()
            .filter(|obj| matches_hostids(obj, params.get("hostids")))
            .filter(|obj| matches_filter(obj, params.get("filter")))
            .filter(|obj| matches_search(obj, params.get("search"), params.get("searchByAny")))
            .map(|obj| project(obj, params))
            .collect()
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn matches_hostids(obj: &Value, hostids: Option<&Value>) -> bool {
    let Some(hostids) = hostids else { return true };
    let Some(own) = obj.get("hostid") else { return false };
    as_list(hostids).iter().any(|id| text(id) == text(own))
}

fn matches_filter(obj: &Value, filter: Option<&Value>) -> bool {
    let Some(Value::Object(filter)) = filter else { return true };
    filter.iter().all(|(field, wanted)| match obj.get(field) {
        Some(actual) => as_list(wanted).iter().any(|w| text(w) == text(actual)),
        None => false,
    })
}

fn matches_search(obj: &Value, search: Option<&Value>, by_any: Option<&Value>) -> bool {
    let Some(Value::Object(search)) = search else { return true };
    if search.is_empty() {
        return true;
    }
    let field_matches = |(field, patterns): (&String, &Value)| match obj.get(field) {
        Some(actual) => {
            let actual = text(actual).to_lowercase();
            as_list(patterns)
                .iter()
                .any(|p| actual.contains(&text(p).to_lowercase()))
        }
        None => false,
    };
    if by_any.and_then(Value::as_bool).unwrap_or(false) {
        search.iter().any(field_matches)
    } else {
        search.iter().all(field_matches)
    }
}

fn project(obj: &Value, params: &Value) -> Value {
    let Value::Object(full) = obj else { return obj.clone() };
    let mut out = Map::new();
    match params.get("output") {
        Some(Value::Array(fields)) => {
            for field in fields.iter().filter_map(Value::as_str) {
                if let Some(v) = full.get(field) {
                    out.insert(field.to_string(), v.clone());
                }
            }
        }
        _ => {
            for (k, v) in full {
                if k != "password" && k != "pages" {
                    out.insert(k.clone(), v.clone());
                }
            }
        }
    }
    if params.get("selectPages").is_some() {
        if let Some(pages) = full.get("pages") {
            out.insert("pages".to_string(), pages.clone());
        }
    }
    Value::Object(out)
}
