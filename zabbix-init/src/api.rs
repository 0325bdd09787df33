//! Typed Zabbix API: one method per remote operation used by the reconciler

use crate::config::{AuthMode, Settings};
use crate::error::{Result, ZabbixError};
use crate::models::*;
use crate::rpc::{token_placement, ApiVersion, RpcClient, Session};
use serde_json::json;
use tracing::info;

pub struct ZabbixApi {
    rpc: RpcClient,
    auth_mode: AuthMode,
}

impl ZabbixApi {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(settings)?,
            auth_mode: settings.auth_mode,
        })
    }

    /// `apiinfo.version` (never authenticated)
    pub async fn api_version(&self) -> Result<ApiVersion> {
        let method = "apiinfo.version";
        let raw: String = self.rpc.call_anonymous(method, &json!([])).await?;
        ApiVersion::parse(&raw).ok_or_else(|| {
            ZabbixError::decode(
                method,
                serde::de::Error::custom(format!("unparsable version '{raw}'")),
            )
        })
    }

    /// `user.login`, then keep the token for every later call
    pub async fn login(
        &mut self,
        version: &ApiVersion,
        username: &str,
        password: &str,
    ) -> Result<()> {
        let params = if version.at_least(5, 4) {
            LoginRequest { username: Some(username), user: None, password }
        } else {
            LoginRequest { username: None, user: Some(username), password }
        };
        let token: String = self.rpc.call_anonymous("user.login", &params).await?;
        let placement = token_placement(self.auth_mode, version);
        info!("Logged in as '{}' (API {}, token via {:?})", username, version, placement);
        self.rpc.set_session(Session { token, placement });
        Ok(())
    }

    pub async fn user_id(&self, username: &str) -> Result<Option<ObjectId>> {
        let mut request = GetRequest::new(Output::fields(&["userid"]));
        request.filter = Some(json!({ "username": username }));
        let users: Vec<UserRef> = self.rpc.call("user.get", &request).await?;
        Ok(users.into_iter().next().map(|u| u.userid))
    }

    pub async fn hostgroup_get(&self, name: &str) -> Result<Vec<HostGroup>> {
        let mut request = GetRequest::new(Output::fields(&["groupid", "name"]));
        request.filter = Some(json!({ "name": name }));
        self.rpc.call("hostgroup.get", &request).await
    }

    pub async fn hostgroup_create(&self, name: &str) -> Result<ObjectId> {
        self.create("hostgroup.create", &HostGroupCreate { name }, "groupids").await
    }

    /// Substring search matching any of `names`
    pub async fn template_search(&self, names: &[String]) -> Result<Vec<Template>> {
        let mut request = GetRequest::new(Output::fields(&["templateid", "name"]));
        request.search = Some(json!({ "name": names }));
        request.search_by_any = Some(true);
        self.rpc.call("template.get", &request).await
    }

    pub async fn host_get(&self, host: &str) -> Result<Vec<HostRef>> {
        let mut request = GetRequest::new(Output::fields(&["hostid"]));
        request.filter = Some(json!({ "host": host }));
        self.rpc.call("host.get", &request).await
    }

    pub async fn host_create(&self, host: &HostCreate) -> Result<ObjectId> {
        self.create("host.create", host, "hostids").await
    }

    pub async fn host_interfaces(&self, host_id: &ObjectId) -> Result<Vec<HostInterface>> {
        let mut request = GetRequest::new(Output::fields(&["interfaceid", "main"]));
        request.hostids = Some(host_id.clone());
        self.rpc.call("hostinterface.get", &request).await
    }

    pub async fn trigger_search(
        &self,
        host_id: &ObjectId,
        description: &str,
    ) -> Result<Vec<TriggerRef>> {
        let mut request = GetRequest::new(Output::fields(&["triggerid"]));
        request.hostids = Some(host_id.clone());
        request.search = Some(json!({ "description": description }));
        request.search_by_any = Some(false);
        self.rpc.call("trigger.get", &request).await
    }

    pub async fn trigger_create(&self, trigger: &TriggerCreate) -> Result<ObjectId> {
        self.create("trigger.create", trigger, "triggerids").await
    }

    pub async fn item_get(&self, host_id: &ObjectId, key: &str) -> Result<Vec<ItemRef>> {
        let mut request = GetRequest::new(Output::fields(&["itemid"]));
        request.hostids = Some(host_id.clone());
        request.filter = Some(json!({ "key_": key }));
        self.rpc.call("item.get", &request).await
    }

    pub async fn item_create(&self, item: &ItemCreate) -> Result<ObjectId> {
        self.create("item.create", item, "itemids").await
    }

    /// Dashboards by exact name, with their pages and widgets
    pub async fn dashboard_get(&self, name: &str) -> Result<Vec<Dashboard>> {
        let mut request = GetRequest::new(Output::fields(&["dashboardid"]));
        request.filter = Some(json!({ "name": name }));
        request.select_pages = Some(Output::extend());
        self.rpc.call("dashboard.get", &request).await
    }

    pub async fn dashboard_create(&self, dashboard: &DashboardCreate) -> Result<ObjectId> {
        self.create("dashboard.create", dashboard, "dashboardids").await
    }

    pub async fn dashboard_update(&self, update: &DashboardUpdate) -> Result<()> {
        let _: CreatedIds = self.rpc.call("dashboard.update", update).await?;
        Ok(())
    }

    async fn create<P: serde::Serialize>(
        &self,
        method: &str,
        params: &P,
        key: &str,
    ) -> Result<ObjectId> {
        let created: CreatedIds = self.rpc.call(method, params).await?;
        created.first(key).cloned().ok_or_else(|| {
            ZabbixError::decode(
                method,
                serde::de::Error::custom(format!("missing '{key}' in result")),
            )
        })
    }
}
