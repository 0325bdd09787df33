/*!
Test harness for zabbix-init

Starts a [`ZabbixStub`] and hands out the environment zabbix-init would
read, pointed at the stub.
*/

use crate::zabbix_stub::ZabbixStub;
use anyhow::Result;
use std::collections::HashMap;

pub struct TestHarness {
    pub stub: ZabbixStub,
    pub url: String,
    env: HashMap<String, String>,
}

impl TestHarness {
    /// Harness around a Zabbix 7.0 stub
    pub async fn start() -> Result<Self> {
        Self::start_with(ZabbixStub::new()).await
    }

    pub async fn start_with(stub: ZabbixStub) -> Result<Self> {
        env_logger::builder().is_test(true).try_init().ok();

        let url = stub.start().await?;
        let mut env = HashMap::new();
        for (key, value) in [
            ("ZABBIX_URL", url.as_str()),
            ("ZABBIX_USER", "Admin"),
            ("ZABBIX_PASSWORD", "zabbix"),
            ("ZBX_HOSTNAME", "Visiology-Server"),
            ("ZABBIX_AGENT_IP", "10.0.0.5"),
            ("ZABBIX_HOST_GROUP", "Visiology"),
            ("ZABBIX_WAIT_MAX_SECS", "5"),
            ("ZABBIX_WAIT_STEP_SECS", "1"),
            ("ZABBIX_REQUEST_TIMEOUT_SECS", "5"),
        ] {
            env.insert(key.to_string(), value.to_string());
        }
        Ok(Self { stub, url, env })
    }

    /// Override one variable
    pub fn set(&mut self, key: &str, value: &str) -> &mut Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn unset(&mut self, key: &str) -> &mut Self {
        self.env.remove(key);
        self
    }

    /// Lookup function for `Settings::from_lookup`
    pub fn lookup(&self) -> impl Fn(&str) -> Option<String> + '_ {
        move |key| self.env.get(key).cloned()
    }
}
