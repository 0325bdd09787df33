use super::Reconciler;
use crate::config::AgentInterface;
use crate::error::Result;
use crate::models::{GroupLink, HostCreate, InterfaceCreate, ObjectId, TemplateLink};
use tracing::warn;

impl Reconciler<'_> {
    /// Host by technical name, created with one agent interface when absent.
    ///
    /// Interfaces and templates of an existing host are left as they are.
    pub async fn ensure_host(
        &mut self,
        name: &str,
        group_id: &ObjectId,
        interface: &AgentInterface,
        template_ids: &[ObjectId],
    ) -> Result<ObjectId> {
        if let Some(host) = self.api.host_get(name).await?.into_iter().next() {
            self.report.unchanged(format!("host '{}' ({})", name, host.hostid));
            return Ok(host.hostid);
        }

        let request = HostCreate {
            host: name.to_string(),
            groups: vec![GroupLink { groupid: group_id.clone() }],
            interfaces: vec![InterfaceCreate::agent(&interface.ip, interface.port)],
            templates: template_ids
                .iter()
                .map(|id| TemplateLink { templateid: id.clone() })
                .collect(),
        };
        let id = self.api.host_create(&request).await?;
        self.report.created(format!(
            "host '{}' ({}) with {} template(s), agent {}:{}",
            name,
            id,
            template_ids.len(),
            interface.ip,
            interface.port
        ));
        Ok(id)
    }

    /// Interface the items poll through: the main one, else the first
    pub async fn primary_interface(&mut self, host_id: &ObjectId) -> Result<Option<ObjectId>> {
        let interfaces = self.api.host_interfaces(host_id).await?;
        let chosen = interfaces
            .iter()
            .find(|i| i.main == 1)
            .or_else(|| interfaces.first())
            .map(|i| i.interfaceid.clone());
        if chosen.is_none() {
            warn!("Host {} has no interface", host_id);
        }
        Ok(chosen)
    }
}
