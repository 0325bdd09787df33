use super::Reconciler;
use crate::error::Result;
use crate::models::ObjectId;

impl Reconciler<'_> {
    /// Host group by exact name, created when absent. Existing groups are never modified.
    pub async fn ensure_group(&mut self, name: &str) -> Result<ObjectId> {
        if let Some(group) = self.api.hostgroup_get(name).await?.into_iter().next() {
            self.report.unchanged(format!("host group '{}' ({})", name, group.groupid));
            return Ok(group.groupid);
        }

        let id = self.api.hostgroup_create(name).await?;
        self.report.created(format!("host group '{}' ({})", name, id));
        Ok(id)
    }
}
