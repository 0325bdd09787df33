use super::Reconciler;
use crate::dashboard::layout::KEY_DISK;
use crate::error::Result;
use crate::models::{ObjectId, TriggerCreate};

/// Substring identifying the disk trigger among the host's triggers
pub const DISK_TRIGGER_SEARCH: &str = "Диск: свободно меньше 25%";
pub const DISK_TRIGGER_DESCRIPTION: &str = "Диск: свободно меньше 25% на {HOST.NAME}";
/// Warning
pub const DISK_TRIGGER_PRIORITY: u8 = 3;

/// Free space of the `/hostfs` mount under 25%
pub fn disk_trigger_expression(host_name: &str) -> String {
    format!("last(/{host_name}/{KEY_DISK})<25")
}

impl Reconciler<'_> {
    /// Disk-space trigger on the host, created when no trigger description
    /// contains `description_substring`.
    pub async fn ensure_trigger(
        &mut self,
        host_id: &ObjectId,
        host_name: &str,
        description_substring: &str,
    ) -> Result<()> {
        let existing = self.api.trigger_search(host_id, description_substring).await?;
        if let Some(trigger) = existing.first() {
            self.report
                .unchanged(format!("trigger '{}' ({})", description_substring, trigger.triggerid));
            return Ok(());
        }

        let request = TriggerCreate {
            description: DISK_TRIGGER_DESCRIPTION.to_string(),
            expression: disk_trigger_expression(host_name),
            priority: DISK_TRIGGER_PRIORITY,
        };
        let id = self.api.trigger_create(&request).await?;
        self.report
            .created(format!("trigger '{}' ({})", DISK_TRIGGER_DESCRIPTION, id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_embeds_host_name() {
        assert_eq!(
            disk_trigger_expression("Visiology-Server"),
            "last(/Visiology-Server/vfs.fs.size[/hostfs,pfree])<25"
        );
        assert!(DISK_TRIGGER_DESCRIPTION.starts_with(DISK_TRIGGER_SEARCH));
    }
}
