use super::Reconciler;
use crate::dashboard::layout::{KEY_DISK, KEY_EXITED, KEY_RUNNING, KEY_SWARM};
use crate::error::Result;
use crate::models::{ItemCreate, ObjectId, ValueType, ITEM_TYPE_AGENT};
use std::collections::HashMap;

/// Polling interval of the items we create
pub const ITEM_DELAY: &str = "60s";

/// An item the dashboard widgets read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemSpec {
    pub name: &'static str,
    pub key: &'static str,
    pub value_type: ValueType,
    pub units: Option<&'static str>,
}

// docker.* keys come from agent UserParameters (agent 2 has no system.run)
pub const DASHBOARD_ITEMS: [ItemSpec; 4] = [
    ItemSpec {
        name: "Docker: running containers",
        key: KEY_RUNNING,
        value_type: ValueType::Text,
        units: None,
    },
    ItemSpec {
        name: "Docker: exited containers",
        key: KEY_EXITED,
        value_type: ValueType::Text,
        units: None,
    },
    ItemSpec {
        name: "Docker: Swarm state",
        key: KEY_SWARM,
        value_type: ValueType::Text,
        units: None,
    },
    ItemSpec {
        name: "Disk: /hostfs free %",
        key: KEY_DISK,
        value_type: ValueType::Float,
        units: Some("%"),
    },
];

impl Reconciler<'_> {
    /// Item by exact key on the host, created when absent.
    ///
    /// Returns `None` when the item is missing and the host has no interface to poll through.
    pub async fn ensure_item(
        &mut self,
        host_id: &ObjectId,
        interface_id: Option<&ObjectId>,
        spec: &ItemSpec,
    ) -> Result<Option<ObjectId>> {
        if let Some(item) = self.api.item_get(host_id, spec.key).await?.into_iter().next() {
            self.report.unchanged(format!("item '{}' ({})", spec.key, item.itemid));
            return Ok(Some(item.itemid));
        }

        let Some(interface_id) = interface_id else {
            self.report
                .warn(format!("Item '{}' not created: host has no interface", spec.name));
            return Ok(None);
        };

        let request = ItemCreate {
            hostid: host_id.clone(),
            name: spec.name.to_string(),
            key_: spec.key.to_string(),
            kind: ITEM_TYPE_AGENT,
            value_type: spec.value_type,
            interfaceid: interface_id.clone(),
            delay: ITEM_DELAY.to_string(),
            units: spec.units.map(str::to_string),
        };
        let id = self.api.item_create(&request).await?;
        self.report.created(format!("item '{}' ({})", spec.key, id));
        Ok(Some(id))
    }

    /// Reconcile a catalogue of items; returns the ids known by key.
    ///
    /// Each item follows the items policy: with the default best-effort
    /// policy a failing item is logged and the others still run.
    pub async fn ensure_items(
        &mut self,
        host_id: &ObjectId,
        interface_id: Option<&ObjectId>,
        specs: &[ItemSpec],
    ) -> Result<HashMap<String, ObjectId>> {
        let mut ids = HashMap::new();
        for spec in specs {
            if ids.contains_key(spec.key) {
                continue;
            }
            let outcome = self.ensure_item(host_id, interface_id, spec).await;
            let step = format!("item '{}'", spec.name);
            if let Some(Some(id)) = self.policies.items.settle(&step, outcome, &mut self.report)? {
                ids.insert(spec.key.to_string(), id);
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::layout::{
        bound_item_key, WIDGET_DISK, WIDGET_EXITED, WIDGET_RUNNING, WIDGET_SWARM,
    };

    #[test]
    fn test_every_bound_widget_has_an_item() {
        for widget in [WIDGET_RUNNING, WIDGET_EXITED, WIDGET_DISK, WIDGET_SWARM] {
            let key = bound_item_key(widget).unwrap();
            assert!(
                DASHBOARD_ITEMS.iter().any(|spec| spec.key == key),
                "no item for {widget} ({key})"
            );
        }
    }
}
