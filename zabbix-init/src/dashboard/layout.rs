//! Widget layout of the main dashboard and the name-keyed page merge
//!
//! The grid is 72 columns wide. Widgets are identified by display name: the
//! API gives no client-controlled stable key, so two widgets sharing a name
//! are indistinguishable here.

use crate::models::{ObjectId, Widget, WidgetField};
use std::collections::{HashMap, HashSet};

pub const WIDGET_SEVERITY: &str = "Проблемы по важности";
pub const WIDGET_RUNNING: &str = "Запущенные контейнеры (docker ps)";
pub const WIDGET_EXITED: &str = "Exited контейнеры";
pub const WIDGET_PROBLEMS: &str = "Проблемы и предупреждения";
pub const WIDGET_DISK: &str = "Свободно места на диске (%)";
pub const WIDGET_SWARM: &str = "Состояние Docker Swarm";

pub const KEY_RUNNING: &str = "docker.containers.running";
pub const KEY_EXITED: &str = "docker.containers.exited";
pub const KEY_SWARM: &str = "docker.swarm.state";
pub const KEY_DISK: &str = "vfs.fs.size[/hostfs,pfree]";

/// Field holding the item a widget displays
pub const ITEM_FIELD: &str = "itemid.0";

/// Widgets bound to an item, by widget name
const ITEM_BINDINGS: [(&str, &str); 4] = [
    (WIDGET_RUNNING, KEY_RUNNING),
    (WIDGET_EXITED, KEY_EXITED),
    (WIDGET_DISK, KEY_DISK),
    (WIDGET_SWARM, KEY_SWARM),
];

pub fn bound_item_key(widget_name: &str) -> Option<&'static str> {
    ITEM_BINDINGS
        .iter()
        .find(|(name, _)| *name == widget_name)
        .map(|(_, key)| *key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

const fn slot(x: u32, y: u32, width: u32, height: u32) -> Slot {
    Slot { x, y, width, height }
}

fn widget(kind: &str, name: &str, at: Slot, fields: Vec<WidgetField>) -> Widget {
    Widget {
        widgetid: None,
        kind: kind.to_string(),
        name: name.to_string(),
        x: at.x,
        y: at.y,
        width: at.width,
        height: at.height,
        view_mode: 0,
        fields: Some(fields),
    }
}

fn item_widget(name: &str, at: Slot, item_id: &ObjectId) -> Widget {
    widget(
        "item",
        name,
        at,
        vec![
            WidgetField::item(ITEM_FIELD, item_id),
            WidgetField::integer("show.0", 1),
            WidgetField::integer("show.1", 2),
        ],
    )
}

/// Full layout for a fresh dashboard. Item widgets whose item id is unknown are left out.
pub fn desired_widgets(group_id: &ObjectId, items: &HashMap<String, ObjectId>) -> Vec<Widget> {
    let mut widgets = Vec::new();

    // row 0: severity breakdown, running and exited containers
    widgets.push(widget(
        "problemsbysv",
        WIDGET_SEVERITY,
        slot(0, 0, 24, 5),
        vec![
            WidgetField::host_group("groupids.0", group_id),
            WidgetField::string("reference", "SEV01"),
        ],
    ));
    if let Some(id) = items.get(KEY_RUNNING) {
        widgets.push(item_widget(WIDGET_RUNNING, slot(24, 0, 24, 8), id));
    }
    if let Some(id) = items.get(KEY_EXITED) {
        widgets.push(item_widget(WIDGET_EXITED, slot(48, 0, 24, 8), id));
    }

    // row 1: problems list
    widgets.push(widget(
        "problems",
        WIDGET_PROBLEMS,
        slot(0, 8, 72, 20),
        vec![
            WidgetField::host_group("groupids.0", group_id),
            WidgetField::integer("show", 3),
            WidgetField::integer("show_lines", 25),
            WidgetField::integer("show_timeline", 1),
            WidgetField::integer("show_opdata", 1),
            WidgetField::string("reference", "PRB01"),
        ],
    ));

    // row 2: disk gauge, swarm state
    if let Some(id) = items.get(KEY_DISK) {
        widgets.push(widget(
            "gauge",
            WIDGET_DISK,
            slot(0, 28, 24, 10),
            vec![
                WidgetField::item(ITEM_FIELD, id),
                WidgetField::string("min", "0"),
                WidgetField::string("max", "100"),
                WidgetField::integer("show.0", 1),
                WidgetField::integer("show.1", 2),
                WidgetField::integer("show.2", 4),
                WidgetField::integer("show.3", 5),
            ],
        ));
    }
    if let Some(id) = items.get(KEY_SWARM) {
        widgets.push(item_widget(WIDGET_SWARM, slot(24, 28, 24, 10), id));
    }

    widgets
}

/// Lowest occupied row of a page, 0 when empty
pub fn max_bottom(widgets: &[Widget]) -> u32 {
    widgets.iter().map(Widget::bottom).max().unwrap_or(0)
}

/// Where a widget missing from an existing page goes, below `bottom`
pub fn append_slot(name: &str, bottom: u32) -> Slot {
    match name {
        WIDGET_RUNNING => slot(0, bottom, 24, 8),
        WIDGET_EXITED => slot(24, bottom, 24, 8),
        WIDGET_DISK => slot(48, bottom, 24, 10),
        WIDGET_SWARM => slot(0, bottom + 10, 24, 10),
        _ => slot(0, bottom, 24, 8),
    }
}

/// Result of merging the desired layout into an existing page
#[derive(Debug, Clone, PartialEq)]
pub struct MergedPage {
    pub widgets: Vec<Widget>,
    pub added: Vec<String>,
    pub rebound: Vec<String>,
}

impl MergedPage {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.rebound.is_empty()
    }
}

fn field_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Point the widget's item field at `item_id`. Returns true when it changed.
fn rebind(widget: &mut Widget, item_id: &ObjectId) -> bool {
    let Some(fields) = widget.fields.as_mut() else {
        return false;
    };
    let Some(field) = fields.iter_mut().find(|f| f.name == ITEM_FIELD) else {
        return false;
    };
    let wanted = WidgetField::item(ITEM_FIELD, item_id);
    if field.kind == wanted.kind && field_text(&field.value) == item_id.as_str() {
        return false;
    }
    *field = wanted;
    true
}

/// Keyed union by widget name.
///
/// Existing widgets keep their id and geometry; the item field of bound
/// widgets is repointed at the freshly resolved item. Desired widgets whose
/// name is not on the page are appended below the lowest occupied row.
pub fn merge_page(
    existing: &[Widget],
    desired: Vec<Widget>,
    items: &HashMap<String, ObjectId>,
) -> MergedPage {
    let present: HashSet<&str> = existing
        .iter()
        .map(|w| w.name.as_str())
        .filter(|n| !n.is_empty())
        .collect();
    let bottom = max_bottom(existing);

    let mut widgets = Vec::with_capacity(existing.len() + desired.len());
    let mut rebound = Vec::new();
    for current in existing {
        let mut kept = current.clone();
        let item_id = bound_item_key(&kept.name).and_then(|key| items.get(key));
        if let Some(item_id) = item_id {
            if rebind(&mut kept, item_id) {
                rebound.push(kept.name.clone());
            }
        }
        widgets.push(kept);
    }

    let mut added = Vec::new();
    for mut new in desired {
        if present.contains(new.name.as_str()) {
            continue;
        }
        let at = append_slot(&new.name, bottom);
        new.x = at.x;
        new.y = at.y;
        new.width = at.width;
        new.height = at.height;
        added.push(new.name.clone());
        widgets.push(new);
    }

    MergedPage {
        widgets,
        added,
        rebound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::field_type;
    use serde_json::json;

    fn all_items() -> HashMap<String, ObjectId> {
        [(KEY_RUNNING, "31"), (KEY_EXITED, "32"), (KEY_SWARM, "33"), (KEY_DISK, "34")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), ObjectId::from(v)))
            .collect()
    }

    fn existing_widget(value: serde_json::Value) -> Widget {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_full_layout() {
        let widgets = desired_widgets(&"5".into(), &all_items());
        let names: Vec<&str> = widgets.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                WIDGET_SEVERITY,
                WIDGET_RUNNING,
                WIDGET_EXITED,
                WIDGET_PROBLEMS,
                WIDGET_DISK,
                WIDGET_SWARM,
            ]
        );
        let problems = &widgets[3];
        assert_eq!((problems.x, problems.y, problems.width, problems.height), (0, 8, 72, 20));
        let gauge = &widgets[4];
        assert_eq!(gauge.kind, "gauge");
        assert_eq!(gauge.fields.as_ref().unwrap()[0].value, json!("34"));
        let severity_group = &widgets[0].fields.as_ref().unwrap()[0];
        assert_eq!(severity_group.kind, field_type::HOST_GROUP);
        assert_eq!(severity_group.value, json!(5));
    }

    #[test]
    fn test_layout_skips_unknown_items() {
        let mut items = all_items();
        items.remove(KEY_SWARM);
        items.remove(KEY_RUNNING);
        let widgets = desired_widgets(&"5".into(), &items);
        assert_eq!(widgets.len(), 4);
        assert!(widgets.iter().all(|w| w.name != WIDGET_SWARM && w.name != WIDGET_RUNNING));
    }

    #[test]
    fn test_rebinds_stale_item_and_keeps_geometry() {
        let existing = vec![existing_widget(json!({
            "widgetid": "900", "type": "item", "name": WIDGET_EXITED,
            "x": "10", "y": "3", "width": "20", "height": "7", "view_mode": "0",
            "fields": [
                {"type": "0", "name": "show.0", "value": "1"},
                {"type": "4", "name": ITEM_FIELD, "value": "41"}
            ]
        }))];
        let mut items = HashMap::new();
        items.insert(KEY_EXITED.to_string(), ObjectId::from("77"));

        let merged = merge_page(&existing, Vec::new(), &items);
        assert_eq!(merged.rebound, vec![WIDGET_EXITED.to_string()]);
        let w = &merged.widgets[0];
        assert_eq!(w.widgetid, Some(ObjectId::from("900")));
        assert_eq!((w.x, w.y, w.width, w.height), (10, 3, 20, 7));
        let fields = w.fields.as_ref().unwrap();
        assert_eq!(fields[0].name, "show.0");
        assert_eq!(fields[1].value, json!("77"));
        assert_eq!(fields[1].kind, field_type::ITEM);
    }

    #[test]
    fn test_current_binding_is_not_a_change() {
        let existing = vec![existing_widget(json!({
            "type": "item", "name": WIDGET_EXITED, "x": 48, "y": 0, "width": 24, "height": 8,
            "fields": [{"type": 4, "name": ITEM_FIELD, "value": "32"}]
        }))];
        let merged = merge_page(&existing, Vec::new(), &all_items());
        assert!(merged.is_unchanged());
    }

    #[test]
    fn test_appends_missing_widgets_below_page() {
        let existing = vec![
            existing_widget(json!({
                "type": "clock", "name": "Clock",
                "x": 0, "y": 0, "width": 12, "height": 5
            })),
            existing_widget(json!({
                "type": "problemsbysv", "name": WIDGET_SEVERITY,
                "x": 12, "y": 2, "width": 24, "height": 5
            })),
        ];
        let items = all_items();
        let desired = desired_widgets(&"5".into(), &items);
        let merged = merge_page(&existing, desired, &items);

        assert_eq!(
            merged.added,
            vec![WIDGET_RUNNING, WIDGET_EXITED, WIDGET_PROBLEMS, WIDGET_DISK, WIDGET_SWARM]
        );
        assert_eq!(merged.widgets.len(), 7);
        let at = |name: &str| {
            let w = merged.widgets.iter().find(|w| w.name == name).unwrap();
            (w.x, w.y, w.width, w.height)
        };
        assert_eq!(at(WIDGET_SEVERITY), (12, 2, 24, 5));
        assert_eq!(at(WIDGET_RUNNING), (0, 7, 24, 8));
        assert_eq!(at(WIDGET_EXITED), (24, 7, 24, 8));
        assert_eq!(at(WIDGET_DISK), (48, 7, 24, 10));
        assert_eq!(at(WIDGET_SWARM), (0, 17, 24, 10));
        assert_eq!(at(WIDGET_PROBLEMS), (0, 7, 24, 8));
    }

    #[test]
    fn test_max_bottom() {
        assert_eq!(max_bottom(&[]), 0);
        let w = existing_widget(json!({"type": "clock", "y": "6"}));
        assert_eq!(max_bottom(&[w]), 10);
    }
}
