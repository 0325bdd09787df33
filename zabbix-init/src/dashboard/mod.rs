//! Main dashboard reconciliation
//!
//! Three outcomes:
//! - no dashboard with that name: create it with the full layout
//! - dashboard without pages: leave it alone
//! - dashboard with a page: merge widgets by name and write the page back

pub mod layout;

use crate::error::Result;
use crate::models::{
    DashboardCreate, DashboardUpdate, DashboardUser, NewPage, ObjectId, PageUpdate,
    PERMISSION_READ_WRITE,
};
use crate::reconcile::Reconciler;
use layout::{desired_widgets, merge_page};
use std::collections::HashMap;
use tracing::info;

/// Seconds per page in slideshow mode
pub const DISPLAY_PERIOD: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardOutcome {
    Created(ObjectId),
    /// Present without pages, treated as configured by hand
    Untouched,
    Unchanged,
    Updated { added: Vec<String>, rebound: Vec<String> },
}

impl Reconciler<'_> {
    /// Owner of a new dashboard: the logged-in user, or user 1 when it cannot be found
    pub async fn dashboard_owner(&mut self, username: &str) -> Result<ObjectId> {
        Ok(self
            .api
            .user_id(username)
            .await?
            .unwrap_or_else(|| ObjectId::from("1")))
    }

    pub async fn ensure_dashboard(
        &mut self,
        name: &str,
        group_id: &ObjectId,
        owner_id: &ObjectId,
        item_ids_by_key: &HashMap<String, ObjectId>,
    ) -> Result<DashboardOutcome> {
        let existing = self.api.dashboard_get(name).await?.into_iter().next();

        let Some(dashboard) = existing else {
            let request = DashboardCreate {
                name: name.to_string(),
                display_period: DISPLAY_PERIOD,
                auto_start: 1,
                pages: vec![NewPage {
                    name: String::new(),
                    widgets: desired_widgets(group_id, item_ids_by_key),
                }],
                users: vec![DashboardUser {
                    userid: owner_id.clone(),
                    permission: PERMISSION_READ_WRITE,
                }],
                user_groups: Vec::new(),
            };
            let id = self.api.dashboard_create(&request).await?;
            self.report.created(format!(
                "dashboard '{}' ({}) with {} widget(s)",
                name,
                id,
                request.pages[0].widgets.len()
            ));
            return Ok(DashboardOutcome::Created(id));
        };

        let Some(page) = dashboard.pages.first() else {
            self.report
                .unchanged(format!("dashboard '{}' ({}, no pages)", name, dashboard.dashboardid));
            return Ok(DashboardOutcome::Untouched);
        };

        let merged = merge_page(
            &page.widgets,
            desired_widgets(group_id, item_ids_by_key),
            item_ids_by_key,
        );
        if merged.is_unchanged() {
            self.report
                .unchanged(format!("dashboard '{}' ({})", name, dashboard.dashboardid));
            return Ok(DashboardOutcome::Unchanged);
        }

        let update = DashboardUpdate {
            dashboardid: dashboard.dashboardid.clone(),
            pages: vec![PageUpdate {
                dashboard_pageid: page.dashboard_pageid.clone(),
                widgets: merged.widgets,
            }],
        };
        self.api.dashboard_update(&update).await?;

        if !merged.added.is_empty() {
            info!("Widgets added to '{}': {}", name, merged.added.join(", "));
        }
        if !merged.rebound.is_empty() {
            info!("Item bindings repaired in '{}': {}", name, merged.rebound.join(", "));
        }
        self.report
            .updated(format!("dashboard '{}' ({})", name, dashboard.dashboardid));
        Ok(DashboardOutcome::Updated {
            added: merged.added,
            rebound: merged.rebound,
        })
    }

    pub(crate) async fn ensure_dashboard_for_user(
        &mut self,
        name: &str,
        group_id: &ObjectId,
        username: &str,
        item_ids_by_key: &HashMap<String, ObjectId>,
    ) -> Result<DashboardOutcome> {
        let owner = self.dashboard_owner(username).await?;
        self.ensure_dashboard(name, group_id, &owner, item_ids_by_key).await
    }
}
