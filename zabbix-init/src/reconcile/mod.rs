//! Idempotent reconciliation against a Zabbix server
//!
//! Fixed order: wait → login → group → templates → host → trigger →
//! interface → items → dashboard. Every create is preceded by a lookup on the
//! resource's natural key, so a second run on unchanged inputs writes nothing.
//!
//! Concurrent runs against the same server are not coordinated and may race
//! between a lookup and the matching create.

mod group;
mod host;
mod item;
mod template;
mod trigger;

pub use item::{ItemSpec, DASHBOARD_ITEMS};
pub use template::TemplateResolution;
pub use trigger::{
    disk_trigger_expression, DISK_TRIGGER_DESCRIPTION, DISK_TRIGGER_PRIORITY, DISK_TRIGGER_SEARCH,
};

use crate::api::ZabbixApi;
use crate::config::Settings;
use crate::error::Result;
use crate::rpc::ApiVersion;
use crate::waiter::wait_until_ready;
use tracing::{info, warn};

/// Whether a failing step aborts the run or is logged and skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPolicy {
    pub required: bool,
}

impl StepPolicy {
    pub const REQUIRED: Self = Self { required: true };
    pub const BEST_EFFORT: Self = Self { required: false };

    /// Propagate the error of a required step; downgrade it to a warning otherwise
    pub fn settle<T>(
        self,
        step: &str,
        result: Result<T>,
        report: &mut ReconcileReport,
    ) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if self.required => Err(e),
            Err(e) => {
                warn!("{} skipped: {}", step, e);
                report.warnings.push(format!("{step}: {e}"));
                Ok(None)
            }
        }
    }
}

/// Policies of the steps whose failure may be tolerated.
///
/// Group, template, host and interface resolution feed every later step and
/// are always fatal.
#[derive(Debug, Clone, Copy)]
pub struct StepPolicies {
    pub trigger: StepPolicy,
    pub items: StepPolicy,
    pub dashboard: StepPolicy,
}

impl Default for StepPolicies {
    fn default() -> Self {
        Self {
            trigger: StepPolicy::BEST_EFFORT,
            items: StepPolicy::BEST_EFFORT,
            dashboard: StepPolicy::REQUIRED,
        }
    }
}

/// What a run did, resource by resource
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub warnings: Vec<String>,
}

impl ReconcileReport {
    pub(crate) fn created(&mut self, what: String) {
        info!("Created {}", what);
        self.created.push(what);
    }

    pub(crate) fn updated(&mut self, what: String) {
        info!("Updated {}", what);
        self.updated.push(what);
    }

    pub(crate) fn unchanged(&mut self, what: String) {
        info!("{} already present", what);
        self.unchanged.push(what);
    }

    pub(crate) fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    /// True when the run did not write anything
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty()
    }
}

pub struct Reconciler<'a> {
    pub(crate) api: ZabbixApi,
    pub(crate) settings: &'a Settings,
    pub(crate) policies: StepPolicies,
    pub(crate) report: ReconcileReport,
}

impl<'a> Reconciler<'a> {
    pub fn new(api: ZabbixApi, settings: &'a Settings) -> Self {
        Self {
            api,
            settings,
            policies: StepPolicies::default(),
            report: ReconcileReport::default(),
        }
    }

    pub fn with_policies(mut self, policies: StepPolicies) -> Self {
        self.policies = policies;
        self
    }

    pub fn report(&self) -> &ReconcileReport {
        &self.report
    }

    /// Wait for the API, then log in
    pub async fn connect(&mut self) -> Result<ApiVersion> {
        let api = &self.api;
        let wait = &self.settings.wait;
        let version =
            wait_until_ready(move || api.api_version(), wait.max_wait, wait.poll_interval)
                .await?;

        self.api
            .login(&version, &self.settings.username, &self.settings.password)
            .await?;
        Ok(version)
    }

    /// Full provisioning sequence
    pub async fn run(mut self) -> Result<ReconcileReport> {
        let settings = self.settings;
        self.connect().await?;

        let group_id = self.ensure_group(&settings.host_group).await?;
        let templates = self.resolve_templates(&settings.templates).await?;
        let host_id = self
            .ensure_host(&settings.hostname, &group_id, &settings.agent, &templates.ids)
            .await?;

        let trigger = self
            .ensure_trigger(&host_id, &settings.hostname, DISK_TRIGGER_SEARCH)
            .await;
        self.policies.trigger.settle("disk trigger", trigger, &mut self.report)?;

        let interface_id = self.primary_interface(&host_id).await?;
        let item_ids = self
            .ensure_items(&host_id, interface_id.as_ref(), &DASHBOARD_ITEMS)
            .await?;

        match &settings.dashboard {
            Some(dashboard) => {
                let outcome = self
                    .ensure_dashboard_for_user(
                        &dashboard.name,
                        &group_id,
                        &settings.username,
                        &item_ids,
                    )
                    .await;
                self.policies.dashboard.settle("dashboard", outcome, &mut self.report)?;
            }
            None => info!("Dashboard reconciliation disabled"),
        }

        Ok(self.report)
    }
}
