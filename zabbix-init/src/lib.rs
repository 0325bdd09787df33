//! zabbix-init - idempotent provisioning of a Zabbix server
//!
//! Ensures, through the JSON-RPC API:
//! - a host group and a host with a Zabbix agent interface
//! - Linux/Docker template links (templates must already exist)
//! - a "free disk space < 25%" trigger
//! - the items and widgets of the main dashboard
//!
//! Anything already present is left untouched.

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod rpc;
pub mod waiter;

pub use api::ZabbixApi;
pub use config::Settings;
pub use dashboard::DashboardOutcome;
pub use error::{Result, ZabbixError};
pub use reconcile::{ReconcileReport, Reconciler, StepPolicies, StepPolicy};
