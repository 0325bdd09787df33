//! End-to-end reconciliation against the in-process Zabbix stub

use serde_json::json;
use zabbix_devkit::{TestHarness, ZabbixStub};
use zabbix_init::dashboard::layout::{WIDGET_PROBLEMS, WIDGET_RUNNING, WIDGET_SEVERITY};
use zabbix_init::{
    DashboardOutcome, ReconcileReport, Reconciler, Settings, StepPolicies, StepPolicy, ZabbixApi,
    ZabbixError,
};

const LINUX: &str = "Linux by Zabbix agent 2";
const DOCKER: &str = "Docker by Zabbix agent 2";

fn stub_with_templates(version: &str) -> ZabbixStub {
    let stub = ZabbixStub::with_version(version);
    stub.add_template(LINUX);
    stub.add_template(DOCKER);
    stub.add_template("Linux by Zabbix agent 2 active");
    stub
}

async fn provision(harness: &TestHarness) -> zabbix_init::Result<ReconcileReport> {
    let settings = Settings::from_lookup(harness.lookup())?;
    let api = ZabbixApi::new(&settings)?;
    Reconciler::new(api, &settings).run().await
}

#[tokio::test]
async fn test_fresh_server_then_second_run_writes_nothing() {
    let harness = TestHarness::start_with(stub_with_templates("7.0.5")).await.unwrap();
    let stub = &harness.stub;

    let first = provision(&harness).await.unwrap();
    assert!(first.warnings.is_empty(), "{:?}", first.warnings);
    // group, host, trigger, 4 items, dashboard
    assert_eq!(first.created.len(), 8, "{:?}", first.created);
    assert_eq!(stub.objects("hostgroups").len(), 1);
    assert_eq!(stub.objects("hosts").len(), 1);
    assert_eq!(stub.objects("items").len(), 4);

    let host = &stub.objects("hosts")[0];
    assert_eq!(host["host"], "Visiology-Server");
    assert_eq!(host["parentTemplates"].as_array().unwrap().len(), 2);
    let interface = &stub.objects("hostinterfaces")[0];
    assert_eq!(interface["ip"], "10.0.0.5");
    assert_eq!(interface["port"], "10050");

    let dashboard = stub.dashboard("Главный экран").unwrap();
    assert_eq!(dashboard["pages"][0]["widgets"].as_array().unwrap().len(), 6);
    assert_eq!(dashboard["users"][0]["userid"], "1");

    stub.clear_calls();
    let second = provision(&harness).await.unwrap();
    assert!(second.is_noop());
    assert!(stub.write_calls().is_empty(), "{:?}", stub.write_calls());
    assert_eq!(stub.objects("items").len(), 4);
}

#[tokio::test]
async fn test_missing_template_is_a_warning() {
    let stub = ZabbixStub::new();
    stub.add_template(LINUX);
    let harness = TestHarness::start_with(stub).await.unwrap();

    let report = provision(&harness).await.unwrap();
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains(DOCKER));

    let host = &harness.stub.objects("hosts")[0];
    assert_eq!(host["parentTemplates"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_existing_objects_are_reused() {
    let stub = stub_with_templates("7.0.5");
    stub.add_group("Visiology");
    let host_id = stub.add_host("Visiology-Server", Some("192.168.1.20"));
    stub.add_trigger(&host_id, "Диск: свободно меньше 25% на {HOST.NAME}");
    stub.add_item(&host_id, "docker.containers.running", "Running containers");
    let harness = TestHarness::start_with(stub).await.unwrap();

    let report = provision(&harness).await.unwrap();
    let stub = &harness.stub;
    assert!(stub.calls_to("hostgroup.create").is_empty());
    assert!(stub.calls_to("host.create").is_empty());
    assert!(stub.calls_to("trigger.create").is_empty());
    assert_eq!(stub.calls_to("item.create").len(), 3);
    assert_eq!(report.unchanged.len(), 4, "{:?}", report.unchanged);
    // interface of an existing host is not touched
    assert_eq!(stub.objects("hostinterfaces")[0]["ip"], "192.168.1.20");
}

#[tokio::test]
async fn test_trigger_failure_is_not_fatal() {
    let stub = stub_with_templates("7.0.5");
    stub.fail_method("trigger.create", "Incorrect trigger expression.");
    let harness = TestHarness::start_with(stub).await.unwrap();

    let report = provision(&harness).await.unwrap();
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("disk trigger"));
    assert!(harness.stub.dashboard("Главный экран").is_some());
}

#[tokio::test]
async fn test_host_without_interface_skips_items() {
    let stub = stub_with_templates("7.0.5");
    stub.add_host("Visiology-Server", None);
    let harness = TestHarness::start_with(stub).await.unwrap();

    let report = provision(&harness).await.unwrap();
    let stub = &harness.stub;
    assert!(stub.calls_to("item.create").is_empty());
    assert_eq!(report.warnings.len(), 4, "{:?}", report.warnings);

    // only the widgets that need no item
    let dashboard = stub.dashboard("Главный экран").unwrap();
    let names: Vec<&str> = dashboard["pages"][0]["widgets"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|w| w["name"].as_str())
        .collect();
    assert_eq!(names, vec![WIDGET_SEVERITY, WIDGET_PROBLEMS]);
}

#[tokio::test]
async fn test_failing_items_do_not_stop_the_run() {
    let stub = stub_with_templates("7.0.5");
    stub.fail_method("item.create", "Invalid key.");
    let harness = TestHarness::start_with(stub).await.unwrap();

    let report = provision(&harness).await.unwrap();
    assert_eq!(harness.stub.calls_to("item.create").len(), 4);
    assert_eq!(report.warnings.len(), 4);
    assert!(harness.stub.dashboard("Главный экран").is_some());
}

#[tokio::test]
async fn test_dashboard_without_pages_is_left_alone() {
    let stub = stub_with_templates("7.0.5");
    stub.add_dashboard("Главный экран", json!([]));
    let harness = TestHarness::start_with(stub).await.unwrap();

    let report = provision(&harness).await.unwrap();
    assert!(harness.stub.calls_to("dashboard.update").is_empty());
    assert!(harness.stub.calls_to("dashboard.create").is_empty());
    assert!(report.unchanged.iter().any(|u| u.contains("no pages")));
}

#[tokio::test]
async fn test_stale_item_binding_is_repaired_in_place() {
    let stub = stub_with_templates("7.0.5");
    stub.add_group("Visiology");
    let host_id = stub.add_host("Visiology-Server", Some("10.0.0.5"));
    let running_id = stub.add_item(&host_id, "docker.containers.running", "Running containers");
    stub.add_dashboard(
        "Главный экран",
        json!([{
            "dashboard_pageid": "900",
            "widgets": [{
                "widgetid": "901",
                "type": "item",
                "name": WIDGET_RUNNING,
                "x": "10", "y": "3", "width": "20", "height": "6",
                "view_mode": "0",
                "fields": [{"type": "4", "name": "itemid.0", "value": "41"}]
            }]
        }]),
    );
    let harness = TestHarness::start_with(stub).await.unwrap();

    let report = provision(&harness).await.unwrap();
    assert_eq!(report.updated.len(), 1);

    let updates = harness.stub.calls_to("dashboard.update");
    assert_eq!(updates.len(), 1);
    let page = &updates[0].params["pages"][0];
    assert_eq!(page["dashboard_pageid"], "900");

    let widgets = page["widgets"].as_array().unwrap();
    assert_eq!(widgets.len(), 6);
    let running = &widgets[0];
    assert_eq!(running["widgetid"], "901");
    assert_eq!(running["x"], 10);
    assert_eq!(running["y"], 3);
    assert_eq!(running["width"], 20);
    assert_eq!(running["fields"][0]["value"], running_id.as_str());

    // appended below the existing widget
    for added in &widgets[1..] {
        assert!(added["y"].as_u64().unwrap() >= 9, "{added}");
    }
}

#[tokio::test]
async fn test_dashboard_failure_is_fatal() {
    let stub = stub_with_templates("7.0.5");
    stub.fail_method("dashboard.create", "No permissions.");
    let harness = TestHarness::start_with(stub).await.unwrap();

    let err = provision(&harness).await.unwrap_err();
    assert!(
        matches!(err, ZabbixError::Api { ref method, .. } if method == "dashboard.create"),
        "{err}"
    );
}

#[tokio::test]
async fn test_dashboard_can_be_disabled() {
    let mut harness = TestHarness::start_with(stub_with_templates("7.0.5")).await.unwrap();
    harness.set("ZABBIX_DASHBOARD_ENABLED", "false");

    provision(&harness).await.unwrap();
    assert!(harness.stub.calls_to("dashboard.get").is_empty());
    assert_eq!(harness.stub.objects("items").len(), 4);
}

#[tokio::test]
async fn test_token_in_header_on_recent_servers() {
    let harness = TestHarness::start_with(stub_with_templates("7.0.5")).await.unwrap();
    provision(&harness).await.unwrap();

    let calls = harness.stub.calls();
    for call in calls.iter().filter(|c| c.method != "apiinfo.version" && c.method != "user.login") {
        assert!(call.bearer.is_some(), "{}", call.method);
        assert!(call.auth_field.is_none(), "{}", call.method);
    }
    let login = &harness.stub.calls_to("user.login")[0];
    assert_eq!(login.params["username"], "Admin");
}

#[tokio::test]
async fn test_token_in_body_on_older_servers() {
    let harness = TestHarness::start_with(stub_with_templates("6.0.20")).await.unwrap();
    provision(&harness).await.unwrap();

    for call in harness.stub.calls().iter().filter(|c| c.method.ends_with(".get")) {
        assert!(call.auth_field.is_some(), "{}", call.method);
        assert!(call.bearer.is_none(), "{}", call.method);
    }
}

#[tokio::test]
async fn test_legacy_login_field() {
    let harness = TestHarness::start_with(stub_with_templates("5.2.7")).await.unwrap();
    provision(&harness).await.unwrap();

    let login = &harness.stub.calls_to("user.login")[0];
    assert_eq!(login.params["user"], "Admin");
    assert!(login.params.get("username").is_none());
}

#[tokio::test]
async fn test_forced_header_mode() {
    let mut harness = TestHarness::start_with(stub_with_templates("6.0.20")).await.unwrap();
    harness.set("ZABBIX_AUTH_MODE", "header");
    provision(&harness).await.unwrap();

    let get = &harness.stub.calls_to("hostgroup.get")[0];
    assert!(get.bearer.is_some());
}

#[tokio::test]
async fn test_wrong_password_is_an_api_error() {
    let mut harness = TestHarness::start_with(stub_with_templates("7.0.5")).await.unwrap();
    harness.set("ZABBIX_PASSWORD", "nope");

    let err = provision(&harness).await.unwrap_err();
    assert!(err.is_api_error(), "{err}");
    assert!(harness.stub.write_calls().is_empty());
}

#[tokio::test]
async fn test_unreachable_api_times_out() {
    let mut harness = TestHarness::start_with(ZabbixStub::new()).await.unwrap();
    harness.set("ZABBIX_WAIT_MAX_SECS", "1");
    harness.stub.set_unavailable(true);

    let err = provision(&harness).await.unwrap_err();
    assert!(matches!(err, ZabbixError::Timeout { attempts, .. } if attempts >= 1), "{err}");
    assert!(harness.stub.calls().iter().all(|c| c.method == "apiinfo.version"));
}

#[tokio::test]
async fn test_group_and_dashboard_steps_are_idempotent() {
    let harness = TestHarness::start_with(stub_with_templates("7.0.5")).await.unwrap();
    let settings = Settings::from_lookup(harness.lookup()).unwrap();
    let api = ZabbixApi::new(&settings).unwrap();
    let mut reconciler = Reconciler::new(api, &settings);
    reconciler.connect().await.unwrap();

    let first = reconciler.ensure_group("Visiology").await.unwrap();
    let again = reconciler.ensure_group("Visiology").await.unwrap();
    assert_eq!(first, again);
    assert_eq!(harness.stub.calls_to("hostgroup.create").len(), 1);

    let owner = reconciler.dashboard_owner("Admin").await.unwrap();
    let items = Default::default();
    let created = reconciler.ensure_dashboard("Ops", &first, &owner, &items).await.unwrap();
    assert!(matches!(created, DashboardOutcome::Created(_)));
    let unchanged = reconciler.ensure_dashboard("Ops", &first, &owner, &items).await.unwrap();
    assert_eq!(unchanged, DashboardOutcome::Unchanged);

    assert_eq!(reconciler.report().created.len(), 2);
}

#[tokio::test]
async fn test_dashboard_failure_tolerated_when_best_effort() {
    let stub = stub_with_templates("7.0.5");
    stub.fail_method("dashboard.create", "No permissions.");
    let harness = TestHarness::start_with(stub).await.unwrap();

    let settings = Settings::from_lookup(harness.lookup()).unwrap();
    let api = ZabbixApi::new(&settings).unwrap();
    let policies = StepPolicies {
        dashboard: StepPolicy::BEST_EFFORT,
        ..StepPolicies::default()
    };
    let report = Reconciler::new(api, &settings)
        .with_policies(policies)
        .run()
        .await
        .unwrap();

    assert_eq!(report.warnings.len(), 1, "{:?}", report.warnings);
    assert!(report.warnings[0].starts_with("dashboard:"));
    assert_eq!(harness.stub.objects("items").len(), 4);
}

#[tokio::test]
async fn test_http_error_status_is_a_transport_error() {
    let harness = TestHarness::start().await.unwrap();
    harness.stub.set_unavailable(true);

    let settings = Settings::from_lookup(harness.lookup()).unwrap();
    let api = ZabbixApi::new(&settings).unwrap();
    let err = api.api_version().await.unwrap_err();
    match &err {
        ZabbixError::Transport { method, status, .. } => {
            assert_eq!(method, "apiinfo.version");
            assert_eq!(*status, Some(503));
        }
        other => panic!("expected a transport error, got {other:?}"),
    }
    assert!(!err.is_api_error());
}

#[tokio::test]
async fn test_unparsable_version_is_a_decode_error() {
    let stub = ZabbixStub::new();
    stub.respond_with("apiinfo.version", json!("not-a-version"));
    let harness = TestHarness::start_with(stub).await.unwrap();

    let settings = Settings::from_lookup(harness.lookup()).unwrap();
    let api = ZabbixApi::new(&settings).unwrap();
    let err = api.api_version().await.unwrap_err();
    assert!(
        matches!(err, ZabbixError::Decode { ref method, .. } if method == "apiinfo.version"),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_unexpected_result_shape_is_a_decode_error() {
    let stub = stub_with_templates("7.0.5");
    stub.respond_with("host.create", json!({"hostids": []}));
    stub.respond_with("hostgroup.get", json!({"groupid": "1"}));
    let harness = TestHarness::start_with(stub).await.unwrap();

    // a get answering an object instead of a list
    let err = provision(&harness).await.unwrap_err();
    assert!(
        matches!(err, ZabbixError::Decode { ref method, .. } if method == "hostgroup.get"),
        "{err:?}"
    );

    // a create answering no id
    let settings = Settings::from_lookup(harness.lookup()).unwrap();
    let mut reconciler = Reconciler::new(ZabbixApi::new(&settings).unwrap(), &settings);
    reconciler.connect().await.unwrap();
    let agent = settings.agent.clone();
    let err = reconciler
        .ensure_host("Visiology-Server", &"5".into(), &agent, &[])
        .await
        .unwrap_err();
    assert!(
        matches!(err, ZabbixError::Decode { ref method, .. } if method == "host.create"),
        "{err:?}"
    );
    assert!(harness.stub.objects("hosts").is_empty());
}
