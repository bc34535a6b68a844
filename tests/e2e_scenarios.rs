// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end scenarios through the HTTP façade: the full pipeline from
//! wire request to JSON envelope against the platform beans.

use beanbus_backend::BackendManagerBuilder;
use beanbus_config::BridgeConfig;
use beanbus_http::HttpBridge;
use beanbus_policy::PolicyRestrictor;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

fn bridge() -> HttpBridge {
    bridge_with(BridgeConfig::default())
}

fn bridge_with(config: BridgeConfig) -> HttpBridge {
    let manager = BackendManagerBuilder::new(config)
        .build()
        .expect("manager builds");
    HttpBridge::new(Arc::new(manager))
}

fn restricted_bridge(policy: &str) -> HttpBridge {
    let restrictor = PolicyRestrictor::from_toml(policy).expect("policy compiles");
    let manager = BackendManagerBuilder::new(BridgeConfig::default())
        .with_restrictor(Arc::new(restrictor))
        .build()
        .expect("manager builds");
    HttpBridge::new(Arc::new(manager))
}

fn no_params() -> BTreeMap<String, String> {
    BTreeMap::new()
}

fn get(bridge: &HttpBridge, path: &str) -> Value {
    bridge.handle_get(path, &no_params(), None)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[test]
fn read_heap_usage_returns_the_composite() {
    let env = get(&bridge(), "read/process:type=Memory/HeapUsage");
    assert_eq!(env["status"], 200);
    for field in ["init", "used", "committed", "max"] {
        assert!(env["value"].get(field).is_some(), "missing field {field}");
    }
    assert_eq!(env["request"]["type"], "read");
    assert_eq!(env["request"]["mbean"], "process:type=Memory");
    assert!(env["timestamp"].as_i64().unwrap() > 0);
}

#[test]
fn inner_path_selects_a_single_field() {
    let env = get(&bridge(), "read/process:type=Memory/HeapUsage/used");
    assert_eq!(env["status"], 200);
    assert!(env["value"].is_i64(), "expected integer, got {}", env["value"]);
    assert_eq!(env["request"]["path"], "used");
}

#[test]
fn unknown_bean_is_a_404_envelope() {
    let env = get(&bridge(), "read/process:type=Bogus");
    assert_eq!(env["status"], 404);
    assert_eq!(env["error_type"], "InstanceNotFound");
    assert!(env["error"].as_str().unwrap().contains("Bogus"));
}

#[test]
fn pattern_read_elides_restricted_beans() {
    let bridge = restricted_bridge(
        r#"
        [[deny]]
        mbean = "process:type=Threading"
        read = ["*"]
        "#,
    );
    let env = get(&bridge, "read/process:type=*/HeapUsage");
    assert_eq!(env["status"], 200);
    let by_name = env["value"].as_object().expect("object keyed by name");
    assert!(by_name.contains_key("process:type=Memory"));
    assert!(!by_name.contains_key("process:type=Threading"));
}

#[test]
fn pattern_without_matches_is_400_with_attributes_200_without() {
    let bridge = bridge();

    let env = get(&bridge, "read/nowhere:type=*/Anything");
    assert_eq!(env["status"], 400);
    assert_eq!(env["error_type"], "InvalidRequest");

    let env = get(&bridge, "read/nowhere:type=*");
    assert_eq!(env["status"], 200);
    assert_eq!(env["value"], json!({}));
}

// ---------------------------------------------------------------------------
// Bulk
// ---------------------------------------------------------------------------

#[test]
fn bulk_post_version_and_read() {
    let body = json!([
        {"type": "version"},
        {"type": "read", "mbean": "process:type=Threading", "attribute": "ThreadCount"},
    ]);
    let env = bridge().handle_post(body.to_string().as_bytes(), None, &no_params(), None);
    let items = env.as_array().expect("bulk array");
    assert_eq!(items.len(), 2);

    assert_eq!(items[0]["status"], 200);
    assert!(items[0]["value"]["protocol"].is_string());
    assert!(items[0]["value"]["agent"].is_string());

    assert_eq!(items[1]["status"], 200);
    assert!(items[1]["value"].as_i64().unwrap() >= 1);
}

#[test]
fn bulk_failures_do_not_abort_siblings() {
    let body = json!([
        {"type": "read", "mbean": "process:type=Bogus"},
        {"type": "read", "mbean": "process:type=Runtime", "attribute": "Pid"},
        {"type": "nonsense"},
        {"type": "version"},
    ]);
    let env = bridge().handle_post(body.to_string().as_bytes(), None, &no_params(), None);
    let items = env.as_array().expect("bulk array");
    assert_eq!(items.len(), 4);
    assert_eq!(items[0]["status"], 404);
    assert_eq!(items[1]["status"], 200);
    assert_eq!(items[2]["status"], 400);
    assert_eq!(items[3]["status"], 200);
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[test]
fn second_read_carries_the_first_value_as_history() {
    let bridge = bridge();
    let first = get(&bridge, "read/process:type=Runtime/Pid");
    assert_eq!(first["status"], 200);
    assert!(first.get("history").is_none());

    let second = get(&bridge, "read/process:type=Runtime/Pid");
    let history = second["history"].as_array().expect("history attached");
    assert!(!history.is_empty());
    assert_eq!(history[0]["value"], first["value"]);
    assert!(history[0]["timestamp"].as_i64().unwrap() > 0);
}

#[test]
fn history_disabled_by_zero_config() {
    let bridge = bridge_with(BridgeConfig {
        history_max_entries: 0,
        ..Default::default()
    });
    get(&bridge, "read/process:type=Runtime/Pid");
    let second = get(&bridge, "read/process:type=Runtime/Pid");
    assert!(second.get("history").is_none());
}

#[test]
fn write_returns_previous_and_records_history() {
    let bridge = bridge();
    let env = get(&bridge, "write/process:type=Memory/Verbose/true");
    assert_eq!(env["status"], 200);
    assert_eq!(env["value"], false);

    let env = get(&bridge, "write/process:type=Memory/Verbose/false");
    assert_eq!(env["status"], 200);
    assert_eq!(env["value"], true);
    let history = env["history"].as_array().expect("history attached");
    assert_eq!(history[0]["value"], false);
}

#[test]
fn config_bean_drives_history_through_the_protocol() {
    let bridge = bridge();
    let env = get(&bridge, "write/beanbus:type=Config/HistoryMaxEntries/0");
    assert_eq!(env["status"], 200);

    get(&bridge, "read/process:type=Runtime/Pid");
    let second = get(&bridge, "read/process:type=Runtime/Pid");
    assert!(second.get("history").is_none());
}

// ---------------------------------------------------------------------------
// Restrictor
// ---------------------------------------------------------------------------

#[test]
fn restrictor_denial_is_403_without_stacktrace() {
    let bridge = restricted_bridge(
        r#"
        [access]
        verbs = ["read"]
        "#,
    );
    let env = get(&bridge, "exec/process:type=Memory/collect");
    assert_eq!(env["status"], 403);
    assert_eq!(env["error_type"], "Forbidden");
    assert!(env.get("stacktrace").is_none());

    assert_eq!(get(&bridge, "read/process:type=Memory/Verbose")["status"], 200);
}

// ---------------------------------------------------------------------------
// List / search / version / notification
// ---------------------------------------------------------------------------

#[test]
fn list_and_search_cover_the_platform_domain() {
    let bridge = bridge();

    let env = get(&bridge, "list/process/type=Memory/attr/Verbose");
    assert_eq!(env["status"], 200);
    assert_eq!(env["value"]["rw"], true);

    let env = get(&bridge, "search/process:type=*");
    assert_eq!(env["status"], 200);
    let names: Vec<&str> = env["value"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(names.contains(&"process:type=Memory"));
    assert!(names.contains(&"process:type=Runtime"));
    assert!(names.contains(&"process:type=Threading"));
}

#[test]
fn search_for_nothing_is_an_empty_list() {
    let env = get(&bridge(), "search/nowhere:type=*");
    assert_eq!(env["status"], 200);
    assert_eq!(env["value"], json!([]));
}

#[test]
fn notification_register_and_ping_through_the_wire() {
    let bridge = bridge();
    let env = get(&bridge, "notification/register");
    assert_eq!(env["status"], 200);
    let client = env["value"]["id"].as_str().expect("client id").to_owned();

    let env = get(&bridge, &format!("notification/ping/{client}"));
    assert_eq!(env["status"], 200);

    let env = get(&bridge, "notification/ping/not-a-client");
    assert_eq!(env["status"], 400);
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

#[test]
fn depth_limit_applies_through_query_parameters() {
    let bridge = bridge();
    let mut params = BTreeMap::new();
    params.insert("maxDepth".to_owned(), "0".to_owned());
    let env = bridge.handle_get("read/process:type=Memory/HeapUsage", &params, None);
    assert_eq!(env["status"], 200);
    assert!(env["value"].is_string());
}
