mod common;

use common::{quiet_context, runner_context, ScriptedRunner};
use jarvis::error::{ErrorKind, ToolError};
use jarvis::platform::Platform;
use jarvis::context::ToolContext;
use jarvis::tools::{
    default_registry, handler, payload, HandlerResult, ParamSpec, ParamType, ToolArgs,
    ToolDescriptor, ToolRegistryBuilder,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

async fn noop(_ctx: Arc<ToolContext>, _args: ToolArgs) -> HandlerResult {
    Ok(payload(json!({})))
}

async fn explode(_ctx: Arc<ToolContext>, _args: ToolArgs) -> HandlerResult {
    panic!("boom")
}

async fn refuse(_ctx: Arc<ToolContext>, _args: ToolArgs) -> HandlerResult {
    Err(ToolError::Timeout {
        operation: "refuses".to_string(),
        after: Duration::from_secs(2),
    })
}

const EXPECTED_TOOLS: &[&str] = &[
    "shutdown_system",
    "restart_system",
    "cancel_shutdown",
    "sleep_system",
    "lock_screen",
    "create_folder",
    "list_folder_items",
    "open_file",
    "open_pdf_in_folder",
    "read_file_text",
    "open_common_app",
    "run_application_or_media",
    "open_quick_settings",
    "open_system_info",
    "close_application",
    "get_battery_info",
    "wifi_status",
    "bluetooth_status",
    "system_info",
    "get_formatted_datetime",
    "capture_photo",
    "read_screen_text",
    "speak_text",
    "send_whatsapp_message",
];

#[test]
fn test_default_registry_catalogue() {
    let registry = default_registry();
    let names: HashSet<_> = registry.names().into_iter().collect();

    assert_eq!(names.len(), registry.len());
    for tool in EXPECTED_TOOLS {
        assert!(names.contains(tool), "missing tool {}", tool);
    }
    assert_eq!(registry.len(), EXPECTED_TOOLS.len());

    println!("✅ Registry exposes {} tools", registry.len());
}

#[test]
fn test_definitions_describe_parameters() {
    let registry = default_registry();
    for definition in registry.definitions() {
        assert!(!definition.description.is_empty(), "{} has no description", definition.name);
        assert_eq!(definition.parameters["type"], "object");
        assert!(definition.parameters["properties"].is_object());
    }

    let read = registry
        .definitions()
        .into_iter()
        .find(|d| d.name == "read_file_text")
        .unwrap();
    assert_eq!(read.parameters["properties"]["path"]["type"], "string");
    assert_eq!(read.parameters["required"], json!(["path"]));
}

#[test]
#[should_panic(expected = "already registered")]
fn test_duplicate_registration_panics() {
    let mut builder = ToolRegistryBuilder::new();
    let make = || ToolDescriptor::new("twice", "Registered twice", handler(noop));
    builder.register(make());
    builder.register(make());
}

#[tokio::test]
async fn test_unknown_tool_is_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = quiet_context(dir.path(), Platform::Linux);

    let result = default_registry().dispatch(&ctx, "no_such_tool", json!({})).await;
    assert!(!result.is_ok());
    assert_eq!(result.kind(), Some(ErrorKind::NotFound));
    assert!(result.error().unwrap().contains("no_such_tool"));
}

#[tokio::test]
async fn test_bad_arguments_never_reach_the_handler() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::exiting(0, "");
    let ctx = runner_context(dir.path(), Platform::Linux, runner.clone());
    let registry = default_registry();

    let wrong_type = registry.dispatch(&ctx, "shutdown_system", json!({"force": "yes"})).await;
    assert_eq!(wrong_type.kind(), Some(ErrorKind::InvalidInput));

    let unknown_key = registry.dispatch(&ctx, "lock_screen", json!({"when": "now"})).await;
    assert_eq!(unknown_key.kind(), Some(ErrorKind::InvalidInput));

    let missing = registry.dispatch(&ctx, "read_file_text", json!({})).await;
    assert_eq!(missing.kind(), Some(ErrorKind::InvalidInput));

    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_handler_failures_are_normalized() {
    let mut builder = ToolRegistryBuilder::new();
    builder
        .register(ToolDescriptor::new(
            "explodes",
            "Panics inside the handler",
            handler(explode),
        ))
        .register(
            ToolDescriptor::new(
                "refuses",
                "Always reports a timeout",
                handler(refuse),
            )
            .param(ParamSpec::optional("level", ParamType::Integer, "Unused")),
        );
    let registry = builder.build();

    let dir = tempfile::tempdir().unwrap();
    let ctx = quiet_context(dir.path(), Platform::Linux);

    let panicked = registry.dispatch(&ctx, "explodes", json!({})).await;
    assert_eq!(panicked.kind(), Some(ErrorKind::Execution));
    assert!(panicked.error().unwrap().contains("explodes"));

    let timed_out = registry.dispatch(&ctx, "refuses", json!({"level": 3})).await;
    assert_eq!(timed_out.kind(), Some(ErrorKind::Timeout));
    let envelope = timed_out.to_value();
    assert_eq!(envelope["ok"], false);
    assert_eq!(envelope["kind"], "timeout");
    assert_eq!(envelope["error"], "refuses timed out after 2s");
}

#[tokio::test]
async fn test_concurrent_dispatch_is_independent() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = quiet_context(dir.path(), Platform::Linux);
    let registry = default_registry();

    let calls = (0..8).map(|_| registry.dispatch(&ctx, "get_formatted_datetime", json!({})));
    let results = futures::future::join_all(calls).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert!(results.iter().all(|r| r.get("spoken").is_some()));
}
