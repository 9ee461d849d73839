//! Listing, call forwarding, and shutdown through the merged surface.

use super::helpers::{TestContext, backend, config, context, listed_names};
use mcp_mashup::aggregator::{
    adapters::BackendScript,
    domain::{ServerInfo, ToolCallRequest, ToolCallResult},
    services::AggregatorError,
};
use rstest::rstest;
use serde_json::{Map, json};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn exposed_tools_are_namespaced_and_described(context: TestContext) {
    context.healthy("file-system", &["read-file"]);
    context
        .aggregator
        .initialize(&[config("file-system")])
        .await
        .expect("initialization should succeed");

    let listed = context.aggregator.list_tools();

    let [tool] = listed.as_slice() else {
        panic!("expected exactly one tool, got {listed:?}");
    };
    assert_eq!(tool.name, "file_system_read_file");
    assert_eq!(
        tool.description.as_deref(),
        Some("[file-system] read-file tool")
    );
    assert_eq!(
        tool.input_schema,
        json!({"type": "object", "properties": {"path": {"type": "string"}}})
    );
    let route = context
        .aggregator
        .route("file_system_read_file")
        .expect("route should exist");
    assert_eq!(route.backend(), &backend("file-system"));
    assert_eq!(route.original_name(), "read-file");
    context.aggregator.shutdown().await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn call_round_trips_to_the_original_tool(context: TestContext) {
    let expected = ToolCallResult::with_content(vec![json!({"type": "text", "text": "contents"})]);
    context
        .backends
        .set_backend(
            backend("file-system"),
            BackendScript::new(ServerInfo::new("fs", "2.0.0"))
                .with_tools(super::helpers::tools(&["read-file"]))
                .with_result("read-file", expected.clone()),
        )
        .expect("script should be stored");
    context
        .aggregator
        .initialize(&[config("file-system")])
        .await
        .expect("initialization should succeed");
    let mut arguments = Map::new();
    arguments.insert("path".to_owned(), json!("/etc/hosts"));
    let mut request = ToolCallRequest::new("file_system_read_file", arguments.clone());
    request.meta = Some(json!({"progressToken": 7}));

    let result = context
        .aggregator
        .call_tool(request)
        .await
        .expect("call should succeed");

    assert_eq!(result, expected);
    let calls = context
        .backends
        .recorded_calls()
        .expect("calls should be readable");
    let [call] = calls.as_slice() else {
        panic!("expected exactly one forwarded call, got {calls:?}");
    };
    assert_eq!(call.backend, backend("file-system"));
    assert_eq!(call.request.name, "read-file");
    assert_eq!(call.request.arguments.as_ref(), Some(&arguments));
    assert_eq!(call.request.meta, Some(json!({"progressToken": 7})));
    context.aggregator.shutdown().await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_tool_is_rejected_without_contacting_backends(context: TestContext) {
    context.healthy("search", &["query"]);
    context
        .aggregator
        .initialize(&[config("search")])
        .await
        .expect("initialization should succeed");

    let result = context
        .aggregator
        .call_tool(ToolCallRequest::new("search_missing", Map::new()))
        .await;

    assert!(matches!(
        result,
        Err(AggregatorError::ToolNotFound { ref name }) if name == "search_missing"
    ));
    assert_eq!(
        context.backends.recorded_calls().map(|calls| calls.len()).ok(),
        Some(0)
    );
    context.aggregator.shutdown().await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_closes_each_session_once_and_empties_the_surface(context: TestContext) {
    context.healthy("alpha", &["read"]);
    context.healthy("beta", &["write"]);
    context
        .aggregator
        .initialize(&[config("alpha"), config("beta")])
        .await
        .expect("initialization should succeed");

    context.aggregator.shutdown().await;
    context.aggregator.shutdown().await;

    assert!(listed_names(&context.aggregator).is_empty());
    assert!(context.aggregator.sessions().is_empty());
    for name in ["alpha", "beta"] {
        assert_eq!(context.backends.close_count(&backend(name)).ok(), Some(1));
    }
    let after = context
        .aggregator
        .call_tool(ToolCallRequest::new("alpha_read", Map::new()))
        .await;
    assert!(matches!(after, Err(AggregatorError::ToolNotFound { .. })));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sanitized_tool_names_collide_last_write_wins(context: TestContext) {
    context.healthy("data", &["get-data", "get_data"]);
    context
        .aggregator
        .initialize(&[config("data")])
        .await
        .expect("initialization should succeed");

    assert_eq!(listed_names(&context.aggregator), ["data_get_data"]);
    let route = context
        .aggregator
        .route("data_get_data")
        .expect("route should exist");
    assert_eq!(route.original_name(), "get_data");
    context.aggregator.shutdown().await;
}
