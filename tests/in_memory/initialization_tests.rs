//! Initialization behaviour with healthy, failing, and filtered backends.

use super::helpers::{TEST_HANDSHAKE_TIMEOUT, TestContext, backend, config, context, listed_names};
use mcp_mashup::aggregator::{
    adapters::ScriptedBehaviour,
    domain::SessionState,
    services::{AggregatorError, BackendInitError},
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stalled_backend_is_skipped_and_the_rest_become_active(context: TestContext) {
    context.healthy("alpha", &["read"]);
    context.scripted("beta", &["write"], ScriptedBehaviour::StallHandshake);
    context.healthy("gamma", &["search", "fetch"]);

    let report = context
        .aggregator
        .initialize(&[config("alpha"), config("beta"), config("gamma")])
        .await
        .expect("two backends should be enough");

    assert_eq!(report.active, [backend("alpha"), backend("gamma")]);
    assert!(matches!(
        report.failures.as_slice(),
        [BackendInitError::HandshakeTimeout { backend, timeout }]
            if backend.as_str() == "beta" && *timeout == TEST_HANDSHAKE_TIMEOUT
    ));
    assert_eq!(
        listed_names(&context.aggregator),
        ["alpha_read", "gamma_fetch", "gamma_search"]
    );
    assert_eq!(context.backends.close_count(&backend("beta")).ok(), Some(1));
    context.aggregator.shutdown().await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn every_backend_failing_is_reported_as_one_error(context: TestContext) {
    context.scripted(
        "alpha",
        &["read"],
        ScriptedBehaviour::RejectConnect("command not found".to_owned()),
    );
    context.scripted(
        "beta",
        &["write"],
        ScriptedBehaviour::RejectHandshake("unsupported protocol".to_owned()),
    );

    let result = context
        .aggregator
        .initialize(&[config("alpha"), config("beta")])
        .await;

    let Err(error) = result else {
        panic!("initialization should fail");
    };
    assert_eq!(error.to_string(), "no servers were successfully initialized");
    let AggregatorError::NoBackendsAvailable { failures } = error else {
        panic!("expected NoBackendsAvailable");
    };
    assert!(matches!(
        failures.as_slice(),
        [
            BackendInitError::Construction { .. },
            BackendInitError::Handshake { .. }
        ]
    ));
    assert!(context.aggregator.list_tools().is_empty());
    assert!(context.aggregator.sessions().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn no_configured_backends_is_an_error(context: TestContext) {
    let result = context.aggregator.initialize(&[]).await;

    assert!(matches!(
        result,
        Err(AggregatorError::NoBackendsAvailable { ref failures }) if failures.is_empty()
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn allow_list_limits_exposed_tools(context: TestContext) {
    context.healthy("file-system", &["read_file", "write_file", "delete_file"]);
    let filtered = config("file-system")
        .with_allowed_tools(["read-file".to_owned(), "write_file".to_owned()]);

    context
        .aggregator
        .initialize(&[filtered])
        .await
        .expect("initialization should succeed");

    assert_eq!(
        listed_names(&context.aggregator),
        ["file_system_read_file", "file_system_write_file"]
    );
    context.aggregator.shutdown().await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn empty_allow_list_keeps_the_backend_active_with_no_tools(context: TestContext) {
    context.healthy("quiet", &["one", "two"]);
    context.healthy("loud", &["shout"]);

    let report = context
        .aggregator
        .initialize(&[config("quiet").with_allowed_tools(Vec::new()), config("loud")])
        .await
        .expect("initialization should succeed");

    assert_eq!(report.active, [backend("quiet"), backend("loud")]);
    assert_eq!(listed_names(&context.aggregator), ["loud_shout"]);
    let quiet = context
        .aggregator
        .sessions()
        .into_iter()
        .find(|snapshot| snapshot.backend.as_str() == "quiet")
        .expect("quiet session should exist");
    assert_eq!(quiet.state, SessionState::Active);
    assert_eq!(quiet.tool_count, 0);
    context.aggregator.shutdown().await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn discovery_failure_leaves_an_open_failed_session(context: TestContext) {
    context.scripted(
        "flaky",
        &["read"],
        ScriptedBehaviour::RejectDiscovery("listing crashed".to_owned()),
    );
    context.healthy("steady", &["read"]);

    let report = context
        .aggregator
        .initialize(&[config("flaky"), config("steady")])
        .await
        .expect("steady should become active");

    assert!(matches!(
        report.failures.as_slice(),
        [BackendInitError::Discovery { backend, .. }] if backend.as_str() == "flaky"
    ));
    let flaky = context
        .aggregator
        .sessions()
        .into_iter()
        .find(|snapshot| snapshot.backend.as_str() == "flaky")
        .expect("flaky session should remain until shutdown");
    assert_eq!(flaky.state, SessionState::Failed);
    assert!(flaky.failure.is_some_and(|reason| reason.contains("listing crashed")));
    assert_eq!(context.backends.close_count(&backend("flaky")).ok(), Some(0));

    context.aggregator.shutdown().await;

    assert_eq!(context.backends.close_count(&backend("flaky")).ok(), Some(1));
}
