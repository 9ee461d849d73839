//! Readers and callers running alongside initialization.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::helpers::{TestContext, config, context};
use mcp_mashup::aggregator::domain::ToolCallRequest;
use rstest::rstest;
use serde_json::Map;

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn listing_during_initialization_sees_whole_backends(context: TestContext) {
    let names = ["b0", "b1", "b2", "b3", "b4", "b5", "b6", "b7"];
    for name in names {
        context.healthy(name, &["one", "two", "three"]);
    }
    let configs: Vec<_> = names.iter().map(|name| config(name)).collect();
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let aggregator = Arc::clone(&context.aggregator);
        let done = Arc::clone(&done);
        tokio::spawn(async move {
            let mut observed = Vec::new();
            while !done.load(Ordering::Acquire) {
                observed.push(aggregator.list_tools().len());
                tokio::task::yield_now().await;
            }
            observed
        })
    };

    let report = context
        .aggregator
        .initialize(&configs)
        .await
        .expect("initialization should succeed");
    done.store(true, Ordering::Release);
    let observed = reader.await.expect("reader task should finish");

    assert_eq!(report.active.len(), names.len());
    assert!(observed.iter().all(|count| count % 3 == 0 && *count <= 24));
    assert!(observed.windows(2).all(|pair| pair.first() <= pair.get(1)));
    assert_eq!(context.aggregator.list_tools().len(), 24);
    context.aggregator.shutdown().await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_calls_are_all_forwarded(context: TestContext) {
    context.healthy("alpha", &["read"]);
    context.healthy("beta", &["write"]);
    context
        .aggregator
        .initialize(&[config("alpha"), config("beta")])
        .await
        .expect("initialization should succeed");

    let calls: Vec<_> = (0..32)
        .map(|index| {
            let aggregator = Arc::clone(&context.aggregator);
            let name = if index % 2 == 0 { "alpha_read" } else { "beta_write" };
            tokio::spawn(async move {
                aggregator
                    .call_tool(ToolCallRequest::new(name, Map::new()))
                    .await
            })
        })
        .collect();
    for call in calls {
        call.await
            .expect("call task should finish")
            .expect("call should succeed");
    }

    let recorded = context
        .backends
        .recorded_calls()
        .expect("calls should be readable");
    assert_eq!(recorded.len(), 32);
    assert_eq!(
        recorded
            .iter()
            .filter(|call| call.request.name == "read")
            .count(),
        16
    );
    context.aggregator.shutdown().await;
}
