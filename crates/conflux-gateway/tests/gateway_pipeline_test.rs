//! End-to-end tests for the gateway pipeline.

use conflux_abstraction::{PlatformDescriptor, QueryPriority, UnifiedQueryRequest};
use conflux_gateway::{Gateway, GatewayConfig, GatewayError, PlatformRegistry};
use conflux_platforms::MockAdapter;
use std::sync::Arc;
use std::time::Duration;

fn two_platform_registry() -> PlatformRegistry {
    PlatformRegistry::builder()
        .register(
            Arc::new(
                MockAdapter::new("doc-search")
                    .with_answer("Retention is 90 days for customer data."),
            ),
            PlatformDescriptor::new("doc-search")
                .with_affinity("document-search", 0.92)
                .with_affinity("hybrid-retrieval", 0.89)
                .with_affinity("document-qa", 0.85)
                .with_affinity("knowledge-retrieval", 0.8),
        )
        .register(
            Arc::new(MockAdapter::new("automation")),
            PlatformDescriptor::new("automation")
                .with_affinity("multi-step-automation", 0.95)
                .with_affinity("workflow-execution", 0.9),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_document_query_is_served_by_doc_search() {
    let gateway = Gateway::with_registry(two_platform_registry(), &GatewayConfig::default());

    let response = gateway
        .process(UnifiedQueryRequest::new("explain our data retention policy"))
        .await
        .unwrap();

    assert_eq!(response.platform_used, "doc-search");
    assert!(response.answer.contains("90 days"));
    assert!(response.confidence_score > 0.0);
}

#[tokio::test]
async fn test_preference_hint_wins_over_scores() {
    let gateway = Gateway::with_registry(two_platform_registry(), &GatewayConfig::default());

    let response = gateway
        .process(
            UnifiedQueryRequest::new("explain our data retention policy")
                .with_preference("automation"),
        )
        .await
        .unwrap();

    assert_eq!(response.platform_used, "automation");
}

#[tokio::test]
async fn test_cache_idempotence() {
    let registry = PlatformRegistry::builder()
        .register(
            Arc::new(
                MockAdapter::new("slowish")
                    .with_answer("the answer")
                    .with_delay(Duration::from_millis(100)),
            ),
            PlatformDescriptor::new("slowish"),
        )
        .build()
        .unwrap();
    let gateway = Gateway::with_registry(registry, &GatewayConfig::default());

    let request = UnifiedQueryRequest::new("what is the answer");
    let first = gateway.process(request.clone()).await.unwrap();
    assert!(!first.cache_hit);
    assert!(first.processing_time_ms >= 100);

    let second = gateway.process(request).await.unwrap();
    assert!(second.cache_hit);
    assert_eq!(second.answer, first.answer);
    assert_eq!(second.platform_used, first.platform_used);
    // Served from cache, far below the adapter's latency.
    assert!(second.processing_time_ms < 100);
    // Each response carries its own request id.
    assert_ne!(second.request_id, first.request_id);
}

#[tokio::test]
async fn test_different_priority_is_a_separate_cache_entry() {
    let gateway = Gateway::with_registry(two_platform_registry(), &GatewayConfig::default());

    let normal = gateway.process(UnifiedQueryRequest::new("hello")).await.unwrap();
    assert!(!normal.cache_hit);

    let high = gateway
        .process(UnifiedQueryRequest::new("hello").with_priority(QueryPriority::High))
        .await
        .unwrap();
    assert!(!high.cache_hit);
}

#[tokio::test]
async fn test_critical_overload_fails_fast() {
    let mut config = GatewayConfig::default();
    config.limits.critical_depth = 2;

    let registry = PlatformRegistry::builder()
        .register(
            Arc::new(MockAdapter::new("only").with_delay(Duration::from_millis(200))),
            PlatformDescriptor::new("only"),
        )
        .build()
        .unwrap();
    let gateway = Gateway::with_registry(registry, &config);

    let requests = (0..4).map(|i| {
        gateway.process(
            UnifiedQueryRequest::new(format!("query {}", i))
                .with_priority(QueryPriority::Critical),
        )
    });
    let results = futures::future::join_all(requests).await;

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let rate_limited = results
        .iter()
        .filter(|r| matches!(r, Err(GatewayError::RateLimitExceeded { .. })))
        .count();
    assert_eq!(successes, 2);
    assert_eq!(rate_limited, 2);
    assert_eq!(gateway.in_flight(), 0);
}

#[tokio::test]
async fn test_mid_flight_cancellation_leaves_no_cache_entry() {
    let registry = PlatformRegistry::builder()
        .register(
            Arc::new(MockAdapter::new("slow").with_delay(Duration::from_millis(300))),
            PlatformDescriptor::new("slow"),
        )
        .build()
        .unwrap();
    let gateway = Arc::new(Gateway::with_registry(registry, &GatewayConfig::default()));

    let cancel = tokio_util::sync::CancellationToken::new();
    let handle = {
        let gateway = Arc::clone(&gateway);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            gateway
                .process_with_cancellation(UnifiedQueryRequest::new("slow query"), cancel)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(GatewayError::Cancelled)));
    assert_eq!(gateway.in_flight(), 0);

    // The cancelled request wrote nothing to the cache.
    let follow_up = gateway.process(UnifiedQueryRequest::new("slow query")).await.unwrap();
    assert!(!follow_up.cache_hit);
}

#[tokio::test]
async fn test_gateway_from_config_with_mock_platforms() {
    let config: GatewayConfig = toml::from_str(
        r#"
[[platforms]]
id = "m1"
kind = "mock"

[platforms.affinity]
"conversational" = 0.9
"#,
    )
    .unwrap();

    let gateway = Gateway::from_config(&config).unwrap();
    assert_eq!(gateway.registry().len(), 1);

    let response = gateway.process(UnifiedQueryRequest::new("hi there")).await.unwrap();
    assert_eq!(response.platform_used, "m1");
}

#[tokio::test]
async fn test_health_report_across_mixed_traffic() {
    let registry = PlatformRegistry::builder()
        .register(Arc::new(MockAdapter::new("steady")), PlatformDescriptor::new("steady"))
        .register(
            Arc::new(MockAdapter::new("broken").failing(
                conflux_abstraction::PlatformError::Unavailable {
                    platform: "broken".to_string(),
                    message: "down".to_string(),
                },
            )),
            PlatformDescriptor::new("broken"),
        )
        .build()
        .unwrap();
    let gateway = Gateway::with_registry(registry, &GatewayConfig::default());

    for i in 0..5 {
        let _ = gateway.process(UnifiedQueryRequest::new(format!("query {}", i))).await;
    }

    let report = gateway.health_report();
    assert_eq!(report.platforms.len(), 2);
    let steady = report.platforms.iter().find(|p| p.platform_id == "steady").unwrap();
    assert_eq!(steady.success_rate, 1.0);
    assert!(steady.sample_count > 0);
    assert_eq!(report.in_flight, 0);
}
