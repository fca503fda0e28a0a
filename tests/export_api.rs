//! End-to-end tests for the export endpoints over the full router.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

use trade_export_gateway::api::create_router;
use trade_export_gateway::app::{AppState, ExportConfig};
use trade_export_gateway::domain::{ErrorResponse, RecordSource};
use trade_export_gateway::test_utils::MockRecordSource;

fn state_with(source: MockRecordSource, config: ExportConfig) -> AppState {
    AppState::new(Arc::new(source) as Arc<dyn RecordSource>, config)
}

fn fx_rows() -> Vec<serde_json::Value> {
    vec![
        json!({
            "currency_code": "USD",
            "buying_rate": 56.5,
            "selling_rate": 57.6,
            "rate_date": "2024-03-15T00:00:00Z",
            "approved_by": "governor"
        }),
        json!({
            "currency_code": "EUR",
            "buying_rate": 61.2,
            "selling_rate": 62.4,
            "rate_date": "2024-03-15T00:00:00Z",
            "approved_by": null
        }),
    ]
}

fn post_export(body: serde_json::Value, roles: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/export")
        .header("Content-Type", "application/json")
        .header("x-user-id", "tester")
        .header("x-user-roles", roles)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_missing_identity_headers_is_401() {
    let router = create_router(state_with(MockRecordSource::empty(), ExportConfig::default()));

    let request = Request::builder()
        .method("POST")
        .uri("/export")
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({"domain": "fx", "format": "csv"}).to_string(),
        ))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let error: ErrorResponse = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(error.code, "UNAUTHORIZED");
}

#[tokio::test]
async fn test_missing_capability_is_403_and_source_untouched() {
    let source = MockRecordSource::with_records(fx_rows());
    let calls = source.call_recorder();
    let router = create_router(state_with(source, ExportConfig::default()));

    let request = post_export(json!({"domain": "fx", "format": "csv"}), "customs:export");
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let error: ErrorResponse = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(error.code, "FORBIDDEN");
    assert_eq!(calls.open_count(), 0);
}

#[tokio::test]
async fn test_unknown_filter_field_is_400_with_field_path() {
    let router = create_router(state_with(MockRecordSource::empty(), ExportConfig::default()));

    let request = post_export(
        json!({
            "domain": "fx",
            "format": "json",
            "filters": { "bogus": { "eq": "x" } }
        }),
        "fx:export",
    );
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(error.code, "INVALID_REQUEST");
    assert_eq!(error.field_path.as_deref(), Some("filters.bogus"));
}

#[tokio::test]
async fn test_unknown_domain_in_body_gets_structured_rejection() {
    let router = create_router(state_with(MockRecordSource::empty(), ExportConfig::default()));

    let request = post_export(json!({"domain": "xyz", "format": "csv"}), "fx:export");
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(error.code, "INVALID_REQUEST");
    assert!(error.message.contains("xyz"));
}

#[tokio::test]
async fn test_unknown_format_in_query_gets_structured_rejection() {
    let router = create_router(state_with(MockRecordSource::empty(), ExportConfig::default()));

    let request = Request::builder()
        .method("GET")
        .uri("/export?domain=fx&format=xml")
        .header("x-user-id", "tester")
        .header("x-user-roles", "fx:export")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(error.code, "INVALID_REQUEST");
}

#[tokio::test]
async fn test_csv_export_quotes_comma_in_exporter_name() {
    let rows = vec![
        json!({
            "declaration_number": "CD-001",
            "exporter_name": "Oromia Coffee, Ltd.",
            "hs_code": "0901.11",
            "declared_value": 125000.0,
            "cleared": true,
            "cleared_at": "2024-02-01T09:30:00Z"
        }),
        json!({
            "declaration_number": "CD-002",
            "exporter_name": "Sidama Union",
            "hs_code": null,
            "declared_value": 98000.5,
            "cleared": false,
            "cleared_at": null
        }),
    ];
    let router = create_router(state_with(
        MockRecordSource::with_records(rows),
        ExportConfig::default(),
    ));

    let request = post_export(
        json!({"domain": "customs", "format": "csv"}),
        "customs:export",
    );
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/csv"
    );
    assert!(
        response.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=\"customs-export-")
    );

    let text = body_text(response).await;
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "declaration_number,exporter_name,hs_code,declared_value,cleared,cleared_at"
    );
    assert_eq!(
        lines.next().unwrap(),
        "CD-001,\"Oromia Coffee, Ltd.\",0901.11,125000,true,2024-02-01T09:30:00Z"
    );
    assert_eq!(lines.next().unwrap(), "CD-002,Sidama Union,,98000.5,false,");
}

#[tokio::test]
async fn test_result_too_large_is_413() {
    let rows: Vec<_> = (0..4)
        .map(|i| {
            json!({
                "currency_code": format!("C{i}"),
                "buying_rate": 1.0,
                "selling_rate": 2.0,
                "rate_date": "2024-03-15T00:00:00Z",
                "approved_by": null
            })
        })
        .collect();
    let router = create_router(state_with(
        MockRecordSource::with_records(rows),
        ExportConfig {
            max_records: 3,
            ..Default::default()
        },
    ));

    let request = post_export(json!({"domain": "fx", "format": "json"}), "fx:export");
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let error: ErrorResponse = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(error.code, "RESULT_TOO_LARGE");
}

#[tokio::test]
async fn test_unmappable_record_counted_in_skip_header() {
    let mut rows = fx_rows();
    // Third record is missing its required rate_date
    rows.push(json!({
        "currency_code": "GBP",
        "buying_rate": 70.1,
        "selling_rate": 71.2,
        "rate_date": null,
        "approved_by": null
    }));
    let router = create_router(state_with(
        MockRecordSource::with_records(rows),
        ExportConfig::default(),
    ));

    let request = post_export(json!({"domain": "fx", "format": "csv"}), "fx:export");
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-export-record-count"], "2");
    assert_eq!(response.headers()["x-export-skipped-count"], "1");
    assert!(response.headers().contains_key("x-export-generated-at"));

    let text = body_text(response).await;
    assert_eq!(text.lines().count(), 3); // header + 2 surviving rows
    assert!(!text.contains("GBP"));
}

#[tokio::test]
async fn test_json_export_preserves_schema_field_order() {
    let router = create_router(state_with(
        MockRecordSource::with_records(fx_rows()),
        ExportConfig::default(),
    ));

    let request = post_export(json!({"domain": "fx", "format": "json"}), "fx:export");
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );

    let text = body_text(response).await;
    let parsed: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0]["currency_code"], "USD");
    assert_eq!(parsed[1]["approved_by"], serde_json::Value::Null);

    // Key order in the raw text follows the schema, not alphabetical order
    let currency_pos = text.find("currency_code").unwrap();
    let buying_pos = text.find("buying_rate").unwrap();
    let approved_pos = text.find("approved_by").unwrap();
    assert!(currency_pos < buying_pos);
    assert!(buying_pos < approved_pos);
}

#[tokio::test]
async fn test_get_export_with_url_encoded_filters() {
    let source = MockRecordSource::with_records(fx_rows());
    let calls = source.call_recorder();
    let router = create_router(state_with(source, ExportConfig::default()));

    // filters = {"currency_code":{"eq":"USD"}}
    let uri = "/export?domain=fx&format=json&filters=%7B%22currency_code%22%3A%7B%22eq%22%3A%22USD%22%7D%7D";
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-user-id", "tester")
        .header("x-user-roles", "fx:export")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let predicate = calls.last_predicate().unwrap();
    assert_eq!(predicate.clauses().len(), 1);
    assert_eq!(predicate.clauses()[0].0, "currency_code");
}

#[tokio::test]
async fn test_get_export_with_malformed_filter_json_is_400() {
    let router = create_router(state_with(MockRecordSource::empty(), ExportConfig::default()));

    let request = Request::builder()
        .method("GET")
        .uri("/export?domain=fx&format=json&filters=not-json")
        .header("x-user-id", "tester")
        .header("x-user-roles", "fx:export")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(error.field_path.as_deref(), Some("filters"));
}

#[tokio::test]
async fn test_pdf_export_returns_pdf_bytes() {
    let router = create_router(state_with(
        MockRecordSource::with_records(fx_rows()),
        ExportConfig::default(),
    ));

    let request = post_export(json!({"domain": "fx", "format": "pdf"}), "fx:export");
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/pdf"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.starts_with(b"%PDF-1.4"));
    assert!(bytes.ends_with(b"%%EOF\n") || bytes.ends_with(b"%%EOF"));
}

#[tokio::test]
async fn test_streamed_export_delivers_complete_artifact() {
    let rows: Vec<_> = (0..40)
        .map(|i| {
            json!({
                "currency_code": format!("C{i:02}"),
                "buying_rate": 1.0 + i as f64,
                "selling_rate": 2.0 + i as f64,
                "rate_date": "2024-03-15T00:00:00Z",
                "approved_by": null
            })
        })
        .collect();
    let router = create_router(state_with(
        MockRecordSource::with_records(rows),
        ExportConfig {
            max_records: 100,
            stream_threshold: 10,
            batch_size: 16,
        },
    ));

    let request = post_export(json!({"domain": "fx", "format": "csv"}), "fx:export");
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-export-record-count"], "40");

    let text = body_text(response).await;
    assert_eq!(text.lines().count(), 41);
    assert!(text.contains("C39"));
}

#[tokio::test]
async fn test_source_failure_is_503_after_retry() {
    let source = MockRecordSource::with_records(fx_rows()).failing_transiently(2);
    let calls = source.call_recorder();
    let router = create_router(state_with(source, ExportConfig::default()));

    let request = post_export(json!({"domain": "fx", "format": "csv"}), "fx:export");
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(calls.open_count(), 2);

    let error: ErrorResponse = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(error.code, "UNAVAILABLE");
    // Source failure detail stays in the log, not the response body
    assert_eq!(error.message, "Record source is temporarily unavailable");
    assert!(!error.message.contains("mock transient failure"));
}

#[tokio::test]
async fn test_health_endpoints() {
    let router = create_router(state_with(MockRecordSource::empty(), ExportConfig::default()));

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(health["status"], "healthy");

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health/live")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_reflects_source_health() {
    let router = create_router(state_with(
        MockRecordSource::empty().unhealthy(),
        ExportConfig::default(),
    ));

    let response = router
        .oneshot(
            Request::builder()
                .uri("/health/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
