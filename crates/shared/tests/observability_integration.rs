//! 可观测性模块集成测试
//!
//! 未安装 recorder 时指标记录必须是空操作；HTTP 中间件在真实路由上验证。

// ============================================================================
// 指标记录测试
// ============================================================================

mod metrics_tests {
    use course_shared::observability::metrics::{
        record_http_request, record_lessons_released, record_notification_delivery,
        record_payment, record_promo_redemption, set_worker_last_run,
    };

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/api/v1/courses", 200, 0.05);
        record_http_request("POST", "/api/v1/payments", 201, 0.12);
        record_http_request("PUT", "/api/v1/streams/{id}", 409, 0.08);
        record_http_request("POST", "/api/v1/payments/callback", 401, 0.01);
    }

    #[test]
    fn test_record_business_metrics() {
        for status in ["pending", "succeeded", "failed", "canceled", "refunded"] {
            record_payment(status);
        }
        for result in ["reserved", "rejected", "released"] {
            record_promo_redemption(result);
        }
        record_lessons_released(0);
        record_lessons_released(12);
        record_notification_delivery("sent", 30);
        record_notification_delivery("failed", 2);
    }

    #[test]
    fn test_set_worker_last_run() {
        set_worker_last_run("lesson_release_worker");
        set_worker_last_run("notification_worker");
        set_worker_last_run("payment_expiry_worker");
    }

    #[test]
    fn test_metrics_with_edge_cases() {
        record_http_request("", "", 0, 0.0);
        let long_path = "/api/".to_string() + &"x".repeat(1000);
        record_http_request("GET", &long_path, 200, f64::MAX);
        record_payment("");
        record_notification_delivery("sent", u64::MAX);
    }
}

// ============================================================================
// HTTP 中间件测试
// ============================================================================

mod middleware_tests {
    use axum::{
        Extension, Router,
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
    };
    use course_shared::observability::middleware::{RequestId, http_tracing, request_id};
    use tower::ServiceExt;

    async fn echo_request_id(Extension(id): Extension<RequestId>) -> String {
        id.as_str().to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/courses/{id}", get(echo_request_id))
            .layer(middleware::from_fn(http_tracing))
            .layer(middleware::from_fn(request_id))
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/courses/1")
                    .header("x-request-id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-request-id").unwrap(), "req-42");
    }

    #[tokio::test]
    async fn test_request_id_is_generated() {
        let response = app()
            .oneshot(Request::builder().uri("/courses/1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_unmatched_route_still_traced() {
        let response = app()
            .oneshot(Request::builder().uri("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[test]
    fn test_request_id_clone() {
        let id1 = RequestId("original".to_string());
        let id2 = id1.clone();
        assert_eq!(id1.as_str(), id2.as_str());
    }
}
