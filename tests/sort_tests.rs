//! Tests for the cached sort endpoint

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use campus::prelude::*;
use common::{BrokenCache, campus, seed_students, students_resource};

fn names(body: &Value) -> Vec<&str> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_sorts_whole_collection() {
    let campus = campus().await;

    let response = campus
        .server
        .get("/api/sort/students?field=gpa&order=asc")
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["field"], "gpa");
    assert_eq!(body["order"], "asc");
    assert_eq!(names(&body), vec!["Dana", "Bob", "Charlie", "Alice", "Eve"]);
    // Full records, unprojected
    assert_eq!(body["data"][0]["__v"], 0);
}

#[tokio::test]
async fn test_sorts_descending_by_string() {
    let campus = campus().await;

    let body: Value = campus
        .server
        .get("/api/sort/students?field=name&order=desc")
        .await
        .json();
    assert_eq!(names(&body), vec!["Eve", "Dana", "Charlie", "Bob", "Alice"]);
}

#[tokio::test]
async fn test_second_request_is_served_from_cache() {
    let campus = campus().await;

    let first: Value = campus
        .server
        .get("/api/sort/students?field=gpa&order=desc")
        .await
        .json();
    assert_eq!(campus.students.finds(), 1);

    let second: Value = campus
        .server
        .get("/api/sort/students?field=gpa&order=desc")
        .await
        .json();
    assert_eq!(campus.students.finds(), 1);
    assert_eq!(first, second);

    let cached = campus
        .cache
        .get("Student_sorted_gpa_desc")
        .await
        .unwrap()
        .unwrap();
    let cached: Value = serde_json::from_str(&cached).unwrap();
    assert_eq!(cached, first);
}

#[tokio::test]
async fn test_each_field_and_order_is_cached_separately() {
    let campus = campus().await;

    for query in [
        "field=gpa&order=asc",
        "field=gpa&order=desc",
        "field=name&order=asc",
        "field=gpa&order=asc",
    ] {
        campus
            .server
            .get(&format!("/api/sort/students?{}", query))
            .await
            .assert_status_ok();
    }
    assert_eq!(campus.students.finds(), 3);
    assert_eq!(campus.cache.len(), 3);
}

#[tokio::test]
async fn test_cached_view_is_stale_after_write() {
    let campus = campus().await;

    campus
        .server
        .get("/api/sort/students?field=gpa&order=asc")
        .await
        .assert_status_ok();

    campus
        .server
        .post("/api/students")
        .json(&json!({"name": "Zoe", "gpa": 1.0}))
        .await
        .assert_status(StatusCode::CREATED);

    let body: Value = campus
        .server
        .get("/api/sort/students?field=gpa&order=asc")
        .await
        .json();
    assert_eq!(body["data"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_unreadable_cache_entry_is_recomputed() {
    let campus = campus().await;
    campus
        .cache
        .set_ex("Student_sorted_year_asc", 60, "{not json".into())
        .await
        .unwrap();

    let response = campus
        .server
        .get("/api/sort/students?field=year&order=asc")
        .await;
    response.assert_status_ok();
    assert_eq!(campus.students.finds(), 1);

    let body: Value = response.json();
    assert_eq!(body["data"][0]["year"], 1);
}

// =============================================================================
// Validation Tests
// =============================================================================

mod validation_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_params() {
        let campus = campus().await;

        for query in ["", "?field=gpa", "?order=asc", "?field=&order=asc"] {
            let response = campus
                .server
                .get(&format!("/api/sort/students{}", query))
                .await;
            response.assert_status(StatusCode::BAD_REQUEST);

            let body: Value = response.json();
            assert_eq!(
                body,
                json!({"status": "fail", "message": "Field or order query missing"})
            );
        }
        assert_eq!(campus.students.finds(), 0);
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let campus = campus().await;

        let response = campus
            .server
            .get("/api/sort/students?field=gpa&order=ASC")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert_eq!(
            body["message"],
            "Invalid sort order 'ASC', expected 'asc' or 'desc'"
        );
    }
}

// =============================================================================
// Cache Failure Tests
// =============================================================================

mod cache_failure_tests {
    use super::*;

    async fn server_with_broken_cache(environment: Environment) -> TestServer {
        let students = InMemoryCollection::new();
        seed_students(&students).await;

        let app = ServerBuilder::new()
            .with_environment(environment)
            .with_cache_arc(Arc::new(BrokenCache))
            .register(students_resource(), students)
            .build()
            .unwrap();
        TestServer::new(app).unwrap()
    }

    #[tokio::test]
    async fn test_cache_failure_is_redacted() {
        let server = server_with_broken_cache(Environment::Production).await;

        let response = server.get("/api/sort/students?field=gpa&order=asc").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = response.json();
        assert_eq!(
            body,
            json!({"status": "error", "message": "Something went very wrong!"})
        );
    }

    #[tokio::test]
    async fn test_cache_failure_detail_in_development() {
        let server = server_with_broken_cache(Environment::Development).await;

        let response = server.get("/api/sort/students?field=gpa&order=asc").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = response.json();
        assert_eq!(body["code"], "CACHE_ERROR");
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .contains("connection refused")
        );
    }

    #[tokio::test]
    async fn test_listing_does_not_touch_cache() {
        let server = server_with_broken_cache(Environment::Production).await;
        server.get("/api/students").await.assert_status_ok();
    }
}
