//! Tests for the enrollment routes

mod common;

use axum::http::StatusCode;
use campus::prelude::*;
use common::{ADMIN_TOKEN, INSTRUCTOR_TOKEN, STUDENT_TOKEN, Campus, campus};

async fn student_id(campus: &Campus, name: &str) -> String {
    let body: Value = campus
        .server
        .get("/api/students")
        .add_query_param("name", name)
        .await
        .json();
    body["data"][0]["_id"].as_str().unwrap().to_string()
}

async fn enroll(campus: &Campus, student: &str, course: &str) -> Value {
    let response = campus
        .server
        .post("/api/enrollments")
        .authorization_bearer(STUDENT_TOKEN)
        .json(&json!({"student": student, "course": course}))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

// =============================================================================
// Enrollment Creation Tests
// =============================================================================

mod create_tests {
    use super::*;

    #[tokio::test]
    async fn test_enroll_student() {
        let campus = campus().await;
        let alice = student_id(&campus, "Alice").await;

        let body = enroll(&campus, &alice, "CS101").await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["student"], alice.as_str());
        assert_eq!(body["data"]["course"], "CS101");
        assert_eq!(body["data"]["status"], "active");

        let student: Value = campus
            .server
            .get(&format!("/api/students/{}", alice))
            .await
            .json();
        assert_eq!(student["data"]["courses"], json!(["CS101"]));
    }

    #[tokio::test]
    async fn test_references_are_required() {
        let campus = campus().await;

        let response = campus
            .server
            .post("/api/enrollments")
            .authorization_bearer(STUDENT_TOKEN)
            .json(&json!({}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert_eq!(
            body,
            json!({"status": "fail", "message": "Student ID and Course ID are required"})
        );
    }

    #[tokio::test]
    async fn test_unknown_student_or_course() {
        let campus = campus().await;
        let alice = student_id(&campus, "Alice").await;

        for (student, course, message) in [
            ("nobody", "CS101", "No student found with that ID"),
            (alice.as_str(), "XX999", "No course found with that ID"),
        ] {
            let response = campus
                .server
                .post("/api/enrollments")
                .authorization_bearer(STUDENT_TOKEN)
                .json(&json!({"student": student, "course": course}))
                .await;
            response.assert_status_not_found();

            let body: Value = response.json();
            assert_eq!(body["message"], message);
        }
        assert!(campus.enrollments.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_enrollment() {
        let campus = campus().await;
        let alice = student_id(&campus, "Alice").await;
        enroll(&campus, &alice, "CS101").await;

        let response = campus
            .server
            .post("/api/enrollments")
            .authorization_bearer(STUDENT_TOKEN)
            .json(&json!({"student": alice, "course": "CS101"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert_eq!(body["message"], "Student is already enrolled in this course");
        assert_eq!(campus.enrollments.len(), 1);
    }

    #[tokio::test]
    async fn test_anonymous_cannot_enroll() {
        let campus = campus().await;

        campus
            .server
            .post("/api/enrollments")
            .json(&json!({"student": "x", "course": "CS101"}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}

// =============================================================================
// Enrollment Listing Tests
// =============================================================================

mod listing_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_all() {
        let campus = campus().await;
        let alice = student_id(&campus, "Alice").await;
        let bob = student_id(&campus, "Bob").await;
        enroll(&campus, &alice, "CS101").await;
        enroll(&campus, &bob, "CS101").await;

        let body: Value = campus
            .server
            .get("/api/enrollments")
            .authorization_bearer(INSTRUCTOR_TOKEN)
            .await
            .json();
        assert_eq!(body["results"], 2);
    }

    #[tokio::test]
    async fn test_student_courses() {
        let campus = campus().await;
        let alice = student_id(&campus, "Alice").await;
        enroll(&campus, &alice, "CS101").await;
        enroll(&campus, &alice, "MA150").await;

        let response = campus
            .server
            .get(&format!("/api/enrollments/student/{}", alice))
            .authorization_bearer(STUDENT_TOKEN)
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        let titles: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Intro to Programming", "Linear Algebra"]);
    }

    #[tokio::test]
    async fn test_course_students_for_instructor() {
        let campus = campus().await;
        let alice = student_id(&campus, "Alice").await;
        enroll(&campus, &alice, "CS201").await;

        let response = campus
            .server
            .get("/api/enrollments/course/CS201")
            .authorization_bearer(INSTRUCTOR_TOKEN)
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["results"], 1);
        assert_eq!(body["data"][0]["name"], "Alice");
    }

    #[tokio::test]
    async fn test_course_students_is_instructor_only() {
        let campus = campus().await;

        for token in [STUDENT_TOKEN, ADMIN_TOKEN] {
            let response = campus
                .server
                .get("/api/enrollments/course/CS201")
                .authorization_bearer(token)
                .await;
            response.assert_status(StatusCode::FORBIDDEN);

            let body: Value = response.json();
            assert_eq!(
                body["message"],
                "You do not have permission to perform this action"
            );
        }
    }

    #[tokio::test]
    async fn test_course_students_unknown_code() {
        let campus = campus().await;

        let response = campus
            .server
            .get("/api/enrollments/course/XX999")
            .authorization_bearer(INSTRUCTOR_TOKEN)
            .await;
        response.assert_status_not_found();

        let body: Value = response.json();
        assert_eq!(body["message"], "No course found with that course code");
    }
}

// =============================================================================
// Withdrawal Tests
// =============================================================================

mod withdraw_tests {
    use super::*;

    #[tokio::test]
    async fn test_withdraw_updates_student() {
        let campus = campus().await;
        let alice = student_id(&campus, "Alice").await;
        enroll(&campus, &alice, "CS101").await;
        let created = enroll(&campus, &alice, "CS201").await;
        let id = created["data"]["_id"].as_str().unwrap();

        let response = campus
            .server
            .delete(&format!("/api/enrollments/{}", id))
            .authorization_bearer(STUDENT_TOKEN)
            .await;
        response.assert_status(StatusCode::NO_CONTENT);
        assert!(response.as_bytes().is_empty());

        let student: Value = campus
            .server
            .get(&format!("/api/students/{}", alice))
            .await
            .json();
        assert_eq!(student["data"]["courses"], json!(["CS101"]));
        assert_eq!(campus.enrollments.len(), 1);
    }

    #[tokio::test]
    async fn test_withdraw_unknown_enrollment() {
        let campus = campus().await;

        let response = campus
            .server
            .delete("/api/enrollments/missing")
            .authorization_bearer(STUDENT_TOKEN)
            .await;
        response.assert_status_not_found();

        let body: Value = response.json();
        assert_eq!(body["message"], "No enrollment found with that ID");
    }
}
