//! Enrollment routes
//!
//! - `GET    /api/enrollments`                   every enrollment (read policy)
//! - `POST   /api/enrollments`                   enroll a student (write policy)
//! - `GET    /api/enrollments/student/{student}` a student's courses (read policy)
//! - `GET    /api/enrollments/course/{code}`     a course's students (roster policy)
//! - `DELETE /api/enrollments/{id}`              withdraw (write policy)

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};

use super::handlers::{DataResponse, ListResponse, SharedState, guard, parse_record};
use super::resource::{ResourceDescriptor, ResourceRoutes};
use crate::core::auth::{AccessPolicy, Role};
use crate::core::enrollment::EnrollmentService;
use crate::core::error::CampusError;
use crate::core::store::{Collection, Record};

/// Enrollment service bound to its routes and policies
pub struct EnrollmentResource<E> {
    descriptor: ResourceDescriptor,
    roster_policy: AccessPolicy,
    service: EnrollmentService<E>,
}

impl<E: Collection> EnrollmentResource<E> {
    /// Any authenticated caller may read and write; course rosters are
    /// restricted to instructors
    pub fn new(service: EnrollmentService<E>) -> Self {
        Self {
            descriptor: ResourceDescriptor::new("Enrollment", "enrollment", "enrollments")
                .with_read_policy(AccessPolicy::Authenticated)
                .with_write_policy(AccessPolicy::Authenticated),
            roster_policy: AccessPolicy::Role(Role::Instructor),
            service,
        }
    }

    pub fn with_roster_policy(mut self, policy: AccessPolicy) -> Self {
        self.roster_policy = policy;
        self
    }
}

impl<E: Collection> ResourceRoutes for EnrollmentResource<E> {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    fn descriptor_mut(&mut self) -> &mut ResourceDescriptor {
        &mut self.descriptor
    }

    fn build_routes(&self, shared: &SharedState) -> Router {
        let plural = self.descriptor.plural();
        let state = EnrollmentState {
            descriptor: Arc::new(self.descriptor.clone()),
            roster_policy: Arc::new(self.roster_policy.clone()),
            service: self.service.clone(),
            shared: shared.clone(),
        };

        Router::new()
            .route(
                &format!("/api/{}", plural),
                get(list_enrollments::<E>).post(create_enrollment::<E>),
            )
            .route(
                &format!("/api/{}/student/{{student}}", plural),
                get(student_courses::<E>),
            )
            .route(
                &format!("/api/{}/course/{{code}}", plural),
                get(course_students::<E>),
            )
            .route(
                &format!("/api/{}/{{id}}", plural),
                delete(delete_enrollment::<E>),
            )
            .with_state(state)
    }
}

pub struct EnrollmentState<E> {
    descriptor: Arc<ResourceDescriptor>,
    roster_policy: Arc<AccessPolicy>,
    service: EnrollmentService<E>,
    shared: SharedState,
}

impl<E> Clone for EnrollmentState<E> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            roster_policy: self.roster_policy.clone(),
            service: self.service.clone(),
            shared: self.shared.clone(),
        }
    }
}

fn listing(data: Vec<Record>) -> Json<ListResponse> {
    Json(ListResponse {
        status: "success",
        results: data.len(),
        data,
    })
}

/// GET /api/enrollments
pub async fn list_enrollments<E: Collection>(
    State(state): State<EnrollmentState<E>>,
    headers: HeaderMap,
) -> Result<Json<ListResponse>, CampusError> {
    guard(state.shared.auth.as_ref(), &headers, state.descriptor.read_policy()).await?;
    Ok(listing(state.service.list().await?))
}

/// POST /api/enrollments
pub async fn create_enrollment<E: Collection>(
    State(state): State<EnrollmentState<E>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, CampusError> {
    guard(state.shared.auth.as_ref(), &headers, state.descriptor.write_policy()).await?;

    let created = state.service.enroll(parse_record(&body)?).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::success(created))))
}

/// GET /api/enrollments/student/{student}
pub async fn student_courses<E: Collection>(
    State(state): State<EnrollmentState<E>>,
    headers: HeaderMap,
    Path(student): Path<String>,
) -> Result<Json<ListResponse>, CampusError> {
    guard(state.shared.auth.as_ref(), &headers, state.descriptor.read_policy()).await?;
    Ok(listing(state.service.courses_of(&student).await?))
}

/// GET /api/enrollments/course/{code}
pub async fn course_students<E: Collection>(
    State(state): State<EnrollmentState<E>>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> Result<Json<ListResponse>, CampusError> {
    guard(state.shared.auth.as_ref(), &headers, &state.roster_policy).await?;
    Ok(listing(state.service.students_of(&code).await?))
}

/// DELETE /api/enrollments/{id}
pub async fn delete_enrollment<E: Collection>(
    State(state): State<EnrollmentState<E>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, CampusError> {
    guard(state.shared.auth.as_ref(), &headers, state.descriptor.write_policy()).await?;

    state.service.withdraw(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
