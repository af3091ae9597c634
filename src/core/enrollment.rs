//! Enrollment of students in courses
//!
//! An enrollment record links a student, by the student collection's lookup
//! key, to a course, by the course collection's lookup key:
//!
//! ```json
//! { "student": "6a1f…", "course": "CS101", "status": "active", "grade": null }
//! ```
//!
//! Enrolling appends the course key to the student's `courses` list and
//! withdrawing removes it again. Reference checks and the duplicate check
//! are plain reads followed by a write; concurrent requests for the same
//! pair are not serialized.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::core::error::{CampusError, ValidationError};
use crate::core::filter::{Condition, Filter};
use crate::core::store::{Collection, CollectionQuery, Record};

pub const STUDENT_FIELD: &str = "student";
pub const COURSE_FIELD: &str = "course";
pub const STATUS_FIELD: &str = "status";
pub const GRADE_FIELD: &str = "grade";
pub const ENROLLED_AT_FIELD: &str = "enrollmentDate";
/// Course keys held on the student record
pub const COURSES_FIELD: &str = "courses";

const STATUSES: [&str; 3] = ["active", "completed", "dropped"];
const GRADES: [&str; 6] = ["A", "B", "C", "D", "E", "F"];

/// Object-safe access to single records of another collection
#[async_trait]
pub trait RecordLookup: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Option<Record>>;

    async fn patch(&self, key: &str, patch: Record) -> Result<Option<Record>>;
}

#[async_trait]
impl<C: Collection> RecordLookup for C {
    async fn fetch(&self, key: &str) -> Result<Option<Record>> {
        self.get(key).await
    }

    async fn patch(&self, key: &str, patch: Record) -> Result<Option<Record>> {
        self.update(key, patch).await
    }
}

/// Enrollment operations over the student, course and enrollment collections
pub struct EnrollmentService<E> {
    students: Arc<dyn RecordLookup>,
    courses: Arc<dyn RecordLookup>,
    enrollments: Arc<E>,
}

impl<E> Clone for EnrollmentService<E> {
    fn clone(&self) -> Self {
        Self {
            students: self.students.clone(),
            courses: self.courses.clone(),
            enrollments: self.enrollments.clone(),
        }
    }
}

fn reference(record: &Record, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn check_choice(record: &Record, field: &str, allowed: &[&str]) -> Result<(), CampusError> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(s)) if allowed.contains(&s.as_str()) => Ok(()),
        Some(other) => Err(ValidationError::InvalidBody {
            message: format!("{} must be one of {}, got {}", field, allowed.join(", "), other),
        }
        .into()),
    }
}

fn course_keys(student: &Record) -> Vec<Value> {
    student
        .get(COURSES_FIELD)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

impl<E: Collection> EnrollmentService<E> {
    pub fn new(
        students: Arc<dyn RecordLookup>,
        courses: Arc<dyn RecordLookup>,
        enrollments: Arc<E>,
    ) -> Self {
        Self {
            students,
            courses,
            enrollments,
        }
    }

    /// Every enrollment, in storage order
    pub async fn list(&self) -> Result<Vec<Record>, CampusError> {
        self.enrollments
            .find_all()
            .await
            .map_err(CampusError::storage)
    }

    async fn matching(&self, filter: Filter) -> Result<Vec<Record>, CampusError> {
        self.enrollments
            .find(filter)
            .execute()
            .await
            .map_err(CampusError::storage)
    }

    /// Enroll `body.student` in `body.course`
    pub async fn enroll(&self, mut body: Record) -> Result<Record, CampusError> {
        let (Some(student_key), Some(course_key)) = (
            reference(&body, STUDENT_FIELD),
            reference(&body, COURSE_FIELD),
        ) else {
            return Err(ValidationError::MissingEnrollmentRefs.into());
        };
        check_choice(&body, STATUS_FIELD, &STATUSES)?;
        check_choice(&body, GRADE_FIELD, &GRADES)?;

        let (student, course) = tokio::try_join!(
            self.students.fetch(&student_key),
            self.courses.fetch(&course_key),
        )
        .map_err(CampusError::storage)?;
        let student = student.ok_or_else(|| CampusError::not_found("student"))?;
        if course.is_none() {
            return Err(CampusError::not_found("course"));
        }

        let existing = self
            .matching(
                Filter::all()
                    .with(STUDENT_FIELD, Condition::Eq(student_key.clone()))
                    .with(COURSE_FIELD, Condition::Eq(course_key.clone())),
            )
            .await?;
        if !existing.is_empty() {
            return Err(ValidationError::AlreadyEnrolled.into());
        }

        body.insert(STUDENT_FIELD.to_string(), Value::String(student_key.clone()));
        body.insert(COURSE_FIELD.to_string(), Value::String(course_key.clone()));
        body.entry(STATUS_FIELD)
            .or_insert_with(|| Value::String(STATUSES[0].to_string()));
        body.entry(GRADE_FIELD).or_insert(Value::Null);
        body.entry(ENROLLED_AT_FIELD)
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));

        let created = self
            .enrollments
            .insert(body)
            .await
            .map_err(CampusError::storage)?;

        let mut courses = course_keys(&student);
        let course_value = Value::String(course_key);
        if !courses.contains(&course_value) {
            courses.push(course_value);
            let mut patch = Record::new();
            patch.insert(COURSES_FIELD.to_string(), Value::Array(courses));
            self.students
                .patch(&student_key, patch)
                .await
                .map_err(CampusError::storage)?;
        }

        tracing::info!(student = %student_key, "student enrolled");
        Ok(created)
    }

    /// Courses the student is enrolled in
    ///
    /// Enrollments whose course no longer exists are skipped.
    pub async fn courses_of(&self, student_key: &str) -> Result<Vec<Record>, CampusError> {
        let enrollments = self
            .matching(Filter::all().with(STUDENT_FIELD, Condition::Eq(student_key.to_string())))
            .await?;
        resolve(&enrollments, COURSE_FIELD, self.courses.as_ref()).await
    }

    /// Students enrolled in the course with the given key
    pub async fn students_of(&self, course_key: &str) -> Result<Vec<Record>, CampusError> {
        if self
            .courses
            .fetch(course_key)
            .await
            .map_err(CampusError::storage)?
            .is_none()
        {
            return Err(CampusError::NotFound {
                message: "No course found with that course code".to_string(),
            });
        }

        let enrollments = self
            .matching(Filter::all().with(COURSE_FIELD, Condition::Eq(course_key.to_string())))
            .await?;
        resolve(&enrollments, STUDENT_FIELD, self.students.as_ref()).await
    }

    /// Delete an enrollment and drop the course from the student's list
    ///
    /// A student that no longer exists is logged and otherwise ignored.
    pub async fn withdraw(&self, enrollment_id: &str) -> Result<(), CampusError> {
        let enrollment = self
            .enrollments
            .get(enrollment_id)
            .await
            .map_err(CampusError::storage)?
            .ok_or_else(|| CampusError::not_found("enrollment"))?;

        if !self
            .enrollments
            .delete(enrollment_id)
            .await
            .map_err(CampusError::storage)?
        {
            return Err(CampusError::not_found("enrollment"));
        }

        let (Some(student_key), Some(course_key)) = (
            reference(&enrollment, STUDENT_FIELD),
            reference(&enrollment, COURSE_FIELD),
        ) else {
            return Ok(());
        };

        let Some(student) = self
            .students
            .fetch(&student_key)
            .await
            .map_err(CampusError::storage)?
        else {
            tracing::warn!(student = %student_key, "withdrawn enrollment references a missing student");
            return Ok(());
        };

        let mut courses = course_keys(&student);
        courses.retain(|c| c.as_str() != Some(course_key.as_str()));
        let mut patch = Record::new();
        patch.insert(COURSES_FIELD.to_string(), Value::Array(courses));
        self.students
            .patch(&student_key, patch)
            .await
            .map_err(CampusError::storage)?;

        tracing::info!(student = %student_key, enrollment = %enrollment_id, "enrollment withdrawn");
        Ok(())
    }
}

/// Look up the record each enrollment references through `field`
async fn resolve(
    enrollments: &[Record],
    field: &str,
    lookup: &dyn RecordLookup,
) -> Result<Vec<Record>, CampusError> {
    let mut resolved = Vec::with_capacity(enrollments.len());
    for enrollment in enrollments {
        let Some(key) = reference(enrollment, field) else {
            continue;
        };
        match lookup.fetch(&key).await.map_err(CampusError::storage)? {
            Some(record) => resolved.push(record),
            None => tracing::warn!(%field, %key, "enrollment references a missing record"),
        }
    }
    Ok(resolved)
}
