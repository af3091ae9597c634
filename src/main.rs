//! Demo server: students, courses, instructors and enrollments in memory
//!
//! ```text
//! campus-server [config.yaml]
//! ```
//!
//! The config path may also come from `CAMPUS_CONFIG`.

use std::sync::Arc;

use anyhow::Result;
use campus::prelude::*;
use campus::storage::cache_from_config;
use campus::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CAMPUS_CONFIG").ok());
    let config = AppConfig::load(path.as_deref())?;

    init_tracing(&config.logging);
    tracing::info!(environment = ?config.environment, "starting campus-server");

    let students = Arc::new(InMemoryCollection::new());
    let courses = Arc::new(InMemoryCollection::new().with_key_field("code"));
    let instructors = InMemoryCollection::new();
    seed(&students, &courses, &instructors).await?;

    let enrollments = EnrollmentService::new(
        students.clone(),
        courses.clone(),
        Arc::new(InMemoryCollection::new()),
    );

    let cache = cache_from_config(&config.cache).await?;

    ServerBuilder::from_config(&config)
        .with_cache_arc(cache)
        .register_arc(
            ResourceDescriptor::new("Student", "student", "students"),
            students,
        )
        .register_arc(
            ResourceDescriptor::new("Course", "course", "courses"),
            courses,
        )
        .register(
            ResourceDescriptor::new("Instructor", "instructor", "instructors")
                .with_listing(ListingMode::Paginated),
            instructors,
        )
        .with_enrollments(enrollments)
        .serve(&config.bind_addr())
        .await
}

async fn seed(
    students: &InMemoryCollection,
    courses: &InMemoryCollection,
    instructors: &InMemoryCollection,
) -> Result<()> {
    for student in [
        json!({"name": "Alice Johnson", "email": "alice@campus.edu", "major": "Computer Science", "gpa": 3.8, "year": 3}),
        json!({"name": "Bob Smith", "email": "bob@campus.edu", "major": "Mathematics", "gpa": 3.2, "year": 2}),
        json!({"name": "Charlie Brown", "email": "charlie@campus.edu", "major": "Physics", "gpa": 3.5, "year": 4}),
        json!({"name": "Dana White", "email": "dana@campus.edu", "major": "Computer Science", "gpa": 2.9, "year": 1}),
    ] {
        students.insert(into_record(student)).await?;
    }

    for course in [
        json!({"code": "CS101", "title": "Intro to Programming", "credits": 4, "price": 500}),
        json!({"code": "CS201", "title": "Data Structures", "credits": 4, "price": 650}),
        json!({"code": "MA150", "title": "Linear Algebra", "credits": 3, "price": 450}),
        json!({"code": "PH110", "title": "Mechanics", "credits": 3, "price": 400}),
    ] {
        courses.insert(into_record(course)).await?;
    }

    for instructor in [
        json!({"name": "Dr. Grace Hopper", "department": "Computer Science"}),
        json!({"name": "Dr. Emmy Noether", "department": "Mathematics"}),
        json!({"name": "Dr. Richard Feynman", "department": "Physics"}),
    ] {
        instructors.insert(into_record(instructor)).await?;
    }

    tracing::info!(
        students = students.len(),
        courses = courses.len(),
        instructors = instructors.len(),
        "seeded demo data"
    );
    Ok(())
}

fn into_record(value: Value) -> Record {
    match value {
        Value::Object(record) => record,
        _ => Record::new(),
    }
}
