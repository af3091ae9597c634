//! Shared fixtures for HTTP integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use axum_test::TestServer;
use campus::core::auth::StaticTokenProvider;
use campus::prelude::*;

pub const ADMIN_TOKEN: &str = "admin-token";
pub const INSTRUCTOR_TOKEN: &str = "instructor-token";
pub const STUDENT_TOKEN: &str = "student-token";

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(record) => record,
        other => panic!("fixture is not an object: {}", other),
    }
}

pub fn token_provider() -> StaticTokenProvider {
    StaticTokenProvider::new()
        .with_token(
            ADMIN_TOKEN,
            Principal {
                user_id: "u-admin".into(),
                role: Role::Admin,
            },
        )
        .with_token(
            INSTRUCTOR_TOKEN,
            Principal {
                user_id: "u-instructor".into(),
                role: Role::Instructor,
            },
        )
        .with_token(
            STUDENT_TOKEN,
            Principal {
                user_id: "u-student".into(),
                role: Role::Student,
            },
        )
}

pub async fn seed_students(students: &impl Collection) {
    for student in [
        json!({"name": "Alice", "major": "CS", "gpa": 3.8, "year": 3}),
        json!({"name": "Bob", "major": "Math", "gpa": 3.2, "year": 2}),
        json!({"name": "Charlie", "major": "CS", "gpa": 3.5, "year": 4}),
        json!({"name": "Dana", "major": "Physics", "gpa": 2.9, "year": 1}),
        json!({"name": "Eve", "major": "CS", "gpa": 3.9, "year": 2}),
    ] {
        students.insert(record(student)).await.unwrap();
    }
}

pub async fn seed_courses(courses: &impl Collection) {
    for course in [
        json!({"code": "CS101", "title": "Intro to Programming", "price": 500, "credits": 4}),
        json!({"code": "CS201", "title": "Data Structures", "price": 650, "credits": 4}),
        json!({"code": "MA150", "title": "Linear Algebra", "price": 450, "credits": 3}),
    ] {
        courses.insert(record(course)).await.unwrap();
    }
}

pub async fn seed_instructors(instructors: &impl Collection) {
    for name in ["Hopper", "Noether", "Feynman"] {
        instructors
            .insert(record(json!({"name": name})))
            .await
            .unwrap();
    }
}

pub fn students_resource() -> ResourceDescriptor {
    ResourceDescriptor::new("Student", "student", "students")
}

pub fn courses_resource() -> ResourceDescriptor {
    ResourceDescriptor::new("Course", "course", "courses")
        .with_write_policy(AccessPolicy::Role(Role::Admin))
}

pub fn instructors_resource() -> ResourceDescriptor {
    ResourceDescriptor::new("Instructor", "instructor", "instructors")
        .with_listing(ListingMode::Paginated)
        .with_read_policy(AccessPolicy::Authenticated)
}

/// Handles kept by a test alongside the running server
pub struct Campus {
    pub server: TestServer,
    pub students: Arc<CountingCollection<InMemoryCollection>>,
    pub courses: InMemoryCollection,
    pub enrollments: InMemoryCollection,
    pub cache: InMemoryCache,
}

/// Seeded server with the demo resources and token auth
pub async fn campus() -> Campus {
    campus_with(ServerBuilder::new()).await
}

pub async fn campus_with(builder: ServerBuilder) -> Campus {
    let students = Arc::new(CountingCollection::new(InMemoryCollection::new()));
    let courses = InMemoryCollection::new().with_key_field("code");
    let instructors = InMemoryCollection::new();
    let enrollments = InMemoryCollection::new();
    let cache = InMemoryCache::new();

    seed_students(students.as_ref()).await;
    seed_courses(&courses).await;
    seed_instructors(&instructors).await;

    let app = builder
        .with_auth_provider(token_provider())
        .with_cache(cache.clone())
        .register_arc(students_resource(), students.clone())
        .register(courses_resource(), courses.clone())
        .register(instructors_resource(), instructors)
        .with_enrollments(EnrollmentService::new(
            students.clone(),
            Arc::new(courses.clone()),
            Arc::new(enrollments.clone()),
        ))
        .build()
        .unwrap();

    Campus {
        server: TestServer::new(app).unwrap(),
        students,
        courses,
        enrollments,
        cache,
    }
}

/// Wraps a collection and counts how many queries it starts
pub struct CountingCollection<C> {
    inner: C,
    finds: AtomicUsize,
}

impl<C> CountingCollection<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            finds: AtomicUsize::new(0),
        }
    }

    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: Collection> Collection for CountingCollection<C> {
    type Query = C::Query;

    fn find(&self, filter: Filter) -> Self::Query {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.inner.find(filter)
    }

    async fn get(&self, id: &str) -> Result<Option<Record>> {
        self.inner.get(id).await
    }

    async fn insert(&self, record: Record) -> Result<Record> {
        self.inner.insert(record).await
    }

    async fn update(&self, id: &str, patch: Record) -> Result<Option<Record>> {
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id).await
    }
}

/// Cache whose every operation fails
pub struct BrokenCache;

#[async_trait]
impl Cache for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(anyhow::anyhow!("connection refused"))
    }

    async fn set_ex(&self, _key: &str, _ttl_seconds: u64, _value: String) -> Result<()> {
        Err(anyhow::anyhow!("connection refused"))
    }
}

/// Collection whose every operation fails with a non-constraint error
pub struct BrokenCollection;

#[async_trait]
impl Collection for BrokenCollection {
    type Query = campus::storage::InMemoryQuery;

    fn find(&self, filter: Filter) -> Self::Query {
        InMemoryCollection::new().find(filter)
    }

    async fn get(&self, _id: &str) -> Result<Option<Record>> {
        Err(anyhow::anyhow!("disk on fire"))
    }

    async fn insert(&self, _record: Record) -> Result<Record> {
        Err(anyhow::anyhow!("disk on fire"))
    }

    async fn update(&self, _id: &str, _patch: Record) -> Result<Option<Record>> {
        Err(anyhow::anyhow!("disk on fire"))
    }

    async fn delete(&self, _id: &str) -> Result<bool> {
        Err(anyhow::anyhow!("disk on fire"))
    }
}
