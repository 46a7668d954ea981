// tests/api_tests.rs
//
// End-to-end tests against a real Postgres. Skipped when DATABASE_URL is unset.

use chrono::{Duration, Utc};
use exam_portal::{config::Config, routes, state::AppState};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;

/// Spawns the app on a random port and returns its base URL,
/// or `None` when no database is configured.
async fn spawn_app() -> Option<String> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        port: 0,
        cors_origins: vec![],
        login_rate_limit: false,
    };

    let app = routes::create_router(AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    Some(format!("http://127.0.0.1:{}/api/v1", port))
}

fn unique() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

struct Fixture {
    base: String,
    client: reqwest::Client,
    department: String,
}

impl Fixture {
    async fn new() -> Option<Self> {
        Some(Self {
            base: spawn_app().await?,
            client: reqwest::Client::new(),
            department: format!("Dept-{}", unique()),
        })
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> reqwest::Response {
        let mut req = self.client.post(format!("{}{}", self.base, path)).json(&body);
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        req.send().await.expect("request failed")
    }

    async fn put(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .put(format!("{}{}", self.base, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("request failed")
    }

    async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("request failed")
    }

    async fn login(&self, email: &str, role: &str) -> String {
        let resp = self
            .post(
                "/auth/login",
                None,
                json!({ "email": email, "password": "password123", "role": role }),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 200);
        let body: Value = resp.json().await.unwrap();
        assert!(body["user"].get("password").is_none());
        body["token"].as_str().expect("token").to_string()
    }

    async fn teacher(&self) -> String {
        let email = format!("t_{}@example.com", unique());
        let resp = self
            .post(
                "/auth/register/teacher",
                None,
                json!({
                    "firstName": "Grace",
                    "lastName": "Hopper",
                    "email": email,
                    "password": "password123",
                    "department": self.department,
                }),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 201);
        self.login(&email, "teacher").await
    }

    async fn student(&self) -> String {
        let email = format!("s_{}@example.com", unique());
        let resp = self
            .post(
                "/auth/register/student",
                None,
                json!({
                    "firstName": "Alan",
                    "lastName": "Turing",
                    "email": email,
                    "password": "password123",
                    "rollNumber": format!("R-{}", unique()),
                    "department": self.department,
                    "year": 2,
                    "semester": 3,
                    "section": "A",
                    "batch": "2024",
                }),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 201);
        let body: Value = resp.json().await.unwrap();
        assert!(body.get("password").is_none());
        self.login(&email, "student").await
    }

    /// Creates an open exam with one MCQ (2 marks) and one subjective question (8 marks).
    async fn open_exam(&self, teacher: &str, code: &str) -> Value {
        let now = Utc::now();
        let resp = self
            .post(
                "/exam",
                Some(teacher),
                json!({
                    "title": "Algorithms midterm",
                    "department": self.department,
                    "year": 2,
                    "semester": 3,
                    "section": "a",
                    "startTime": now - Duration::minutes(5),
                    "endTime": now + Duration::hours(1),
                    "durationMinutes": 60,
                    "accessCode": code,
                    "questions": [
                        {
                            "type": "mcq",
                            "text": "2 + 2 = ?",
                            "marks": 2,
                            "options": [
                                { "text": "4", "isCorrect": true },
                                { "text": "5", "isCorrect": false }
                            ]
                        },
                        {
                            "type": "subjective",
                            "text": "Explain quicksort.",
                            "marks": 8,
                            "modelAnswer": "Partition around a pivot and recurse."
                        }
                    ]
                }),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 201);
        resp.json().await.unwrap()
    }
}

fn access_code() -> String {
    unique()[..6].to_ascii_uppercase()
}

#[tokio::test]
async fn exam_lifecycle_from_start_to_published_result() {
    let Some(fx) = Fixture::new().await else { return };
    let teacher = fx.teacher().await;
    let student = fx.student().await;
    let lagging_student = fx.student().await;

    let code = access_code();
    let created = fx.open_exam(&teacher, &code).await;
    let exam_id = created["exam"]["id"].as_i64().unwrap();
    assert_eq!(created["exam"]["totalMarks"], 10);
    let questions = created["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    let mcq_id = questions[0]["id"].as_i64().unwrap();
    let essay_id = questions[1]["id"].as_i64().unwrap();

    // Wrong code is refused.
    let resp = fx
        .post(
            &format!("/student/exams/{}/start", exam_id),
            Some(&student),
            json!({ "accessCode": "ZZZZZZ" }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 403);

    // Codes are case-insensitive.
    let resp = fx
        .post(
            &format!("/student/exams/{}/start", exam_id),
            Some(&student),
            json!({ "accessCode": code.to_ascii_lowercase() }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 201);
    let attempt: Value = resp.json().await.unwrap();
    let submission_id = attempt["submission"]["id"].as_i64().unwrap();
    assert_eq!(attempt["submission"]["status"], "in_progress");
    assert_eq!(attempt["submission"]["answers"].as_array().unwrap().len(), 2);
    assert!(attempt["questions"][0].get("modelAnswer").is_none());

    // Starting again resumes the same attempt.
    let resp = fx
        .post(
            &format!("/student/exams/{}/start", exam_id),
            Some(&student),
            json!({ "accessCode": code }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let again: Value = resp.json().await.unwrap();
    assert_eq!(again["submission"]["id"].as_i64(), Some(submission_id));

    // A second student starts but never hands in.
    let resp = fx
        .post(
            &format!("/student/exams/{}/start", exam_id),
            Some(&lagging_student),
            json!({ "accessCode": code }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 201);

    let resp = fx
        .put(
            &format!("/student/submissions/{}/submit", submission_id),
            &student,
            json!({
                "answers": [
                    { "questionId": mcq_id, "selectedOption": 0 },
                    { "questionId": essay_id, "response": "Pick a pivot, partition, recurse." }
                ]
            }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let submitted: Value = resp.json().await.unwrap();
    assert_eq!(submitted["status"], "submitted");
    assert_eq!(submitted["totalMarks"].as_f64(), Some(2.0));

    // Handing in twice is rejected.
    let resp = fx
        .put(
            &format!("/student/submissions/{}/submit", submission_id),
            &student,
            json!({ "answers": [] }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 400);

    // And so is starting after hand-in.
    let resp = fx
        .post(
            &format!("/student/exams/{}/start", exam_id),
            Some(&student),
            json!({ "accessCode": code }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 400);

    // Results stay hidden until published.
    let resp = fx
        .get(&format!("/student/results/{}", submission_id), &student)
        .await;
    assert_eq!(resp.status().as_u16(), 404);

    let resp = fx
        .put(
            &format!("/teacher/submissions/{}/grade", submission_id),
            &teacher,
            json!({
                "answers": [{ "questionId": essay_id, "marksAwarded": 6, "feedback": "Good" }],
                "remarks": "Solid work"
            }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let graded: Value = resp.json().await.unwrap();
    assert_eq!(graded["status"], "evaluated");
    assert_eq!(graded["totalMarks"].as_f64(), Some(8.0));
    assert_eq!(graded["isPassed"], true);

    let resp = fx
        .post(
            &format!("/teacher/exams/{}/publish-results", exam_id),
            Some(&teacher),
            json!({}),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let outcome: Value = resp.json().await.unwrap();
    assert_eq!(outcome["published"], 1);
    assert_eq!(outcome["pending"]["inProgress"], 1);
    assert_eq!(outcome["pending"]["submitted"], 0);

    let resp = fx
        .get(&format!("/student/results/{}", submission_id), &student)
        .await;
    assert_eq!(resp.status().as_u16(), 200);

    let stats: Value = fx
        .get("/dashboard/stats", &student)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(stats["publishedResults"], 1);
    let average = stats["averagePercentage"].as_f64().unwrap();
    assert!((average - 80.0).abs() < 1e-9);

    // The lagging student's attempt is untouched by publishing.
    let subs: Value = fx
        .get(&format!("/teacher/exams/{}/submissions", exam_id), &teacher)
        .await
        .json()
        .await
        .unwrap();
    let statuses: Vec<&str> = subs
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["status"].as_str())
        .collect();
    assert!(statuses.contains(&"in_progress"));
    assert!(statuses.contains(&"published"));
}

#[tokio::test]
async fn submission_after_end_time_is_rejected() {
    let Some(fx) = Fixture::new().await else { return };
    let teacher = fx.teacher().await;
    let student = fx.student().await;

    let code = access_code();
    let created = fx.open_exam(&teacher, &code).await;
    let exam_id = created["exam"]["id"].as_i64().unwrap();

    let resp = fx
        .post(
            &format!("/student/exams/{}/start", exam_id),
            Some(&student),
            json!({ "accessCode": code }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 201);
    let attempt: Value = resp.json().await.unwrap();
    let submission_id = attempt["submission"]["id"].as_i64().unwrap();

    // Close the window behind the student's back.
    let now = Utc::now();
    let resp = fx
        .put(
            &format!("/teacher/exams/{}", exam_id),
            &teacher,
            json!({
                "startTime": now - Duration::hours(2),
                "endTime": now - Duration::minutes(1),
            }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);

    let resp = fx
        .put(
            &format!("/student/submissions/{}/submit", submission_id),
            &student,
            json!({ "answers": [] }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn other_class_is_refused_even_with_the_right_code() {
    let Some(fx) = Fixture::new().await else { return };
    let teacher = fx.teacher().await;

    let code = access_code();
    let created = fx.open_exam(&teacher, &code).await;
    let exam_id = created["exam"]["id"].as_i64().unwrap();

    let outsider = Fixture {
        base: fx.base.clone(),
        client: fx.client.clone(),
        department: format!("Other-{}", unique()),
    };
    let student = outsider.student().await;

    let resp = fx
        .post(
            &format!("/student/exams/{}/start", exam_id),
            Some(&student),
            json!({ "accessCode": code }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn duplicate_email_is_a_field_error() {
    let Some(fx) = Fixture::new().await else { return };
    let email = format!("dup_{}@example.com", unique());
    let body = json!({
        "firstName": "Grace",
        "lastName": "Hopper",
        "email": email,
        "password": "password123",
        "department": fx.department,
    });

    let first = fx.post("/auth/register/teacher", None, body.clone()).await;
    assert_eq!(first.status().as_u16(), 201);

    let second = fx.post("/auth/register/teacher", None, body).await;
    assert_eq!(second.status().as_u16(), 400);
    let err: Value = second.json().await.unwrap();
    assert_eq!(err["field"], "email");
}

#[tokio::test]
async fn issue_thread_is_private_to_its_student() {
    let Some(fx) = Fixture::new().await else { return };
    let teacher = fx.teacher().await;
    let owner = fx.student().await;
    let other = fx.student().await;

    let resp = fx
        .post(
            "/issues",
            Some(&owner),
            json!({
                "title": "Timer <b>reset</b>",
                "description": "<script>alert(1)</script>The timer reset on refresh.",
                "category": "technical"
            }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 201);
    let issue: Value = resp.json().await.unwrap();
    let issue_id = issue["id"].as_i64().unwrap();
    assert_eq!(issue["status"], "open");
    assert!(!issue["description"].as_str().unwrap().contains("<script>"));

    let resp = fx.get(&format!("/issues/{}", issue_id), &other).await;
    assert_eq!(resp.status().as_u16(), 404);

    let resp = fx
        .post(
            &format!("/issues/{}/reply", issue_id),
            Some(&teacher),
            json!({ "message": "Fixed in the next release." }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 201);

    let resp = fx
        .put(
            &format!("/issues/{}/status", issue_id),
            &teacher,
            json!({ "status": "resolved" }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);

    let thread: Value = fx
        .get(&format!("/issues/{}", issue_id), &owner)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(thread["issue"]["status"], "resolved");
    assert_eq!(thread["replies"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_starts_create_one_submission() {
    let Some(fx) = Fixture::new().await else { return };
    let teacher = fx.teacher().await;
    let student = fx.student().await;

    let code = access_code();
    let created = fx.open_exam(&teacher, &code).await;
    let exam_id = created["exam"]["id"].as_i64().unwrap();

    let mut starts = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let client = fx.client.clone();
        let url = format!("{}/student/exams/{}/start", fx.base, exam_id);
        let token = student.clone();
        let code = code.clone();
        starts.spawn(async move {
            let resp = client
                .post(url)
                .bearer_auth(token)
                .json(&json!({ "accessCode": code }))
                .send()
                .await
                .expect("request failed");
            let status = resp.status().as_u16();
            let body: Value = resp.json().await.unwrap();
            (status, body["submission"]["id"].as_i64())
        });
    }

    let mut created_count = 0;
    let mut ids = Vec::new();
    while let Some(joined) = starts.join_next().await {
        let (status, id) = joined.unwrap();
        match status {
            201 => created_count += 1,
            200 => {}
            other => panic!("unexpected status {}", other),
        }
        ids.push(id.expect("submission id"));
    }
    assert_eq!(created_count, 1);
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let subs: Value = fx
        .get(&format!("/teacher/exams/{}/submissions", exam_id), &teacher)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(subs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn publishing_leaves_ungraded_submissions_alone() {
    let Some(fx) = Fixture::new().await else { return };
    let teacher = fx.teacher().await;
    let graded_student = fx.student().await;
    let ungraded_student = fx.student().await;

    let code = access_code();
    let created = fx.open_exam(&teacher, &code).await;
    let exam_id = created["exam"]["id"].as_i64().unwrap();
    let essay_id = created["questions"][1]["id"].as_i64().unwrap();

    let mut submission_ids = Vec::new();
    for token in [&graded_student, &ungraded_student] {
        let resp = fx
            .post(
                &format!("/student/exams/{}/start", exam_id),
                Some(token),
                json!({ "accessCode": code }),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 201);
        let attempt: Value = resp.json().await.unwrap();
        let submission_id = attempt["submission"]["id"].as_i64().unwrap();

        let resp = fx
            .put(
                &format!("/student/submissions/{}/submit", submission_id),
                token,
                json!({
                    "answers": [{ "questionId": essay_id, "response": "Divide and conquer." }]
                }),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 200);
        submission_ids.push(submission_id);
    }
    let (graded_id, ungraded_id) = (submission_ids[0], submission_ids[1]);

    let resp = fx
        .put(
            &format!("/teacher/submissions/{}/grade", graded_id),
            &teacher,
            json!({
                "answers": [{ "questionId": essay_id, "marksAwarded": 5, "feedback": "Brief" }]
            }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);

    let resp = fx
        .post(
            &format!("/teacher/exams/{}/publish-results", exam_id),
            Some(&teacher),
            json!({}),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let outcome: Value = resp.json().await.unwrap();
    assert_eq!(outcome["published"], 1);
    assert_eq!(outcome["pending"]["submitted"], 1);
    assert_eq!(outcome["pending"]["inProgress"], 0);

    let subs: Value = fx
        .get(&format!("/teacher/exams/{}/submissions", exam_id), &teacher)
        .await
        .json()
        .await
        .unwrap();
    let status_of = |id: i64| {
        subs.as_array()
            .unwrap()
            .iter()
            .find(|s| s["id"].as_i64() == Some(id))
            .and_then(|s| s["status"].as_str())
            .map(str::to_string)
    };
    assert_eq!(status_of(graded_id).as_deref(), Some("published"));
    assert_eq!(status_of(ungraded_id).as_deref(), Some("submitted"));

    // The ungraded student still has nothing to see.
    let resp = fx
        .get(&format!("/student/results/{}", ungraded_id), &ungraded_student)
        .await;
    assert_eq!(resp.status().as_u16(), 404);
}
