//! Course catalogue, profile course list and workout progress.

use reqwest::Url;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::TokenStore;
use crate::models::{clamp_progress, Course, CourseProgress, Workout, WorkoutProgress};
use crate::pending::PendingCourses;

use super::transport::{ApiContext, HttpRequest, Payload};
use super::ApiError;

/// Status with which the backend signals that an add was queued
const QUEUED_STATUS: u16 = 500;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddCourseBody<'a> {
    course_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressBody<'a> {
    progress_data: &'a [u32],
}

/// Client for course, workout and progress endpoints.
/// Clone is cheap; clones share transport, token store and pending set.
#[derive(Clone)]
pub struct CourseApi {
    ctx: ApiContext,
    tokens: TokenStore,
    pending: PendingCourses,
}

impl CourseApi {
    pub fn new(ctx: ApiContext, tokens: TokenStore, pending: PendingCourses) -> Self {
        Self {
            ctx,
            tokens,
            pending,
        }
    }

    pub fn pending(&self) -> &PendingCourses {
        &self.pending
    }

    /// Network failures, timeouts included, as a user-facing error
    fn network_error(err: ApiError) -> ApiError {
        match err {
            ApiError::Timeout => ApiError::Network(
                "The server did not respond in time. Check your connection and try again."
                    .to_string(),
            ),
            ApiError::Network(message) => ApiError::Network(format!(
                "Could not reach the server ({}). Check your connection and try again.",
                message
            )),
            other => other,
        }
    }

    /// Send a request with the bearer token attached.
    ///
    /// Fails with an auth error when no token is stored, and removes the
    /// token when the server answers 401.
    pub async fn authorized_request(&self, request: HttpRequest) -> Result<Payload, ApiError> {
        let token = self
            .tokens
            .get()
            .ok_or_else(|| ApiError::unauthorized("Not logged in"))?;

        let response = self
            .ctx
            .fetch(request.bearer(&token))
            .await
            .map_err(Self::network_error)?;

        if !response.is_success() {
            if response.status == 401 {
                debug!("Token rejected by server");
                self.tokens.remove_if(&token);
            }
            return Err(ApiError::from_status(response.status, &response.body));
        }

        Ok(response.payload())
    }

    /// Send a request that needs no token
    async fn public_request(&self, request: HttpRequest) -> Result<Payload, ApiError> {
        let response = self.ctx.fetch(request).await.map_err(Self::network_error)?;
        if !response.is_success() {
            return Err(ApiError::from_status(response.status, &response.body));
        }
        Ok(response.payload())
    }

    /// `/users/me/progress` with the ids as encoded query parameters
    fn progress_url(&self, course_id: &str, workout_id: Option<&str>) -> Result<String, ApiError> {
        let mut url = Url::parse(&self.ctx.url("/users/me/progress"))
            .map_err(|e| ApiError::Validation(format!("Invalid API URL: {}", e)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("courseId", course_id);
            if let Some(workout_id) = workout_id {
                query.append_pair("workoutId", workout_id);
            }
        }
        Ok(url.into())
    }

    // ===== Catalogue =====

    pub async fn get_courses(&self) -> Result<Vec<Course>, ApiError> {
        let request = HttpRequest::get(self.ctx.url("/courses"));
        let courses: Vec<Course> = self.public_request(request).await?.json()?;
        debug!(count = courses.len(), "Courses fetched");
        Ok(courses)
    }

    pub async fn get_course_by_id(&self, course_id: &str) -> Result<Course, ApiError> {
        let request = HttpRequest::get(self.ctx.url(&format!("/courses/{}", course_id)));
        self.public_request(request).await?.json()
    }

    pub async fn get_course_workouts(&self, course_id: &str) -> Result<Vec<Workout>, ApiError> {
        let request =
            HttpRequest::get(self.ctx.url(&format!("/courses/{}/workouts", course_id)));
        self.authorized_request(request).await?.json()
    }

    pub async fn get_workout_by_id(&self, workout_id: &str) -> Result<Workout, ApiError> {
        let request = HttpRequest::get(self.ctx.url(&format!("/workouts/{}", workout_id)));
        self.authorized_request(request).await?.json()
    }

    // ===== Profile courses =====

    /// Add a course to the user's profile.
    ///
    /// A 500 means the server queued the add: the id is recorded in the
    /// pending set and the call fails with [`ApiError::Pending`], which
    /// callers may treat as a soft success.
    pub async fn add_user_course(&self, course_id: &str) -> Result<String, ApiError> {
        let request = HttpRequest::post(self.ctx.url("/users/me/courses"))
            .json_text(&AddCourseBody { course_id })?;

        match self.authorized_request(request).await {
            Ok(payload) => {
                info!(course_id, "Course added");
                Ok(payload.message())
            }
            Err(ApiError::Server { status: QUEUED_STATUS, message }) => {
                warn!(course_id, %message, "Course add queued by server");
                self.pending.add(course_id);
                Err(ApiError::Pending {
                    course_id: course_id.to_string(),
                    status: QUEUED_STATUS,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn delete_user_course(&self, course_id: &str) -> Result<String, ApiError> {
        let request =
            HttpRequest::delete(self.ctx.url(&format!("/users/me/courses/{}", course_id)));
        let message = self.authorized_request(request).await?.message();
        self.pending.remove(course_id);
        info!(course_id, "Course removed");
        Ok(message)
    }

    // ===== Progress =====

    pub async fn reset_course_progress(&self, course_id: &str) -> Result<String, ApiError> {
        let request = HttpRequest::patch(self.ctx.url(&format!("/courses/{}/reset", course_id)));
        Ok(self.authorized_request(request).await?.message())
    }

    pub async fn get_course_progress(&self, course_id: &str) -> Result<CourseProgress, ApiError> {
        let request = HttpRequest::get(self.progress_url(course_id, None)?);
        self.authorized_request(request).await?.json()
    }

    /// Progress for one workout, clamped to its exercises
    pub async fn get_workout_progress(
        &self,
        course_id: &str,
        workout: &Workout,
    ) -> Result<WorkoutProgress, ApiError> {
        let request = HttpRequest::get(self.progress_url(course_id, Some(&workout.id))?);
        let mut progress: WorkoutProgress = self.authorized_request(request).await?.json()?;
        progress.progress_data = progress
            .clamped_to(workout)
            .into_iter()
            .map(i64::from)
            .collect();
        Ok(progress)
    }

    /// Save repetitions for each exercise of a workout. Values are clamped
    /// to `[0, quantity]` before being sent; the clamped values are returned
    /// alongside the server message.
    pub async fn save_workout_progress(
        &self,
        course_id: &str,
        workout: &Workout,
        values: &[i64],
    ) -> Result<(Vec<u32>, String), ApiError> {
        let progress = clamp_progress(&workout.exercises, values);
        let request = HttpRequest::patch(
            self.ctx
                .url(&format!("/courses/{}/workouts/{}", course_id, workout.id)),
        )
        .json_text(&ProgressBody {
            progress_data: &progress,
        })?;

        let message = self.authorized_request(request).await?.message();
        debug!(course_id, workout_id = %workout.id, ?progress, "Workout progress saved");
        Ok((progress, message))
    }

    pub async fn reset_workout_progress(
        &self,
        course_id: &str,
        workout_id: &str,
    ) -> Result<String, ApiError> {
        let request = HttpRequest::patch(self.ctx.url(&format!(
            "/courses/{}/workouts/{}/reset",
            course_id, workout_id
        )));
        Ok(self.authorized_request(request).await?.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Exercise;
    use crate::testing::{fresh_token, harness, json, text, MockTransport};
    use crate::api::transport::TransportError;
    use reqwest::Method;
    use std::time::Duration;

    fn workout() -> Workout {
        Workout {
            id: "17oz5f".into(),
            name: "Урок 1".into(),
            video: "https://youtu.be/v-xTLFDhoD0".into(),
            exercises: vec![
                Exercise { id: None, name: "Наклоны".into(), quantity: 10 },
                Exercise { id: None, name: "Приседания".into(), quantity: 20 },
            ],
        }
    }

    fn client(transport: MockTransport, with_token: bool) -> (std::sync::Arc<MockTransport>, CourseApi) {
        let (transport, ctx, tokens, pending) = harness(transport);
        if with_token {
            tokens.save(&fresh_token());
        }
        (transport, CourseApi::new(ctx, tokens, pending))
    }

    #[tokio::test]
    async fn test_get_courses_is_public() {
        let (transport, api) = client(
            MockTransport::ok_json(r#"[{"_id":"ab1c3f","nameRU":"Йога"},{"_id":"kfpq8e","nameRU":"Стретчинг"}]"#),
            false,
        );

        let courses = api.get_courses().await.expect("courses");
        assert_eq!(courses.len(), 2);
        let request = transport.last_request().expect("request");
        assert_eq!(request.url, "http://api.test/fitness/courses");
        assert_eq!(request.header_value("authorization"), None);
    }

    #[tokio::test]
    async fn test_authorized_request_requires_token() {
        let (transport, api) = client(MockTransport::ok_json("[]"), false);

        let err = api.get_course_workouts("ab1c3f").await.unwrap_err();
        assert!(matches!(err, ApiError::Auth { status: 401, .. }));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_authorized_request_removes_token_on_401() {
        let (_, api) = client(MockTransport::new(|_| Ok(json(401, r#"{"message":"Нет авторизации"}"#))), true);

        let err = api.get_workout_by_id("17oz5f").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(!api.tokens.is_authenticated());
    }

    #[tokio::test]
    async fn test_authorized_request_keeps_token_on_other_errors() {
        let (_, api) = client(MockTransport::new(|_| Ok(text(404, "Not found"))), true);

        let err = api.get_workout_by_id("nope").await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Server { status: 404, message: "Not found".into() }
        );
        assert!(api.tokens.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_network_error() {
        let (_, api) = client(
            MockTransport::ok_json("[]").with_delay(Duration::from_secs(60)),
            true,
        );

        let err = api.get_course_workouts("ab1c3f").await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert!(api.tokens.is_authenticated());
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_network_error() {
        let (_, api) = client(
            MockTransport::new(|_| Err(TransportError::Failed("dns error".into()))),
            false,
        );
        let err = api.get_courses().await.unwrap_err();
        assert!(matches!(err, ApiError::Network(ref m) if m.contains("dns error")));
    }

    #[tokio::test]
    async fn test_add_user_course() {
        let (transport, api) = client(
            MockTransport::new(|_| Ok(json(201, r#"{"message":"Курс успешно добавлен!"}"#))),
            true,
        );

        assert_eq!(api.add_user_course("ab1c3f").await.expect("add"), "Курс успешно добавлен!");
        let request = transport.last_request().expect("request");
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url, "http://api.test/fitness/users/me/courses");
        assert_eq!(request.body.as_deref(), Some(r#"{"courseId":"ab1c3f"}"#));
        assert!(api.pending().is_empty());
    }

    #[tokio::test]
    async fn test_add_user_course_500_is_pending() {
        let (_, api) = client(MockTransport::new(|_| Ok(text(500, "Internal Server Error"))), true);

        let err = api.add_user_course("ab1c3f").await.unwrap_err();
        assert!(err.is_pending());
        assert_eq!(err.status(), Some(500));
        assert!(api.pending().contains("ab1c3f"));
    }

    #[tokio::test]
    async fn test_add_user_course_other_errors_not_pending() {
        let (_, api) = client(MockTransport::new(|_| Ok(text(400, "Курс уже добавлен"))), true);

        let err = api.add_user_course("ab1c3f").await.unwrap_err();
        assert!(!err.is_pending());
        assert!(api.pending().is_empty());
    }

    #[tokio::test]
    async fn test_delete_user_course_drops_pending() {
        let (transport, api) = client(MockTransport::ok_json(r#"{"message":"Курс удален"}"#), true);
        api.pending().add("ab1c3f");

        assert_eq!(api.delete_user_course("ab1c3f").await.expect("delete"), "Курс удален");
        assert!(!api.pending().contains("ab1c3f"));
        let request = transport.last_request().expect("request");
        assert_eq!(request.method, Method::DELETE);
        assert_eq!(request.url, "http://api.test/fitness/users/me/courses/ab1c3f");
    }

    #[tokio::test]
    async fn test_save_workout_progress_clamps() {
        let (transport, api) = client(MockTransport::ok_json(r#"{"message":"Прогресс сохранен"}"#), true);

        let (saved, message) = api
            .save_workout_progress("ab1c3f", &workout(), &[-2, 25, 7])
            .await
            .expect("save");
        assert_eq!(saved, vec![0, 20]);
        assert_eq!(message, "Прогресс сохранен");

        let request = transport.last_request().expect("request");
        assert_eq!(request.method, Method::PATCH);
        assert_eq!(request.url, "http://api.test/fitness/courses/ab1c3f/workouts/17oz5f");
        assert_eq!(request.body.as_deref(), Some(r#"{"progressData":[0,20]}"#));
    }

    #[tokio::test]
    async fn test_get_workout_progress_clamps() {
        let (transport, api) = client(
            MockTransport::ok_json(r#"{"workoutId":"17oz5f","workoutCompleted":false,"progressData":[15]}"#),
            true,
        );

        let progress = api.get_workout_progress("ab1c3f", &workout()).await.expect("progress");
        assert_eq!(progress.progress_data, vec![10, 0]);
        assert_eq!(
            transport.last_request().expect("request").url,
            "http://api.test/fitness/users/me/progress?courseId=ab1c3f&workoutId=17oz5f"
        );
    }

    #[tokio::test]
    async fn test_progress_query_is_encoded() {
        let (transport, api) = client(
            MockTransport::ok_json(r#"{"courseId":"a b&c","workoutsProgress":[]}"#),
            true,
        );

        api.get_course_progress("a b&c").await.expect("progress");
        assert_eq!(
            transport.last_request().expect("request").url,
            "http://api.test/fitness/users/me/progress?courseId=a+b%26c"
        );
    }

    #[tokio::test]
    async fn test_get_course_by_id_is_public() {
        let (transport, api) = client(
            MockTransport::ok_json(
                r#"{"_id":"ab1c3f","nameRU":"Йога","nameEN":"Yoga","workouts":["17oz5f","pi5xj5"],"order":1}"#,
            ),
            false,
        );

        let course = api.get_course_by_id("ab1c3f").await.expect("course");
        assert_eq!(course.id, "ab1c3f");
        assert_eq!(course.display_name(), "Йога");
        assert_eq!(course.workouts, vec!["17oz5f", "pi5xj5"]);

        let request = transport.last_request().expect("request");
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.url, "http://api.test/fitness/courses/ab1c3f");
        assert_eq!(request.header_value("authorization"), None);
    }

    #[tokio::test]
    async fn test_get_workout_by_id() {
        let (transport, api) = client(
            MockTransport::ok_json(
                r#"{"_id":"17oz5f","name":"Урок 1","video":"https://youtu.be/v-xTLFDhoD0","exercises":[{"name":"Наклоны","quantity":10}]}"#,
            ),
            true,
        );

        let workout = api.get_workout_by_id("17oz5f").await.expect("workout");
        assert_eq!(workout.name, "Урок 1");
        assert_eq!(workout.exercises.len(), 1);
        assert_eq!(
            workout.embed_url().as_deref(),
            Some("https://www.youtube.com/embed/v-xTLFDhoD0")
        );

        let request = transport.last_request().expect("request");
        assert_eq!(request.url, "http://api.test/fitness/workouts/17oz5f");
        assert!(request
            .header_value("authorization")
            .is_some_and(|h| h.starts_with("Bearer ")));
    }

    #[tokio::test]
    async fn test_course_progress_and_resets() {
        let (transport, api) = client(
            MockTransport::new(|req| {
                if req.method == Method::GET {
                    Ok(json(200, r#"{"courseId":"ab1c3f","courseCompleted":false,"workoutsProgress":[]}"#))
                } else {
                    Ok(json(200, r#"{"message":"Прогресс сброшен"}"#))
                }
            }),
            true,
        );

        let progress = api.get_course_progress("ab1c3f").await.expect("progress");
        assert_eq!(progress.course_id, "ab1c3f");

        assert_eq!(api.reset_course_progress("ab1c3f").await.expect("reset"), "Прогресс сброшен");
        assert_eq!(
            transport.last_request().expect("request").url,
            "http://api.test/fitness/courses/ab1c3f/reset"
        );

        api.reset_workout_progress("ab1c3f", "17oz5f").await.expect("reset");
        assert_eq!(
            transport.last_request().expect("request").url,
            "http://api.test/fitness/courses/ab1c3f/workouts/17oz5f/reset"
        );
        assert_eq!(transport.calls(), 3);
    }
}
