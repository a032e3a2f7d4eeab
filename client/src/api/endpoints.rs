//! Typed wrappers over the backend REST surface.

use crate::api::executor::{ApiRequest, RequestExecutor};
use crate::api::transport::MultipartForm;
use crate::api::models::*;
use crate::errors::ApiResult;
use serde_json::{Map, Value, json};
use std::sync::Arc;

#[derive(Clone)]
pub struct CourseHubApi {
    executor: Arc<RequestExecutor>,
}

impl CourseHubApi {
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    // --- Authentication ---

    pub async fn login(&self, email: &str, password: &str) -> ApiResult<AuthPayload> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.executor
            .send(ApiRequest::post("/auth/login").json(&body)?)
            .await
    }

    pub async fn register(&self, request: &RegisterRequest) -> ApiResult<RegisterOutcome> {
        self.executor
            .send(ApiRequest::post("/auth/register").json(request)?)
            .await
    }

    pub async fn verify_email(&self, token: &str) -> ApiResult<AuthPayload> {
        self.executor
            .send(ApiRequest::post("/auth/verify-email").json(&json!({ "token": token }))?)
            .await
    }

    pub async fn resend_verification(&self, email: &str) -> ApiResult<MessageResponse> {
        self.executor
            .send(ApiRequest::post("/auth/resend-verification").json(&json!({ "email": email }))?)
            .await
    }

    pub async fn forgot_password(&self, email: &str) -> ApiResult<MessageResponse> {
        self.executor
            .send(ApiRequest::post("/auth/forgot-password").json(&json!({ "email": email }))?)
            .await
    }

    pub async fn reset_password(&self, reset: &PasswordReset) -> ApiResult<MessageResponse> {
        self.executor
            .send(ApiRequest::post("/auth/reset-password").json(reset)?)
            .await
    }

    // --- Profile ---

    pub async fn profile(&self) -> ApiResult<UserRecord> {
        self.executor.send(ApiRequest::get("/users/me")).await
    }

    pub async fn update_profile(&self, changes: &Map<String, Value>) -> ApiResult<UserRecord> {
        self.executor
            .send(ApiRequest::put("/users/me").json(changes)?)
            .await
    }

    // --- Courses ---

    pub async fn courses(&self) -> ApiResult<Vec<Course>> {
        self.executor
            .send(ApiRequest::get("/courses").retry(self.executor.default_retry()))
            .await
    }

    pub async fn course(&self, course_id: u64) -> ApiResult<Course> {
        self.executor
            .send(ApiRequest::get(format!("/courses/{}", course_id)).retry(self.executor.default_retry()))
            .await
    }

    /// Lectures of a course in playback order.
    pub async fn resources(&self, course_id: u64) -> ApiResult<Vec<Resource>> {
        self.executor
            .send(
                ApiRequest::get(format!("/courses/{}/resources", course_id))
                    .retry(self.executor.default_retry()),
            )
            .await
    }

    pub async fn rating_summary(&self, course_id: u64) -> ApiResult<RatingSummary> {
        self.executor
            .send(
                ApiRequest::get(format!("/courses/{}/rating-summary", course_id))
                    .retry(self.executor.default_retry()),
            )
            .await
    }

    pub async fn ratings(&self, course_id: u64) -> ApiResult<Vec<Rating>> {
        self.executor
            .send(ApiRequest::get(format!("/courses/{}/ratings", course_id)))
            .await
    }

    pub async fn rate_course(&self, course_id: u64, rating: &NewRating) -> ApiResult<Value> {
        self.executor
            .execute(ApiRequest::post(format!("/courses/{}/ratings", course_id)).json(rating)?)
            .await
    }

    // --- Enrollments ---

    pub async fn check_enrollment(&self, course_id: u64) -> ApiResult<EnrollmentCheck> {
        self.executor
            .send(ApiRequest::get(format!("/enrollments/check/{}", course_id)))
            .await
    }

    /// The learner's enrollments, each with its course, payment flag and
    /// progress.
    pub async fn my_courses(&self) -> ApiResult<Vec<Enrollment>> {
        self.executor
            .send(ApiRequest::get("/enrollments/my-courses").retry(self.executor.default_retry()))
            .await
    }

    pub async fn student_enrollments(&self) -> ApiResult<Vec<Enrollment>> {
        self.executor
            .send(ApiRequest::get("/enrollments/student"))
            .await
    }

    pub async fn enroll(&self, course_id: u64) -> ApiResult<Value> {
        self.executor
            .execute(ApiRequest::post(format!("/enrollments/course/{}", course_id)))
            .await
    }

    pub async fn unenroll(&self, course_id: u64) -> ApiResult<Value> {
        self.executor
            .execute(ApiRequest::delete(format!("/enrollments/course/{}", course_id)))
            .await
    }

    /// Marks the enrollment as paid after the (simulated) checkout.
    pub async fn mark_paid(&self, course_id: u64) -> ApiResult<Value> {
        self.executor
            .execute(ApiRequest::post(format!("/enrollments/course/{}/pay", course_id)))
            .await
    }

    pub async fn save_progress(&self, course_id: u64, progress: u8) -> ApiResult<Value> {
        self.executor
            .execute(
                ApiRequest::post(format!("/enrollments/course/{}/progress", course_id))
                    .json(&ProgressUpdate { progress })?,
            )
            .await
    }

    // --- Instructor ---

    /// Enrollments across every course the signed-in instructor teaches.
    pub async fn enrolled_students(&self) -> ApiResult<Vec<Enrollment>> {
        self.executor
            .send(ApiRequest::get("/enrollments/teacher/enrolled-students"))
            .await
    }

    pub async fn enrolled_students_for_course(&self, course_id: u64) -> ApiResult<Vec<Enrollment>> {
        self.executor
            .send(ApiRequest::get(format!(
                "/enrollments/teacher/course/{}/enrolled-students",
                course_id
            )))
            .await
    }

    /// Uploads a course file under the long upload timeout, retrying transient
    /// failures. `replaces` names a previously uploaded file the backend
    /// should delete.
    pub async fn upload_file(
        &self,
        file_name: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
        replaces: Option<&str>,
    ) -> ApiResult<UploadedFile> {
        let mut form = MultipartForm::new().file(
            "file",
            file_name,
            content_type.map(str::to_string),
            bytes,
        );
        if let Some(existing) = replaces {
            form = form.text("existingFileId", existing);
        }

        let settings = self.executor.settings();
        self.executor
            .send(
                ApiRequest::post("/upload")
                    .multipart(form)
                    .timeout(settings.upload_timeout)
                    .retry(self.executor.default_retry()),
            )
            .await
    }

    /// The enrollment record for one course, if the learner has one.
    pub async fn enrollment_for(&self, course_id: u64) -> ApiResult<Option<Enrollment>> {
        let enrollments = self.my_courses().await?;
        Ok(enrollments
            .into_iter()
            .find(|e| e.course_id() == Some(course_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::Method;
    use crate::auth::{FailureSignal, TokenStore};
    use crate::storage::MemoryStore;
    use crate::testing::{MockReply, MockTransport};

    fn api() -> (Arc<MockTransport>, CourseHubApi) {
        let transport = Arc::new(MockTransport::new());
        let executor = RequestExecutor::new(
            MockTransport::settings(),
            transport.clone(),
            TokenStore::new(MemoryStore::shared()),
            FailureSignal::new(),
        );
        (transport, CourseHubApi::new(Arc::new(executor)))
    }

    #[tokio::test]
    async fn test_save_progress_body() {
        let (transport, api) = api();
        transport.on(
            Method::Post,
            "/enrollments/course/5/progress",
            MockReply::json(200, json!({"progress": 40})),
        );

        api.save_progress(5, 40).await.unwrap();

        let calls = transport.calls_to(Method::Post, "/enrollments/course/5/progress");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].body.as_deref(), Some(r#"{"progress":40}"#));
    }

    #[tokio::test]
    async fn test_enrollment_for() {
        let (transport, api) = api();
        transport.on(
            Method::Get,
            "/enrollments/my-courses",
            MockReply::json(
                200,
                json!([
                    {"course": {"id": 1, "title": "Rust"}, "paid": true, "progress": 20},
                    {"course": {"id": 2, "title": "Go"}, "paid": false, "progress": 0}
                ]),
            ),
        );

        let enrollment = api.enrollment_for(2).await.unwrap().unwrap();
        assert!(!enrollment.paid);
        assert!(api.enrollment_for(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resources_in_order() {
        let (transport, api) = api();
        transport.on(
            Method::Get,
            "/courses/9/resources",
            MockReply::json(
                200,
                json!([
                    {"id": 30, "fileName": "intro.mp4", "fileType": "video/mp4"},
                    {"id": 10, "fileName": "notes.pdf", "fileType": "application/pdf"}
                ]),
            ),
        );

        let resources = api.resources(9).await.unwrap();
        let ids: Vec<u64> = resources.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![30, 10]);
        assert!(resources[0].is_video());
        assert!(!resources[1].is_video());
    }

    #[tokio::test]
    async fn test_enrolled_students() {
        let (transport, api) = api();
        transport.on(
            Method::Get,
            "/enrollments/teacher/enrolled-students",
            MockReply::json(
                200,
                json!([{"id": 1, "user": {"id": 3, "email": "sam@example.com"}, "course": {"id": 4}, "paid": true, "progress": 20}]),
            ),
        );
        transport.on(
            Method::Get,
            "/enrollments/teacher/course/4/enrolled-students",
            MockReply::json(200, json!([])),
        );

        let all = api.enrolled_students().await.unwrap();
        assert_eq!(all[0].user.as_ref().map(|u| u.email.as_str()), Some("sam@example.com"));
        assert_eq!(all[0].course_id(), Some(4));
        assert!(api.enrolled_students_for_course(4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enrolled_students_for_foreign_course_is_forbidden() {
        let (transport, api) = api();
        transport.on(
            Method::Get,
            "/enrollments/teacher/course/8/enrolled-students",
            MockReply::status(403),
        );
        let err = api.enrolled_students_for_course(8).await.unwrap_err();
        assert_eq!(err.status, Some(403));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_uses_upload_timeout_and_retries() {
        let (transport, api) = api();
        let settings = MockTransport::settings();
        assert!(settings.upload_timeout > settings.request_timeout);
        transport.on_sequence(
            Method::Post,
            "/upload",
            vec![
                MockReply::Hang,
                MockReply::status(503),
                MockReply::json(200, json!({"url": "https://files.example.com/v1/files/f2", "fileId": "f2"})),
            ],
        );

        let start = tokio::time::Instant::now();
        let uploaded = api
            .upload_file("cover.png", Some("image/png"), vec![7; 16], Some("f1"))
            .await
            .unwrap();

        assert_eq!(uploaded.file_id.as_deref(), Some("f2"));
        let calls = transport.calls_to(Method::Post, "/upload");
        assert_eq!(calls.len(), 3);
        let form = calls[0].form.as_ref().unwrap();
        assert_eq!(form.text_value("existingFileId"), Some("f1"));

        let instants = transport.call_instants();
        assert!(instants[1] - start >= settings.upload_timeout);
    }
}
