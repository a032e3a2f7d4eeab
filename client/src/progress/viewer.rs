//! A learner's viewing session of one course.
//!
//! Loads the course, its lectures and the learner's enrollment concurrently,
//! computes unlock state once everything has arrived, and applies
//! lecture-completion events. Local unlock state is authoritative for the
//! session; saving progress to the backend is best-effort and never rolls
//! anything back.

use crate::api::CourseHubApi;
use crate::api::models::{Course, RatingSummary, Resource};
use crate::errors::{ApiResult, ProgressError};
use crate::progress::gate::{CourseAccess, InitGate};
use crate::progress::tracker::ProgressChange;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct CourseViewer {
    api: CourseHubApi,
    course: Course,
    resources: Vec<Resource>,
    rating: Option<RatingSummary>,
    access: Arc<Mutex<CourseAccess>>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl CourseViewer {
    /// Fetches everything the viewer needs. Course and resource failures are
    /// returned; a failed enrollment lookup yields
    /// [`CourseAccess::EnrollmentUnknown`] and a failed rating lookup is
    /// ignored.
    pub async fn load(api: CourseHubApi, course_id: u64, signed_in: bool) -> ApiResult<Self> {
        let enrollment_lookup = async {
            if !signed_in {
                return Ok(None);
            }
            api.enrollment_for(course_id).await
        };

        let (course, resources, enrollment, rating) = tokio::join!(
            api.course(course_id),
            api.resources(course_id),
            enrollment_lookup,
            api.rating_summary(course_id),
        );
        let course = course?;
        let resources = resources?;

        let mut gate = InitGate::new();
        match enrollment {
            Ok(enrollment) => {
                gate.provide_enrollment(enrollment);
            }
            Err(e) => {
                warn!("Enrollment lookup for course {} failed: {}", course_id, e);
                gate.enrollment_unavailable();
            }
        }
        let access = gate
            .provide_resources(resources.clone())
            .unwrap_or(CourseAccess::EnrollmentUnknown);

        if let Some(tracker) = access.tracker() {
            info!(
                "Course {}: {}/{} lectures unlocked",
                course_id,
                tracker.unlocked_count(),
                tracker.total()
            );
        }

        Ok(Self {
            api,
            course,
            resources,
            rating: rating.ok(),
            access: Arc::new(Mutex::new(access)),
            pending: Mutex::new(Vec::new()),
        })
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn rating(&self) -> Option<RatingSummary> {
        self.rating
    }

    pub async fn access(&self) -> CourseAccess {
        self.access.lock().await.clone()
    }

    pub async fn is_unlocked(&self, lecture_id: u64) -> bool {
        self.access
            .lock()
            .await
            .tracker()
            .is_some_and(|tracker| tracker.is_unlocked(lecture_id))
    }

    pub async fn percent(&self) -> u8 {
        self.access
            .lock()
            .await
            .tracker()
            .map_or(0, |tracker| tracker.percent())
    }

    /// Applies a lecture-end event and, if it unlocked something, saves the
    /// new percentage in the background.
    pub async fn complete_lecture(&self, index: usize) -> Result<ProgressChange, ProgressError> {
        let change = {
            let mut access = self.access.lock().await;
            let reason = access.blocked_reason().unwrap_or_default();
            let tracker = access.tracker_mut().ok_or_else(|| ProgressError::Unavailable {
                reason: reason.to_string(),
            })?;
            tracker.complete_lecture(index)?
        };

        if change.changed {
            self.persist_in_background().await;
        } else {
            debug!("Lecture {} completion unlocked nothing new", index);
        }
        Ok(change)
    }

    async fn persist_in_background(&self) {
        let api = self.api.clone();
        let access = Arc::clone(&self.access);
        let course_id = self.course.id;

        let handle = tokio::spawn(async move {
            // Read at send time so a late task never sends an older value.
            let Some(percent) = access.lock().await.tracker().map(|t| t.percent()) else {
                return;
            };
            match api.save_progress(course_id, percent).await {
                Ok(_) => debug!("Saved progress {}% for course {}", percent, course_id),
                Err(e) => error!(
                    "Failed to save progress {}% for course {}: {}",
                    percent, course_id, e
                ),
            }
        });

        let mut pending = self.pending.lock().await;
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }

    /// Waits for background progress saves started so far.
    pub async fn flush(&self) {
        let handles: Vec<JoinHandle<()>> = self.pending.lock().await.drain(..).collect();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Progress save task failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::Method;
    use crate::api::RequestExecutor;
    use crate::auth::{FailureSignal, TokenStore};
    use crate::storage::MemoryStore;
    use crate::testing::{MockReply, MockTransport};
    use serde_json::{Value, json};

    fn setup(progress: i64, paid: bool, lectures: u64) -> (Arc<MockTransport>, CourseHubApi) {
        let transport = Arc::new(MockTransport::new());
        transport.on(Method::Get, "/courses/4", MockReply::json(200, json!({"id": 4, "title": "Rust"})));
        let resources: Vec<Value> = (1..=lectures).map(|id| json!({"id": id})).collect();
        transport.on(Method::Get, "/courses/4/resources", MockReply::json(200, json!(resources)));
        transport.on(
            Method::Get,
            "/enrollments/my-courses",
            MockReply::json(200, json!([{"course": {"id": 4}, "paid": paid, "progress": progress}])),
        );
        transport.on(
            Method::Get,
            "/courses/4/rating-summary",
            MockReply::json(200, json!({"average": 4.5, "count": 2, "enrolled": 10})),
        );
        transport.on(Method::Post, "/enrollments/course/4/progress", MockReply::json(200, json!({})));

        let executor = RequestExecutor::new(
            MockTransport::settings(),
            transport.clone(),
            TokenStore::new(MemoryStore::shared()),
            FailureSignal::new(),
        );
        (transport, CourseHubApi::new(Arc::new(executor)))
    }

    fn saved_bodies(transport: &MockTransport) -> Vec<String> {
        transport
            .calls_to(Method::Post, "/enrollments/course/4/progress")
            .into_iter()
            .filter_map(|call| call.body)
            .collect()
    }

    #[tokio::test]
    async fn test_scenario_and_reload() {
        let (transport, api) = setup(0, true, 5);
        let viewer = CourseViewer::load(api, 4, true).await.unwrap();
        assert_eq!(viewer.rating().unwrap().count, 2);
        assert!(viewer.is_unlocked(1).await);
        assert!(!viewer.is_unlocked(2).await);

        assert_eq!(viewer.complete_lecture(0).await.unwrap().percent, 40);
        assert_eq!(viewer.complete_lecture(1).await.unwrap().percent, 60);
        viewer.flush().await;

        let bodies = saved_bodies(&transport);
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies.last().map(String::as_str), Some(r#"{"progress":60}"#));

        let (_, api) = setup(60, true, 5);
        let reloaded = CourseViewer::load(api, 4, true).await.unwrap();
        let access = reloaded.access().await;
        assert_eq!(access.tracker().unwrap().unlocked_ids(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_back_to_back_completions() {
        let (transport, api) = setup(0, true, 5);
        let viewer = Arc::new(CourseViewer::load(api, 4, true).await.unwrap());

        let first = viewer.complete_lecture(0);
        let second = viewer.complete_lecture(0);
        let (a, b) = tokio::join!(first, second);
        assert!(a.unwrap().changed ^ b.unwrap().changed);

        viewer.complete_lecture(1).await.unwrap();
        viewer.flush().await;
        assert_eq!(viewer.percent().await, 60);
        assert_eq!(saved_bodies(&transport).len(), 2);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_unlock() {
        let (transport, api) = setup(0, true, 5);
        transport.on(Method::Post, "/enrollments/course/4/progress", MockReply::status(500));
        let viewer = CourseViewer::load(api, 4, true).await.unwrap();

        let change = viewer.complete_lecture(0).await.unwrap();
        viewer.flush().await;

        assert_eq!(change.unlocked_count, 2);
        assert!(viewer.is_unlocked(2).await);
        assert_eq!(viewer.percent().await, 40);
    }

    #[tokio::test]
    async fn test_unpaid_and_anonymous_are_locked() {
        let (_, api) = setup(0, false, 3);
        let viewer = CourseViewer::load(api, 4, true).await.unwrap();
        assert_eq!(viewer.access().await, CourseAccess::AwaitingPayment);
        assert!(matches!(
            viewer.complete_lecture(0).await,
            Err(ProgressError::Unavailable { .. })
        ));

        let (transport, api) = setup(0, true, 3);
        let viewer = CourseViewer::load(api, 4, false).await.unwrap();
        assert_eq!(viewer.access().await, CourseAccess::NotEnrolled);
        assert!(transport.calls_to(Method::Get, "/enrollments/my-courses").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_enrollment_lookup_is_unknown() {
        let (transport, api) = setup(0, true, 3);
        transport.on(Method::Get, "/enrollments/my-courses", MockReply::status(503));

        let viewer = CourseViewer::load(api, 4, true).await.unwrap();

        assert_eq!(viewer.access().await, CourseAccess::EnrollmentUnknown);
        assert_eq!(transport.calls_to(Method::Get, "/enrollments/my-courses").len(), 4);
        assert!(!viewer.is_unlocked(1).await);
        match viewer.complete_lecture(0).await {
            Err(ProgressError::Unavailable { reason }) => {
                assert_eq!(reason, "enrollment status unavailable")
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_course() {
        let (transport, api) = setup(0, true, 0);
        let viewer = CourseViewer::load(api, 4, true).await.unwrap();
        assert_eq!(viewer.access().await, CourseAccess::NoContent);
        assert_eq!(viewer.percent().await, 0);
        assert!(viewer.complete_lecture(0).await.is_err());
        assert!(saved_bodies(&transport).is_empty());
    }

    #[tokio::test]
    async fn test_missing_course_is_an_error() {
        let (transport, api) = setup(0, true, 3);
        transport.on(Method::Get, "/courses/4", MockReply::json(404, json!({"message": "Course not found"})));
        let err = CourseViewer::load(api, 4, true).await.err().unwrap();
        assert_eq!(err.message, "Course not found");
    }
}
