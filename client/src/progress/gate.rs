//! Waits for every input the tracker needs before computing unlock state.
//!
//! The resource list and the enrollment record are fetched independently and
//! may arrive in either order. The gate only produces a result once both are
//! present.

use crate::api::models::{Enrollment, Resource};
use crate::progress::tracker::ProgressTracker;

/// What the learner can do with a course once all inputs are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseAccess {
    /// No enrollment for this learner (or nobody is signed in).
    NotEnrolled,
    /// Enrolled, but the checkout has not been completed.
    AwaitingPayment,
    /// The course has no lectures to show.
    NoContent,
    /// The enrollment lookup failed, so whether the learner is enrolled is
    /// not known. Distinct from `NotEnrolled` so a paying learner is never
    /// told to enroll because of a network error.
    EnrollmentUnknown,
    Ready(ProgressTracker),
}

impl CourseAccess {
    pub fn tracker(&self) -> Option<&ProgressTracker> {
        match self {
            CourseAccess::Ready(tracker) => Some(tracker),
            _ => None,
        }
    }

    /// Why lectures cannot be played, or `None` when the course is ready.
    pub fn blocked_reason(&self) -> Option<&'static str> {
        match self {
            CourseAccess::NotEnrolled => Some("not enrolled"),
            CourseAccess::AwaitingPayment => Some("payment pending"),
            CourseAccess::NoContent => Some("no content"),
            CourseAccess::EnrollmentUnknown => Some("enrollment status unavailable"),
            CourseAccess::Ready(_) => None,
        }
    }

    pub fn tracker_mut(&mut self) -> Option<&mut ProgressTracker> {
        match self {
            CourseAccess::Ready(tracker) => Some(tracker),
            _ => None,
        }
    }
}

#[derive(Debug)]
enum EnrollmentInput {
    Known(Option<Enrollment>),
    Unavailable,
}

#[derive(Debug, Default)]
pub struct InitGate {
    resources: Option<Vec<Resource>>,
    enrollment: Option<EnrollmentInput>,
}

impl InitGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provide_resources(&mut self, resources: Vec<Resource>) -> Option<CourseAccess> {
        self.resources = Some(resources);
        self.try_open()
    }

    /// `None` means the learner has no enrollment in the course.
    pub fn provide_enrollment(&mut self, enrollment: Option<Enrollment>) -> Option<CourseAccess> {
        self.enrollment = Some(EnrollmentInput::Known(enrollment));
        self.try_open()
    }

    /// Records that the enrollment could not be looked up.
    pub fn enrollment_unavailable(&mut self) -> Option<CourseAccess> {
        self.enrollment = Some(EnrollmentInput::Unavailable);
        self.try_open()
    }

    pub fn is_ready(&self) -> bool {
        self.resources.is_some() && self.enrollment.is_some()
    }

    /// The access decision, or `None` while an input is still missing.
    pub fn try_open(&self) -> Option<CourseAccess> {
        let resources = self.resources.as_ref()?;
        let enrollment = self.enrollment.as_ref()?;

        let enrollment = match enrollment {
            EnrollmentInput::Unavailable => return Some(CourseAccess::EnrollmentUnknown),
            EnrollmentInput::Known(enrollment) => enrollment,
        };
        let access = match enrollment {
            None => CourseAccess::NotEnrolled,
            Some(enrollment) if !enrollment.paid => CourseAccess::AwaitingPayment,
            Some(_) if resources.is_empty() => CourseAccess::NoContent,
            Some(enrollment) => CourseAccess::Ready(ProgressTracker::new(
                resources.iter().map(|r| r.id).collect(),
                enrollment.progress_percent(),
                true,
            )),
        };
        Some(access)
    }
}
