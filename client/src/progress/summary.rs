//! Dashboard statistics over a learner's enrollments.

use crate::api::models::Enrollment;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSummary {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub not_started: usize,
    /// Rounded mean progress across all enrollments, 0 when there are none.
    pub average_progress: u8,
}

impl ProgressSummary {
    pub fn from_enrollments(enrollments: &[Enrollment]) -> Self {
        let mut summary = Self {
            total: enrollments.len(),
            ..Self::default()
        };
        if enrollments.is_empty() {
            return summary;
        }

        let mut sum = 0usize;
        for enrollment in enrollments {
            let progress = enrollment.progress_percent();
            sum += progress as usize;
            match progress {
                100 => summary.completed += 1,
                0 => summary.not_started += 1,
                _ => summary.in_progress += 1,
            }
        }
        summary.average_progress = ((2 * sum + enrollments.len()) / (2 * enrollments.len())) as u8;
        summary
    }
}
