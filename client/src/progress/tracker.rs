//! Lecture unlock state for one enrollment.
//!
//! Lectures unlock strictly in order: the set of unlocked lectures is always
//! a prefix of the course's resource list, it only grows within a viewing
//! session, and the first lecture is open as soon as the enrollment is paid.
//! The completion percentage is derived from the size of that prefix.

use crate::errors::ProgressError;
use std::collections::BTreeSet;

/// Number of lectures a stored percentage unlocks.
///
/// This is `ceil(percent / 100 * total)` taken at the lower edge of the
/// percentage's rounding interval, so that a percentage produced by
/// [`percent_for`] maps back to exactly the count it came from.
pub fn unlocked_count_for(percent: u8, total: usize) -> usize {
    let percent = percent.min(100) as usize;
    if percent == 0 || total == 0 {
        return 0;
    }
    ((2 * percent - 1) * total).div_ceil(200).min(total)
}

/// `round(unlocked / total * 100)`, rounding halves up.
pub fn percent_for(unlocked: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let unlocked = unlocked.min(total);
    ((200 * unlocked + total) / (2 * total)) as u8
}

/// Outcome of a lecture-completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressChange {
    pub unlocked_count: usize,
    pub percent: u8,
    /// False when the event unlocked nothing new.
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressTracker {
    lecture_ids: Vec<u64>,
    unlocked: BTreeSet<usize>,
    paid: bool,
}

impl ProgressTracker {
    /// Builds the unlock state from the ordered lecture ids and the progress
    /// reported by the server. A paid enrollment always has at least the first
    /// lecture open; an unpaid one has none.
    pub fn new(lecture_ids: Vec<u64>, progress: u8, paid: bool) -> Self {
        let total = lecture_ids.len();
        let count = if paid && total > 0 {
            unlocked_count_for(progress, total).clamp(1, total)
        } else {
            0
        };

        Self {
            lecture_ids,
            unlocked: (0..count).collect(),
            paid,
        }
    }

    pub fn total(&self) -> usize {
        self.lecture_ids.len()
    }

    /// A course without resources has nothing to unlock or measure.
    pub fn has_content(&self) -> bool {
        !self.lecture_ids.is_empty()
    }

    pub fn is_paid(&self) -> bool {
        self.paid
    }

    pub fn unlocked_count(&self) -> usize {
        self.unlocked.len()
    }

    pub fn percent(&self) -> u8 {
        percent_for(self.unlocked_count(), self.total())
    }

    pub fn is_index_unlocked(&self, index: usize) -> bool {
        self.unlocked.contains(&index)
    }

    pub fn is_unlocked(&self, lecture_id: u64) -> bool {
        self.lecture_ids
            .iter()
            .position(|id| *id == lecture_id)
            .is_some_and(|index| self.is_index_unlocked(index))
    }

    /// Ids of the unlocked lectures, in course order.
    pub fn unlocked_ids(&self) -> Vec<u64> {
        self.unlocked
            .iter()
            .filter_map(|index| self.lecture_ids.get(*index).copied())
            .collect()
    }

    /// Records that lecture `index` finished playing and opens the next one.
    ///
    /// Only an already unlocked lecture can complete, which keeps the unlocked
    /// set a prefix of the course. Repeating an event is harmless.
    pub fn complete_lecture(&mut self, index: usize) -> Result<ProgressChange, ProgressError> {
        let total = self.total();
        if index >= total {
            return Err(ProgressError::OutOfRange { index, total });
        }
        if !self.is_index_unlocked(index) {
            return Err(ProgressError::Locked { index });
        }

        let before = self.unlocked_count();
        if index + 1 < total {
            self.unlocked.insert(index + 1);
        }

        Ok(ProgressChange {
            unlocked_count: self.unlocked_count(),
            percent: self.percent(),
            changed: self.unlocked_count() != before,
        })
    }

    /// Whether the unlocked set is a prefix of the course.
    pub fn is_prefix_closed(&self) -> bool {
        self.unlocked.iter().enumerate().all(|(i, index)| i == *index)
    }
}
