//! Progressive lecture unlocking and progress tracking.

pub mod gate;
pub mod summary;
pub mod tracker;
pub mod viewer;

pub use gate::{CourseAccess, InitGate};
pub use summary::ProgressSummary;
pub use tracker::{ProgressChange, ProgressTracker};
pub use viewer::CourseViewer;
