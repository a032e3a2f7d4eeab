//! Command-line entry point for the CourseHub client.
//!
//! Restores the saved session and reports the learner's enrolled courses
//! together with a progress summary.

use anyhow::Result;
use coursehub_client::CourseHubClient;
use coursehub_client::api::ReqwestTransport;
use coursehub_client::config::Config;
use coursehub_client::progress::ProgressSummary;
use coursehub_client::session::SessionState;
use coursehub_client::storage::FileStore;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!("Using API at {}", config.api_base_url);

    let store = Arc::new(FileStore::open(&config.session_file));
    let client = CourseHubClient::new(
        config.executor_settings(),
        store,
        Arc::new(ReqwestTransport::new()),
    );

    let session = match client.session.rehydrate().await {
        SessionState::Authenticated(session) => session,
        state => {
            info!("No active session ({}); sign in to see your courses", state.label());
            return Ok(());
        }
    };
    info!("Signed in as {}", session.user.display_name());

    let enrollments = client.api.my_courses().await?;
    if enrollments.is_empty() {
        info!("You are not enrolled in any course yet");
        return Ok(());
    }

    let ratings = futures::future::join_all(enrollments.iter().map(|enrollment| {
        let api = client.api.clone();
        let course_id = enrollment.course_id();
        async move {
            match course_id {
                Some(id) => api.rating_summary(id).await.ok(),
                None => None,
            }
        }
    }))
    .await;

    for (enrollment, rating) in enrollments.iter().zip(ratings) {
        let title = enrollment
            .course
            .as_ref()
            .map_or("Untitled course", |course| course.title.as_str());
        let status = if enrollment.paid { "paid" } else { "awaiting payment" };
        match rating {
            Some(rating) => info!(
                "{}: {}% ({}), rated {:.1} by {}",
                title,
                enrollment.progress_percent(),
                status,
                rating.average,
                rating.count
            ),
            None => info!("{}: {}% ({})", title, enrollment.progress_percent(), status),
        }
    }

    let summary = ProgressSummary::from_enrollments(&enrollments);
    info!(
        "{} courses: {} completed, {} in progress, {} not started, average {}%",
        summary.total,
        summary.completed,
        summary.in_progress,
        summary.not_started,
        summary.average_progress
    );

    if !client.session.is_authenticated() {
        warn!("Session was revoked while loading courses");
    }
    Ok(())
}
