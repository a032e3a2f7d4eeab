//! Data access against the learning-platform backend.

pub mod endpoints;
pub mod executor;
pub mod models;
pub mod transport;

pub use endpoints::CourseHubApi;
pub use executor::{ApiRequest, RequestExecutor, RetryPolicy};
pub use transport::{HttpTransport, Method, ReqwestTransport};
