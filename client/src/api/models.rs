//! Request and response bodies of the learning-platform backend.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Identity fields of a user as returned by login, registration and
/// `GET /users/me`. Unknown fields are kept so that they round-trip through
/// the durable user mirror.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_roles")]
    pub roles: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserRecord {
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            _ => self.email.clone(),
        }
    }

    /// Role check tolerant of the `ROLE_` prefix the backend sometimes uses.
    pub fn has_role(&self, role: &str) -> bool {
        let wanted = role.trim_start_matches("ROLE_");
        self.roles
            .iter()
            .any(|r| r.trim_start_matches("ROLE_").eq_ignore_ascii_case(wanted))
    }

    /// Shallow merge: every key of `partial` replaces the matching field.
    pub fn merged(&self, partial: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let mut current = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in partial {
            current.insert(key.clone(), value.clone());
        }
        serde_json::from_value(Value::Object(current))
    }
}

/// Accepts `["STUDENT"]`, `[{"name": "ROLE_STUDENT"}]` or a bare string.
fn deserialize_roles<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RoleEntry {
        Name(String),
        Object { name: String },
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Roles {
        One(RoleEntry),
        Many(Vec<RoleEntry>),
    }

    let roles = Option::<Roles>::deserialize(deserializer)?;
    let entries = match roles {
        None => Vec::new(),
        Some(Roles::One(entry)) => vec![entry],
        Some(Roles::Many(entries)) => entries,
    };
    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            RoleEntry::Name(name) | RoleEntry::Object { name } => name,
        })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

/// A successful login: the bearer token plus the user fields.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    #[serde(flatten)]
    pub user: UserRecord,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationNotice {
    #[serde(default)]
    pub requires_verification: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RegisterOutcome {
    Authenticated(AuthPayload),
    VerificationRequired(VerificationNotice),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordReset {
    pub token: String,
    pub new_password: String,
}

/// Plain `{"message": ...}` acknowledgement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub level: Option<String>,
    /// Duration in hours
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One lecture (video or document) of a course, in playback order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: u64,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource {
    pub fn is_video(&self) -> bool {
        self.file_type
            .as_deref()
            .map(|t| {
                let t = t.to_ascii_lowercase();
                ["mp4", "mov", "avi", "webm", "video"]
                    .iter()
                    .any(|kind| t.contains(kind))
            })
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EnrollmentCheck {
    pub enrolled: bool,
}

/// A learner's enrollment in a course.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub course: Option<Course>,
    /// The enrolled learner, present in instructor listings
    #[serde(default)]
    pub user: Option<UserRecord>,
    #[serde(default)]
    pub enrolled_at: Option<String>,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub last_activity_date: Option<String>,
}

impl Enrollment {
    /// Progress clamped to 0..=100; missing progress counts as 0.
    pub fn progress_percent(&self) -> u8 {
        self.progress.unwrap_or(0).clamp(0, 100) as u8
    }

    pub fn course_id(&self) -> Option<u64> {
        self.course.as_ref().map(|c| c.id)
    }
}

/// Where an uploaded file can be fetched from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub url: String,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProgressUpdate {
    pub progress: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct RatingSummary {
    #[serde(default)]
    pub average: f64,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub enrolled: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    #[serde(default)]
    pub id: Option<u64>,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub user: Option<UserRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRating {
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}
