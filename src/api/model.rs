//! Wire types for the backend REST surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Professional role recorded on the profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Radiologist,
    Researcher,
    Student,
    Technician,
    #[default]
    #[serde(other)]
    Other,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Radiologist,
        Role::Researcher,
        Role::Student,
        Role::Technician,
        Role::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Radiologist => "RADIOLOGIST",
            Self::Researcher => "RESEARCHER",
            Self::Student => "STUDENT",
            Self::Technician => "TECHNICIAN",
            Self::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown role: {s}"))
    }
}

/// Server-owned user profile (`GET /users/me/`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub onboarding_complete: bool,
    #[serde(default)]
    pub credits: i64,
}

impl Profile {
    /// Display name, falling back to the email address.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// A stored reference to a user-owned bucket and the role used to access it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: Uuid,
    pub name: String,
    pub bucket_name: String,
    pub aws_role_arn: String,
    #[serde(default)]
    pub region: Option<String>,
}

/// Processing status of a job.
///
/// The backend's finer-grained statuses fold into these four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    #[serde(alias = "PROCESSING")]
    Running,
    Completed,
    #[serde(alias = "FAILED_RETRYABLE", alias = "FAILED_PERMANENT")]
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Status only moves forward; terminal states never change.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        *self == target || (!self.is_terminal() && target.rank() > self.rank())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown job status: {s}"))
    }
}

/// A de-identification job as listed by `GET /jobs/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "connection")]
    pub connection_id: Option<Uuid>,
    #[serde(default)]
    pub connection_name: Option<String>,
    #[serde(default)]
    pub ocr_requested: bool,
    #[serde(default)]
    pub tag_removal_requested: bool,
    /// Key of the de-identified output.
    #[serde(default, rename = "s3_cleaned_result_key")]
    pub result_artifact_ref: Option<String>,
    #[serde(default, rename = "s3_audit_log_key")]
    pub audit_log_ref: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub files_processed: u64,
    #[serde(default)]
    pub total_files: u64,
}

impl Job {
    /// Percentage of files processed, rounded to two decimals.
    pub fn progress_percentage(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        let pct = self.files_processed as f64 / self.total_files as f64 * 100.0;
        (pct * 100.0).round() / 100.0
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.completed_at? - self.started_at?)
    }
}

// ── Request bodies ──────────────────────────────────────────────────

/// `POST /connections/` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewConnection {
    pub name: String,
    pub bucket_name: String,
    pub aws_role_arn: String,
    pub region: String,
}

/// `POST /jobs/` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSubmission {
    #[serde(rename = "jobId")]
    pub job_id: Uuid,
    pub user_bucket: String,
    pub upload_prefix: String,
    pub result_prefix: String,
    pub user_role_arn: String,
    pub ocr_requested: bool,
    pub ocr_render_boxes: bool,
    pub tag_removal_requested: bool,
    pub ai_inference_requested: bool,
    pub connection: Uuid,
    /// Filled in server-side; always sent as `null`.
    pub sagemaker_endpoint: Option<String>,
}

/// `POST /users/` body completing onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSubmission {
    pub display_name: String,
    pub email: String,
    pub user_id: String,
    pub role: Role,
    pub onboarding_complete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_from_backend_json() {
        let profile: Profile = serde_json::from_value(json!({
            "user_id": "abc-123",
            "email": "jane@example.com",
            "display_name": "Dr. Jane Doe",
            "role": "RADIOLOGIST",
            "onboarding_complete": true,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(profile.role, Role::Radiologist);
        assert!(profile.onboarding_complete);
        assert_eq!(profile.credits, 0);
        assert_eq!(profile.label(), "Dr. Jane Doe");
    }

    #[test]
    fn unknown_role_is_other() {
        let profile: Profile = serde_json::from_value(json!({
            "user_id": "u",
            "email": "x@y.z",
            "role": "ASTRONAUT",
        }))
        .unwrap();
        assert_eq!(profile.role, Role::Other);
        assert!(!profile.onboarding_complete);
        assert_eq!(profile.label(), "x@y.z");
    }

    #[test]
    fn role_parse_case_insensitive() {
        assert_eq!("radiologist".parse::<Role>().unwrap(), Role::Radiologist);
        assert!("pilot".parse::<Role>().is_err());
    }

    #[test]
    fn backend_statuses_fold() {
        let parse = |s: &str| serde_json::from_value::<JobStatus>(json!(s)).unwrap();
        assert_eq!(parse("PROCESSING"), JobStatus::Running);
        assert_eq!(parse("RUNNING"), JobStatus::Running);
        assert_eq!(parse("FAILED_RETRYABLE"), JobStatus::Failed);
        assert_eq!(parse("FAILED_PERMANENT"), JobStatus::Failed);
        assert_eq!(serde_json::to_value(JobStatus::Running).unwrap(), json!("RUNNING"));
    }

    #[test]
    fn status_is_monotonic() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(Running.can_transition_to(Running));
        assert!(!Running.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Running));
    }

    #[test]
    fn job_from_backend_json() {
        let job: Job = serde_json::from_value(json!({
            "id": "6f1c1b1e-3c1a-4c2e-9a49-5f9d3f4c0b11",
            "status": "COMPLETED",
            "created_at": "2025-03-01T10:00:00Z",
            "started_at": "2025-03-01T10:00:05Z",
            "completed_at": "2025-03-01T10:01:05Z",
            "connection": "0b1f5a8e-2a55-4f6a-9b7f-7cbe2a0d9c33",
            "s3_cleaned_result_key": "results/abc.zip",
            "s3_audit_log_key": "audit/abc.json",
            "files_processed": 1,
            "total_files": 3
        }))
        .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result_artifact_ref.as_deref(), Some("results/abc.zip"));
        assert_eq!(job.duration().unwrap().num_seconds(), 60);
        assert_eq!(job.progress_percentage(), 33.33);
        assert!(job.connection_id.is_some());
    }

    #[test]
    fn job_submission_wire_names() {
        let body = JobSubmission {
            job_id: Uuid::nil(),
            user_bucket: "b".into(),
            upload_prefix: "in/".into(),
            result_prefix: "out/".into(),
            user_role_arn: "arn:aws:iam::123456789012:role/r".into(),
            ocr_requested: true,
            ocr_render_boxes: false,
            tag_removal_requested: true,
            ai_inference_requested: false,
            connection: Uuid::nil(),
            sagemaker_endpoint: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("jobId").is_some());
        assert_eq!(value["sagemaker_endpoint"], serde_json::Value::Null);
        assert_eq!(value["ocr_requested"], true);
    }
}
