//! Job submission.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::required;
use crate::api::{ApiClient, JobSubmission};
use crate::error::{MutationError, ValidationError};
use crate::resources::{ResourceStore, Snapshot};

/// Raw input of the "run job" form. Feature flags default to off.
#[derive(Debug, Clone, Default)]
pub struct JobForm {
    /// Selected connection id.
    pub connection: Option<Uuid>,
    pub user_bucket: String,
    pub upload_prefix: String,
    pub result_prefix: String,
    pub ocr_requested: bool,
    pub ocr_render_boxes: bool,
    pub tag_removal_requested: bool,
    pub ai_inference_requested: bool,
}

impl JobForm {
    /// Check the form against the snapshot's connections and build the
    /// request body under a fresh client-generated job id.
    pub fn validate(&self, snapshot: &Snapshot) -> Result<JobSubmission, ValidationError> {
        let connection_id = self
            .connection
            .ok_or_else(|| ValidationError::required("connection"))?;
        let user_bucket = required("user_bucket", &self.user_bucket)?;
        let upload_prefix = required("upload_prefix", &self.upload_prefix)?;
        let result_prefix = required("result_prefix", &self.result_prefix)?;

        let connection = snapshot
            .connection(connection_id)
            .ok_or_else(|| ValidationError::new("connection", "Selected connection not found."))?;

        Ok(JobSubmission {
            job_id: Uuid::new_v4(),
            user_bucket,
            upload_prefix,
            result_prefix,
            user_role_arn: connection.aws_role_arn.clone(),
            ocr_requested: self.ocr_requested,
            ocr_render_boxes: self.ocr_render_boxes,
            tag_removal_requested: self.tag_removal_requested,
            ai_inference_requested: self.ai_inference_requested,
            connection: connection.id,
            sagemaker_endpoint: None,
        })
    }
}

pub struct JobController {
    client: ApiClient,
    store: Arc<ResourceStore>,
}

impl JobController {
    pub fn new(client: ApiClient, store: Arc<ResourceStore>) -> Self {
        Self { client, store }
    }

    /// Submit a job, then refresh the store. Returns the client job id.
    pub async fn submit(&self, form: &JobForm) -> Result<Uuid, MutationError> {
        let body = form.validate(&self.store.snapshot())?;
        let job_id = body.job_id;

        self.client.submit_job(&body).await.inspect_err(|e| {
            warn!(job_id = %job_id, error = %e, "Job submission rejected");
        })?;
        info!(
            job_id = %job_id,
            connection = %body.connection,
            bucket = %body.user_bucket,
            "Job submitted"
        );
        self.store.refresh().await;
        Ok(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Connection;

    fn snapshot(connections: &[Connection]) -> Snapshot {
        Snapshot {
            connections: connections.to_vec(),
            ..Default::default()
        }
    }

    fn connection() -> Connection {
        Connection {
            id: Uuid::new_v4(),
            name: "Research".into(),
            bucket_name: "dicom-raw".into(),
            aws_role_arn: "arn:aws:iam::123456789012:role/DeidAccess".into(),
            region: Some("us-east-1".into()),
        }
    }

    fn form(connection: &Connection) -> JobForm {
        JobForm {
            connection: Some(connection.id),
            user_bucket: "dicom-raw".into(),
            upload_prefix: "incoming/".into(),
            result_prefix: "clean/".into(),
            tag_removal_requested: true,
            ..Default::default()
        }
    }

    #[test]
    fn body_takes_role_from_connection() {
        let conn = connection();
        let body = form(&conn).validate(&snapshot(std::slice::from_ref(&conn))).unwrap();
        assert_eq!(body.user_role_arn, conn.aws_role_arn);
        assert_eq!(body.connection, conn.id);
        assert!(body.tag_removal_requested);
        assert!(!body.ocr_requested);
        assert!(body.sagemaker_endpoint.is_none());
        assert_eq!(body.job_id.get_version_num(), 4);
    }

    #[test]
    fn fresh_job_id_per_submission() {
        let conn = connection();
        let conns = snapshot(&[conn.clone()]);
        let a = form(&conn).validate(&conns).unwrap();
        let b = form(&conn).validate(&conns).unwrap();
        assert_ne!(a.job_id, b.job_id);
    }

    #[test]
    fn required_fields() {
        let conn = connection();
        let conns = snapshot(&[conn.clone()]);
        let cases: [(&str, fn(&mut JobForm)); 4] = [
            ("connection", |f| f.connection = None),
            ("user_bucket", |f| f.user_bucket.clear()),
            ("upload_prefix", |f| f.upload_prefix = " ".into()),
            ("result_prefix", |f| f.result_prefix.clear()),
        ];
        for (field, blank) in cases {
            let mut f = form(&conn);
            blank(&mut f);
            assert_eq!(f.validate(&conns).unwrap_err().field, field);
        }
    }

    #[test]
    fn unknown_connection_rejected() {
        let conn = connection();
        let err = form(&conn).validate(&Snapshot::default()).unwrap_err();
        assert_eq!(err.field, "connection");
        assert_eq!(err.message, "Selected connection not found.");
    }
}
