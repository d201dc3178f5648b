//! Connection create/delete.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::{Confirm, required};
use crate::api::{ApiClient, NewConnection};
use crate::error::{MutationError, ValidationError};
use crate::resources::ResourceStore;

/// Prompt shown before a connection is deleted.
pub const DELETE_PROMPT: &str = "Are you sure you want to delete this connection?";

static ROLE_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws:iam::\d{12}:role/[\w+=,.@/-]+$").expect("valid role ARN pattern")
});

/// Raw input of the "add connection" form.
#[derive(Debug, Clone, Default)]
pub struct ConnectionForm {
    pub name: String,
    pub bucket_name: String,
    pub aws_role_arn: String,
    pub region: String,
}

impl ConnectionForm {
    /// Check the form and build the request body.
    pub fn validate(&self) -> Result<NewConnection, ValidationError> {
        let name = required("name", &self.name)?;
        let bucket_name = required("bucket_name", &self.bucket_name)?;
        let aws_role_arn = required("aws_role_arn", &self.aws_role_arn)?;
        let region = required("region", &self.region)?;

        if !ROLE_ARN.is_match(&aws_role_arn) {
            return Err(ValidationError::new(
                "aws_role_arn",
                "Enter a role ARN like arn:aws:iam::123456789012:role/RoleName.",
            ));
        }
        Ok(NewConnection {
            name,
            bucket_name,
            aws_role_arn,
            region,
        })
    }
}

pub struct ConnectionController {
    client: ApiClient,
    store: Arc<ResourceStore>,
}

impl ConnectionController {
    pub fn new(client: ApiClient, store: Arc<ResourceStore>) -> Self {
        Self { client, store }
    }

    /// Create a connection, then refresh the store.
    pub async fn create(&self, form: &ConnectionForm) -> Result<(), MutationError> {
        let body = form.validate()?;
        self.client.create_connection(&body).await.inspect_err(|e| {
            warn!(name = %body.name, error = %e, "Connection create rejected");
        })?;
        info!(name = %body.name, bucket = %body.bucket_name, "Connection created");
        self.store.refresh().await;
        Ok(())
    }

    /// Delete a connection after the user confirms, then refresh the store.
    pub async fn delete(&self, id: Uuid, confirm: &dyn Confirm) -> Result<(), MutationError> {
        if !confirm.confirm(DELETE_PROMPT).await {
            return Err(MutationError::Declined);
        }
        self.client.delete_connection(id).await.inspect_err(|e| {
            warn!(connection_id = %id, error = %e, "Connection delete rejected");
        })?;
        info!(connection_id = %id, "Connection deleted");
        self.store.refresh().await;
        Ok(())
    }
}
