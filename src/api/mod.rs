//! Backend REST access: the authorized fetch client and wire models.

pub mod client;
pub mod model;

pub use client::ApiClient;
pub use model::{
    Connection, Job, JobStatus, JobSubmission, NewConnection, Profile, ProfileSubmission, Role,
};
