mod client;
mod types;

pub use client::GitLabClient;
pub use types::{Job, Pipeline, PipelineStatus, Project};
