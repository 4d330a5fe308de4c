pub mod gitlab;

use std::future::Future;

use log::warn;

use crate::error::Result;

use gitlab::{Job, Pipeline, Project};

/// Remote operations the dashboard needs from a Git forge.
///
/// Implementations return errors as-is; degrading failures into empty results
/// is the caller's decision.
pub trait ForgeApi: Send + Sync + 'static {
    /// Projects the authenticated user is a member of, in server order.
    fn list_projects(&self) -> impl Future<Output = Result<Vec<Project>>> + Send;

    /// Most recent pipeline of a project, `None` if it never ran one.
    fn latest_pipeline(
        &self,
        project_id: u64,
    ) -> impl Future<Output = Result<Option<Pipeline>>> + Send;

    fn retry_pipeline(
        &self,
        project_id: u64,
        pipeline_id: u64,
    ) -> impl Future<Output = Result<Pipeline>> + Send;

    fn list_jobs(
        &self,
        project_id: u64,
        pipeline_id: u64,
    ) -> impl Future<Output = Result<Vec<Job>>> + Send;
}

/// Jobs of a pipeline. Failures are logged and degrade to an empty list.
pub async fn jobs_or_empty<A: ForgeApi>(api: &A, project_id: u64, pipeline_id: u64) -> Vec<Job> {
    match api.list_jobs(project_id, pipeline_id).await {
        Ok(jobs) => jobs,
        Err(e) => {
            warn!("Failed to fetch jobs of pipeline #{pipeline_id}: {e}");
            Vec::new()
        }
    }
}
