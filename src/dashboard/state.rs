use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::providers::gitlab::{Pipeline, Project};

/// A project joined with its latest pipeline.
///
/// `pipeline` is `None` when the project never ran one or the fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectView {
    pub project: Project,
    pub pipeline: Option<Pipeline>,
}

impl ProjectView {
    pub fn id(&self) -> u64 {
        self.project.id
    }
}

/// Everything the presentation layer reads, published as one value.
///
/// Containers are behind `Arc` and replaced wholesale on every change, so a
/// reader holding an old value never sees it mutate.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// Pinned projects in pin order, followed by the rest in server order
    pub snapshot: Arc<[ProjectView]>,
    /// Number of snapshot publishes so far
    pub revision: u64,
    /// First load in progress, nothing to show yet
    pub loading: bool,
    /// Background refresh in progress, `snapshot` stays visible
    pub refreshing: bool,
    /// Set when the last cycle could not fetch the project list
    pub error: Option<String>,
    /// Projects with a retry request in flight
    pub retrying: Arc<BTreeSet<u64>>,
    /// Transient user-facing message, e.g. a failed retry
    pub notice: Option<String>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            snapshot: Arc::from(Vec::new()),
            revision: 0,
            loading: false,
            refreshing: false,
            error: None,
            retrying: Arc::default(),
            notice: None,
            last_refreshed: None,
        }
    }
}

impl DashboardState {
    pub fn is_retrying(&self, project_id: u64) -> bool {
        self.retrying.contains(&project_id)
    }

    pub fn find(&self, project_id: u64) -> Option<&ProjectView> {
        self.snapshot.iter().find(|view| view.id() == project_id)
    }
}

/// The snapshot split the way it is displayed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardView {
    pub pinned: Vec<ProjectView>,
    pub others: Vec<ProjectView>,
}

/// Orders `views` by `pin_order`. Pinned ids missing from `views` are dropped.
pub fn arrange_pinned(pin_order: &[u64], views: &[ProjectView]) -> Vec<ProjectView> {
    pin_order
        .iter()
        .filter_map(|id| views.iter().find(|view| view.id() == *id))
        .cloned()
        .collect()
}

/// Splits a snapshot into pinned (by current pin order) and others (snapshot order).
pub fn split_view(pin_order: &[u64], snapshot: &[ProjectView]) -> DashboardView {
    let pinned = arrange_pinned(pin_order, snapshot);
    let others = snapshot
        .iter()
        .filter(|view| !pin_order.contains(&view.id()))
        .cloned()
        .collect();

    DashboardView { pinned, others }
}

/// Returns a new snapshot with one project's pipeline replaced.
pub(super) fn patch_pipeline(
    snapshot: &[ProjectView],
    project_id: u64,
    pipeline: Pipeline,
) -> Arc<[ProjectView]> {
    snapshot
        .iter()
        .map(|view| {
            if view.id() == project_id {
                ProjectView {
                    project: view.project.clone(),
                    pipeline: Some(pipeline.clone()),
                }
            } else {
                view.clone()
            }
        })
        .collect()
}
