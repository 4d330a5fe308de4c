use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::providers::gitlab::{Job, Pipeline, PipelineStatus, Project};
use crate::providers::{self, ForgeApi};

use super::drag::DragGesture;
use super::pins::PinStore;
use super::state::{
    arrange_pinned, patch_pipeline, split_view, DashboardState, DashboardView, ProjectView,
};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    /// Time between timer-driven refreshes
    pub interval: Duration,
    /// Non-pinned projects fetched together per batch
    pub batch_size: usize,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Result of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The snapshot was replaced with this many projects.
    Published { projects: usize },
    /// The project list could not be fetched; the previous snapshot is kept.
    Failed { message: String },
    /// The coordinator was stopped while the cycle was running.
    Discarded,
}

/// Whether a pipeline in this status can be retried.
pub fn can_retry(status: Option<PipelineStatus>) -> bool {
    status.is_some_and(PipelineStatus::is_retryable)
}

/// Aggregates projects and their latest pipelines into one published
/// [`DashboardState`] and keeps it fresh on a timer.
///
/// Pinned projects are fetched first, the rest in fixed-size batches in server
/// order. On the first load every finished batch is published so content
/// appears incrementally; later refreshes publish once, after all batches.
pub struct Coordinator<A: ForgeApi> {
    inner: Arc<Inner<A>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

struct Inner<A> {
    api: Arc<A>,
    pins: Mutex<PinStore>,
    state: watch::Sender<DashboardState>,
    settings: RefreshSettings,
    /// Bumped by `stop`; writes tagged with an older value are dropped.
    epoch: AtomicU64,
    /// Serializes refresh cycles.
    cycle: tokio::sync::Mutex<()>,
}

impl<A: ForgeApi> Coordinator<A> {
    pub fn new(api: Arc<A>, pins: PinStore, settings: RefreshSettings) -> Self {
        let (state, _) = watch::channel(DashboardState::default());
        let settings = RefreshSettings {
            batch_size: settings.batch_size.max(1),
            ..settings
        };

        Self {
            inner: Arc::new(Inner {
                api,
                pins: Mutex::new(pins),
                state,
                settings,
                epoch: AtomicU64::new(0),
                cycle: tokio::sync::Mutex::new(()),
            }),
            timer: Mutex::new(None),
        }
    }

    /// Refreshes immediately, then every `interval` until [`stop`](Self::stop).
    ///
    /// Returns `false` without doing anything if the timer is already armed.
    pub fn start(&self) -> bool {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if timer.is_some() {
            warn!("Refresh timer already running");
            return false;
        }

        let inner = Arc::clone(&self.inner);
        let period = inner.settings.interval;
        info!("Starting refresh timer ({}s)", period.as_secs_f64());

        *timer = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let outcome = inner.refresh().await;
                debug!("Timer refresh finished: {outcome:?}");
            }
        }));

        true
    }

    /// Cancels the timer and clears the in-progress flags. Completions of
    /// requests still in flight are ignored.
    pub fn stop(&self) {
        if let Some(handle) = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }

        self.inner.state.send_if_modified(|state| {
            self.inner.epoch.fetch_add(1, Ordering::SeqCst);
            let busy = state.loading || state.refreshing;
            state.loading = false;
            state.refreshing = false;
            busy
        });
        info!("Refresh stopped");
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        self.inner.refresh().await
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> DashboardState {
        self.inner.state.borrow().clone()
    }

    /// The current snapshot split by the current pin order.
    pub fn view(&self) -> DashboardView {
        let pin_order = self.inner.pins().get_all();
        split_view(&pin_order, &self.inner.state.borrow().snapshot)
    }

    pub fn is_pinned(&self, project_id: u64) -> bool {
        self.inner.pins().is_pinned(project_id)
    }

    pub fn pinned_ids(&self) -> Vec<u64> {
        self.inner.pins().get_all()
    }

    pub fn toggle_pin(&self, project_id: u64) -> Result<bool> {
        self.inner.pins().toggle(project_id)
    }

    pub fn reorder_pinned(&self, from: usize, to: usize) -> Result<()> {
        self.inner.pins().reorder(from, to)
    }

    /// Completes a drag gesture, reordering pins when it ended elsewhere.
    pub fn apply_drag(&self, gesture: &mut DragGesture) -> Result<bool> {
        match gesture.release() {
            Some((from, to)) => {
                self.reorder_pinned(from, to)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Retries the view's current pipeline and patches the snapshot with the
    /// pipeline the server returns.
    ///
    /// Returns `Ok(None)` without any request when the view has no pipeline.
    /// On failure the pipeline is left as it was and a notice is published.
    pub async fn retry(&self, view: &ProjectView) -> Result<Option<Pipeline>> {
        let Some(current) = &view.pipeline else {
            debug!("Project {} has no pipeline to retry", view.id());
            return Ok(None);
        };

        let inner = &self.inner;
        let project_id = view.id();
        let epoch = inner.current_epoch();

        inner.update(epoch, |state| {
            let mut retrying = (*state.retrying).clone();
            retrying.insert(project_id);
            state.retrying = Arc::new(retrying);
            state.notice = None;
        });

        info!(
            "Retrying pipeline #{} of {}",
            current.id, view.project.path_with_namespace
        );

        match inner.api.retry_pipeline(project_id, current.id).await {
            Ok(pipeline) => {
                inner.update(epoch, |state| {
                    if state.find(project_id).is_some() {
                        state.snapshot =
                            patch_pipeline(&state.snapshot, project_id, pipeline.clone());
                        state.revision += 1;
                    }
                    state.retrying = without(&state.retrying, project_id);
                });
                Ok(Some(pipeline))
            }
            Err(e) => {
                let notice = format!(
                    "Failed to retry pipeline #{} of {}: {e}",
                    current.id, view.project.path_with_namespace
                );
                warn!("{notice}");
                inner.update(epoch, |state| {
                    state.notice = Some(notice);
                    state.retrying = without(&state.retrying, project_id);
                });
                Err(e)
            }
        }
    }

    /// Jobs of a pipeline. Failures degrade to an empty list.
    pub async fn jobs(&self, project_id: u64, pipeline_id: u64) -> Vec<Job> {
        providers::jobs_or_empty(self.inner.api.as_ref(), project_id, pipeline_id).await
    }
}

impl<A: ForgeApi> Drop for Coordinator<A> {
    fn drop(&mut self) {
        if let Some(handle) = self
            .timer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl<A: ForgeApi> Inner<A> {
    fn pins(&self) -> MutexGuard<'_, PinStore> {
        self.pins.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Applies `change` unless the coordinator was stopped since `epoch`.
    ///
    /// The epoch check runs under the state lock, the same lock `stop` bumps
    /// the epoch under, so no write can land after teardown.
    fn update(&self, epoch: u64, change: impl FnOnce(&mut DashboardState)) -> bool {
        self.state.send_if_modified(|state| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            change(state);
            true
        })
    }

    fn publish_partial(&self, epoch: u64, views: &[ProjectView]) -> bool {
        debug!("Publishing {} projects", views.len());
        self.update(epoch, |state| {
            state.snapshot = views.into();
            state.revision += 1;
        })
    }

    async fn refresh(&self) -> RefreshOutcome {
        let _cycle = self.cycle.lock().await;
        let epoch = self.current_epoch();

        let is_initial_load = self.state.borrow().snapshot.is_empty();
        let started = self.update(epoch, |state| {
            if is_initial_load {
                state.loading = true;
            } else {
                state.refreshing = true;
            }
        });
        if !started {
            return RefreshOutcome::Discarded;
        }

        let projects = match self.api.list_projects().await {
            Ok(projects) => projects,
            Err(e) => {
                let message = e.to_string();
                error!("Failed to fetch projects: {message}");
                let live = self.update(epoch, |state| {
                    state.error = Some(message.clone());
                    state.loading = false;
                    state.refreshing = false;
                });
                return if live {
                    RefreshOutcome::Failed { message }
                } else {
                    RefreshOutcome::Discarded
                };
            }
        };

        let total = projects.len();
        let pin_order = self.pins().get_all();
        let (pinned, others): (Vec<Project>, Vec<Project>) = projects
            .into_iter()
            .partition(|project| pin_order.contains(&project.id));

        info!(
            "Fetching pipelines for {total} projects ({} pinned)",
            pinned.len()
        );

        let mut merged: Vec<ProjectView> = Vec::with_capacity(total);

        if !pinned.is_empty() {
            let pinned_views = self.fetch_views(&pinned).await;
            merged = arrange_pinned(&pin_order, &pinned_views);

            if is_initial_load && !others.is_empty() && !self.publish_partial(epoch, &merged) {
                return RefreshOutcome::Discarded;
            }
        }

        let batch_size = self.settings.batch_size;
        let batch_count = others.len().div_ceil(batch_size);

        for (index, batch) in others.chunks(batch_size).enumerate() {
            debug!("Fetching batch {}/{batch_count}", index + 1);
            merged.extend(self.fetch_views(batch).await);

            let is_last = index + 1 == batch_count;
            if is_initial_load && !is_last {
                if !self.publish_partial(epoch, &merged) {
                    return RefreshOutcome::Discarded;
                }
            } else if self.current_epoch() != epoch {
                return RefreshOutcome::Discarded;
            }
        }

        let published = self.update(epoch, |state| {
            state.snapshot = merged.into();
            state.revision += 1;
            state.loading = false;
            state.refreshing = false;
            state.error = None;
            state.last_refreshed = Some(Utc::now());
        });

        if published {
            info!("Dashboard refreshed with {total} projects");
            RefreshOutcome::Published { projects: total }
        } else {
            RefreshOutcome::Discarded
        }
    }

    /// Fetches latest pipelines concurrently, keeping input order.
    async fn fetch_views(&self, projects: &[Project]) -> Vec<ProjectView> {
        join_all(projects.iter().map(|project| async move {
            ProjectView {
                project: project.clone(),
                pipeline: self.latest_pipeline_or_none(project).await,
            }
        }))
        .await
    }

    async fn latest_pipeline_or_none(&self, project: &Project) -> Option<Pipeline> {
        match self.api.latest_pipeline(project.id).await {
            Ok(pipeline) => pipeline,
            Err(e) => {
                warn!(
                    "Failed to fetch pipeline for {}: {e}",
                    project.path_with_namespace
                );
                None
            }
        }
    }
}

fn without(set: &Arc<BTreeSet<u64>>, project_id: u64) -> Arc<BTreeSet<u64>> {
    let mut set = (**set).clone();
    set.remove(&project_id);
    Arc::new(set)
}
