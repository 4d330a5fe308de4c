mod coordinator;
mod drag;
mod pins;
mod state;

pub use coordinator::{can_retry, Coordinator, RefreshOutcome, RefreshSettings};
pub use drag::DragGesture;
pub use pins::PinStore;
pub use state::{DashboardState, DashboardView, ProjectView};
