use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use log::debug;

use crate::error::{PipedashError, Result};
use crate::storage;

const PINS_FILE: &str = "pins.json";

/// Ordered set of pinned project ids.
///
/// Membership decides whether a project is fetched with priority; the
/// position decides where it is displayed. Every mutation is written through
/// to `pins.json`.
pub struct PinStore {
    path: Option<PathBuf>,
    pins: IndexSet<u64>,
}

impl PinStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(PINS_FILE);
        let pins: Vec<u64> = storage::read_json(&path)?.unwrap_or_default();

        Ok(Self {
            path: Some(path),
            pins: pins.into_iter().collect(),
        })
    }

    /// A store that never touches disk.
    pub fn in_memory(ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            path: None,
            pins: ids.into_iter().collect(),
        }
    }

    pub fn is_pinned(&self, project_id: u64) -> bool {
        self.pins.contains(&project_id)
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Pins the project at the end of the order, or unpins it.
    ///
    /// Returns whether the project is pinned afterwards.
    pub fn toggle(&mut self, project_id: u64) -> Result<bool> {
        let mut pins = self.pins.clone();
        let pinned = if pins.shift_remove(&project_id) {
            false
        } else {
            pins.insert(project_id);
            true
        };

        self.commit(pins)?;
        debug!("Project {project_id} pinned: {pinned}");
        Ok(pinned)
    }

    /// Moves the pin at `from` to `to`, shifting the pins in between.
    ///
    /// `[A, B, C, D]` with `(2, 0)` becomes `[C, A, B, D]` and with `(0, 2)`
    /// becomes `[B, C, A, D]`.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.pins.len();
        for index in [from, to] {
            if index >= len {
                return Err(PipedashError::InvalidPinIndex { index, len });
            }
        }

        if from == to {
            return Ok(());
        }

        let mut pins = self.pins.clone();
        pins.move_index(from, to);
        self.commit(pins)
    }

    pub fn get_all(&self) -> Vec<u64> {
        self.pins.iter().copied().collect()
    }

    /// Replaces the whole order. Duplicate ids keep their first position.
    pub fn set_all(&mut self, ids: impl IntoIterator<Item = u64>) -> Result<()> {
        self.commit(ids.into_iter().collect())
    }

    /// Writes `pins` to disk, then makes it the current order. A failed write
    /// leaves the current order untouched.
    fn commit(&mut self, pins: IndexSet<u64>) -> Result<()> {
        if let Some(path) = &self.path {
            storage::write_json(path, &pins)?;
        }
        self.pins = pins;
        Ok(())
    }
}
