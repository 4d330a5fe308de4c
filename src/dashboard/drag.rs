/// Tracks a pointer-drag gesture over the pinned list.
///
/// Only indices are tracked; the rendering of the dragged row belongs to the
/// presentation layer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DragGesture {
    origin: Option<usize>,
    target: Option<usize>,
}

impl DragGesture {
    pub fn begin(origin: usize) -> Self {
        Self {
            origin: Some(origin),
            target: Some(origin),
        }
    }

    pub fn origin(&self) -> Option<usize> {
        self.origin
    }

    pub fn target(&self) -> Option<usize> {
        self.target
    }

    pub fn is_active(&self) -> bool {
        self.origin.is_some()
    }

    /// Updates the current drop target. Ignored when no drag is in progress.
    pub fn hover(&mut self, index: usize) {
        if self.origin.is_some() {
            self.target = Some(index);
        }
    }

    /// Ends the gesture, yielding `(from, to)` when the pin actually moved.
    pub fn release(&mut self) -> Option<(usize, usize)> {
        let origin = self.origin.take();
        let target = self.target.take();

        match (origin, target) {
            (Some(from), Some(to)) if from != to => Some((from, to)),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.origin = None;
        self.target = None;
    }
}
