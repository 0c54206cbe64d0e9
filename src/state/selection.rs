/// Selection and comparison controller
///
/// Finite state machine over the gallery's interaction modes:
/// - `Browse`: a click opens the detail view
/// - `Compare`: picks exactly two entries for a side-by-side slider
/// - `Batch`: unbounded multi-select for re-scoring and edit hand-off
///
/// Entering any mode clears the prior selection. Detail navigation is
/// bounded by the curator's current flat list.

/// Maximum number of entries the edit hand-off accepts.
pub const MAX_EDIT_SELECTION: usize = 4;

/// Gallery interaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    Browse,
    Compare,
    Batch,
}

/// What a tile click resulted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Browse mode: open the detail view for this entry
    OpenDetail(String),
    /// Compare or batch mode: the selection set changed
    SelectionChanged,
}

/// Selection state shared by the grid and the detail view.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    mode: InteractionMode,
    /// Insertion-ordered so compare mode can evict the oldest pick
    selected: Vec<String>,
    active_id: Option<String>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn is_selected(&self, prompt_id: &str) -> bool {
        self.selected.iter().any(|id| id == prompt_id)
    }

    /// Switch interaction mode. Any prior selection is dropped, even
    /// when re-entering the current mode.
    pub fn set_mode(&mut self, mode: InteractionMode) {
        self.mode = mode;
        self.selected.clear();
    }

    /// Handle a tile click under the current mode.
    pub fn click(&mut self, prompt_id: &str) -> ClickOutcome {
        match self.mode {
            InteractionMode::Browse => {
                self.active_id = Some(prompt_id.to_string());
                ClickOutcome::OpenDetail(prompt_id.to_string())
            }
            InteractionMode::Compare => {
                if let Some(pos) = self.selected.iter().position(|id| id == prompt_id) {
                    self.selected.remove(pos);
                } else {
                    // FIFO of depth 2: a third pick evicts the oldest.
                    if self.selected.len() == 2 {
                        self.selected.remove(0);
                    }
                    self.selected.push(prompt_id.to_string());
                }
                ClickOutcome::SelectionChanged
            }
            InteractionMode::Batch => {
                if let Some(pos) = self.selected.iter().position(|id| id == prompt_id) {
                    self.selected.remove(pos);
                } else {
                    self.selected.push(prompt_id.to_string());
                }
                ClickOutcome::SelectionChanged
            }
        }
    }

    /// The ordered pair for the side-by-side comparison, available only
    /// when exactly two entries are selected in compare mode.
    pub fn compare_pair(&self) -> Option<(&str, &str)> {
        if self.mode == InteractionMode::Compare && self.selected.len() == 2 {
            Some((self.selected[0].as_str(), self.selected[1].as_str()))
        } else {
            None
        }
    }

    /// Selection for the edit hand-off, bounded to `MAX_EDIT_SELECTION`.
    pub fn edit_selection(&self) -> Option<Vec<String>> {
        if self.mode == InteractionMode::Batch
            && !self.selected.is_empty()
            && self.selected.len() <= MAX_EDIT_SELECTION
        {
            Some(self.selected.clone())
        } else {
            None
        }
    }

    /// Selection for batch re-scoring (any non-empty batch set).
    pub fn batch_selection(&self) -> Option<Vec<String>> {
        if self.mode == InteractionMode::Batch && !self.selected.is_empty() {
            Some(self.selected.clone())
        } else {
            None
        }
    }

    /// Called when a batch action completes: back to browse, empty set.
    pub fn finish_batch(&mut self) {
        self.set_mode(InteractionMode::Browse);
    }

    pub fn open_detail(&mut self, prompt_id: &str) {
        self.active_id = Some(prompt_id.to_string());
    }

    pub fn close_detail(&mut self) {
        self.active_id = None;
    }

    /// Move the active entry one step within the flat ordered list.
    /// No-op at either boundary or when nothing is active.
    pub fn step_active(&mut self, flat: &[String], delta: isize) {
        let Some(active) = self.active_id.as_deref() else {
            return;
        };
        let Some(pos) = flat.iter().position(|id| id == active) else {
            return;
        };
        let next = pos as isize + delta;
        if next < 0 || next as usize >= flat.len() {
            return;
        }
        self.active_id = Some(flat[next as usize].clone());
    }

    /// Drop state that no longer references the current filtered view.
    /// The active entry must always be present in the view or be None.
    pub fn reconcile(&mut self, flat: &[String]) {
        if let Some(active) = self.active_id.as_deref() {
            if !flat.iter().any(|id| id == active) {
                self.active_id = None;
            }
        }
        self.selected.retain(|id| flat.contains(id));
    }
}
