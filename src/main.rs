use iced::widget::{
    button, canvas, checkbox, column, container, pick_list, row, scrollable, slider, stack, text,
};
use iced::{Alignment, Element, Length, Size, Subscription, Task, Theme};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

// Declare the application modules
mod moderation;
mod state;
mod ui;

use moderation::{
    decide, rescore_batch, BatchOutcome, FetchGate, ModerationScorer, SafetyLevel, ScoreError,
    SidecarScorer,
};
use state::{
    curate, CuratedEntry, CuratedView, HistoryEntry, InteractionMode, SelectionState,
    SeverityBucket, SeverityFilter, SortDirection,
};
use ui::overlay::{OverlayLayer, RenderMetrics};
use ui::{FileResolver, ImageResolver};

/// Chrome reserved around the inspector image (side panel and toolbar),
/// used to estimate the image container from the window size.
const INSPECTOR_CHROME: Size = Size::new(320.0, 140.0);

/// Main application state
struct Gallery {
    /// Local copy of the external history store's records
    history: Vec<HistoryEntry>,
    /// Derived gallery view, recomputed wholesale on every input change
    view_model: CuratedView,
    /// Severity bucket filter
    filter: SeverityFilter,
    /// Sort direction toggle
    sort: SortDirection,
    /// Interaction mode and selection
    selection: SelectionState,
    /// Active safety level
    safety_level: SafetyLevel,
    /// Mask detected regions instead of blurring the whole view
    selective_ambiguity: bool,
    /// Single-fetch dedup and staleness gate
    fetch_gate: FetchGate,
    /// External moderation scorer, if configured
    scorer: Option<Arc<dyn ModerationScorer>>,
    /// External image resolver
    resolver: FileResolver,
    /// Natural pixel dimensions, probed per entry on detail open
    natural_sizes: HashMap<String, (u32, u32)>,
    /// Last observed window size
    viewport: Option<Size>,
    /// Cached inspector render metrics, recomputed on resize and probe
    metrics: Option<RenderMetrics>,
    /// Split position of the comparison slider
    compare_split: f32,
    /// The pair currently shown side by side
    comparing: Option<(String, String)>,
    /// True while a batch re-score is running
    batch_running: bool,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    /// The external store delivered a fresh record list
    HistoryRefreshed(Vec<HistoryEntry>),
    /// User clicked a tile in the grid
    TileClicked(String),
    /// User switched interaction mode
    ModeSelected(InteractionMode),
    /// User toggled a severity filter bucket
    FilterToggled(SeverityBucket),
    /// User flipped the sort direction
    SortToggled,
    /// User picked a safety level
    SafetyLevelSelected(SafetyLevel),
    /// User toggled selective region masking
    SelectiveAmbiguityToggled(bool),
    /// Detail-view navigation
    PrevEntry,
    NextEntry,
    CloseDetail,
    /// A single-entry scoring fetch resolved
    ModerationFetched {
        prompt_id: String,
        generation: u64,
        result: Result<JsonValue, ScoreError>,
    },
    /// Batch actions
    RescoreSelected,
    BatchRescored(Vec<BatchOutcome>),
    EditSelected,
    /// Boundary callbacks
    DeleteEntry(String),
    OpenInNewView(String),
    /// Background image probe finished
    ImageProbed {
        prompt_id: String,
        dimensions: Option<(u32, u32)>,
    },
    /// Window resized
    WindowResized(Size),
    /// Comparison
    CompareRequested,
    CompareSplitChanged(f32),
    CloseCompare,
}

impl Gallery {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        // CAPTURE_GALLERY_SCORES points at the detection service's
        // sidecar payload directory; without it, entries stay unscored
        // and the policy's conservative default applies.
        let scorer: Option<Arc<dyn ModerationScorer>> = match std::env::var("CAPTURE_GALLERY_SCORES")
        {
            Ok(dir) => {
                println!("📂 Moderation scores from: {}", dir);
                Some(Arc::new(SidecarScorer::new(dir)))
            }
            Err(_) => None,
        };

        let gallery = Gallery {
            history: Vec::new(),
            view_model: CuratedView::default(),
            filter: SeverityFilter::default(),
            sort: SortDirection::default(),
            selection: SelectionState::new(),
            safety_level: SafetyLevel::Enabled,
            selective_ambiguity: false,
            fetch_gate: FetchGate::new(),
            scorer,
            resolver: FileResolver,
            natural_sizes: HashMap::new(),
            viewport: None,
            metrics: None,
            compare_split: 0.5,
            comparing: None,
            batch_running: false,
            status: "Ready. Waiting for history.".to_string(),
        };

        // A history snapshot path may be handed over on the command
        // line; without one the gallery waits for the external store.
        let task = match std::env::args().nth(1) {
            Some(path) => Task::perform(load_history(path), Message::HistoryRefreshed),
            None => Task::none(),
        };
        (gallery, task)
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::HistoryRefreshed(entries) => {
                self.history = entries;
                self.refresh_view();
                self.status = format!("{} captures in history.", self.view_model.len());
                Task::none()
            }

            Message::TileClicked(prompt_id) => match self.selection.click(&prompt_id) {
                state::ClickOutcome::OpenDetail(id) => self.activate(&id),
                state::ClickOutcome::SelectionChanged => Task::none(),
            },

            Message::ModeSelected(mode) => {
                self.selection.set_mode(mode);
                self.comparing = None;
                Task::none()
            }

            Message::FilterToggled(bucket) => {
                self.filter.toggle(bucket);
                self.refresh_view();
                Task::none()
            }

            Message::SortToggled => {
                self.sort = self.sort.toggled();
                self.refresh_view();
                Task::none()
            }

            Message::SafetyLevelSelected(level) => {
                self.safety_level = level;
                Task::none()
            }

            Message::SelectiveAmbiguityToggled(enabled) => {
                self.selective_ambiguity = enabled;
                Task::none()
            }

            Message::PrevEntry => self.step(-1),
            Message::NextEntry => self.step(1),

            Message::CloseDetail => {
                self.selection.close_detail();
                self.fetch_gate.bump();
                Task::none()
            }

            Message::ModerationFetched {
                prompt_id,
                generation,
                result,
            } => {
                // Discard results for entries the user navigated away
                // from before the fetch resolved. Forgetting the entry
                // lets a later activation arm a fresh fetch for it.
                if !self.fetch_gate.admits(generation) {
                    self.fetch_gate.forget(&prompt_id);
                    return Task::none();
                }
                match result {
                    Ok(payload) => {
                        self.apply_moderation(&prompt_id, payload);
                        self.status = format!("Scored {}.", prompt_id);
                    }
                    Err(e) => {
                        // The entry stays "awaiting"; retrying is the
                        // presentation layer's affordance.
                        eprintln!("⚠️  Scoring failed for {}: {}", prompt_id, e);
                        self.status = format!("Scoring failed for {}.", prompt_id);
                    }
                }
                Task::none()
            }

            Message::RescoreSelected => {
                let (Some(scorer), Some(ids)) =
                    (self.scorer.clone(), self.selection.batch_selection())
                else {
                    return Task::none();
                };
                self.batch_running = true;
                self.status = format!("Re-scoring {} captures…", ids.len());
                Task::perform(rescore_batch(scorer, ids), Message::BatchRescored)
            }

            Message::BatchRescored(outcomes) => {
                let mut applied = 0;
                for outcome in outcomes {
                    self.fetch_gate.forget(&outcome.entry_id);
                    if let Some(payload) = outcome.payload {
                        self.apply_moderation(&outcome.entry_id, payload);
                        applied += 1;
                    }
                }
                self.batch_running = false;
                self.selection.finish_batch();
                self.status = format!("✅ Re-scored {} captures.", applied);
                Task::none()
            }

            Message::EditSelected => {
                if let Some(ids) = self.selection.edit_selection() {
                    // Boundary hand-off: the edit consumer receives plain
                    // identifiers and owes us nothing back.
                    println!("🖌️  Edit hand-off: {}", ids.join(", "));
                    self.selection.finish_batch();
                }
                Task::none()
            }

            Message::DeleteEntry(prompt_id) => {
                println!("🗑️  Delete requested: {}", prompt_id);
                self.history.retain(|e| e.prompt_id != prompt_id);
                self.refresh_view();
                Task::none()
            }

            Message::OpenInNewView(prompt_id) => {
                println!("🔗 Open in new view: {}", prompt_id);
                Task::none()
            }

            Message::ImageProbed {
                prompt_id,
                dimensions,
            } => {
                if let Some(dims) = dimensions {
                    self.natural_sizes.insert(prompt_id, dims);
                    self.recompute_metrics();
                }
                Task::none()
            }

            Message::WindowResized(size) => {
                self.viewport = Some(size);
                self.recompute_metrics();
                Task::none()
            }

            Message::CompareRequested => {
                if let Some((a, b)) = self.selection.compare_pair() {
                    self.comparing = Some((a.to_string(), b.to_string()));
                    self.compare_split = 0.5;
                }
                Task::none()
            }

            Message::CompareSplitChanged(split) => {
                self.compare_split = split;
                Task::none()
            }

            Message::CloseCompare => {
                self.comparing = None;
                Task::none()
            }
        }
    }

    /// Store a fetched payload on our copy of the entry and rebuild the
    /// derived view from scratch.
    fn apply_moderation(&mut self, prompt_id: &str, payload: JsonValue) {
        if let Some(entry) = self.history.iter_mut().find(|e| e.prompt_id == prompt_id) {
            entry.moderation_raw = Some(payload);
        }
        self.refresh_view();
    }

    /// Recompute the derived view and drop state it no longer covers.
    fn refresh_view(&mut self) {
        self.view_model = curate(&self.history, &self.filter, self.sort);
        let flat = self.view_model.flat_ids();
        self.selection.reconcile(&flat);
    }

    /// Make an entry active: stamp a new fetch generation, kick off the
    /// scoring fetch and the natural-size probe as needed.
    fn activate(&mut self, prompt_id: &str) -> Task<Message> {
        self.selection.open_detail(prompt_id);
        self.fetch_gate.bump();
        self.recompute_metrics();
        Task::batch([self.maybe_fetch(prompt_id), self.maybe_probe(prompt_id)])
    }

    /// Move the active entry within the flat list and refresh fetches.
    fn step(&mut self, delta: isize) -> Task<Message> {
        let flat = self.view_model.flat_ids();
        let before = self.selection.active_id().map(str::to_string);
        self.selection.step_active(&flat, delta);
        let after = self.selection.active_id().map(str::to_string);
        match after {
            Some(active) if Some(&active) != before.as_ref() => {
                self.fetch_gate.bump();
                self.recompute_metrics();
                Task::batch([self.maybe_fetch(&active), self.maybe_probe(&active)])
            }
            _ => Task::none(),
        }
    }

    /// Start a scoring fetch for the entry, at most once per session.
    fn maybe_fetch(&mut self, prompt_id: &str) -> Task<Message> {
        let Some(scorer) = self.scorer.clone() else {
            // Without a scorer, entries stay unscored and the policy's
            // conservative default applies.
            return Task::none();
        };
        let unscored = self
            .view_model
            .find(prompt_id)
            .map(|e| e.moderation.is_none())
            .unwrap_or(false);
        if !unscored {
            return Task::none();
        }
        let Some(generation) = self.fetch_gate.arm(prompt_id) else {
            return Task::none();
        };

        let id = prompt_id.to_string();
        let result_id = id.clone();
        Task::perform(
            async move { scorer.fetch_moderation(&id, false).await },
            move |result| Message::ModerationFetched {
                prompt_id: result_id.clone(),
                generation,
                result,
            },
        )
    }

    /// Probe the image's natural pixel size in the background.
    fn maybe_probe(&self, prompt_id: &str) -> Task<Message> {
        if self.natural_sizes.contains_key(prompt_id) {
            return Task::none();
        }
        let Some(path) = self
            .view_model
            .find(prompt_id)
            .and_then(|e| e.entry.image_path.clone())
        else {
            return Task::none();
        };
        let id = prompt_id.to_string();
        Task::perform(probe_dimensions(path), move |dimensions| {
            Message::ImageProbed {
                prompt_id: id.clone(),
                dimensions,
            }
        })
    }

    /// Recompute the cached inspector metrics from the window size and
    /// the active entry's natural size. Idempotent; safe to call on
    /// every resize notification.
    fn recompute_metrics(&mut self) {
        self.metrics = match (self.viewport, self.active_natural_size()) {
            (Some(viewport), Some(natural)) => {
                let container = Size::new(
                    (viewport.width - INSPECTOR_CHROME.width).max(1.0),
                    (viewport.height - INSPECTOR_CHROME.height).max(1.0),
                );
                RenderMetrics::fit(container, natural)
            }
            _ => None,
        };
    }

    fn active_natural_size(&self) -> Option<Size> {
        let active = self.selection.active_id()?;
        let (w, h) = self.natural_sizes.get(active)?;
        Some(Size::new(*w as f32, *h as f32))
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let body: Element<Message> = if let Some((a, b)) = &self.comparing {
            self.compare_view(a, b)
        } else if let Some(active) = self.selection.active_id() {
            match self.view_model.find(active) {
                Some(entry) => self.detail_view(entry),
                None => self.grid_view(),
            }
        } else {
            self.grid_view()
        };

        column![self.toolbar(), body, text(&self.status).size(13)]
            .spacing(12)
            .padding(16)
            .into()
    }

    /// Mode, filter, sort, and safety controls.
    fn toolbar(&self) -> Element<Message> {
        let mode_button = |label, mode| {
            let marker = if self.selection.mode() == mode { "●" } else { "○" };
            button(text(format!("{} {}", marker, label)).size(13))
                .on_press(Message::ModeSelected(mode))
                .padding(6)
        };

        let filter_button = |label, bucket| {
            let marker = if self.filter.is_selected(bucket) { "■" } else { "□" };
            button(text(format!("{} {}", marker, label)).size(13))
                .on_press(Message::FilterToggled(bucket))
                .padding(6)
        };

        let sort_label = match self.sort {
            SortDirection::NewestFirst => "Newest first",
            SortDirection::OldestFirst => "Oldest first",
        };

        let compare_action = button(text("Compare").size(13))
            .on_press_maybe(self.selection.compare_pair().map(|_| Message::CompareRequested))
            .padding(6);

        let rescore_action = button(text("Re-score selected").size(13))
            .on_press_maybe(
                (!self.batch_running && self.scorer.is_some())
                    .then(|| self.selection.batch_selection().map(|_| Message::RescoreSelected))
                    .flatten(),
            )
            .padding(6);

        let edit_action = button(text("Use in edit").size(13))
            .on_press_maybe(self.selection.edit_selection().map(|_| Message::EditSelected))
            .padding(6);

        column![
            row![
                mode_button("Browse", InteractionMode::Browse),
                mode_button("Compare", InteractionMode::Compare),
                mode_button("Batch", InteractionMode::Batch),
                compare_action,
                rescore_action,
                edit_action,
            ]
            .spacing(8),
            row![
                filter_button("All", SeverityBucket::All),
                filter_button("Safe", SeverityBucket::Safe),
                filter_button("Mild", SeverityBucket::Mild),
                filter_button("Sensitive", SeverityBucket::Sensitive),
                button(text(sort_label).size(13))
                    .on_press(Message::SortToggled)
                    .padding(6),
                pick_list(
                    &SafetyLevel::ALL[..],
                    Some(self.safety_level),
                    Message::SafetyLevelSelected,
                ),
                checkbox("Mask regions only", self.selective_ambiguity)
                    .on_toggle(Message::SelectiveAmbiguityToggled),
            ]
            .spacing(8)
            .align_y(Alignment::Center),
        ]
        .spacing(8)
        .into()
    }

    /// The date-grouped tile grid.
    fn grid_view(&self) -> Element<Message> {
        scrollable(ui::grid::history_grid(
            &self.view_model,
            &self.selection,
            self.safety_level,
            self.selective_ambiguity,
            &self.resolver,
        ))
        .height(Length::Fill)
        .into()
    }

    /// Full inspector for the active entry.
    fn detail_view<'a>(&'a self, entry: &'a CuratedEntry) -> Element<'a, Message> {
        let decision = decide(
            self.safety_level,
            self.selective_ambiguity,
            entry.moderation.as_ref(),
        );

        let picture: Element<Message> = match self.resolver.full(&entry.entry) {
            None => centered_note("No image available"),
            Some(_) if decision.blur_inspector => centered_note("Content redacted"),
            Some(handle) => {
                let image = iced::widget::image(handle)
                    .width(Length::Fill)
                    .height(Length::Fill);
                if decision.inspector_boxes.is_empty() {
                    image.into()
                } else {
                    stack([
                        image.into(),
                        canvas(OverlayLayer {
                            boxes: decision.inspector_boxes.clone(),
                            natural: self.active_natural_size(),
                            metrics: self.metrics,
                        })
                        .width(Length::Fill)
                        .height(Length::Fill)
                        .into(),
                    ])
                    .into()
                }
            }
        };

        let nav = row![
            button(text("← Prev").size(13)).on_press(Message::PrevEntry).padding(6),
            button(text("Next →").size(13)).on_press(Message::NextEntry).padding(6),
            button(text("Close").size(13)).on_press(Message::CloseDetail).padding(6),
            button(text("Delete").size(13))
                .on_press(Message::DeleteEntry(entry.entry.prompt_id.clone()))
                .padding(6),
            button(text("Open in new view").size(13))
                .on_press(Message::OpenInNewView(entry.entry.prompt_id.clone()))
                .padding(6),
        ]
        .spacing(8);

        row![
            column![picture, nav].spacing(8).width(Length::FillPortion(3)),
            self.metadata_panel(entry),
        ]
        .spacing(16)
        .height(Length::Fill)
        .into()
    }

    /// Side panel with the entry's metadata and moderation summary.
    fn metadata_panel<'a>(&self, entry: &'a CuratedEntry) -> Element<'a, Message> {
        let mut lines = column![text(&entry.entry.prompt_id).size(14)].spacing(6);

        if let Some(prompt) = &entry.entry.prompt {
            lines = lines.push(text(format!("Prompt: {}", prompt)).size(13));
        }
        if let Some(seed) = entry.entry.seed {
            lines = lines.push(text(format!("Seed: {}", seed)).size(13));
        }
        if let Some((w, h)) = entry.entry.resolution {
            lines = lines.push(text(format!("Resolution: {}×{}", w, h)).size(13));
        }
        if let Some(completed) = entry.entry.completed_at {
            lines = lines.push(text(format!("Completed: {}", completed)).size(13));
        } else if let Some(created) = entry.entry.created_at {
            lines = lines.push(text(format!("Created: {}", created)).size(13));
        }

        lines = lines.push(match &entry.moderation {
            Some(info) => text(format!(
                "Moderation: {:?}, {} regions",
                info.severity,
                info.detections.len()
            ))
            .size(13),
            None => text("Moderation: awaiting score").size(13),
        });

        container(lines)
            .width(Length::FillPortion(1))
            .padding(8)
            .into()
    }

    /// Side-by-side slider comparison of the selected pair.
    fn compare_view<'a>(&'a self, left: &str, right: &str) -> Element<'a, Message> {
        let pane = |id: &str| -> Element<'a, Message> {
            match self.view_model.find(id) {
                Some(entry) => {
                    let decision = decide(
                        self.safety_level,
                        self.selective_ambiguity,
                        entry.moderation.as_ref(),
                    );
                    match self.resolver.full(&entry.entry) {
                        Some(_) if decision.blur_inspector => centered_note("Content redacted"),
                        Some(handle) => iced::widget::image(handle)
                            .width(Length::Fill)
                            .height(Length::Fill)
                            .into(),
                        None => centered_note("No image available"),
                    }
                }
                None => centered_note("No image available"),
            }
        };

        let split = (self.compare_split * 100.0).round().max(1.0) as u16;

        column![
            row![
                container(pane(left)).width(Length::FillPortion(split)),
                container(pane(right)).width(Length::FillPortion(101 - split.min(100))),
            ]
            .spacing(4)
            .height(Length::Fill),
            row![
                slider(0.0..=1.0, self.compare_split, Message::CompareSplitChanged).step(0.01),
                button(text("Close").size(13)).on_press(Message::CloseCompare).padding(6),
            ]
            .spacing(8)
            .align_y(Alignment::Center),
        ]
        .spacing(8)
        .into()
    }

    /// Listen for window resizes to keep render metrics fresh.
    fn subscription(&self) -> Subscription<Message> {
        iced::event::listen_with(|event, _status, _window| match event {
            iced::Event::Window(iced::window::Event::Resized(size)) => {
                Some(Message::WindowResized(size))
            }
            _ => None,
        })
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Neutral placeholder for missing or redacted inspector content.
fn centered_note<'a>(note: &'a str) -> Element<'a, Message> {
    container(text(note).size(16))
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}

/// Load a history snapshot from disk (the external store's hand-off
/// format). Failures degrade to an empty history, never a crash.
async fn load_history(path: String) -> Vec<HistoryEntry> {
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                eprintln!("⚠️  Failed to parse history snapshot: {}", e);
                Vec::new()
            }
        },
        Err(e) => {
            eprintln!("⚠️  Failed to read history snapshot: {}", e);
            Vec::new()
        }
    }
}

/// Read an image's dimensions without decoding the pixel data.
/// Runs on the blocking pool because header parsing still touches disk.
async fn probe_dimensions(path: String) -> Option<(u32, u32)> {
    tokio::task::spawn_blocking(move || image::image_dimensions(&path).ok())
        .await
        .unwrap_or(None)
}

fn main() -> iced::Result {
    iced::application("Capture Gallery", Gallery::update, Gallery::view)
        .subscription(Gallery::subscription)
        .theme(Gallery::theme)
        .centered()
        .run_with(Gallery::new)
}
