/// Date-grouped tile grid
///
/// Builds the gallery grid from the curated view: one section per local
/// calendar day, tiles wrapped responsively. Tiles consult the redaction
/// policy for their blur state and the selection state for their
/// selected marker. Visual chrome is intentionally minimal; styling is
/// the presentation layer's concern.

use iced::widget::{button, column, container, row, text, Column};
use iced::{Alignment, Element, Length};
use iced_aw::Wrap;

use super::ImageResolver;
use crate::moderation::{decide, SafetyLevel, Severity};
use crate::state::{CuratedEntry, CuratedView, DateGroup, InteractionMode, SelectionState};
use crate::Message;

/// Tile edge length in logical pixels
const TILE_SIZE: f32 = 160.0;

/// Render the full grid: date sections stacked vertically.
pub fn history_grid<'a>(
    view: &'a CuratedView,
    selection: &'a SelectionState,
    safety_level: SafetyLevel,
    selective_ambiguity: bool,
    resolver: &dyn ImageResolver,
) -> Element<'a, Message> {
    if view.is_empty() {
        return container(text("No captures to show").size(18))
            .width(Length::Fill)
            .center_x(Length::Fill)
            .padding(40)
            .into();
    }

    let mut sections: Column<Message> = column![].spacing(24);
    for group in &view.groups {
        sections = sections.push(date_section(
            group,
            selection,
            safety_level,
            selective_ambiguity,
            resolver,
        ));
    }
    sections.into()
}

/// One local-day section: header plus a wrapping row of tiles.
fn date_section<'a>(
    group: &'a DateGroup,
    selection: &'a SelectionState,
    safety_level: SafetyLevel,
    selective_ambiguity: bool,
    resolver: &dyn ImageResolver,
) -> Element<'a, Message> {
    let header = row![
        text(&group.label).size(16),
        text(format!("({})", group.items.len())).size(13),
    ]
    .spacing(8)
    .align_y(Alignment::Center);

    let tiles: Vec<Element<'a, Message>> = group
        .items
        .iter()
        .map(|entry| tile(entry, selection, safety_level, selective_ambiguity, resolver))
        .collect();

    column![
        header,
        Wrap::with_elements(tiles).spacing(10.0).line_spacing(10.0),
    ]
    .spacing(10)
    .into()
}

/// One clickable tile.
fn tile<'a>(
    entry: &'a CuratedEntry,
    selection: &'a SelectionState,
    safety_level: SafetyLevel,
    selective_ambiguity: bool,
    resolver: &dyn ImageResolver,
) -> Element<'a, Message> {
    let decision = decide(safety_level, selective_ambiguity, entry.moderation.as_ref());

    let preview: Element<'a, Message> = match resolver.thumbnail(&entry.entry) {
        // A blurred thumbnail shows a neutral cover instead of content.
        Some(_) if decision.blur_thumbnail => placeholder("🔒"),
        Some(handle) => iced::widget::image(handle)
            .width(Length::Fixed(TILE_SIZE))
            .height(Length::Fixed(TILE_SIZE))
            .into(),
        None => placeholder("No preview"),
    };

    let marker = match selection.mode() {
        InteractionMode::Browse => String::new(),
        _ if selection.is_selected(&entry.entry.prompt_id) => "✓".to_string(),
        _ => "·".to_string(),
    };

    let footer = row![
        text(severity_tag(entry.severity(), entry.moderation.is_some())).size(12),
        text(marker).size(12),
    ]
    .spacing(6);

    button(column![preview, footer].spacing(4).align_x(Alignment::Center))
        .on_press(Message::TileClicked(entry.entry.prompt_id.clone()))
        .padding(4)
        .into()
}

/// Neutral square shown for missing or covered images.
fn placeholder<'a>(label: &'a str) -> Element<'a, Message> {
    container(text(label).size(14))
        .center_x(Length::Fixed(TILE_SIZE))
        .center_y(Length::Fixed(TILE_SIZE))
        .into()
}

/// Short severity tag for the tile footer.
fn severity_tag(severity: Severity, scored: bool) -> &'static str {
    if !scored {
        return "awaiting";
    }
    match severity {
        Severity::None => "safe",
        Severity::Mild => "mild",
        Severity::Sensitive => "sensitive",
    }
}
