/// UI module
///
/// View helpers for the gallery. This module handles:
/// - Resolving entry image references into renderable handles (the
///   external image-resolver seam)
/// - The date-grouped tile grid (grid.rs)
/// - Overlay geometry mapping and the region-mask canvas (overlay.rs)

pub mod grid;
pub mod overlay;

use iced::widget::image::Handle;
use std::path::Path;

use crate::state::HistoryEntry;

/// External image resolver seam.
///
/// Implementations turn an entry's opaque image reference into
/// renderable sources. `None` means "no image available": the gallery
/// shows a neutral placeholder and never renders a redaction verdict
/// over content that does not exist.
pub trait ImageResolver {
    /// Thumbnail-sized source for the grid.
    fn thumbnail(&self, entry: &HistoryEntry) -> Option<Handle>;

    /// Full-resolution source for the inspector.
    fn full(&self, entry: &HistoryEntry) -> Option<Handle>;
}

/// Resolver that treats image references as filesystem paths.
#[derive(Debug, Default)]
pub struct FileResolver;

impl ImageResolver for FileResolver {
    fn thumbnail(&self, entry: &HistoryEntry) -> Option<Handle> {
        self.full(entry)
    }

    fn full(&self, entry: &HistoryEntry) -> Option<Handle> {
        let path = entry.image_path.as_deref()?;
        if !Path::new(path).exists() {
            return None;
        }
        Some(Handle::from_path(path))
    }
}
