/// Overlay geometry mapper
///
/// Projects detector bounding boxes onto the on-screen rendering of the
/// source image. The image is drawn contain-fit inside its container
/// (aspect preserved, letterboxed), so projection needs the rendered
/// dimensions and letterbox offsets. All of this is pure math: the same
/// inputs always produce the same placement, and recomputing on every
/// resize is safe.

use iced::mouse::Cursor;
use iced::widget::canvas::{self, Program};
use iced::{Color, Point, Rectangle, Renderer, Size, Theme};

use crate::moderation::{BoxUnit, Detection, DetectionRect};
use crate::Message;

/// Rendered geometry of the image inside its container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderMetrics {
    pub render_width: f32,
    pub render_height: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl RenderMetrics {
    /// Contain-fit an image of `natural` pixel size into `container`,
    /// preserving aspect ratio and centering the letterbox.
    pub fn fit(container: Size, natural: Size) -> Option<Self> {
        if natural.width <= 0.0 || natural.height <= 0.0 {
            return None;
        }
        if container.width <= 0.0 || container.height <= 0.0 {
            // Layout has not been measured yet.
            return None;
        }
        let scale = (container.width / natural.width).min(container.height / natural.height);
        let render_width = natural.width * scale;
        let render_height = natural.height * scale;
        Some(Self {
            render_width,
            render_height,
            offset_x: (container.width - render_width) / 2.0,
            offset_y: (container.height - render_height) / 2.0,
        })
    }
}

/// Container-relative placement of one overlay box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayPlacement {
    /// Absolute placement in container pixels
    Pixels {
        left: f32,
        top: f32,
        width: f32,
        height: f32,
    },
    /// Percentage placement for the first paint, before layout has been
    /// measured (values in [0, 100] of the container)
    Percent {
        left: f32,
        top: f32,
        width: f32,
        height: f32,
    },
}

/// Reduce a detection rect to normalized [0, 1] coordinates.
///
/// Pixel-unit rects are divided by the natural image dimensions; a
/// missing or degenerate natural size yields a zero rect rather than NaN.
pub fn normalize_rect(rect: &DetectionRect, natural: Option<Size>) -> (f32, f32, f32, f32) {
    match rect.unit {
        BoxUnit::Normalized => (rect.x, rect.y, rect.width, rect.height),
        BoxUnit::Pixel => match natural {
            Some(n) if n.width > 0.0 && n.height > 0.0 => (
                rect.x / n.width,
                rect.y / n.height,
                rect.width / n.width,
                rect.height / n.height,
            ),
            _ => (0.0, 0.0, 0.0, 0.0),
        },
    }
}

/// Project one detection rect into the container.
///
/// Falls back to percentage placement when no render metrics are
/// available yet (graceful first-paint degradation).
pub fn project(
    rect: &DetectionRect,
    metrics: Option<&RenderMetrics>,
    natural: Option<Size>,
) -> OverlayPlacement {
    let (x, y, w, h) = normalize_rect(rect, natural);
    match metrics {
        Some(m) => OverlayPlacement::Pixels {
            left: m.offset_x + x * m.render_width,
            top: m.offset_y + y * m.render_height,
            width: w * m.render_width,
            height: h * m.render_height,
        },
        None => OverlayPlacement::Percent {
            left: x * 100.0,
            top: y * 100.0,
            width: w * 100.0,
            height: h * 100.0,
        },
    }
}

/// Canvas layer that masks the given detections over the inspector image.
pub struct OverlayLayer {
    /// Regions to mask, already filtered by the redaction policy
    pub boxes: Vec<Detection>,
    /// Natural pixel size of the source image, once known
    pub natural: Option<Size>,
    /// Metrics cached by the shell from resize notifications, used only
    /// while the canvas has no measured bounds of its own
    pub metrics: Option<RenderMetrics>,
}

impl OverlayLayer {
    /// Geometry for the given container. The live container is the
    /// ground truth; the shell's cached metrics are an estimate and only
    /// cover the frame before layout has been measured.
    fn resolve_metrics(&self, container: Size) -> Option<RenderMetrics> {
        self.natural
            .and_then(|natural| RenderMetrics::fit(container, natural))
            .or(self.metrics)
    }
}

impl Program<Message> for OverlayLayer {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        let metrics = self.resolve_metrics(bounds.size());

        for detection in &self.boxes {
            let placement = project(&detection.rect, metrics.as_ref(), self.natural);
            let (left, top, width, height) = match placement {
                OverlayPlacement::Pixels {
                    left,
                    top,
                    width,
                    height,
                } => (left, top, width, height),
                OverlayPlacement::Percent {
                    left,
                    top,
                    width,
                    height,
                } => (
                    left / 100.0 * bounds.width,
                    top / 100.0 * bounds.height,
                    width / 100.0 * bounds.width,
                    height / 100.0 * bounds.height,
                ),
            };

            frame.fill_rectangle(
                Point::new(left, top),
                Size::new(width, height),
                Color::from_rgba(0.05, 0.05, 0.08, 0.96),
            );
        }

        vec![frame.into_geometry()]
    }
}
