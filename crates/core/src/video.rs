//! Rendering sink for provider-decoded video.
//!
//! [`VideoWidget`] is what a host UI embeds: the provider paints frames into
//! it through [`VideoWidgetContext`], the UI sets the surface size and pulls a
//! letterboxed, aspect-preserving frame out with [`VideoWidget::render`].

use std::sync::Arc;

use image::RgbaImage;
use image::imageops::{self, FilterType};
use parking_lot::Mutex;

use crate::listeners::{Listeners, Subscription};
use crate::provider::{PSize, VideoWidgetContext};
use crate::types::Size;

/// A frame ready to be drawn at `(x, y)` on the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFrame {
    pub x: u32,
    pub y: u32,
    pub image: RgbaImage,
}

#[derive(Clone)]
pub struct VideoWidget {
    shared: Arc<WidgetShared>,
}

struct WidgetShared {
    surface: Mutex<Size>,
    current: Mutex<Option<RgbaImage>>,
    repaint: Listeners<Size>,
}

impl VideoWidget {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(WidgetShared {
                surface: Mutex::new(Size::default()),
                current: Mutex::new(None),
                repaint: Listeners::new(),
            }),
        }
    }

    /// Set the size of the drawing surface. The provider reads it back as its
    /// desired frame size.
    pub fn resize(&self, size: Size) {
        *self.shared.surface.lock() = size;
    }

    pub fn surface_size(&self) -> Size {
        *self.shared.surface.lock()
    }

    /// Size of the last frame received, if any.
    pub fn size_hint(&self) -> Option<Size> {
        self.shared
            .current
            .lock()
            .as_ref()
            .map(|frame| Size::new(frame.width(), frame.height()))
    }

    /// Called (on the provider's thread) whenever a new frame arrives, with
    /// the frame's size. Hosts use it to schedule a repaint on their UI thread.
    pub fn on_frame(&self, callback: impl Fn(Size) + Send + Sync + 'static) -> Subscription {
        let id = self.shared.repaint.add(move |size| callback(*size));
        let weak = Arc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.repaint.remove(id);
            }
        })
    }

    /// The last frame, scaled to fit the surface with its aspect ratio kept and
    /// centred along the axis with spare room.
    ///
    /// `None` before the first frame or while the surface is empty.
    pub fn render(&self) -> Option<RenderedFrame> {
        let surface = self.surface_size();
        if surface.is_empty() {
            return None;
        }
        let current = self.shared.current.lock();
        let frame = current.as_ref()?;
        let target = fit_within(Size::new(frame.width(), frame.height()), surface);
        if target.is_empty() {
            return None;
        }

        let (mut x, mut y) = (0, 0);
        if target.width < surface.width {
            x = (surface.width - target.width) / 2;
        } else if target.height < surface.height {
            y = (surface.height - target.height) / 2;
        }

        let image = if frame.dimensions() == (target.width, target.height) {
            frame.clone()
        } else {
            imageops::resize(frame, target.width, target.height, FilterType::Triangle)
        };
        Some(RenderedFrame { x, y, image })
    }

    /// The handle handed to providers.
    pub fn context(&self) -> Arc<dyn VideoWidgetContext> {
        self.shared.clone()
    }
}

impl Default for VideoWidget {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VideoWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoWidget")
            .field("surface", &self.surface_size())
            .field("frame", &self.size_hint())
            .finish()
    }
}

impl VideoWidgetContext for WidgetShared {
    fn desired_size(&self) -> PSize {
        PSize::from(&*self.surface.lock())
    }

    fn show_frame(&self, frame: RgbaImage) {
        let size = Size::new(frame.width(), frame.height());
        *self.current.lock() = Some(frame);
        tracing::trace!(width = size.width, height = size.height, "video frame received");
        self.repaint.emit(&size);
    }
}

/// Largest size with `frame`'s aspect ratio that fits in `bounds`.
fn fit_within(frame: Size, bounds: Size) -> Size {
    if frame.is_empty() {
        return Size::default();
    }
    let (fw, fh) = (u64::from(frame.width), u64::from(frame.height));
    let (bw, bh) = (u64::from(bounds.width), u64::from(bounds.height));

    let width_at_full_height = bh * fw / fh;
    if width_at_full_height <= bw {
        Size::new(width_at_full_height as u32, bounds.height)
    } else {
        Size::new(bounds.width, (bw * fh / fw) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn solid(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 255]))
    }

    #[test]
    fn fit_keeps_aspect_ratio() {
        assert_eq!(fit_within(Size::new(320, 240), Size::new(640, 480)), Size::new(640, 480));
        assert_eq!(fit_within(Size::new(320, 240), Size::new(800, 480)), Size::new(640, 480));
        assert_eq!(fit_within(Size::new(320, 240), Size::new(640, 600)), Size::new(640, 480));
        assert_eq!(fit_within(Size::new(0, 240), Size::new(640, 600)), Size::default());
    }

    #[test]
    fn nothing_to_render_without_frame_or_surface() {
        let widget = VideoWidget::new();
        assert!(widget.render().is_none());
        assert!(widget.size_hint().is_none());

        widget.context().show_frame(solid(4, 4));
        assert!(widget.render().is_none());
        assert_eq!(widget.size_hint(), Some(Size::new(4, 4)));
    }

    #[test]
    fn desired_size_follows_resize() {
        let widget = VideoWidget::new();
        widget.resize(Size::new(320, 240));
        assert_eq!(widget.context().desired_size(), PSize { width: 320, height: 240 });
    }

    #[test]
    fn wide_surface_gets_horizontal_offset() {
        let widget = VideoWidget::new();
        widget.resize(Size::new(800, 480));
        widget.context().show_frame(solid(320, 240));

        let rendered = widget.render().expect("frame");
        assert_eq!((rendered.x, rendered.y), (80, 0));
        assert_eq!(rendered.image.dimensions(), (640, 480));
    }

    #[test]
    fn tall_surface_gets_vertical_offset() {
        let widget = VideoWidget::new();
        widget.resize(Size::new(320, 400));
        widget.context().show_frame(solid(320, 240));

        let rendered = widget.render().expect("frame");
        assert_eq!((rendered.x, rendered.y), (0, 80));
        // Already the right size: passed through untouched.
        assert_eq!(rendered.image, solid(320, 240));
    }

    #[test]
    fn frame_notification_carries_size() {
        let widget = VideoWidget::new();
        let area = Arc::new(AtomicUsize::new(0));
        let a = area.clone();
        let sub = widget.on_frame(move |size| {
            a.store((size.width * size.height) as usize, Ordering::SeqCst);
        });

        widget.context().show_frame(solid(8, 2));
        assert_eq!(area.load(Ordering::SeqCst), 16);

        sub.unsubscribe();
        widget.context().show_frame(solid(4, 4));
        assert_eq!(area.load(Ordering::SeqCst), 16);
    }
}
