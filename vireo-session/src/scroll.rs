use std::sync::Arc;
use std::time::Duration;

use log::trace;
use tokio_util::sync::CancellationToken;

use crate::sync::Debouncer;

/// Geometry of one transcript row relative to its own scroll container.
///
/// All values are in the container's coordinate space: `element_top` is
/// measured from the top of the scrollable content, not the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub content_height: f64,
    pub element_top: f64,
    pub element_height: f64,
}

/// New `scroll_top` for the container, or `None` when the element is
/// already fully visible.
///
/// A partially visible element moves by the minimal offset that brings it
/// fully into view; one entirely outside the window is centered. Both are
/// clamped to the container's scroll range.
pub fn scroll_target(metrics: &ScrollMetrics) -> Option<f64> {
    let ScrollMetrics {
        scroll_top,
        viewport_height,
        content_height,
        element_top,
        element_height,
    } = *metrics;

    let visible_bottom = scroll_top + viewport_height;
    let element_bottom = element_top + element_height;
    if element_top >= scroll_top && element_bottom <= visible_bottom {
        return None;
    }

    let outside = element_bottom <= scroll_top || element_top >= visible_bottom;
    let wanted = if outside {
        element_top + element_height / 2.0 - viewport_height / 2.0
    } else if element_top < scroll_top || element_height > viewport_height {
        element_top
    } else {
        element_bottom - viewport_height
    };

    let max_scroll = (content_height - viewport_height).max(0.0);
    let target = wanted.clamp(0.0, max_scroll);

    ((target - scroll_top).abs() > f64::EPSILON).then_some(target)
}

/// View-side hooks for the transcript list.
pub trait SegmentScroller: Send + Sync {
    /// Current geometry of the row at `segment_index`, if it is laid out.
    fn metrics(&self, segment_index: usize) -> Option<ScrollMetrics>;

    /// Set the container's scroll offset.
    fn scroll_to(&self, scroll_top: f64);
}

/// Scrolls the active row into view once layout has settled.
///
/// Only the latest change scrolls; earlier pending adjustments are dropped.
pub struct ScrollScheduler {
    scroller: Arc<dyn SegmentScroller>,
    debouncer: Debouncer,
}

impl std::fmt::Debug for ScrollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollScheduler")
            .field("debouncer", &self.debouncer)
            .finish()
    }
}

impl ScrollScheduler {
    pub fn new(
        scroller: Arc<dyn SegmentScroller>,
        settle: Duration,
        cancel: &CancellationToken,
    ) -> Self {
        Self {
            scroller,
            debouncer: Debouncer::new(settle, cancel),
        }
    }

    pub fn request(&self, segment_index: usize) {
        let scroller = Arc::clone(&self.scroller);
        self.debouncer.schedule(async move {
            let Some(metrics) = scroller.metrics(segment_index) else {
                return;
            };
            if let Some(target) = scroll_target(&metrics) {
                trace!("[Scroll] Segment {} -> scroll_top {:.1}", segment_index, target);
                scroller.scroll_to(target);
            }
        });
    }

    pub fn cancel(&self) {
        self.debouncer.shutdown();
    }
}
