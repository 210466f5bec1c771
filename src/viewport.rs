use super::*;

pub(crate) const DEFAULT_VIEWPORT_HEIGHT_PX: i64 = 768;
pub(crate) const FADE_IN_VISIBLE_THRESHOLD: f64 = 0.1;
pub(crate) const FADE_IN_BOTTOM_MARGIN_PX: i64 = 50;

/// Current scroll window over the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Viewport {
    pub(crate) scroll_y: i64,
    pub(crate) height: i64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scroll_y: 0,
            height: DEFAULT_VIEWPORT_HEIGHT_PX,
        }
    }
}

/// What an observer does to a target once it intersects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObserverReaction {
    RevealFadeIn,
    LazyLoadImage,
}

/// Deterministic stand-in for a visibility observer: a target set, an
/// intersection threshold, and a single reaction applied when a target's
/// visible fraction reaches the threshold.
#[derive(Debug)]
pub(crate) struct ViewportObserver {
    pub(crate) threshold: f64,
    // Positive values pull the viewport's bottom edge up, excluding a band
    // from intersection checks.
    pub(crate) bottom_margin_px: i64,
    pub(crate) reaction: ObserverReaction,
    pub(crate) targets: Vec<NodeId>,
}

impl ViewportObserver {
    pub(crate) fn fade_in(targets: Vec<NodeId>) -> Self {
        Self {
            threshold: FADE_IN_VISIBLE_THRESHOLD,
            bottom_margin_px: FADE_IN_BOTTOM_MARGIN_PX,
            reaction: ObserverReaction::RevealFadeIn,
            targets,
        }
    }

    pub(crate) fn lazy_images(targets: Vec<NodeId>) -> Self {
        Self {
            threshold: 0.0,
            bottom_margin_px: 0,
            reaction: ObserverReaction::LazyLoadImage,
            targets,
        }
    }
}

/// Fraction of an element (at `top`, `height` px) inside the viewport after
/// excluding `bottom_margin_px` from the bottom edge. Zero-height elements
/// count as fully visible while their top edge is inside the window.
pub(crate) fn visible_fraction(
    top: i64,
    height: i64,
    viewport: Viewport,
    bottom_margin_px: i64,
) -> f64 {
    let view_start = viewport.scroll_y;
    let view_end = viewport
        .scroll_y
        .saturating_add(viewport.height)
        .saturating_sub(bottom_margin_px);
    if view_end <= view_start {
        return 0.0;
    }

    if height <= 0 {
        if top >= view_start && top <= view_end {
            return 1.0;
        }
        return 0.0;
    }

    let overlap = (top + height).min(view_end) - top.max(view_start);
    if overlap <= 0 {
        0.0
    } else {
        overlap as f64 / height as f64
    }
}

/// Whether `fraction` satisfies an observer threshold: any visibility for a
/// zero threshold, at least the threshold otherwise.
pub(crate) fn meets_threshold(fraction: f64, threshold: f64) -> bool {
    if threshold <= 0.0 {
        fraction > 0.0
    } else {
        fraction >= threshold
    }
}
