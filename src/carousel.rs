use super::*;

pub(crate) const PROJECTS_INTERVAL_MS: i64 = 5000;
pub(crate) const NEWS_INTERVAL_MS: i64 = 6000;

/// Which of the page's two carousels is meant. Each runs with fully
/// independent state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CarouselKind {
    Projects,
    News,
}

impl CarouselKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Projects => "Projects",
            Self::News => "News",
        }
    }

    pub(crate) fn wiring(self) -> CarouselWiring {
        match self {
            Self::Projects => CarouselWiring {
                kind: self,
                container_id: "carousel",
                slide_class: "project-slide",
                indicator_class: "indicator",
                interval_ms: PROJECTS_INTERVAL_MS,
                missing_container_warning: "projects carousel element not found",
            },
            Self::News => CarouselWiring {
                kind: self,
                container_id: "newsCarousel",
                slide_class: "news-slide",
                indicator_class: "news-indicator",
                interval_ms: NEWS_INTERVAL_MS,
                missing_container_warning: "news carousel element not found",
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct CarouselWiring {
    pub(crate) kind: CarouselKind,
    pub(crate) container_id: &'static str,
    pub(crate) slide_class: &'static str,
    pub(crate) indicator_class: &'static str,
    pub(crate) interval_ms: i64,
    pub(crate) missing_container_warning: &'static str,
}

/// One carousel instance: an ordered set of slides, the indicator row that
/// mirrors the current position, and the container whose transform encodes
/// it. Collections are fixed at capture time.
#[derive(Debug)]
pub(crate) struct Carousel {
    pub(crate) kind: CarouselKind,
    pub(crate) container: Option<NodeId>,
    pub(crate) slides: Vec<NodeId>,
    pub(crate) indicators: Vec<NodeId>,
    pub(crate) current_index: usize,
    pub(crate) interval_ms: i64,
}

impl Carousel {
    pub(crate) fn capture(dom: &Dom, wiring: &CarouselWiring) -> Self {
        Self {
            kind: wiring.kind,
            container: dom.by_id(wiring.container_id),
            slides: dom.elements_with_class(wiring.slide_class),
            indicators: dom.elements_with_class(wiring.indicator_class),
            current_index: 0,
            interval_ms: wiring.interval_ms,
        }
    }

    pub(crate) fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Index after moving `direction` steps (+1 forward, -1 backward) with
    /// wraparound in both directions. `None` when there are no slides.
    pub(crate) fn stepped_index(&self, direction: i64) -> Option<usize> {
        if self.slides.is_empty() {
            None
        } else {
            Some(step_index(self.current_index, direction, self.slides.len()))
        }
    }
}

pub(crate) fn step_index(current: usize, direction: i64, len: usize) -> usize {
    debug_assert!(len >= 1);
    (current as i64 + direction).rem_euclid(len as i64) as usize
}
