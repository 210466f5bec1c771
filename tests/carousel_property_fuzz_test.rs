use page_harness::{CarouselKind, Page};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::{FileFailurePersistence, TestCaseResult};

const CAROUSEL_PROPTEST_REGRESSION_FILE: &str =
    "tests/proptest-regressions/carousel_property_fuzz_test.txt";
const DEFAULT_CAROUSEL_PROPTEST_CASES: u32 = 128;

const AUTO_ADVANCE_INTERVAL_MS: i64 = 5000;

fn env_proptest_cases(var_name: &str, default_cases: u32) -> u32 {
    std::env::var(var_name)
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default_cases)
}

fn carousel_proptest_cases() -> u32 {
    env_proptest_cases(
        "PAGE_HARNESS_PROPTEST_CASES",
        DEFAULT_CAROUSEL_PROPTEST_CASES,
    )
}

fn carousel_html(slide_count: usize) -> String {
    let mut html = String::from(r#"<div id="carousel">"#);
    for i in 1..=slide_count {
        html.push_str(&format!(r#"<div class="project-slide" id="slide-{i}"></div>"#));
    }
    html.push_str("</div>");
    for i in 1..=slide_count {
        html.push_str(&format!(
            r#"<span class="indicator" id="dot-{i}" onclick="currentSlide({i})"></span>"#
        ));
    }
    html
}

fn boot_page(
    slide_count: usize,
) -> std::result::Result<Page, proptest::test_runner::TestCaseError> {
    Page::from_html(&carousel_html(slide_count))
        .map_err(|err| proptest::test_runner::TestCaseError::fail(format!("{err:?}")))
}

#[derive(Clone, Debug)]
enum CarouselAction {
    Next,
    Previous,
    Select(usize),
    AdvanceTime(i64),
}

fn action_strategy(slide_count: usize) -> impl Strategy<Value = CarouselAction> {
    prop_oneof![
        Just(CarouselAction::Next),
        Just(CarouselAction::Previous),
        (1..=slide_count).prop_map(CarouselAction::Select),
        (0i64..12_000).prop_map(CarouselAction::AdvanceTime),
    ]
}

/// Replays an action sequence against the page while tracking the expected
/// index with plain modular arithmetic and a shadow timer, then checks the
/// carousel state after every step.
fn run_actions(slide_count: usize, actions: &[CarouselAction]) -> TestCaseResult {
    let mut page = boot_page(slide_count)?;

    let mut expected = 0usize;
    let mut now = 0i64;
    let mut next_due = AUTO_ADVANCE_INTERVAL_MS;
    let mut shown = false;

    for action in actions {
        match action {
            CarouselAction::Next => {
                page.next_slide();
                expected = (expected + 1) % slide_count;
                shown = true;
            }
            CarouselAction::Previous => {
                page.previous_slide();
                expected = (expected + slide_count - 1) % slide_count;
                shown = true;
            }
            CarouselAction::Select(position) => {
                page.current_slide(*position);
                expected = position - 1;
                shown = true;
            }
            CarouselAction::AdvanceTime(delta_ms) => {
                page.advance_time(*delta_ms)
                    .map_err(|err| proptest::test_runner::TestCaseError::fail(format!("{err:?}")))?;
                now += delta_ms;
                while next_due <= now {
                    expected = (expected + 1) % slide_count;
                    next_due += AUTO_ADVANCE_INTERVAL_MS;
                    shown = true;
                }
            }
        }

        prop_assert_eq!(page.carousel_index(CarouselKind::Projects), expected);

        if shown {
            // Exactly one indicator is active, and it marks the current
            // slide.
            for i in 1..=slide_count {
                let selector = format!("#dot-{i}");
                if i == expected + 1 {
                    prop_assert!(page.assert_has_class(&selector, "active").is_ok());
                } else {
                    prop_assert!(page.assert_not_has_class(&selector, "active").is_ok());
                }
            }
        }
    }

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: carousel_proptest_cases(),
        failure_persistence: Some(Box::new(
            FileFailurePersistence::Direct(CAROUSEL_PROPTEST_REGRESSION_FILE),
        )),
        .. ProptestConfig::default()
    })]

    #[test]
    fn random_action_sequences_preserve_carousel_invariants(
        (slide_count, actions) in (1usize..=6).prop_flat_map(|slide_count| {
            (Just(slide_count), vec(action_strategy(slide_count), 0..40))
        })
    ) {
        run_actions(slide_count, &actions)?;
    }

    #[test]
    fn a_full_cycle_of_forward_advances_returns_to_the_start(
        (slide_count, start) in (1usize..=8).prop_flat_map(|slide_count| {
            (Just(slide_count), 0..slide_count)
        })
    ) {
        let mut page = boot_page(slide_count)?;
        page.current_slide(start + 1);
        prop_assert_eq!(page.carousel_index(CarouselKind::Projects), start);

        for _ in 0..slide_count {
            page.next_slide();
        }
        prop_assert_eq!(page.carousel_index(CarouselKind::Projects), start);
    }

    #[test]
    fn a_backward_advance_from_zero_wraps_to_the_last_slide(
        slide_count in 1usize..=8
    ) {
        let mut page = boot_page(slide_count)?;
        page.previous_slide();
        prop_assert_eq!(
            page.carousel_index(CarouselKind::Projects),
            slide_count - 1
        );
    }

    #[test]
    fn timer_firings_match_modular_arithmetic(
        (slide_count, delta_ms) in (1usize..=5).prop_flat_map(|slide_count| {
            (Just(slide_count), 0i64..30_000)
        })
    ) {
        let mut page = boot_page(slide_count)?;
        page.advance_time(delta_ms)
            .map_err(|err| proptest::test_runner::TestCaseError::fail(format!("{err:?}")))?;

        let firings = (delta_ms / AUTO_ADVANCE_INTERVAL_MS) as usize;
        prop_assert_eq!(
            page.carousel_index(CarouselKind::Projects),
            firings % slide_count
        );
    }
}
