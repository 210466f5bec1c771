use page_harness::{CarouselKind, Page, RateLimit, Result, ScrollRequest};

const LANDING_PAGE_HTML: &str = r##"
<!DOCTYPE html>
<html>
<head>
  <title>Davicenne Studio</title>
</head>
<body>
  <header id="header" class="header" data-offset-height="72">
    <div id="menuToggle" class="menu-toggle"><span></span><span></span><span></span></div>
    <nav id="navMenu" class="nav-menu">
      <a id="projects-link" href="#projects">Projects</a>
      <a id="news-link" href="#news">News</a>
      <a id="contact-link" href="#contact">Contact</a>
    </nav>
  </header>
  <main>
    <section id="hero" class="fade-in" data-offset-top="0" data-offset-height="600">
      <button id="hero-cta" onclick="trackEvent('hero_cta')">See our work</button>
    </section>
    <section id="projects" class="fade-in" data-offset-top="900" data-offset-height="700">
      <div id="carousel">
        <div class="project-slide">Atrium</div>
        <div class="project-slide">Riverside</div>
        <div class="project-slide">Loft 27</div>
      </div>
      <button id="projects-prev" class="carousel-btn" onclick="previousSlide()">Prev</button>
      <button id="projects-next" class="carousel-btn" onclick="nextSlide()">Next</button>
      <span class="indicator" id="projects-dot-1" onclick="currentSlide(1)"></span>
      <span class="indicator" id="projects-dot-2" onclick="currentSlide(2)"></span>
      <span class="indicator" id="projects-dot-3" onclick="currentSlide(3)"></span>
    </section>
    <section id="news" class="fade-in" data-offset-top="1800" data-offset-height="500">
      <div id="newsCarousel">
        <div class="news-slide">Award</div>
        <div class="news-slide">Expansion</div>
      </div>
      <button id="news-next" class="news-btn" onclick="nextNewsSlide()">Next</button>
      <span class="news-indicator" id="news-dot-1" onclick="currentNewsSlide(1)"></span>
      <span class="news-indicator" id="news-dot-2" onclick="currentNewsSlide(2)"></span>
      <img id="news-photo" class="lazy" data-src="/img/news.jpg"
           data-offset-top="2100" data-offset-height="240">
    </section>
    <section id="contact" class="fade-in" data-offset-top="2600" data-offset-height="400">
      <input id="email" type="text">
      <button id="send">Send</button>
    </section>
  </main>
</body>
</html>
"##;

#[test]
fn full_page_boot_wires_everything_without_warnings() -> Result<()> {
    let page = Page::from_html(LANDING_PAGE_HTML)?;

    assert!(page.warnings().is_empty(), "warnings: {:?}", page.warnings());

    let pending = page.pending_timers();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].due_at, 5000);
    assert_eq!(pending[1].due_at, 6000);

    assert_eq!(page.carousel_slide_count(CarouselKind::Projects), 3);
    assert_eq!(page.carousel_slide_count(CarouselKind::News), 2);

    // Above the fold reveals immediately; the rest waits for scrolling.
    page.assert_has_class("#hero", "visible")?;
    page.assert_not_has_class("#projects", "visible")?;
    assert!(page.assert_attr("#news-photo", "src", "/img/news.jpg").is_err());
    Ok(())
}

#[test]
fn menu_navigation_closes_the_menu_and_scrolls_below_the_header() -> Result<()> {
    let mut page = Page::from_html(LANDING_PAGE_HTML)?;

    page.click("#menuToggle")?;
    page.assert_has_class("#navMenu", "active")?;
    page.click("#menuToggle")?;
    page.assert_not_has_class("#navMenu", "active")?;

    page.click("#menuToggle")?;
    page.click("#contact-link")?;
    page.assert_not_has_class("#navMenu", "active")?;
    page.assert_not_has_class("#menuToggle", "active")?;

    assert_eq!(
        page.scroll_requests(),
        &[ScrollRequest {
            top: 2528,
            smooth: true
        }]
    );
    assert_eq!(page.scroll_y(), 2528);
    page.assert_has_class("#header", "scrolled")?;
    page.assert_has_class("#contact", "visible")?;
    // The news photo sits above the landing position and stays unloaded.
    assert!(page.assert_attr("#news-photo", "src", "/img/news.jpg").is_err());
    Ok(())
}

#[test]
fn scroll_journey_reveals_sections_and_loads_images() -> Result<()> {
    let mut page = Page::from_html(LANDING_PAGE_HTML)?;

    page.scroll_to(400)?;
    page.assert_has_class("#projects", "visible")?;
    page.assert_not_has_class("#news", "visible")?;

    page.scroll_to(1500)?;
    page.assert_has_class("#news", "visible")?;
    page.assert_attr("#news-photo", "src", "/img/news.jpg")?;
    page.assert_not_has_class("#news-photo", "lazy")?;

    // Reveals are permanent once earned.
    page.scroll_to(0)?;
    page.assert_has_class("#projects", "visible")?;
    page.assert_has_class("#news", "visible")?;
    Ok(())
}

#[test]
fn taller_viewport_reveals_more_without_scrolling() -> Result<()> {
    let mut page = Page::from_html(LANDING_PAGE_HTML)?;
    page.assert_not_has_class("#projects", "visible")?;
    page.set_viewport_height(2000)?;
    assert_eq!(page.viewport_height(), 2000);
    page.assert_has_class("#projects", "visible")?;
    Ok(())
}

#[test]
fn timer_and_manual_navigation_interleave_with_last_call_winning() -> Result<()> {
    let mut page = Page::from_html(LANDING_PAGE_HTML)?;

    page.advance_time(5000)?;
    assert_eq!(page.carousel_index(CarouselKind::Projects), 1);
    assert_eq!(page.carousel_index(CarouselKind::News), 0);

    page.click("#projects-dot-1")?;
    assert_eq!(page.carousel_index(CarouselKind::Projects), 0);

    page.advance_time(5000)?;
    assert_eq!(page.carousel_index(CarouselKind::Projects), 1);
    assert_eq!(page.carousel_index(CarouselKind::News), 1);

    page.click("#projects-next")?;
    assert_eq!(page.carousel_index(CarouselKind::Projects), 2);
    page.click("#projects-next")?;
    assert_eq!(page.carousel_index(CarouselKind::Projects), 0);
    page.click("#projects-prev")?;
    assert_eq!(page.carousel_index(CarouselKind::Projects), 2);

    page.assert_has_class("#projects-dot-3", "active")?;
    page.assert_not_has_class("#projects-dot-1", "active")?;
    page.assert_attr("#carousel", "style", "transform: translateX(-200%)")?;
    Ok(())
}

#[test]
fn keyboard_access_tabs_and_arrows_through_the_page() -> Result<()> {
    let mut page = Page::from_html(LANDING_PAGE_HTML)?;

    page.press_key("Tab")?;
    page.assert_focused("#projects-link")?;
    page.press_key("Shift+Tab")?;
    page.assert_focused("#send")?;
    page.press_key("Tab")?;
    page.assert_focused("#projects-link")?;

    page.focus("#news-next")?;
    page.press_key("ArrowRight")?;
    assert_eq!(page.carousel_index(CarouselKind::News), 1);
    page.press_key("ArrowLeft")?;
    assert_eq!(page.carousel_index(CarouselKind::News), 0);
    assert_eq!(page.carousel_index(CarouselKind::Projects), 0);
    Ok(())
}

#[test]
fn inline_controls_drive_both_carousels_and_tracking() -> Result<()> {
    let mut page = Page::from_html(LANDING_PAGE_HTML)?;

    page.click("#projects-dot-2")?;
    assert_eq!(page.carousel_index(CarouselKind::Projects), 1);
    page.assert_has_class("#projects-dot-2", "active")?;

    page.click("#news-dot-2")?;
    assert_eq!(page.carousel_index(CarouselKind::News), 1);
    page.assert_has_class("#news-dot-2", "active")?;
    assert_eq!(page.carousel_index(CarouselKind::Projects), 1);

    page.click("#hero-cta")?;
    assert_eq!(page.tracked_events().len(), 1);
    assert_eq!(page.tracked_events()[0].name, "hero_cta");
    Ok(())
}

#[test]
fn debounced_scrolling_settles_on_the_final_position() -> Result<()> {
    let mut page = Page::from_html(LANDING_PAGE_HTML)?;
    page.set_scroll_rate_limit(RateLimit::Debounce(120));

    page.scroll_to(300)?;
    page.scroll_to(1500)?;
    page.assert_not_has_class("#header", "scrolled")?;
    page.assert_not_has_class("#news", "visible")?;

    page.advance_time(120)?;
    page.assert_has_class("#header", "scrolled")?;
    page.assert_has_class("#news", "visible")?;
    page.assert_attr("#news-photo", "src", "/img/news.jpg")?;
    Ok(())
}

#[test]
fn step_limit_guards_runaway_timer_queues() -> Result<()> {
    let mut page = Page::from_html(LANDING_PAGE_HTML)?;
    assert!(page.set_timer_step_limit(0).is_err());
    page.set_timer_step_limit(2)?;
    // Two carousel intervals over a minute need far more than two steps.
    assert!(page.advance_time(60_000).is_err());
    Ok(())
}

#[test]
fn preloaded_assets_join_the_existing_head() -> Result<()> {
    let mut page = Page::from_html(LANDING_PAGE_HTML)?;
    page.preload_assets(&["/img/hero.webp"])?;
    let head = page.dump_dom("head")?;
    assert!(head.contains("<title>Davicenne Studio</title>"));
    assert!(head.contains(r#"<link as="image" href="/img/hero.webp" rel="preload">"#));
    Ok(())
}
