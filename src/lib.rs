use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

mod carousel;
mod scheduler;
mod selector;
mod viewport;

pub use carousel::CarouselKind;
pub use scheduler::{PendingTimer, RateLimit};

use carousel::Carousel;
use scheduler::{ScheduledTask, Scheduler, TimerCallback};
use selector::{SelectorPart, chain_matches, parse_selector_groups};
use viewport::{ObserverReaction, Viewport, ViewportObserver, meets_threshold, visible_fraction};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    Runtime(String),
    SelectorNotFound(String),
    UnsupportedSelector(String),
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::Runtime(msg) => write!(f, "runtime error: {msg}"),
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::AssertionFailed {
                selector,
                expected,
                actual,
                dom_snippet,
            } => write!(
                f,
                "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
            ),
        }
    }
}

impl StdError for Error {}

const HEADER_SCROLL_THRESHOLD_PX: i64 = 100;
const ANCHOR_SELECTOR: &str = r##"a[href^="#"]"##;
const FADE_IN_SELECTOR: &str = ".fade-in";
const LAZY_IMAGE_SELECTOR: &str = "img[data-src]";
const FOCUSABLE_SELECTOR: &str = r#"a[href], button, textarea, input[type="text"], input[type="radio"], input[type="checkbox"], select"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) node_type: NodeType,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: HashMap<String, String>,
    pub(crate) offset_top: i64,
    pub(crate) offset_height: i64,
}

pub(crate) fn has_class(element: &Element, class_name: &str) -> bool {
    element
        .attrs
        .get("class")
        .map(|classes| classes.split_whitespace().any(|c| c == class_name))
        .unwrap_or(false)
}

fn class_tokens(class_attr: Option<&str>) -> Vec<String> {
    class_attr
        .map(|value| {
            value
                .split_whitespace()
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub(crate) struct Dom {
    nodes: Vec<Node>,
    pub(crate) root: NodeId,
    id_index: HashMap<String, NodeId>,
}

impl Dom {
    fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            id_index: HashMap::new(),
        }
    }

    fn create_node(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.0].children.push(id);
        }
        id
    }

    fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: HashMap<String, String>,
    ) -> NodeId {
        let offset_top = parse_px_attr(&attrs, "data-offset-top");
        let offset_height = parse_px_attr(&attrs, "data-offset-height");
        let element = Element {
            tag_name,
            attrs,
            offset_top,
            offset_height,
        };
        let id = self.create_node(Some(parent), NodeType::Element(element));
        if let Some(id_attr) = self
            .element(id)
            .and_then(|element| element.attrs.get("id").cloned())
        {
            self.id_index.insert(id_attr, id);
        }
        id
    }

    fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(Some(parent), NodeType::Text(text))
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&Element> {
        match &self.nodes[node_id.0].node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node_id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[node_id.0].node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|e| e.tag_name.as_str())
    }

    pub(crate) fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes[node_id.0].parent
    }

    pub(crate) fn parent_element(&self, node_id: NodeId) -> Option<NodeId> {
        let parent = self.parent(node_id)?;
        self.element(parent).map(|_| parent)
    }

    fn is_descendant_of(&self, node_id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.parent(node_id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    fn contains(&self, ancestor: NodeId, node_id: NodeId) -> bool {
        ancestor == node_id || self.is_descendant_of(node_id, ancestor)
    }

    pub(crate) fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    fn elements_preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if self.element(node).is_some() {
                out.push(node);
            }
            for child in self.nodes[node.0].children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    pub(crate) fn elements_with_class(&self, class_name: &str) -> Vec<NodeId> {
        self.elements_preorder()
            .into_iter()
            .filter(|node| {
                self.element(*node)
                    .is_some_and(|element| has_class(element, class_name))
            })
            .collect()
    }

    fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        let groups = parse_selector_groups(selector)?;
        if let Some(id) = id_only_group(&groups) {
            return Ok(self.by_id(id));
        }
        for node in self.elements_preorder() {
            if groups.iter().any(|chain| chain_matches(self, node, chain)) {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let groups = parse_selector_groups(selector)?;
        Ok(self
            .elements_preorder()
            .into_iter()
            .filter(|node| groups.iter().any(|chain| chain_matches(self, *node, chain)))
            .collect())
    }

    fn set_attr(&mut self, node_id: NodeId, key: &str, value: String) {
        if key == "id" {
            self.id_index.insert(value.clone(), node_id);
        }
        if let Some(element) = self.element_mut(node_id) {
            element.attrs.insert(key.to_string(), value);
        }
    }

    fn set_class_attr(&mut self, node_id: NodeId, tokens: Vec<String>) {
        if let Some(element) = self.element_mut(node_id) {
            if tokens.is_empty() {
                element.attrs.remove("class");
            } else {
                element.attrs.insert("class".to_string(), tokens.join(" "));
            }
        }
    }

    fn add_class(&mut self, node_id: NodeId, class_name: &str) {
        let Some(element) = self.element(node_id) else {
            return;
        };
        let mut tokens = class_tokens(element.attrs.get("class").map(String::as_str));
        if !tokens.iter().any(|token| token == class_name) {
            tokens.push(class_name.to_string());
        }
        self.set_class_attr(node_id, tokens);
    }

    fn remove_class(&mut self, node_id: NodeId, class_name: &str) {
        let Some(element) = self.element(node_id) else {
            return;
        };
        let mut tokens = class_tokens(element.attrs.get("class").map(String::as_str));
        tokens.retain(|token| token != class_name);
        self.set_class_attr(node_id, tokens);
    }

    fn toggle_class(&mut self, node_id: NodeId, class_name: &str) -> bool {
        let present = self
            .element(node_id)
            .is_some_and(|element| has_class(element, class_name));
        if present {
            self.remove_class(node_id, class_name);
        } else {
            self.add_class(node_id, class_name);
        }
        !present
    }

    fn set_class_enabled(&mut self, node_id: NodeId, class_name: &str, enabled: bool) {
        if enabled {
            self.add_class(node_id, class_name);
        } else {
            self.remove_class(node_id, class_name);
        }
    }

    fn text_content(&self, node_id: NodeId) -> String {
        match &self.nodes[node_id.0].node_type {
            NodeType::Document | NodeType::Element(_) => {
                let mut out = String::new();
                for child in &self.nodes[node_id.0].children {
                    out.push_str(&self.text_content(*child));
                }
                out
            }
            NodeType::Text(text) => text.clone(),
        }
    }

    fn dump_node(&self, node_id: NodeId) -> String {
        match &self.nodes[node_id.0].node_type {
            NodeType::Document => {
                let mut out = String::new();
                for child in &self.nodes[node_id.0].children {
                    out.push_str(&self.dump_node(*child));
                }
                out
            }
            NodeType::Text(text) => text.clone(),
            NodeType::Element(element) => {
                let mut out = String::new();
                out.push('<');
                out.push_str(&element.tag_name);
                let mut keys: Vec<&String> = element.attrs.keys().collect();
                keys.sort();
                for key in keys {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&element.attrs[key]);
                    out.push('"');
                }
                out.push('>');
                if is_void_tag(&element.tag_name) {
                    return out;
                }
                for child in &self.nodes[node_id.0].children {
                    out.push_str(&self.dump_node(*child));
                }
                out.push_str("</");
                out.push_str(&element.tag_name);
                out.push('>');
                out
            }
        }
    }

    fn node_label(&self, node_id: NodeId) -> String {
        match &self.nodes[node_id.0].node_type {
            NodeType::Document => "#document".to_string(),
            NodeType::Text(_) => "#text".to_string(),
            NodeType::Element(element) => match element.attrs.get("id") {
                Some(id) => format!("{}#{id}", element.tag_name),
                None => element.tag_name.clone(),
            },
        }
    }
}

fn id_only_group(groups: &[Vec<SelectorPart>]) -> Option<&str> {
    match groups {
        [chain] if chain.len() == 1 => chain[0].step.id_only(),
        _ => None,
    }
}

fn parse_px_attr(attrs: &HashMap<String, String>, key: &str) -> i64 {
    attrs
        .get(key)
        .and_then(|value| value.trim().trim_end_matches("px").trim().parse::<i64>().ok())
        .unwrap_or(0)
}

fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag.to_ascii_lowercase().as_str(),
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn starts_with_at(bytes: &[u8], at: usize, needle: &[u8]) -> bool {
    bytes.len() >= at + needle.len() && &bytes[at..at + needle.len()] == needle
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || bytes.len() < needle.len() {
        return None;
    }
    (from..=bytes.len() - needle.len()).find(|&i| &bytes[i..i + needle.len()] == needle)
}

fn find_case_insensitive_end_tag(bytes: &[u8], from: usize, tag: &[u8]) -> Option<usize> {
    let mut i = from;
    while i + tag.len() + 2 <= bytes.len() {
        if bytes[i] == b'<'
            && bytes[i + 1] == b'/'
            && bytes[i + 2..i + 2 + tag.len()].eq_ignore_ascii_case(tag)
        {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn parse_html(html: &str) -> Result<Dom> {
    let mut dom = Dom::new();
    let mut stack = vec![dom.root];
    let bytes = html.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        if starts_with_at(bytes, i, b"<!--") {
            if let Some(end) = find_subslice(bytes, i + 4, b"-->") {
                i = end + 3;
            } else {
                return Err(Error::HtmlParse("unclosed HTML comment".into()));
            }
            continue;
        }

        if starts_with_at(bytes, i, b"<!") {
            // Doctype and other markup declarations carry no tree content.
            let close = bytes[i..]
                .iter()
                .position(|&b| b == b'>')
                .map(|offset| i + offset)
                .ok_or_else(|| Error::HtmlParse("unclosed markup declaration".into()))?;
            i = close + 1;
            continue;
        }

        if bytes[i] == b'<' {
            if starts_with_at(bytes, i, b"</") {
                let (tag, next) = parse_end_tag(html, i)?;
                i = next;

                while stack.len() > 1 {
                    let top = *stack
                        .last()
                        .ok_or_else(|| Error::HtmlParse("invalid stack state".into()))?;
                    let top_tag = dom.tag_name(top).unwrap_or("");
                    let matched = top_tag.eq_ignore_ascii_case(&tag);
                    stack.pop();
                    if matched {
                        break;
                    }
                }
                continue;
            }

            let (tag, attrs, self_closing, next) = parse_start_tag(html, i)?;
            i = next;

            let parent = *stack
                .last()
                .ok_or_else(|| Error::HtmlParse("missing parent element".into()))?;
            let node = dom.create_element(parent, tag.clone(), attrs);

            if tag.eq_ignore_ascii_case("script") || tag.eq_ignore_ascii_case("style") {
                let lower = tag.to_ascii_lowercase();
                let close = find_case_insensitive_end_tag(bytes, i, lower.as_bytes())
                    .ok_or_else(|| Error::HtmlParse(format!("unclosed <{lower}>")))?;
                if let Some(body) = html.get(i..close) {
                    if !body.is_empty() {
                        dom.create_text(node, body.to_string());
                    }
                }
                i = close;
                let (_, after_end) = parse_end_tag(html, i)?;
                i = after_end;
                continue;
            }

            if !self_closing && !is_void_tag(&tag) {
                stack.push(node);
            }
            continue;
        }

        let text_start = i;
        while i < bytes.len() && bytes[i] != b'<' {
            i += 1;
        }

        if let Some(text) = html.get(text_start..i) {
            if !text.is_empty() {
                let parent = *stack
                    .last()
                    .ok_or_else(|| Error::HtmlParse("missing parent element".into()))?;
                dom.create_text(parent, text.to_string());
            }
        }
    }

    Ok(dom)
}

fn parse_end_tag(html: &str, at: usize) -> Result<(String, usize)> {
    let bytes = html.as_bytes();
    let mut i = at + 2;
    let name_start = i;
    while i < bytes.len() && bytes[i] != b'>' {
        i += 1;
    }
    if i >= bytes.len() {
        return Err(Error::HtmlParse("unclosed end tag".into()));
    }
    let tag = html[name_start..i].trim().to_string();
    Ok((tag, i + 1))
}

fn parse_start_tag(html: &str, at: usize) -> Result<(String, HashMap<String, String>, bool, usize)> {
    let bytes = html.as_bytes();
    let mut i = at + 1;
    let name_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    if i == name_start {
        return Err(Error::HtmlParse(format!("invalid tag at byte {at}")));
    }
    let tag = html[name_start..i].to_string();

    let mut attrs = HashMap::new();
    let mut self_closing = false;

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return Err(Error::HtmlParse(format!("unclosed <{tag}> tag")));
        }
        if bytes[i] == b'>' {
            i += 1;
            break;
        }
        if bytes[i] == b'/' {
            self_closing = true;
            i += 1;
            continue;
        }

        let attr_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && bytes[i] != b'='
            && bytes[i] != b'>'
            && bytes[i] != b'/'
        {
            i += 1;
        }
        let name = html[attr_start..i].to_ascii_lowercase();
        if name.is_empty() {
            return Err(Error::HtmlParse(format!("invalid attribute in <{tag}>")));
        }

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let value = if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i];
                i += 1;
                let value_start = i;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err(Error::HtmlParse(format!(
                        "unclosed attribute value in <{tag}>"
                    )));
                }
                let value = html[value_start..i].to_string();
                i += 1;
                value
            } else {
                let value_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                html[value_start..i].to_string()
            }
        } else {
            String::new()
        };

        attrs.insert(name, value);
    }

    Ok((tag, attrs, self_closing, i))
}

/// Page behaviors a listener can run. Replaces per-listener script handlers:
/// the behavior set of the page is fixed, so listeners name their work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handler {
    HeaderScrollState,
    MenuToggle,
    MenuLinkClose,
    MenuOutsideClose,
    SmoothScrollAnchor,
    CarouselKeyNav,
    FocusCycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Listener {
    capture: bool,
    handler: Handler,
}

#[derive(Debug, Default)]
struct ListenerStore {
    map: HashMap<NodeId, HashMap<String, Vec<Listener>>>,
}

impl ListenerStore {
    fn add(&mut self, node_id: NodeId, event: &str, listener: Listener) {
        let listeners = self
            .map
            .entry(node_id)
            .or_default()
            .entry(event.to_string())
            .or_default();

        // Match browser semantics: the same handler re-registered for one
        // type/capture pair stays single.
        if listeners.contains(&listener) {
            return;
        }
        listeners.push(listener);
    }

    fn get(&self, node_id: NodeId, event: &str, capture: bool) -> Vec<Listener> {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .map(|listeners| {
                listeners
                    .iter()
                    .filter(|listener| listener.capture == capture)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
struct EventState {
    event_type: String,
    target: NodeId,
    current_target: NodeId,
    time_stamp_ms: i64,
    default_prevented: bool,
    propagation_stopped: bool,
    key: Option<String>,
    shift: bool,
}

impl EventState {
    fn new(event_type: &str, target: NodeId, time_stamp_ms: i64) -> Self {
        Self {
            event_type: event_type.to_string(),
            target,
            current_target: target,
            time_stamp_ms,
            default_prevented: false,
            propagation_stopped: false,
            key: None,
            shift: false,
        }
    }
}

/// Entry points callable from inline `onclick` markup. The page exposes
/// exactly its navigation functions and the tracking hook.
#[derive(Debug, Clone, PartialEq, Eq)]
enum GlobalCall {
    NextSlide,
    PreviousSlide,
    CurrentSlide(usize),
    NextNewsSlide,
    PreviousNewsSlide,
    CurrentNewsSlide(usize),
    TrackEvent(String),
}

fn parse_global_call(src: &str) -> Option<GlobalCall> {
    let src = src.trim().trim_end_matches(';').trim();
    let open = src.find('(')?;
    if !src.ends_with(')') {
        return None;
    }
    let name = src[..open].trim();
    let arg = src[open + 1..src.len() - 1].trim();

    match name {
        "nextSlide" if arg.is_empty() => Some(GlobalCall::NextSlide),
        "previousSlide" if arg.is_empty() => Some(GlobalCall::PreviousSlide),
        "nextNewsSlide" if arg.is_empty() => Some(GlobalCall::NextNewsSlide),
        "previousNewsSlide" if arg.is_empty() => Some(GlobalCall::PreviousNewsSlide),
        "currentSlide" => arg.parse().ok().map(GlobalCall::CurrentSlide),
        "currentNewsSlide" => arg.parse().ok().map(GlobalCall::CurrentNewsSlide),
        "trackEvent" => unquote_call_arg(arg).map(GlobalCall::TrackEvent),
        _ => None,
    }
}

fn unquote_call_arg(arg: &str) -> Option<String> {
    let bytes = arg.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'\'' && last == b'\'') || (first == b'"' && last == b'"') {
            return Some(arg[1..arg.len() - 1].to_string());
        }
    }
    None
}

/// A smooth-scroll request issued by an anchor click, recorded for
/// inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollRequest {
    pub top: i64,
    pub smooth: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEvent {
    pub name: String,
    pub properties: Vec<(String, String)>,
}

/// A parsed page with its enhancement behaviors wired and a virtual clock.
///
/// Construction performs the whole load-time setup: header scroll state,
/// mobile menu, smooth-scroll anchors, both carousels with their
/// auto-advance timers, fade-in and lazy-image observers, and keyboard
/// accessibility. Everything after that is driven explicitly through the
/// methods below; nothing advances on its own.
#[derive(Debug)]
pub struct Page {
    dom: Dom,
    listeners: ListenerStore,
    scheduler: Scheduler,
    projects: Carousel,
    news: Carousel,
    observers: Vec<ViewportObserver>,
    viewport: Viewport,
    active_element: Option<NodeId>,
    scroll_rate_limit: RateLimit,
    pending_scroll_reaction: Option<i64>,
    scroll_throttle_open: bool,
    scroll_requests: Vec<ScrollRequest>,
    tracked_events: Vec<TrackedEvent>,
    warnings: Vec<String>,
    trace: bool,
    trace_events: bool,
    trace_timers: bool,
    trace_logs: Vec<String>,
    trace_log_limit: usize,
    trace_to_stderr: bool,
}

impl Page {
    pub fn from_html(html: &str) -> Result<Self> {
        let dom = parse_html(html)?;
        let projects = Carousel::capture(&dom, &CarouselKind::Projects.wiring());
        let news = Carousel::capture(&dom, &CarouselKind::News.wiring());

        let mut page = Self {
            dom,
            listeners: ListenerStore::default(),
            scheduler: Scheduler::default(),
            projects,
            news,
            observers: Vec::new(),
            viewport: Viewport::default(),
            active_element: None,
            scroll_rate_limit: RateLimit::None,
            pending_scroll_reaction: None,
            scroll_throttle_open: false,
            scroll_requests: Vec::new(),
            tracked_events: Vec::new(),
            warnings: Vec::new(),
            trace: false,
            trace_events: true,
            trace_timers: true,
            trace_logs: Vec::new(),
            trace_log_limit: 10_000,
            trace_to_stderr: true,
        };

        page.initialize_behaviors()?;
        Ok(page)
    }

    fn initialize_behaviors(&mut self) -> Result<()> {
        let root = self.dom.root;

        if self.dom.by_id("header").is_some() {
            self.listeners.add(
                root,
                "scroll",
                Listener {
                    capture: false,
                    handler: Handler::HeaderScrollState,
                },
            );
        } else {
            self.warn("Header element not found");
        }

        match (self.dom.by_id("menuToggle"), self.dom.by_id("navMenu")) {
            (Some(toggle), Some(menu)) => {
                self.listeners.add(
                    toggle,
                    "click",
                    Listener {
                        capture: false,
                        handler: Handler::MenuToggle,
                    },
                );
                self.listeners.add(
                    menu,
                    "click",
                    Listener {
                        capture: false,
                        handler: Handler::MenuLinkClose,
                    },
                );
                self.listeners.add(
                    root,
                    "click",
                    Listener {
                        capture: false,
                        handler: Handler::MenuOutsideClose,
                    },
                );
            }
            _ => self.warn("Menu toggle or nav menu element not found"),
        }

        for anchor in self.dom.query_selector_all(ANCHOR_SELECTOR)? {
            self.listeners.add(
                anchor,
                "click",
                Listener {
                    capture: false,
                    handler: Handler::SmoothScrollAnchor,
                },
            );
        }

        for kind in [CarouselKind::Projects, CarouselKind::News] {
            let wiring = kind.wiring();
            let (container, slide_count, indicator_count, interval_ms) = {
                let carousel = self.carousel(kind);
                (
                    carousel.container,
                    carousel.slide_count(),
                    carousel.indicators.len(),
                    carousel.interval_ms,
                )
            };
            if container.is_none() {
                self.warn(wiring.missing_container_warning);
            } else if indicator_count != slide_count {
                self.warn(format!(
                    "{} carousel has {indicator_count} indicators for {slide_count} slides",
                    kind.label()
                ));
            }
            if slide_count > 0 {
                self.scheduler
                    .set_interval(TimerCallback::AdvanceCarousel(kind), interval_ms);
            }
        }

        let fade_targets = self.dom.query_selector_all(FADE_IN_SELECTOR)?;
        self.observers.push(ViewportObserver::fade_in(fade_targets));
        let lazy_targets = self.dom.query_selector_all(LAZY_IMAGE_SELECTOR)?;
        self.observers
            .push(ViewportObserver::lazy_images(lazy_targets));

        self.listeners.add(
            root,
            "keydown",
            Listener {
                capture: false,
                handler: Handler::CarouselKeyNav,
            },
        );
        self.listeners.add(
            root,
            "keydown",
            Listener {
                capture: false,
                handler: Handler::FocusCycle,
            },
        );

        self.check_observers();
        Ok(())
    }

    // ---- driving API ----

    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self
            .dom
            .element(target)
            .is_some_and(|element| element.attrs.contains_key("disabled"))
        {
            return Ok(());
        }
        self.dispatch_event(target, "click")?;
        Ok(())
    }

    pub fn dispatch(&mut self, selector: &str, event: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dispatch_event(target, event)?;
        Ok(())
    }

    pub fn press_key(&mut self, key: &str) -> Result<()> {
        let (key_name, shift) = match key.strip_prefix("Shift+") {
            Some(rest) => (rest, true),
            None => (key, false),
        };
        if key_name.is_empty() {
            return Err(Error::Runtime("press_key requires a key name".into()));
        }
        let target = self.active_element.unwrap_or(self.dom.root);
        self.dispatch_event_full(target, "keydown", Some(key_name.to_string()), shift)?;
        Ok(())
    }

    pub fn focus(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.focus_node(target)
    }

    pub fn blur(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.blur_node(target)
    }

    pub fn scroll_to(&mut self, y: i64) -> Result<()> {
        self.viewport.scroll_y = y.max(0);
        self.scroll_changed()
    }

    pub fn set_viewport_height(&mut self, height: i64) -> Result<()> {
        if height <= 0 {
            return Err(Error::Runtime(
                "set_viewport_height requires a positive height".into(),
            ));
        }
        self.viewport.height = height;
        self.check_observers();
        Ok(())
    }

    /// Records layout geometry for every element matched by `selector`.
    /// Geometry normally arrives via `data-offset-top`/`data-offset-height`
    /// attributes; this overrides it after parsing.
    pub fn set_metrics(&mut self, selector: &str, top: i64, height: i64) -> Result<()> {
        let targets = self.dom.query_selector_all(selector)?;
        if targets.is_empty() {
            return Err(Error::SelectorNotFound(selector.into()));
        }
        for target in targets {
            if let Some(element) = self.dom.element_mut(target) {
                element.offset_top = top;
                element.offset_height = height;
            }
        }
        self.check_observers();
        Ok(())
    }

    pub fn set_scroll_rate_limit(&mut self, mode: RateLimit) {
        if let Some(pending) = self.pending_scroll_reaction.take() {
            self.scheduler.clear(pending);
        }
        self.scroll_throttle_open = false;
        self.scroll_rate_limit = mode;
    }

    /// Appends `<link rel="preload" as="image">` entries for critical assets
    /// to the document head, creating the head if the markup lacks one.
    pub fn preload_assets(&mut self, urls: &[&str]) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }
        let head = self.ensure_head()?;
        for url in urls {
            let link = self
                .dom
                .create_element(head, "link".to_string(), HashMap::new());
            self.dom.set_attr(link, "rel", "preload".to_string());
            self.dom.set_attr(link, "href", (*url).to_string());
            self.dom.set_attr(link, "as", "image".to_string());
        }
        Ok(())
    }

    fn ensure_head(&mut self) -> Result<NodeId> {
        let existing = self
            .dom
            .elements_preorder()
            .into_iter()
            .find(|node| self.dom.tag_name(*node).is_some_and(|t| t.eq_ignore_ascii_case("head")));
        if let Some(head) = existing {
            return Ok(head);
        }
        let parent = self
            .dom
            .elements_preorder()
            .into_iter()
            .find(|node| self.dom.tag_name(*node).is_some_and(|t| t.eq_ignore_ascii_case("html")))
            .unwrap_or(self.dom.root);
        Ok(self
            .dom
            .create_element(parent, "head".to_string(), HashMap::new()))
    }

    // ---- global namespace ----

    pub fn next_slide(&mut self) {
        self.advance_carousel(CarouselKind::Projects, 1);
    }

    pub fn previous_slide(&mut self) {
        self.advance_carousel(CarouselKind::Projects, -1);
    }

    pub fn current_slide(&mut self, one_based: usize) {
        self.go_to(CarouselKind::Projects, one_based);
    }

    pub fn next_news_slide(&mut self) {
        self.advance_carousel(CarouselKind::News, 1);
    }

    pub fn previous_news_slide(&mut self) {
        self.advance_carousel(CarouselKind::News, -1);
    }

    pub fn current_news_slide(&mut self, one_based: usize) {
        self.go_to(CarouselKind::News, one_based);
    }

    pub fn track_event(&mut self, name: &str, properties: &[(&str, &str)]) {
        let properties: Vec<(String, String)> = properties
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        self.trace_event_line(format!(
            "[event] tracked name={name} properties={}",
            properties.len()
        ));
        self.tracked_events.push(TrackedEvent {
            name: name.to_string(),
            properties,
        });
    }

    // ---- carousel mechanics ----

    fn carousel(&self, kind: CarouselKind) -> &Carousel {
        match kind {
            CarouselKind::Projects => &self.projects,
            CarouselKind::News => &self.news,
        }
    }

    fn carousel_mut(&mut self, kind: CarouselKind) -> &mut Carousel {
        match kind {
            CarouselKind::Projects => &mut self.projects,
            CarouselKind::News => &mut self.news,
        }
    }

    pub fn carousel_index(&self, kind: CarouselKind) -> usize {
        self.carousel(kind).current_index
    }

    pub fn carousel_slide_count(&self, kind: CarouselKind) -> usize {
        self.carousel(kind).slide_count()
    }

    fn advance_carousel(&mut self, kind: CarouselKind, direction: i64) {
        let Some(next) = self.carousel(kind).stepped_index(direction) else {
            return;
        };
        self.show_carousel_slide(kind, next);
    }

    fn go_to(&mut self, kind: CarouselKind, one_based: usize) {
        if self.carousel(kind).slide_count() == 0 {
            return;
        }
        if one_based == 0 {
            self.warn(format!(
                "{} carousel ignored slide position 0; positions are 1-based",
                kind.label()
            ));
            return;
        }
        self.show_carousel_slide(kind, one_based - 1);
    }

    /// Applies a slide index: container transform plus the
    /// exactly-one-active indicator rule. The index is taken as given;
    /// in-range values are the caller's responsibility.
    fn show_carousel_slide(&mut self, kind: CarouselKind, index: usize) {
        let Some(container) = self.carousel(kind).container else {
            return;
        };
        self.carousel_mut(kind).current_index = index;
        self.dom.set_attr(
            container,
            "style",
            format!("transform: translateX(-{}%)", index * 100),
        );

        let indicators = self.carousel(kind).indicators.clone();
        for (i, indicator) in indicators.into_iter().enumerate() {
            self.dom.set_class_enabled(indicator, "active", i == index);
        }
        self.trace_event_line(format!(
            "[event] carousel kind={:?} index={index}",
            kind
        ));
    }

    // ---- event dispatch ----

    fn dispatch_event(&mut self, target: NodeId, event_type: &str) -> Result<EventState> {
        self.dispatch_event_full(target, event_type, None, false)
    }

    fn dispatch_event_full(
        &mut self,
        target: NodeId,
        event_type: &str,
        key: Option<String>,
        shift: bool,
    ) -> Result<EventState> {
        let mut event = EventState::new(event_type, target, self.scheduler.now_ms);
        event.key = key;
        event.shift = shift;

        self.trace_event_line(format!(
            "[event] dispatch type={event_type} target={} t={}",
            self.dom.node_label(target),
            event.time_stamp_ms
        ));

        let mut path = Vec::new();
        let mut cursor = Some(target);
        while let Some(node) = cursor {
            path.push(node);
            cursor = self.dom.parent(node);
        }
        path.reverse();

        if path.is_empty() {
            self.trace_event_done(&event, "empty_path");
            return Ok(event);
        }

        // Capture phase.
        if path.len() >= 2 {
            for node in &path[..path.len() - 1] {
                event.current_target = *node;
                self.invoke_listeners(*node, &mut event, true);
                if event.propagation_stopped {
                    self.trace_event_done(&event, "propagation_stopped");
                    return Ok(event);
                }
            }
        }

        // Target phase: capture listeners first.
        event.current_target = target;
        self.invoke_listeners(target, &mut event, true);
        if event.propagation_stopped {
            self.trace_event_done(&event, "propagation_stopped");
            return Ok(event);
        }

        // Inline markup handlers fire at the target like parse-time
        // registrations.
        if event.event_type == "click" {
            self.run_inline_click_handler(&event);
        }

        self.invoke_listeners(target, &mut event, false);
        if event.propagation_stopped {
            self.trace_event_done(&event, "propagation_stopped");
            return Ok(event);
        }

        // Bubble phase.
        if path.len() >= 2 {
            for node in path[..path.len() - 1].iter().rev() {
                event.current_target = *node;
                self.invoke_listeners(*node, &mut event, false);
                if event.propagation_stopped {
                    self.trace_event_done(&event, "propagation_stopped");
                    return Ok(event);
                }
            }
        }

        self.trace_event_done(&event, "completed");
        Ok(event)
    }

    fn trace_event_done(&mut self, event: &EventState, outcome: &str) {
        self.trace_event_line(format!(
            "[event] done type={} outcome={outcome} default_prevented={}",
            event.event_type, event.default_prevented
        ));
    }

    fn invoke_listeners(&mut self, node: NodeId, event: &mut EventState, capture: bool) {
        for listener in self.listeners.get(node, &event.event_type, capture) {
            if let Err(error) = self.run_handler(listener.handler, event) {
                // Enhancements must never take the page down; record and
                // keep dispatching.
                self.warn(format!(
                    "enhancement failed during {}: {error}",
                    event.event_type
                ));
            }
        }
    }

    fn run_inline_click_handler(&mut self, event: &EventState) {
        let Some(source) = self
            .dom
            .element(event.target)
            .and_then(|element| element.attrs.get("onclick").cloned())
        else {
            return;
        };
        match parse_global_call(&source) {
            Some(call) => self.invoke_global(call),
            None => self.warn(format!("unsupported inline handler: {source}")),
        }
    }

    fn invoke_global(&mut self, call: GlobalCall) {
        match call {
            GlobalCall::NextSlide => self.next_slide(),
            GlobalCall::PreviousSlide => self.previous_slide(),
            GlobalCall::CurrentSlide(position) => self.current_slide(position),
            GlobalCall::NextNewsSlide => self.next_news_slide(),
            GlobalCall::PreviousNewsSlide => self.previous_news_slide(),
            GlobalCall::CurrentNewsSlide(position) => self.current_news_slide(position),
            GlobalCall::TrackEvent(name) => self.track_event(&name, &[]),
        }
    }

    fn run_handler(&mut self, handler: Handler, event: &mut EventState) -> Result<()> {
        match handler {
            Handler::HeaderScrollState => self.apply_header_scroll_state(),
            Handler::MenuToggle => self.toggle_menu(),
            Handler::MenuLinkClose => self.close_menu_on_link(event),
            Handler::MenuOutsideClose => self.close_menu_on_outside(event),
            Handler::SmoothScrollAnchor => self.follow_anchor(event),
            Handler::CarouselKeyNav => self.carousel_key_nav(event),
            Handler::FocusCycle => self.cycle_focus(event),
        }
    }

    // ---- behaviors ----

    fn apply_header_scroll_state(&mut self) -> Result<()> {
        let Some(header) = self.dom.by_id("header") else {
            return Ok(());
        };
        let scrolled = self.viewport.scroll_y > HEADER_SCROLL_THRESHOLD_PX;
        self.dom.set_class_enabled(header, "scrolled", scrolled);
        Ok(())
    }

    fn toggle_menu(&mut self) -> Result<()> {
        let (Some(toggle), Some(menu)) = (self.dom.by_id("menuToggle"), self.dom.by_id("navMenu"))
        else {
            return Ok(());
        };
        self.dom.toggle_class(menu, "active");
        self.dom.toggle_class(toggle, "active");
        Ok(())
    }

    fn close_menu(&mut self) {
        if let Some(menu) = self.dom.by_id("navMenu") {
            self.dom.remove_class(menu, "active");
        }
        if let Some(toggle) = self.dom.by_id("menuToggle") {
            self.dom.remove_class(toggle, "active");
        }
    }

    fn close_menu_on_link(&mut self, event: &EventState) -> Result<()> {
        if self
            .dom
            .tag_name(event.target)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("a"))
        {
            self.close_menu();
        }
        Ok(())
    }

    fn close_menu_on_outside(&mut self, event: &EventState) -> Result<()> {
        let (Some(toggle), Some(menu)) = (self.dom.by_id("menuToggle"), self.dom.by_id("navMenu"))
        else {
            return Ok(());
        };
        if !self.dom.contains(toggle, event.target) && !self.dom.contains(menu, event.target) {
            self.close_menu();
        }
        Ok(())
    }

    fn follow_anchor(&mut self, event: &mut EventState) -> Result<()> {
        event.default_prevented = true;

        let Some(href) = self
            .dom
            .element(event.current_target)
            .and_then(|element| element.attrs.get("href").cloned())
        else {
            return Ok(());
        };
        let fragment = href.trim_start_matches('#');
        if fragment.is_empty() {
            return Ok(());
        }
        let Some(target) = self.dom.by_id(fragment) else {
            return Ok(());
        };

        let header_height = self
            .dom
            .by_id("header")
            .and_then(|header| self.dom.element(header))
            .map(|element| element.offset_height)
            .unwrap_or(0);
        let target_top = self
            .dom
            .element(target)
            .map(|element| element.offset_top)
            .unwrap_or(0);

        let top = target_top - header_height;
        self.scroll_requests.push(ScrollRequest { top, smooth: true });
        self.viewport.scroll_y = top.max(0);
        self.scroll_changed()
    }

    fn carousel_key_nav(&mut self, event: &EventState) -> Result<()> {
        let direction = match event.key.as_deref() {
            Some("ArrowLeft") => -1,
            Some("ArrowRight") => 1,
            _ => return Ok(()),
        };
        let Some(element) = self.dom.element(event.target) else {
            return Ok(());
        };
        if has_class(element, "carousel-btn") {
            self.advance_carousel(CarouselKind::Projects, direction);
        } else if has_class(element, "news-btn") {
            self.advance_carousel(CarouselKind::News, direction);
        }
        Ok(())
    }

    fn cycle_focus(&mut self, event: &EventState) -> Result<()> {
        if event.key.as_deref() != Some("Tab") {
            return Ok(());
        }
        let focusable = self.dom.query_selector_all(FOCUSABLE_SELECTOR)?;
        if focusable.is_empty() {
            return Ok(());
        }

        let index = self
            .active_element
            .and_then(|active| focusable.iter().position(|&node| node == active))
            .map(|position| position as i64)
            .unwrap_or(-1);

        let next = if event.shift {
            if index > 0 {
                (index - 1) as usize
            } else {
                focusable.len() - 1
            }
        } else if index < focusable.len() as i64 - 1 {
            (index + 1) as usize
        } else {
            0
        };

        self.focus_node(focusable[next])
    }

    // ---- focus model ----

    fn focus_node(&mut self, node: NodeId) -> Result<()> {
        if self
            .dom
            .element(node)
            .is_some_and(|element| element.attrs.contains_key("disabled"))
        {
            return Ok(());
        }
        if self.active_element == Some(node) {
            return Ok(());
        }
        if let Some(current) = self.active_element {
            self.blur_node(current)?;
        }
        self.active_element = Some(node);
        self.dispatch_event(node, "focusin")?;
        self.dispatch_event(node, "focus")?;
        Ok(())
    }

    fn blur_node(&mut self, node: NodeId) -> Result<()> {
        if self.active_element != Some(node) {
            return Ok(());
        }
        self.dispatch_event(node, "focusout")?;
        self.dispatch_event(node, "blur")?;
        self.active_element = None;
        Ok(())
    }

    // ---- scroll reactions and observers ----

    fn scroll_changed(&mut self) -> Result<()> {
        match self.scroll_rate_limit {
            RateLimit::None => self.react_to_scroll(),
            RateLimit::Debounce(wait_ms) => {
                if let Some(pending) = self.pending_scroll_reaction.take() {
                    self.scheduler.clear(pending);
                }
                let id = self
                    .scheduler
                    .set_timeout(TimerCallback::DeferredScrollReaction, wait_ms);
                self.pending_scroll_reaction = Some(id);
                Ok(())
            }
            RateLimit::Throttle(limit_ms) => {
                if self.scroll_throttle_open {
                    return Ok(());
                }
                self.scroll_throttle_open = true;
                self.scheduler
                    .set_timeout(TimerCallback::ReleaseScrollThrottle, limit_ms);
                self.react_to_scroll()
            }
        }
    }

    fn react_to_scroll(&mut self) -> Result<()> {
        let root = self.dom.root;
        self.dispatch_event(root, "scroll")?;
        self.check_observers();
        Ok(())
    }

    fn check_observers(&mut self) {
        let viewport = self.viewport;
        for observer_index in 0..self.observers.len() {
            let mut fired = Vec::new();
            {
                let observer = &self.observers[observer_index];
                for &target in &observer.targets {
                    let Some(element) = self.dom.element(target) else {
                        continue;
                    };
                    let fraction = visible_fraction(
                        element.offset_top,
                        element.offset_height,
                        viewport,
                        observer.bottom_margin_px,
                    );
                    if meets_threshold(fraction, observer.threshold) {
                        fired.push(target);
                    }
                }
            }
            if fired.is_empty() {
                continue;
            }

            let reaction = self.observers[observer_index].reaction;
            for &target in &fired {
                match reaction {
                    ObserverReaction::RevealFadeIn => self.dom.add_class(target, "visible"),
                    ObserverReaction::LazyLoadImage => self.lazy_load_image(target),
                }
            }
            if reaction == ObserverReaction::LazyLoadImage {
                // Loaded images leave the target set.
                self.observers[observer_index]
                    .targets
                    .retain(|target| !fired.contains(target));
            }
        }
    }

    fn lazy_load_image(&mut self, node: NodeId) {
        let Some(src) = self
            .dom
            .element(node)
            .and_then(|element| element.attrs.get("data-src").cloned())
        else {
            return;
        };
        self.dom.set_attr(node, "src", src);
        self.dom.remove_class(node, "lazy");
    }

    // ---- timers ----

    pub fn now_ms(&self) -> i64 {
        self.scheduler.now_ms
    }

    pub fn advance_time(&mut self, delta_ms: i64) -> Result<()> {
        if delta_ms < 0 {
            return Err(Error::Runtime(
                "advance_time requires non-negative milliseconds".into(),
            ));
        }
        let from = self.scheduler.now_ms;
        self.scheduler.now_ms = self.scheduler.now_ms.saturating_add(delta_ms);
        let ran = self.run_timer_queue(Some(self.scheduler.now_ms), false)?;
        self.trace_timer_line(format!(
            "[timer] advance delta_ms={delta_ms} from={from} to={} ran_due={ran}",
            self.scheduler.now_ms
        ));
        Ok(())
    }

    pub fn advance_time_to(&mut self, target_ms: i64) -> Result<()> {
        if target_ms < self.scheduler.now_ms {
            return Err(Error::Runtime(format!(
                "advance_time_to requires target >= now_ms (target={target_ms}, now_ms={})",
                self.scheduler.now_ms
            )));
        }
        let from = self.scheduler.now_ms;
        self.scheduler.now_ms = target_ms;
        let ran = self.run_timer_queue(Some(self.scheduler.now_ms), false)?;
        self.trace_timer_line(format!(
            "[timer] advance_to from={from} to={} ran_due={ran}",
            self.scheduler.now_ms
        ));
        Ok(())
    }

    pub fn run_due_timers(&mut self) -> Result<usize> {
        let ran = self.run_timer_queue(Some(self.scheduler.now_ms), false)?;
        self.trace_timer_line(format!(
            "[timer] run_due now_ms={} ran={ran}",
            self.scheduler.now_ms
        ));
        Ok(ran)
    }

    pub fn run_next_timer(&mut self) -> Result<bool> {
        let Some(task) = self.scheduler.take_next(None) else {
            self.trace_timer_line("[timer] run_next none".into());
            return Ok(false);
        };
        if task.due_at > self.scheduler.now_ms {
            self.scheduler.now_ms = task.due_at;
        }
        self.execute_timer_task(task)?;
        Ok(true)
    }

    pub fn pending_timers(&self) -> Vec<PendingTimer> {
        self.scheduler.pending_timers()
    }

    pub fn clear_timer(&mut self, timer_id: i64) -> bool {
        if self.pending_scroll_reaction == Some(timer_id) {
            self.pending_scroll_reaction = None;
        }
        self.scheduler.clear(timer_id)
    }

    pub fn clear_all_timers(&mut self) -> usize {
        self.pending_scroll_reaction = None;
        self.scheduler.clear_all()
    }

    pub fn set_timer_step_limit(&mut self, max_steps: usize) -> Result<()> {
        if max_steps == 0 {
            return Err(Error::Runtime(
                "set_timer_step_limit requires at least 1 step".into(),
            ));
        }
        self.scheduler.timer_step_limit = max_steps;
        Ok(())
    }

    fn run_timer_queue(&mut self, due_limit: Option<i64>, advance_clock: bool) -> Result<usize> {
        let mut steps = 0usize;
        while let Some(task) = self.scheduler.take_next(due_limit) {
            steps += 1;
            if steps > self.scheduler.timer_step_limit {
                return Err(Error::Runtime(format!(
                    "timer step limit {} exceeded",
                    self.scheduler.timer_step_limit
                )));
            }
            if advance_clock && task.due_at > self.scheduler.now_ms {
                self.scheduler.now_ms = task.due_at;
            }
            self.execute_timer_task(task)?;
        }
        Ok(steps)
    }

    fn execute_timer_task(&mut self, task: ScheduledTask) -> Result<()> {
        self.trace_timer_line(format!(
            "[timer] fire id={} due_at={} callback={:?}",
            task.id, task.due_at, task.callback
        ));
        match task.callback {
            TimerCallback::AdvanceCarousel(kind) => self.advance_carousel(kind, 1),
            TimerCallback::DeferredScrollReaction => {
                self.pending_scroll_reaction = None;
                self.react_to_scroll()?;
            }
            TimerCallback::ReleaseScrollThrottle => {
                self.scroll_throttle_open = false;
            }
        }
        self.scheduler.reschedule_interval(&task);
        Ok(())
    }

    // ---- trace and warnings ----

    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace = enabled;
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.trace_logs)
    }

    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.trace_to_stderr = enabled;
    }

    pub fn set_trace_events(&mut self, enabled: bool) {
        self.trace_events = enabled;
    }

    pub fn set_trace_timers(&mut self, enabled: bool) {
        self.trace_timers = enabled;
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::Runtime(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        self.trace_log_limit = max_entries;
        while self.trace_logs.len() > self.trace_log_limit {
            self.trace_logs.remove(0);
        }
        Ok(())
    }

    fn trace_event_line(&mut self, line: String) {
        if self.trace && self.trace_events {
            self.push_trace(line);
        }
    }

    fn trace_timer_line(&mut self, line: String) {
        if self.trace && self.trace_timers {
            self.push_trace(line);
        }
    }

    fn push_trace(&mut self, line: String) {
        if self.trace_to_stderr {
            eprintln!("{line}");
        }
        self.trace_logs.push(line);
        while self.trace_logs.len() > self.trace_log_limit {
            self.trace_logs.remove(0);
        }
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    // ---- accessors and assertions ----

    pub fn scroll_y(&self) -> i64 {
        self.viewport.scroll_y
    }

    pub fn viewport_height(&self) -> i64 {
        self.viewport.height
    }

    pub fn scroll_requests(&self) -> &[ScrollRequest] {
        &self.scroll_requests
    }

    pub fn tracked_events(&self) -> &[TrackedEvent] {
        &self.tracked_events
    }

    fn select_one(&self, selector: &str) -> Result<NodeId> {
        self.dom
            .query_selector(selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.into()))
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        self.select_one(selector).map(|_| ())
    }

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.text_content(target);
        if actual == expected {
            Ok(())
        } else {
            Err(self.assertion_failed(selector, expected, &actual, target))
        }
    }

    pub fn assert_has_class(&self, selector: &str, class_name: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self
            .dom
            .element(target)
            .is_some_and(|element| has_class(element, class_name))
        {
            Ok(())
        } else {
            let actual = self
                .dom
                .element(target)
                .and_then(|element| element.attrs.get("class").cloned())
                .unwrap_or_default();
            Err(self.assertion_failed(selector, &format!("class {class_name}"), &actual, target))
        }
    }

    pub fn assert_not_has_class(&self, selector: &str, class_name: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self
            .dom
            .element(target)
            .is_some_and(|element| has_class(element, class_name))
        {
            let actual = self
                .dom
                .element(target)
                .and_then(|element| element.attrs.get("class").cloned())
                .unwrap_or_default();
            Err(self.assertion_failed(selector, &format!("no class {class_name}"), &actual, target))
        } else {
            Ok(())
        }
    }

    pub fn assert_attr(&self, selector: &str, attr: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self
            .dom
            .element(target)
            .and_then(|element| element.attrs.get(attr).cloned());
        match actual {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(self.assertion_failed(selector, expected, &actual, target)),
            None => Err(self.assertion_failed(selector, expected, "<missing>", target)),
        }
    }

    pub fn assert_focused(&self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.active_element == Some(target) {
            Ok(())
        } else {
            let actual = self
                .active_element
                .map(|node| self.dom.node_label(node))
                .unwrap_or_else(|| "<none>".to_string());
            Err(self.assertion_failed(selector, "focused", &actual, target))
        }
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.dump_node(target))
    }

    fn assertion_failed(
        &self,
        selector: &str,
        expected: &str,
        actual: &str,
        target: NodeId,
    ) -> Error {
        Error::AssertionFailed {
            selector: selector.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            dom_snippet: self.dom.dump_node(target),
        }
    }
}
