//! Shared test harness: an in-memory automation surface that behaves like
//! the Municode download panel, plus a session factory over it.
#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use municrawl::browser::{AutomationSurface, SessionFactory, WaitPolicy};

#[derive(Debug, Clone)]
pub struct MockNode {
    pub id: String,
    pub heading: String,
    pub children: Vec<MockNode>,
}

pub fn leaf(id: &str, heading: &str) -> MockNode {
    MockNode {
        id: id.to_string(),
        heading: heading.to_string(),
        children: Vec::new(),
    }
}

pub fn parent(id: &str, heading: &str, children: Vec<MockNode>) -> MockNode {
    MockNode {
        id: id.to_string(),
        heading: heading.to_string(),
        children,
    }
}

#[derive(Debug, Clone)]
pub enum MockHandle {
    OpenButton,
    CloseButton,
    Panel,
    Trigger,
    Node(String),
    Heading(String),
    Expander(String),
    Checkbox(String),
}

#[derive(Debug, Default)]
struct PanelState {
    panel_open: bool,
    expanded: HashSet<String>,
    selected: HashSet<String>,
    sticky_checkboxes: HashSet<String>,
    artifact_seq: usize,
}

/// Gauge ticked down when a surface is dropped; lets tests observe how many
/// sessions are alive at once.
pub struct LiveGauge {
    live: Arc<AtomicUsize>,
}

impl Drop for LiveGauge {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockSurface {
    nodes: Vec<MockNode>,
    download_dir: PathBuf,
    panel_available: bool,
    trigger_enabled: bool,
    dead_nodes: HashSet<String>,
    state: Mutex<PanelState>,
    interactions: Arc<AtomicUsize>,
    find_all_calls: Mutex<Vec<(String, Duration)>>,
    _gauge: Option<LiveGauge>,
}

impl MockSurface {
    pub fn new(nodes: Vec<MockNode>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            nodes,
            download_dir: download_dir.into(),
            panel_available: true,
            trigger_enabled: true,
            dead_nodes: HashSet::new(),
            state: Mutex::new(PanelState::default()),
            interactions: Arc::new(AtomicUsize::new(0)),
            find_all_calls: Mutex::new(Vec::new()),
            _gauge: None,
        }
    }

    /// Simulate a page without the download panel button.
    pub fn without_panel(mut self) -> Self {
        self.panel_available = false;
        self
    }

    pub fn with_disabled_trigger(mut self) -> Self {
        self.trigger_enabled = false;
        self
    }

    /// Selecting `id` will work, but triggering never produces an artifact.
    pub fn with_dead_node(mut self, id: &str) -> Self {
        self.dead_nodes.insert(id.to_string());
        self
    }

    /// The first click on this node's checkbox is swallowed; only the
    /// corrective click registers.
    pub fn with_sticky_checkbox(mut self, id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .sticky_checkboxes
            .insert(id.to_string());
        self
    }

    pub fn interaction_count(&self) -> usize {
        self.interactions.load(Ordering::SeqCst)
    }

    pub fn panel_is_open(&self) -> bool {
        self.state.lock().unwrap().panel_open
    }

    /// Every `find_all` call seen so far, as (selector, timeout) pairs.
    pub fn find_all_calls(&self) -> Vec<(String, Duration)> {
        self.find_all_calls.lock().unwrap().clone()
    }

    fn touch(&self) {
        self.interactions.fetch_add(1, Ordering::SeqCst);
    }

    fn find_node(&self, id: &str) -> Option<(&MockNode, Option<&MockNode>)> {
        for top in &self.nodes {
            if top.id == id {
                return Some((top, None));
            }
            for child in &top.children {
                if child.id == id {
                    return Some((child, Some(top)));
                }
            }
        }
        None
    }

    fn visible(&self, id: &str, st: &PanelState) -> bool {
        if !st.panel_open {
            return false;
        }
        match self.find_node(id) {
            Some((_, None)) => true,
            Some((_, Some(parent))) => st.expanded.contains(&parent.id),
            None => false,
        }
    }

    fn classify(&self, selector: &str, st: &PanelState) -> Option<MockHandle> {
        if selector.contains("hopscotch") {
            return None;
        }
        if selector == ".offcanvas-pane button[data-dismiss]" {
            return st.panel_open.then_some(MockHandle::CloseButton);
        }
        if selector == ".offcanvas-pane.active" {
            return st.panel_open.then_some(MockHandle::Panel);
        }
        if selector.starts_with("//button") && selector.contains("btn-primary") {
            return st.panel_open.then_some(MockHandle::Trigger);
        }
        if selector.starts_with("//button") || selector == "button.toc-download" {
            return self.panel_available.then_some(MockHandle::OpenButton);
        }
        if let Some(rest) = selector.strip_prefix("li[data-nodeid='") {
            let end = rest.find('\'')?;
            let id = rest[..end].to_string();
            let tail = rest[end..].strip_prefix("']")?;
            if !self.visible(&id, st) {
                return None;
            }
            return match tail {
                "" => Some(MockHandle::Node(id)),
                " > button.expToc-expander" => {
                    let (node, _) = self.find_node(&id)?;
                    (!node.children.is_empty()).then_some(MockHandle::Expander(id))
                }
                " > button.expToc-selector[role='checkbox']" => Some(MockHandle::Checkbox(id)),
                " button.expToc-selector span[data-ng-bind]" => Some(MockHandle::Heading(id)),
                _ => None,
            };
        }
        None
    }

    fn write_artifacts_for_selection(&self, st: &mut PanelState) {
        for id in st.selected.clone() {
            if self.dead_nodes.contains(&id) {
                continue;
            }
            st.artifact_seq += 1;
            let name = format!("mock_download_{}.docx", st.artifact_seq);
            std::fs::write(self.download_dir.join(name), format!("artifact for {id}"))
                .expect("mock artifact write");
        }
    }
}

#[async_trait]
impl AutomationSurface for MockSurface {
    type Handle = MockHandle;

    async fn navigate(&self, _url: &str, _wait: WaitPolicy) -> Result<()> {
        self.touch();
        Ok(())
    }

    async fn find_one(&self, selector: &str, _timeout: Duration) -> Result<Option<MockHandle>> {
        self.touch();
        let st = self.state.lock().unwrap();
        Ok(self.classify(selector, &st))
    }

    async fn find_all(&self, selector: &str, timeout: Duration) -> Result<Vec<MockHandle>> {
        self.touch();
        self.find_all_calls
            .lock()
            .unwrap()
            .push((selector.to_string(), timeout));
        let st = self.state.lock().unwrap();
        if selector == "ul.gen-toc-nav > li[data-nodeid]" {
            if !st.panel_open {
                return Ok(Vec::new());
            }
            return Ok(self
                .nodes
                .iter()
                .map(|n| MockHandle::Node(n.id.clone()))
                .collect());
        }
        if let Some(rest) = selector.strip_prefix("ul#child-nodes-") {
            let Some(id) = rest.strip_suffix(" > li[data-nodeid]") else {
                return Ok(Vec::new());
            };
            if !st.expanded.contains(id) {
                return Ok(Vec::new());
            }
            if let Some((node, _)) = self.find_node(id) {
                return Ok(node
                    .children
                    .iter()
                    .map(|c| MockHandle::Node(c.id.clone()))
                    .collect());
            }
        }
        Ok(Vec::new())
    }

    async fn click(&self, handle: &MockHandle) -> Result<()> {
        self.touch();
        let mut st = self.state.lock().unwrap();
        match handle {
            MockHandle::OpenButton => st.panel_open = true,
            MockHandle::CloseButton => {
                st.panel_open = false;
                st.selected.clear();
                st.expanded.clear();
            }
            MockHandle::Expander(id) => {
                if !st.expanded.remove(id) {
                    st.expanded.insert(id.clone());
                }
            }
            MockHandle::Checkbox(id) => {
                if st.sticky_checkboxes.remove(id) {
                    // first click swallowed
                } else if !st.selected.remove(id) {
                    st.selected.insert(id.clone());
                }
            }
            MockHandle::Trigger => {
                if self.trigger_enabled {
                    self.write_artifacts_for_selection(&mut st);
                }
            }
            MockHandle::Panel | MockHandle::Node(_) | MockHandle::Heading(_) => {}
        }
        Ok(())
    }

    async fn read_text(&self, handle: &MockHandle) -> Result<String> {
        self.touch();
        match handle {
            MockHandle::Heading(id) => Ok(self
                .find_node(id)
                .map(|(n, _)| n.heading.clone())
                .unwrap_or_default()),
            _ => Ok(String::new()),
        }
    }

    async fn read_attribute(&self, handle: &MockHandle, name: &str) -> Result<Option<String>> {
        self.touch();
        let st = self.state.lock().unwrap();
        Ok(match (handle, name) {
            (MockHandle::Node(id), "data-nodeid") => Some(id.clone()),
            (MockHandle::Checkbox(id), "aria-checked") => {
                Some(if st.selected.contains(id) { "true" } else { "false" }.to_string())
            }
            (MockHandle::Trigger, "disabled") => {
                (!self.trigger_enabled).then(|| "true".to_string())
            }
            _ => None,
        })
    }

    async fn evaluate(&self, _js: &str) -> Result<()> {
        self.touch();
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.touch();
        std::fs::write(path, b"")?;
        Ok(())
    }
}

/// Factory producing mock surfaces over a shared tree and download
/// directory, with counters for created and concurrently-live sessions.
#[derive(Clone)]
pub struct MockFactory {
    pub nodes: Vec<MockNode>,
    pub download_dir: PathBuf,
    pub dead_nodes: HashSet<String>,
    pub created: Arc<AtomicUsize>,
    pub live: Arc<AtomicUsize>,
    pub high_water: Arc<AtomicUsize>,
    pub interactions: Arc<AtomicUsize>,
}

impl MockFactory {
    pub fn new(nodes: Vec<MockNode>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            nodes,
            download_dir: download_dir.into(),
            dead_nodes: HashSet::new(),
            created: Arc::new(AtomicUsize::new(0)),
            live: Arc::new(AtomicUsize::new(0)),
            high_water: Arc::new(AtomicUsize::new(0)),
            interactions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_dead_node(mut self, id: &str) -> Self {
        self.dead_nodes.insert(id.to_string());
        self
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    pub fn interaction_count(&self) -> usize {
        self.interactions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for MockFactory {
    type Surface = MockSurface;

    async fn create(&self) -> Result<MockSurface> {
        std::fs::create_dir_all(&self.download_dir)?;
        self.created.fetch_add(1, Ordering::SeqCst);
        let live_now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(live_now, Ordering::SeqCst);
        let mut surface = MockSurface::new(self.nodes.clone(), &self.download_dir);
        surface.dead_nodes = self.dead_nodes.clone();
        surface.interactions = Arc::clone(&self.interactions);
        surface._gauge = Some(LiveGauge {
            live: Arc::clone(&self.live),
        });
        Ok(surface)
    }
}
