//! Selector set for the download panel and tree widget.
//!
//! Per-node selectors are templates with an `{id}` placeholder, so the
//! engine always queries the live document by stable node id instead of
//! holding element handles across panel cycles.

/// Selectors describing one site's download panel layout. The default is
/// the Municode library layout.
#[derive(Debug, Clone)]
pub struct PanelSelectors {
    /// Tour/onboarding overlays dismissed before anything else.
    pub overlay_closers: Vec<String>,
    /// Close button of an already-open panel.
    pub panel_close: String,
    /// Candidate buttons that open the download panel, tried in order.
    pub open_buttons: Vec<String>,
    /// The panel once it is open and active.
    pub active_panel: String,
    /// Top-level tree items inside the panel.
    pub root_items: String,
    /// The button that starts the download of the selected sections.
    pub trigger_button: String,
    /// Attribute carrying the stable node id.
    pub node_id_attr: String,
    /// Attribute reflecting a checkbox's selection state.
    pub checked_attr: String,
    /// Attribute present when the trigger is disabled.
    pub disabled_attr: String,
    node_item_tpl: String,
    node_heading_tpl: String,
    node_expander_tpl: String,
    node_checkbox_tpl: String,
    child_items_tpl: String,
}

impl Default for PanelSelectors {
    fn default() -> Self {
        Self {
            overlay_closers: vec![
                "div.hopscotch-bubble-container button.hopscotch-cta".to_string(),
                "div.hopscotch-bubble-container button.hopscotch-close".to_string(),
            ],
            panel_close: ".offcanvas-pane button[data-dismiss]".to_string(),
            open_buttons: vec![
                "//button[contains(@title, 'Download')]".to_string(),
                "//button[contains(., 'Download')]".to_string(),
                "button.toc-download".to_string(),
            ],
            active_panel: ".offcanvas-pane.active".to_string(),
            root_items: "ul.gen-toc-nav > li[data-nodeid]".to_string(),
            trigger_button:
                "//button[contains(@class, 'btn-primary') and contains(., 'Download')]"
                    .to_string(),
            node_id_attr: "data-nodeid".to_string(),
            checked_attr: "aria-checked".to_string(),
            disabled_attr: "disabled".to_string(),
            node_item_tpl: "li[data-nodeid='{id}']".to_string(),
            node_heading_tpl:
                "li[data-nodeid='{id}'] button.expToc-selector span[data-ng-bind]".to_string(),
            node_expander_tpl: "li[data-nodeid='{id}'] > button.expToc-expander".to_string(),
            node_checkbox_tpl:
                "li[data-nodeid='{id}'] > button.expToc-selector[role='checkbox']".to_string(),
            child_items_tpl: "ul#child-nodes-{id} > li[data-nodeid]".to_string(),
        }
    }
}

impl PanelSelectors {
    pub fn node_item(&self, id: &str) -> String {
        self.node_item_tpl.replace("{id}", id)
    }

    pub fn node_heading(&self, id: &str) -> String {
        self.node_heading_tpl.replace("{id}", id)
    }

    pub fn node_expander(&self, id: &str) -> String {
        self.node_expander_tpl.replace("{id}", id)
    }

    pub fn node_checkbox(&self, id: &str) -> String {
        self.node_checkbox_tpl.replace("{id}", id)
    }

    pub fn child_items(&self, id: &str) -> String {
        self.child_items_tpl.replace("{id}", id)
    }
}
