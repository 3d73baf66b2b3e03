use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn is_false(b: &bool) -> bool {
    !*b
}

/// One entry in a container's file index (§3 "Archive entry").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Stored path, still carrying its leading `/`.
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

impl ArchiveEntry {
    /// The path with its leading `/` stripped, ready to join to an output root.
    pub fn relative_path(&self) -> &str {
        self.name.strip_prefix('/').unwrap_or(&self.name)
    }
}

/// Parsed container: the file index plus the plaintext it indexes into.
#[derive(Debug, Clone)]
pub struct Container {
    pub entries: Vec<ArchiveEntry>,
    pub plaintext: Vec<u8>,
}

/// Tally of how many entries of each extension were written, plus failures.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractStats {
    pub total: usize,
    pub by_extension: BTreeMap<String, usize>,
    pub failed: usize,
}

/// A restored style sheet, keyed by logical path (§3 "Style record").
#[derive(Debug, Clone, Serialize)]
pub struct StyleRecord {
    pub logical_path: String,
    pub css_text: String,
    pub is_global: bool,
}

/// An attribute value: either a quoted string or a bare boolean flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    Boolean,
}

/// One node of a restored template tree (§3 "Template node").
#[derive(Debug, Clone, Serialize)]
pub struct TemplateNode {
    pub tag: String,
    pub attrs: Vec<(String, AttrValue)>,
    pub children: Vec<TemplateChild>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TemplateChild {
    Text(String),
    Node(TemplateNode),
}

impl TemplateNode {
    pub fn new(tag: impl Into<String>) -> Self {
        TemplateNode {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// `tabBar` configuration, serialised only when at least one field is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabBarItem {
    #[serde(rename = "pagePath")]
    pub page_path: String,
    pub text: String,
    #[serde(rename = "iconPath", skip_serializing_if = "String::is_empty", default)]
    pub icon_path: String,
    #[serde(
        rename = "selectedIconPath",
        skip_serializing_if = "String::is_empty",
        default
    )]
    pub selected_icon_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabBar {
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub color: String,
    #[serde(
        rename = "selectedColor",
        skip_serializing_if = "String::is_empty",
        default
    )]
    pub selected_color: String,
    #[serde(
        rename = "backgroundColor",
        skip_serializing_if = "String::is_empty",
        default
    )]
    pub background_color: String,
    #[serde(
        rename = "borderStyle",
        skip_serializing_if = "String::is_empty",
        default
    )]
    pub border_style: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub position: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub list: Vec<TabBarItem>,
}

impl TabBar {
    pub fn is_empty(&self) -> bool {
        self.color.is_empty()
            && self.selected_color.is_empty()
            && self.background_color.is_empty()
            && self.border_style.is_empty()
            && self.position.is_empty()
            && self.list.is_empty()
    }
}

/// The global `app.json` view (§3 "Restored-config document").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub pages: Vec<String>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty", default)]
    pub window: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "tabBar", skip_serializing_if = "Option::is_none", default)]
    pub tab_bar: Option<TabBar>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub subpackages: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty", default)]
    pub plugins: serde_json::Map<String, serde_json::Value>,
}

/// Per-page configuration. Known fields per §4.8, plus a catch-all for
/// unrecognised keys so future fields never silently vanish (§9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(
        rename = "navigationBarTitleText",
        skip_serializing_if = "String::is_empty",
        default
    )]
    pub navigation_bar_title_text: String,
    #[serde(
        rename = "navigationBarBackgroundColor",
        skip_serializing_if = "String::is_empty",
        default
    )]
    pub navigation_bar_background_color: String,
    #[serde(
        rename = "navigationBarTextStyle",
        skip_serializing_if = "String::is_empty",
        default
    )]
    pub navigation_bar_text_style: String,
    #[serde(
        rename = "backgroundColor",
        skip_serializing_if = "String::is_empty",
        default
    )]
    pub background_color: String,
    #[serde(
        rename = "backgroundTextStyle",
        skip_serializing_if = "String::is_empty",
        default
    )]
    pub background_text_style: String,
    #[serde(
        rename = "enablePullDownRefresh",
        skip_serializing_if = "is_false",
        default
    )]
    pub enable_pull_down_refresh: bool,
    #[serde(
        rename = "usingComponents",
        skip_serializing_if = "serde_json::Map::is_empty",
        default
    )]
    pub using_components: serde_json::Map<String, serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PageConfig {
    pub fn is_empty(&self) -> bool {
        self.navigation_bar_title_text.is_empty()
            && self.navigation_bar_background_color.is_empty()
            && self.navigation_bar_text_style.is_empty()
            && self.background_color.is_empty()
            && self.background_text_style.is_empty()
            && !self.enable_pull_down_refresh
            && self.using_components.is_empty()
            && self.extra.is_empty()
    }
}

/// Full restored-config view: the global config plus every per-page config
/// keyed by logical page path (without a trailing `.json`).
#[derive(Debug, Clone, Default)]
pub struct RestoredConfig {
    pub app: Option<AppConfig>,
    pub pages: BTreeMap<String, PageConfig>,
}
