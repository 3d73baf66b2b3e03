//! Template restorer (C7): reconstruct `.wxml` trees from `z.push` calls.

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{AttrValue, TemplateChild, TemplateNode};
use crate::tokenizer::{tokenize, unquote};

const SELF_CLOSING: &[&str] = &["image", "input", "import", "include", "wxs"];
const VALID_TAGS: &[&str] = &[
    "view",
    "text",
    "image",
    "button",
    "input",
    "scroll-view",
    "swiper",
    "swiper-item",
    "icon",
    "navigator",
    "form",
    "checkbox",
    "radio",
    "picker",
    "slider",
    "switch",
    "textarea",
    "video",
    "audio",
    "map",
    "canvas",
    "block",
    "template",
    "import",
    "include",
    "wxs",
];

static GWX_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\$gwx\s*\(\s*["']([^"']+\.wxml)["']\s*\)"#).unwrap());

static Z_PUSH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)z\.push\s*\(\s*(\[.*?\])\s*\)\s*;").unwrap());

static APP_CODE_WXML_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"__wxAppCode__\s*\[\s*["']([^"']+\.wxml)["']\s*\]\s*=\s*\$gwx\s*\("#).unwrap()
});

static LITERAL_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)["'](<[a-z][^>]*>.*?</[a-z][a-z0-9-]*>)["']"#).unwrap());

/// Restore every template reachable from `root`: existing `.wxml` files
/// (re-restored if still compiled), `app-service.js`, `page-frame.html`,
/// and any other `*.js` that contains compiled template markers.
pub fn restore(root: &Path) -> BTreeMap<String, String> {
    let mut templates: BTreeMap<String, String> = BTreeMap::new();

    scan_wxml_files(root, &mut templates);

    let app_service = root.join("app-service.js");
    if let Ok(content) = std::fs::read_to_string(&app_service) {
        extract_from_app_service(&content, &mut templates);
    }

    let page_frame = root.join("page-frame.html");
    if let Ok(content) = std::fs::read_to_string(&page_frame) {
        extract_from_page_frame(&content, &mut templates);
    }

    scan_page_directories(root, &mut templates);

    templates
}

fn scan_wxml_files(root: &Path, templates: &mut BTreeMap<String, String>) {
    for entry in walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("wxml"))
    {
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        let Ok(rel_path) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel_path = rel_path.to_string_lossy().replace('\\', "/");

        if is_compiled_wxml(&content) {
            if let Some(restored) = restore_from_compiled(&content) {
                templates.insert(rel_path, restored);
            }
        } else {
            templates.insert(rel_path, content);
        }
    }
}

fn is_compiled_wxml(content: &str) -> bool {
    if content.trim_start().starts_with('<') {
        return false;
    }
    content.contains("var z=") || content.contains("z.push") || content.contains("$gwx")
}

fn extract_from_app_service(content: &str, templates: &mut BTreeMap<String, String>) {
    for caps in APP_CODE_WXML_PATTERN.captures_iter(content) {
        let wxml_path = caps[1].to_string();
        if templates.contains_key(&wxml_path) {
            continue;
        }
        if let Some(template) = extract_template_block(content, &wxml_path) {
            templates.insert(wxml_path, template);
        }
    }
}

fn extract_from_page_frame(content: &str, templates: &mut BTreeMap<String, String>) {
    for caps in GWX_PATTERN.captures_iter(content) {
        let wxml_path = caps[1].to_string();
        if templates.contains_key(&wxml_path) {
            continue;
        }
        if let Some(template) = extract_template_block(content, &wxml_path) {
            templates.insert(wxml_path, template);
        }
    }
}

/// Scope extraction to the function block adjacent to `wxml_path`, rather
/// than the whole file, so a multi-page bundle doesn't concatenate every
/// page's nodes into each page's output.
fn extract_template_block(content: &str, wxml_path: &str) -> Option<String> {
    let escaped = regex::escape(wxml_path);
    let patterns = [
        format!(
            r#"__wxAppCode__\s*\[\s*["']{escaped}["']\s*\]\s*=\s*\$gwx\s*\([^)]*\)\s*;?\s*(function\s*\([^)]*\)\s*\{{[\s\S]*?\}})"#
        ),
        format!(r#"/\*\s*{escaped}\s*\*/\s*(function\s*\([^)]*\)\s*\{{[\s\S]*?\}})"#),
    ];

    for pattern in &patterns {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        if let Some(caps) = re.captures(content) {
            let func_content = caps.get(1).unwrap().as_str();
            return restore_from_compiled(func_content);
        }
    }

    None
}

fn scan_page_directories(root: &Path, templates: &mut BTreeMap<String, String>) {
    for entry in walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("js"))
    {
        let file_name = entry.file_name().to_string_lossy();
        if file_name == "app-service.js" || file_name == "app-wxss.js" {
            continue;
        }

        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        if !content.contains("z.push") && !content.contains("$gwx") {
            continue;
        }

        let Ok(rel_path) = entry.path().strip_prefix(root) else {
            continue;
        };
        let wxml_path = rel_path.to_string_lossy().replace('\\', "/").replace(".js", ".wxml");

        if templates.contains_key(&wxml_path) {
            continue;
        }
        if let Some(template) = restore_from_compiled(&content) {
            templates.insert(wxml_path, template);
        }
    }
}

/// Reverse `z.push([...])` calls into a flat sequence of template nodes,
/// rendering each and concatenating. Falls back to literal `<tag>...</tag>`
/// extraction when no `z.push` call is found.
fn restore_from_compiled(content: &str) -> Option<String> {
    let mut rendered = String::new();

    for caps in Z_PUSH_PATTERN.captures_iter(content) {
        if let Some(node) = parse_z_array(&caps[1]) {
            rendered.push_str(&render_node(&node, 0));
        }
    }

    if rendered.trim().is_empty() {
        return try_alternative_restore(content);
    }

    Some(rendered.trim().to_string())
}

fn parse_z_array(array_str: &str) -> Option<TemplateNode> {
    let parts = tokenize(array_str);
    if parts.is_empty() {
        return None;
    }

    let tag = unquote(&parts[0]);
    if tag.is_empty() || tag.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut node = TemplateNode::new(tag);

    if let Some(attrs_part) = parts.get(1) {
        if attrs_part.starts_with('[') {
            node.attrs = parse_attrs(attrs_part);
        }
    }

    for child_part in parts.iter().skip(2) {
        if child_part.starts_with('[') {
            if let Some(child_node) = parse_z_array(child_part) {
                node.children.push(TemplateChild::Node(child_node));
            }
        } else {
            let text = unquote(child_part);
            if !text.is_empty() {
                node.children.push(TemplateChild::Text(text));
            }
        }
    }

    Some(node)
}

fn parse_attrs(attrs_str: &str) -> Vec<(String, AttrValue)> {
    let parts = tokenize(attrs_str);
    let mut result = Vec::new();
    let mut i = 0;
    while i + 1 < parts.len() {
        let key = unquote(&parts[i]);
        let raw_value = &parts[i + 1];
        let value = if raw_value == "true" || raw_value == "!0" {
            AttrValue::Boolean
        } else {
            AttrValue::Text(unquote(raw_value))
        };
        result.push((key, value));
        i += 2;
    }
    result
}

fn try_alternative_restore(content: &str) -> Option<String> {
    let tags: Vec<&str> = LITERAL_TAG_PATTERN
        .captures_iter(content)
        .map(|caps| caps.get(1).unwrap().as_str())
        .filter(|tag| is_valid_wxml_tag(tag))
        .collect();

    if tags.is_empty() {
        None
    } else {
        Some(tags.join("\n"))
    }
}

fn is_valid_wxml_tag(tag: &str) -> bool {
    let lower = tag.to_lowercase();
    VALID_TAGS
        .iter()
        .any(|t| lower.contains(&format!("<{t}")))
}

fn render_node(node: &TemplateNode, indent: usize) -> String {
    let prefix = "  ".repeat(indent);

    let mut attrs_str = String::new();
    for (key, value) in &node.attrs {
        match value {
            AttrValue::Boolean => {
                attrs_str.push(' ');
                attrs_str.push_str(key);
            }
            AttrValue::Text(text) => {
                attrs_str.push_str(&format!(r#" {key}="{text}""#));
            }
        }
    }

    if node.children.is_empty() {
        if SELF_CLOSING.contains(&node.tag.as_str()) {
            return format!("{prefix}<{}{attrs_str} />\n", node.tag);
        }
        return format!("{prefix}<{}{attrs_str}></{}>\n", node.tag, node.tag);
    }

    if node.children.len() == 1 {
        if let TemplateChild::Text(text) = &node.children[0] {
            let trimmed = text.trim();
            if !trimmed.contains('\n') && trimmed.len() < 60 {
                return format!("{prefix}<{}{attrs_str}>{trimmed}</{}>\n", node.tag, node.tag);
            }
        }
    }

    let mut result = format!("{prefix}<{}{attrs_str}>\n", node.tag);
    for child in &node.children {
        match child {
            TemplateChild::Node(child_node) => {
                result.push_str(&render_node(child_node, indent + 1));
            }
            TemplateChild::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    result.push_str(&"  ".repeat(indent + 1));
                    result.push_str(trimmed);
                    result.push('\n');
                }
            }
        }
    }
    result.push_str(&format!("{prefix}</{}>\n", node.tag));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tag_attrs_and_text_child() {
        let node = parse_z_array(r#"["view", ["class", "container"], "hello"]"#).unwrap();
        assert_eq!(node.tag, "view");
        assert_eq!(node.attrs[0].0, "class");
        assert!(matches!(&node.children[0], TemplateChild::Text(t) if t == "hello"));
    }

    #[test]
    fn renders_self_closing_tags() {
        let node = TemplateNode::new("image");
        let rendered = render_node(&node, 0);
        assert_eq!(rendered, "<image />\n");
    }

    #[test]
    fn renders_short_text_inline() {
        let mut node = TemplateNode::new("text");
        node.children.push(TemplateChild::Text("hi there".into()));
        let rendered = render_node(&node, 0);
        assert_eq!(rendered, "<text>hi there</text>\n");
    }

    #[test]
    fn recursively_decodes_nested_child_arrays() {
        let node = parse_z_array(r#"["view", [], ["text", [], "nested"]]"#).unwrap();
        assert_eq!(node.children.len(), 1);
        match &node.children[0] {
            TemplateChild::Node(inner) => assert_eq!(inner.tag, "text"),
            _ => panic!("expected nested node"),
        }
    }

    #[test]
    fn restores_from_z_push_calls() {
        let content = r#"var z=[];z.push(["view", ["class", "a"], "hi"]);"#;
        let restored = restore_from_compiled(content).unwrap();
        assert!(restored.contains("<view class=\"a\">hi</view>"));
    }

    #[test]
    fn extract_from_app_service_scopes_to_the_matching_page_only() {
        let content = concat!(
            r#"__wxAppCode__["pages/a/a.wxml"]=$gwx("pages/a/a.wxml");"#,
            r#"function($){var z=[];z.push(["view",[],"a-page"]);};"#,
            r#"__wxAppCode__["pages/b/b.wxml"]=$gwx("pages/b/b.wxml");"#,
            r#"function($){var z=[];z.push(["view",[],"b-page"]);};"#,
        );

        let mut templates = BTreeMap::new();
        extract_from_app_service(content, &mut templates);

        let a = templates.get("pages/a/a.wxml").unwrap();
        let b = templates.get("pages/b/b.wxml").unwrap();
        assert!(a.contains("a-page"));
        assert!(!a.contains("b-page"));
        assert!(b.contains("b-page"));
        assert!(!b.contains("a-page"));
    }

    #[test]
    fn falls_back_to_literal_tag_extraction() {
        let content = r#"var x = "<view class='a'>literal</view>";"#;
        let restored = restore_from_compiled(content).unwrap();
        assert!(restored.contains("<view"));
    }

    #[test]
    fn is_compiled_detects_markers() {
        assert!(is_compiled_wxml("var z=[];z.push([1])"));
        assert!(is_compiled_wxml("$gwx(\"a.wxml\")"));
        assert!(!is_compiled_wxml("<view></view>"));
    }
}
