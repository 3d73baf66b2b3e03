//! Style restorer (C6): reconstruct `.wxss` files from `setCssToHead` calls.

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::StyleRecord;
use crate::tokenizer::{tokenize, unquote};

const DEFAULT_DEVICE_WIDTH: u32 = 375;

static SET_CSS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)setCssToHead\s*\(\s*\[\s*["']([^"']+)["']\s*\]\s*,\s*(\[(?:[^\[\]]|\[[^\[\]]*\])*\])\s*(?:,\s*(\d+))?\s*\)"#,
    )
    .unwrap()
});

static APP_CODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)__wxAppCode__\s*\[\s*["']([^"']+\.wxss)["']\s*\]\s*=\s*setCssToHead\s*\(\s*(\[(?:[^\[\]]|\[[^\[\]]*\])*\])\s*(?:,\s*(\d+))?\s*\)"#,
    )
    .unwrap()
});

static STYLE_TAG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<style[^>]*>(.*?)</style>").unwrap()
});

static RPX_ARRAY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[\s*(\d+)\s*,\s*([\d.]+)\s*\]$").unwrap());

/// Restore every style sheet reachable from `root`: `page-frame.html`'s
/// inline `<style>` blocks (attributed to `app.wxss`, global), `app-wxss.js`'s
/// `setCssToHead` calls, and any `*.wxss` file in the tree (re-parsed if it
/// still contains a `setCssToHead` call, otherwise treated as literal CSS).
pub fn restore(root: &Path) -> BTreeMap<String, StyleRecord> {
    let mut styles: BTreeMap<String, StyleRecord> = BTreeMap::new();

    let page_frame = root.join("page-frame.html");
    if let Ok(content) = std::fs::read_to_string(&page_frame) {
        extract_from_page_frame(&content, &mut styles);
    }

    let app_wxss = root.join("app-wxss.js");
    if let Ok(content) = std::fs::read_to_string(&app_wxss) {
        extract_set_css_calls(&content, &mut styles);
    }

    scan_page_directories(root, &mut styles);

    styles
}

fn extract_from_page_frame(content: &str, styles: &mut BTreeMap<String, StyleRecord>) {
    for caps in STYLE_TAG_PATTERN.captures_iter(content) {
        let css = caps[1].trim();
        if !css.is_empty() {
            add_style(styles, "app.wxss", css, true);
        }
    }
    extract_set_css_calls(content, styles);
}

fn extract_set_css_calls(content: &str, styles: &mut BTreeMap<String, StyleRecord>) {
    for caps in SET_CSS_PATTERN.captures_iter(content) {
        let path = &caps[1];
        let width = caps
            .get(3)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(DEFAULT_DEVICE_WIDTH);
        let css = parse_style_array(&caps[2], width);
        if !css.is_empty() {
            add_style(styles, path, &css, false);
        }
    }

    for caps in APP_CODE_PATTERN.captures_iter(content) {
        let path = &caps[1];
        let width = caps
            .get(3)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(DEFAULT_DEVICE_WIDTH);
        let css = parse_style_array(&caps[2], width);
        if !css.is_empty() {
            add_style(styles, path, &css, false);
        }
    }
}

/// Decode a style array literal (`["text", [0, 20], "more", ...]`) into CSS
/// text. `[0, v]` is an rpx-unit value, `[1, v]` a bare number; `device_width`
/// is accepted for fidelity with the original call signature but the rpx
/// unit is preserved rather than resolved to pixels.
fn parse_style_array(array_str: &str, _device_width: u32) -> String {
    let mut result = String::new();
    for part in tokenize(array_str) {
        if let Some(caps) = RPX_ARRAY_PATTERN.captures(&part) {
            let type_val: u32 = caps[1].parse().unwrap_or(1);
            let num_val = &caps[2];
            if type_val == 0 {
                result.push_str(num_val);
                result.push_str("rpx");
            } else {
                result.push_str(num_val);
            }
        } else if part.starts_with('"') || part.starts_with('\'') {
            result.push_str(&unquote(&part));
        }
    }
    result
}

fn scan_page_directories(root: &Path, styles: &mut BTreeMap<String, StyleRecord>) {
    for entry in walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("wxss"))
    {
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        let Ok(rel_path) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel_path = rel_path.to_string_lossy().replace('\\', "/");

        if content.contains("setCssToHead") {
            extract_set_css_calls(&content, styles);
        } else {
            add_style(styles, &rel_path, &content, false);
        }
    }
}

fn add_style(styles: &mut BTreeMap<String, StyleRecord>, path: &str, css: &str, is_global: bool) {
    let mut path = path.replace('\\', "/");
    if !path.ends_with(".wxss") {
        path.push_str(".wxss");
    }

    let formatted = format_css(css);

    styles
        .entry(path.clone())
        .and_modify(|record| {
            record.css_text.push('\n');
            record.css_text.push_str(&formatted);
        })
        .or_insert_with(|| StyleRecord {
            logical_path: path,
            css_text: formatted,
            is_global,
        });
}

static OPEN_BRACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\{\s*").unwrap());
static CLOSE_BRACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\}\s*").unwrap());
static SEMICOLON: Lazy<Regex> = Lazy::new(|| Regex::new(r";\s*").unwrap());
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Minimal pretty pass (§4.6): `{` starts a new indented line, `}` closes
/// it, `;` starts a new statement line, collapse blank lines.
fn format_css(css: &str) -> String {
    let css = css.trim();
    let css = OPEN_BRACE.replace_all(css, " {\n  ");
    let css = CLOSE_BRACE.replace_all(&css, "\n}\n");
    let css = SEMICOLON.replace_all(&css, ";\n  ");
    let css = BLANK_LINES.replace_all(&css, "\n");
    css.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn decodes_rpx_and_plain_tuples() {
        let css = parse_style_array(r#"["a", [0, 20], "b", [1, 32]]"#, 375);
        assert_eq!(css, "a20rpxb32");
    }

    #[test]
    fn decodes_string_escapes() {
        let css = parse_style_array(r#"[".a{color:\"red\"}"]"#, 375);
        assert_eq!(css, ".a{color:\"red\"}");
    }

    #[test]
    fn extracts_set_css_to_head_call() {
        let mut styles = BTreeMap::new();
        let content = r#"setCssToHead(["pages/index/index.wxss"], [".a{", [0, 20], "}"], 375);"#;
        extract_set_css_calls(content, &mut styles);
        assert!(styles.contains_key("pages/index/index.wxss"));
    }

    #[test]
    fn extracts_app_code_form() {
        let mut styles = BTreeMap::new();
        let content = r#"__wxAppCode__["app.wxss"]=setCssToHead([".b{color:red}"], 375);"#;
        extract_set_css_calls(content, &mut styles);
        assert!(styles.contains_key("app.wxss"));
    }

    #[test]
    fn style_tag_in_page_frame_is_global() {
        let mut styles = BTreeMap::new();
        let content = "<html><head><style>.c{color:blue}</style></head></html>";
        extract_from_page_frame(content, &mut styles);
        let record = styles.get("app.wxss").unwrap();
        assert!(record.is_global);
    }

    #[test]
    fn same_path_styles_are_concatenated() {
        let mut styles = BTreeMap::new();
        add_style(&mut styles, "app", "a{color:red}", false);
        add_style(&mut styles, "app", "b{color:blue}", false);
        let record = styles.get("app.wxss").unwrap();
        assert!(record.css_text.contains("a {"));
        assert!(record.css_text.contains("b {"));
    }

    #[test]
    fn format_css_splits_rules_onto_lines() {
        let out = format_css("a{color:red;margin:0;}");
        assert!(out.starts_with("a {"));
        assert!(out.contains("color:red;\n"));
    }

    #[test]
    fn scans_plain_wxss_file_in_tree() {
        let dir = tempfile::tempdir().unwrap();
        let page_dir = dir.path().join("pages/index");
        std::fs::create_dir_all(&page_dir).unwrap();
        let mut file = std::fs::File::create(page_dir.join("index.wxss")).unwrap();
        write!(file, ".x{{color:green}}").unwrap();
        drop(file);

        let styles = restore(dir.path());
        assert!(styles.contains_key("pages/index/index.wxss"));
    }
}
