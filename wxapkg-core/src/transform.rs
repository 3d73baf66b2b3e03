//! Per-extension pretty-printer registry (§4.4, §6.4).
//!
//! Every transform is `fn(&[u8]) -> Option<Vec<u8>>`: `None` means "leave
//! the raw bytes alone", which the extractor treats as a silent fallback,
//! never a hard failure.

use std::collections::HashMap;

pub type Transform = fn(&[u8]) -> Option<Vec<u8>>;

/// Build the default registry: `.json`, `.js`, `.html`.
pub fn default_registry() -> HashMap<&'static str, Transform> {
    let mut registry: HashMap<&'static str, Transform> = HashMap::new();
    registry.insert(".json", pretty_json);
    registry.insert(".js", pretty_js);
    registry.insert(".html", pretty_html);
    registry
}

/// An empty registry, for `--disable-beautify`: every entry is written raw.
pub fn disabled_registry() -> HashMap<&'static str, Transform> {
    HashMap::new()
}

/// Re-emit JSON with 2-space indentation, preserving key order and
/// non-ASCII codepoints. Falls back to `None` (pass-through) on parse
/// failure.
pub fn pretty_json(bytes: &[u8]) -> Option<Vec<u8>> {
    let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    serde::Serialize::serialize(&value, &mut ser).ok()?;
    Some(out)
}

/// A brace/semicolon-driven reindentation pass, not a full JS formatter.
/// Tracks bracket depth across `{ } ( ) [ ]` and string/comment state so it
/// never reindents inside a string literal or comment.
pub fn pretty_js(bytes: &[u8]) -> Option<Vec<u8>> {
    let text = std::str::from_utf8(bytes).ok()?;
    Some(reindent_js(text).into_bytes())
}

fn reindent_js(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    let mut depth: i32 = 0;
    let mut chars = text.chars().peekable();
    let mut at_line_start = true;
    let mut in_string: Option<char> = None;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while let Some(c) = chars.next() {
        if in_line_comment {
            out.push(c);
            if c == '\n' {
                in_line_comment = false;
                at_line_start = true;
            }
            continue;
        }
        if in_block_comment {
            out.push(c);
            if c == '*' && chars.peek() == Some(&'/') {
                out.push(chars.next().unwrap());
                in_block_comment = false;
            }
            continue;
        }
        if let Some(quote) = in_string {
            out.push(c);
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
                continue;
            }
            if c == quote {
                in_string = None;
            }
            continue;
        }

        if at_line_start && (c == ' ' || c == '\t') {
            continue;
        }

        match c {
            '"' | '\'' | '`' => {
                in_string = Some(c);
                indent_if_needed(&mut out, &mut at_line_start, depth);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                chars.next();
                indent_if_needed(&mut out, &mut at_line_start, depth);
                out.push_str("//");
                in_line_comment = true;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                indent_if_needed(&mut out, &mut at_line_start, depth);
                out.push_str("/*");
                in_block_comment = true;
            }
            '}' | ')' | ']' => {
                depth = (depth - 1).max(0);
                indent_if_needed(&mut out, &mut at_line_start, depth);
                out.push(c);
            }
            '{' | '(' | '[' => {
                indent_if_needed(&mut out, &mut at_line_start, depth);
                out.push(c);
                depth += 1;
            }
            '\n' => {
                out.push('\n');
                at_line_start = true;
            }
            ';' => {
                indent_if_needed(&mut out, &mut at_line_start, depth);
                out.push(c);
            }
            _ => {
                indent_if_needed(&mut out, &mut at_line_start, depth);
                out.push(c);
            }
        }
    }

    out
}

fn indent_if_needed(out: &mut String, at_line_start: &mut bool, depth: i32) {
    if *at_line_start {
        for _ in 0..depth {
            out.push_str("  ");
        }
        *at_line_start = false;
    }
}

/// A small tag-aware re-indenter: walks tags and text nodes, re-indenting
/// each new tag by nesting depth, and re-indents the contents of any
/// `<script>` element through [`pretty_js`].
pub fn pretty_html(bytes: &[u8]) -> Option<Vec<u8>> {
    let text = std::str::from_utf8(bytes).ok()?;
    if !text.contains('<') {
        return None;
    }
    Some(reindent_html(text).into_bytes())
}

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

fn reindent_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    let mut depth: usize = 0;
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'<' {
            if let Some(script_contents_end) = try_consume_script(text, i, &mut out, &mut depth) {
                i = script_contents_end;
                continue;
            }

            let tag_end = match text[i..].find('>') {
                Some(rel) => i + rel + 1,
                None => {
                    out.push_str(&text[i..]);
                    break;
                }
            };
            let tag_text = &text[i..tag_end];
            let is_closing = tag_text.starts_with("</");
            let is_self_closing = tag_text.ends_with("/>");
            let name = tag_name(tag_text);
            let is_void = name
                .map(|n| VOID_TAGS.contains(&n.to_lowercase().as_str()))
                .unwrap_or(false);

            if is_closing && depth > 0 {
                depth -= 1;
            }
            push_indent(&mut out, depth);
            out.push_str(tag_text);
            out.push('\n');
            if !is_closing && !is_self_closing && !is_void && !tag_text.starts_with("<!--") {
                depth += 1;
            }

            i = tag_end;
        } else {
            let next_tag = text[i..].find('<').map(|r| i + r).unwrap_or(text.len());
            let chunk = text[i..next_tag].trim();
            if !chunk.is_empty() {
                push_indent(&mut out, depth);
                out.push_str(chunk);
                out.push('\n');
            }
            i = next_tag;
        }
    }

    out
}

fn try_consume_script(
    text: &str,
    start: usize,
    out: &mut String,
    depth: &mut usize,
) -> Option<usize> {
    let rest = &text[start..];
    if !rest.to_lowercase().starts_with("<script") {
        return None;
    }
    let open_end = start + rest.find('>')? + 1;
    let close_rel = text[open_end..].to_lowercase().find("</script>")?;
    let close_start = open_end + close_rel;
    let close_end = close_start + "</script>".len();

    push_indent(out, *depth);
    out.push_str(&text[start..open_end]);
    out.push('\n');

    let script_body = &text[open_end..close_start];
    if !script_body.trim().is_empty() {
        let reindented = reindent_js(script_body.trim());
        for line in reindented.lines() {
            push_indent(out, *depth + 1);
            out.push_str(line);
            out.push('\n');
        }
    }

    push_indent(out, *depth);
    out.push_str(&text[close_start..close_end]);
    out.push('\n');

    Some(close_end)
}

fn tag_name(tag_text: &str) -> Option<&str> {
    let trimmed = tag_text.trim_start_matches("</").trim_start_matches('<');
    let end = trimmed
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(trimmed.len());
    if end == 0 {
        None
    } else {
        Some(&trimmed[..end])
    }
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_json_reindents_with_two_spaces() {
        let input = br#"{"a":1,"b":[1,2,3]}"#;
        let out = pretty_json(input).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\n  \"a\""));
    }

    #[test]
    fn pretty_json_preserves_non_ascii() {
        let input = "{\"name\":\"\u{5fae}\u{4fe1}\"}".as_bytes();
        let out = pretty_json(input).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains('\u{5fae}'));
    }

    #[test]
    fn pretty_json_falls_back_on_invalid_input() {
        assert!(pretty_json(b"not json").is_none());
    }

    #[test]
    fn pretty_js_indents_nested_braces() {
        let input = b"function f(){if(x){return 1;}}";
        let out = pretty_js(input).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains('{'));
    }

    #[test]
    fn pretty_js_does_not_reindent_inside_strings() {
        let input = b"var s = \"{ not real }\";";
        let out = pretty_js(input).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"{ not real }\""));
    }

    #[test]
    fn pretty_html_falls_back_without_tags() {
        assert!(pretty_html(b"plain text, no markup").is_none());
    }

    #[test]
    fn pretty_html_reindents_nested_tags() {
        let input = b"<div><p>hello</p></div>";
        let out = pretty_html(input).unwrap();
        let text = String::from_utf8(out).unwrap();
        let p_line = text.lines().find(|l| l.contains("<p>")).unwrap();
        assert!(p_line.starts_with("  "));
    }

    #[test]
    fn pretty_html_reindents_script_contents_as_js() {
        let input = b"<script>function f(){return 1;}</script>";
        let out = pretty_html(input).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("function f"));
        assert!(text.lines().count() > 1);
    }

    #[test]
    fn default_registry_has_three_entries() {
        let registry = default_registry();
        assert_eq!(registry.len(), 3);
        assert!(registry.contains_key(".json"));
        assert!(registry.contains_key(".js"));
        assert!(registry.contains_key(".html"));
    }

    #[test]
    fn disabled_registry_is_empty() {
        assert!(disabled_registry().is_empty());
    }
}
