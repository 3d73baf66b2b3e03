//! Config restorer (C8): reconstruct `app.json`, per-page `.json`, and a
//! `project.config.json` template from `app-config.json` / `app-service.js`.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::model::{AppConfig, PageConfig, RestoredConfig, TabBar, TabBarItem};

static APP_CODE_CONFIG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"__wxAppCode__\s*\[\s*["']([^"']+\.json)["']\s*\]\s*=\s*(\{(?:[^{}]|\{[^{}]*\})*\})"#)
        .unwrap()
});

const WXID_LEN: usize = 18;

/// Restore the full config view reachable from `root`.
pub fn restore(root: &Path) -> RestoredConfig {
    let mut config = RestoredConfig::default();

    let app_config_file = root.join("app-config.json");
    if let Ok(content) = std::fs::read_to_string(&app_config_file) {
        parse_app_config(&content, &mut config);
    }

    let app_service = root.join("app-service.js");
    if let Ok(content) = std::fs::read_to_string(&app_service) {
        extract_from_app_service(&content, &mut config);
    }

    scan_json_files(root, &mut config);

    config
}

fn parse_app_config(content: &str, config: &mut RestoredConfig) {
    let Ok(parsed) = serde_json::from_str::<Value>(content) else {
        return;
    };
    let Some(obj) = parsed.as_object() else {
        return;
    };

    let pages = obj
        .get("pages")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let window = obj
        .get("window")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let tab_bar = obj.get("tabBar").and_then(Value::as_object).map(|tb| TabBar {
        color: string_field(tb, "color"),
        selected_color: string_field(tb, "selectedColor"),
        background_color: string_field(tb, "backgroundColor"),
        border_style: string_field(tb, "borderStyle"),
        position: string_field(tb, "position"),
        list: tb
            .get("list")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_tab_bar_item).collect())
            .unwrap_or_default(),
    });

    let subpackages = obj
        .get("subPackages")
        .or_else(|| obj.get("subpackages"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let plugins = obj
        .get("plugins")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    config.app = Some(AppConfig {
        pages,
        window,
        tab_bar,
        subpackages,
        plugins,
    });

    if let Some(page_map) = obj.get("page").and_then(Value::as_object) {
        for (page_path, page_value) in page_map {
            if let Some(page_obj) = page_value.as_object() {
                config
                    .pages
                    .insert(page_path.clone(), page_config_from_object(page_obj));
            }
        }
    }
}

fn parse_tab_bar_item(value: &Value) -> Option<TabBarItem> {
    let obj = value.as_object()?;
    Some(TabBarItem {
        page_path: string_field(obj, "pagePath"),
        text: string_field(obj, "text"),
        icon_path: string_field(obj, "iconPath"),
        selected_icon_path: string_field(obj, "selectedIconPath"),
    })
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    obj.get(key).and_then(Value::as_str).unwrap_or("").to_string()
}

fn page_config_from_object(obj: &serde_json::Map<String, Value>) -> PageConfig {
    let known = [
        "navigationBarTitleText",
        "navigationBarBackgroundColor",
        "navigationBarTextStyle",
        "backgroundColor",
        "backgroundTextStyle",
        "enablePullDownRefresh",
        "usingComponents",
    ];

    let mut extra = serde_json::Map::new();
    for (key, value) in obj {
        if !known.contains(&key.as_str()) {
            extra.insert(key.clone(), value.clone());
        }
    }

    PageConfig {
        navigation_bar_title_text: string_field(obj, "navigationBarTitleText"),
        navigation_bar_background_color: string_field(obj, "navigationBarBackgroundColor"),
        navigation_bar_text_style: string_field(obj, "navigationBarTextStyle"),
        background_color: string_field(obj, "backgroundColor"),
        background_text_style: string_field(obj, "backgroundTextStyle"),
        enable_pull_down_refresh: obj
            .get("enablePullDownRefresh")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        using_components: obj
            .get("usingComponents")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
        extra,
    }
}

fn extract_from_app_service(content: &str, config: &mut RestoredConfig) {
    for caps in APP_CODE_CONFIG_PATTERN.captures_iter(content) {
        let json_path = &caps[1];
        let json_content = &caps[2];

        let Ok(parsed) = serde_json::from_str::<Value>(json_content) else {
            continue;
        };
        let Some(obj) = parsed.as_object() else {
            continue;
        };

        if json_path == "app.json" {
            if config.app.is_none() {
                config.app = Some(AppConfig {
                    pages: obj
                        .get("pages")
                        .and_then(Value::as_array)
                        .map(|arr| arr.iter().filter_map(Value::as_str).map(String::from).collect())
                        .unwrap_or_default(),
                    window: obj
                        .get("window")
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default(),
                    ..Default::default()
                });
            }
        } else {
            let page_path = json_path.trim_end_matches(".json").to_string();
            config.pages.entry(page_path).or_insert_with(|| PageConfig {
                using_components: obj
                    .get("usingComponents")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
                ..Default::default()
            });
        }
    }
}

fn scan_json_files(root: &Path, config: &mut RestoredConfig) {
    for entry in walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
    {
        let file_name = entry.file_name().to_string_lossy();
        if matches!(
            file_name.as_ref(),
            "app-config.json" | "project.config.json" | "sitemap.json"
        ) {
            continue;
        }

        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        let Ok(parsed) = serde_json::from_str::<Value>(&content) else {
            continue;
        };
        let Some(obj) = parsed.as_object() else {
            continue;
        };
        if !obj.contains_key("usingComponents") && !obj.contains_key("navigationBarTitleText") {
            continue;
        }

        let Ok(rel_path) = entry.path().strip_prefix(root) else {
            continue;
        };
        let page_path = rel_path
            .to_string_lossy()
            .replace('\\', "/")
            .trim_end_matches(".json")
            .to_string();

        config
            .pages
            .entry(page_path)
            .or_insert_with(|| page_config_from_object(obj));
    }
}

/// Render the restored config into the files C8 synthesizes: `app.json`,
/// one `{page}.json` per non-empty page config, and `project.config.json`
/// when pages are known (appid sniffed from the input directory path).
pub fn render(root: &Path, config: &RestoredConfig) -> Vec<(String, String)> {
    let mut out = Vec::new();

    if let Some(app) = &config.app {
        if let Ok(text) = serde_json::to_string_pretty(app) {
            out.push(("app.json".to_string(), text));
        }
    }

    for (page_path, page_config) in &config.pages {
        if page_config.is_empty() {
            continue;
        }
        if let Ok(text) = serde_json::to_string_pretty(page_config) {
            out.push((format!("{page_path}.json"), text));
        }
    }

    if let Some(app) = &config.app {
        if !app.pages.is_empty() {
            let appid = sniff_appid(root);
            let projectname = if appid.is_empty() {
                "miniprogram".to_string()
            } else {
                appid.clone()
            };
            let project_config = serde_json::json!({
                "description": "miniprogram project config",
                "packOptions": { "ignore": [] },
                "setting": {
                    "urlCheck": true,
                    "es6": true,
                    "postcss": true,
                    "minified": true
                },
                "compileType": "miniprogram",
                "appid": appid,
                "projectname": projectname,
            });
            if let Ok(text) = serde_json::to_string_pretty(&project_config) {
                out.push(("project.config.json".to_string(), text));
            }
        }
    }

    out
}

fn sniff_appid(root: &Path) -> String {
    for component in root.components() {
        if let std::path::Component::Normal(part) = component {
            if let Some(text) = part.to_str() {
                if text.starts_with("wx") && text.len() == WXID_LEN {
                    return text.to_string();
                }
            }
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_app_config_json() {
        let content = r#"{
            "pages": ["pages/index/index"],
            "window": {"navigationBarTitleText": "Home"},
            "tabBar": {"color": "#000", "list": [{"pagePath": "pages/index/index", "text": "Home"}]},
            "page": {
                "pages/index/index": {"navigationBarTitleText": "Index"}
            }
        }"#;
        let mut config = RestoredConfig::default();
        parse_app_config(content, &mut config);

        let app = config.app.unwrap();
        assert_eq!(app.pages, vec!["pages/index/index"]);
        assert!(app.tab_bar.is_some());
        assert_eq!(app.tab_bar.unwrap().list.len(), 1);

        let page = config.pages.get("pages/index/index").unwrap();
        assert_eq!(page.navigation_bar_title_text, "Index");
    }

    #[test]
    fn unrecognised_page_keys_round_trip_via_extra() {
        let content = r#"{
            "pages": ["pages/index/index"],
            "window": {},
            "page": {
                "pages/index/index": {"customFlag": true, "navigationBarTitleText": "Index"}
            }
        }"#;
        let mut config = RestoredConfig::default();
        parse_app_config(content, &mut config);

        let page = config.pages.get("pages/index/index").unwrap();
        assert_eq!(page.extra.get("customFlag"), Some(&Value::Bool(true)));
    }

    #[test]
    fn extracts_page_config_from_app_service() {
        let content = r#"__wxAppCode__["pages/a/a.json"]={"usingComponents":{"my-comp":"/components/my-comp"}};"#;
        let mut config = RestoredConfig::default();
        extract_from_app_service(content, &mut config);
        let page = config.pages.get("pages/a/a").unwrap();
        assert!(page.using_components.contains_key("my-comp"));
    }

    #[test]
    fn extracts_page_config_with_multiple_components_from_app_service() {
        let content = r#"__wxAppCode__["pages/b/b.json"]={"usingComponents":{"my-comp":"/components/my-comp","other-comp":"/components/other"},"navigationBarTitleText":"B"};"#;
        let mut config = RestoredConfig::default();
        extract_from_app_service(content, &mut config);
        let page = config.pages.get("pages/b/b").unwrap();
        assert!(page.using_components.contains_key("my-comp"));
        assert!(page.using_components.contains_key("other-comp"));
    }

    #[test]
    fn sniffs_appid_from_path_component() {
        let root = Path::new("/unpack/wx0123456789abcdef/out");
        assert_eq!(sniff_appid(root), "wx0123456789abcdef");
    }

    #[test]
    fn render_emits_project_config_when_pages_known() {
        let mut config = RestoredConfig::default();
        config.app = Some(AppConfig {
            pages: vec!["pages/index/index".into()],
            ..Default::default()
        });
        let root = Path::new("/unpack/wx0123456789abcdef");
        let rendered = render(root, &config);
        assert!(rendered.iter().any(|(name, _)| name == "project.config.json"));
        assert!(rendered.iter().any(|(name, _)| name == "app.json"));
    }
}
