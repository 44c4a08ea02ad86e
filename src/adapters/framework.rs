//! Shared helpers for extracting embedded JSON from HTML. Adapters built
//! around `__NEXT_DATA__`, `window.__INITIAL_STATE__`, or JSON-LD all call
//! into these instead of rolling their own regex (§9 embedded JSON
//! extraction note).

use scraper::{Html, Selector};
use serde_json::Value;

/// Next.js-style `<script id="__NEXT_DATA__" type="application/json">{...}</script>`.
pub fn extract_next_data(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script#__NEXT_DATA__"#).ok()?;
    let script = document.select(&selector).next()?;
    let text: String = script.text().collect();
    serde_json::from_str(&text).ok()
}

/// `<script>window.__INITIAL_STATE__ = {...};</script>` — pulled out with a
/// simple delimiter scan rather than a full JS parser, matching the
/// narrow, tolerant style the spec calls for (fewer predictions, not a
/// crash, when the shape drifts).
pub fn extract_initial_state_json(html: &str) -> Option<Value> {
    let marker = "window.__INITIAL_STATE__";
    let start = html.find(marker)? + marker.len();
    let rest = &html[start..];
    let eq = rest.find('=')? + 1;
    let after_eq = rest[eq..].trim_start();
    let json_start = after_eq.find('{')?;
    let mut depth = 0i32;
    let bytes = after_eq.as_bytes();
    let mut end = None;
    for (i, &b) in bytes.iter().enumerate().skip(json_start) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(i + 1);
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end?;
    serde_json::from_str(&after_eq[json_start..end]).ok()
}

/// `<script type="application/ld+json">{...}</script>`.
pub fn extract_json_ld(html: &str) -> Vec<Value> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return vec![];
    };
    document
        .select(&selector)
        .filter_map(|el| {
            let text: String = el.text().collect();
            serde_json::from_str(&text).ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_next_data_payload() {
        let html = r#"<html><body><script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{"picks":[]}}}</script></body></html>"#;
        let value = extract_next_data(html).unwrap();
        assert!(value["props"]["pageProps"]["picks"].is_array());
    }

    #[test]
    fn extracts_initial_state_with_nested_braces() {
        let html = r#"<script>window.__INITIAL_STATE__ = {"picks": [{"team": "Lakers"}]};</script>"#;
        let value = extract_initial_state_json(html).unwrap();
        assert_eq!(value["picks"][0]["team"], "Lakers");
    }

    #[test]
    fn extracts_json_ld_blocks() {
        let html = r#"<script type="application/ld+json">{"@type":"SportsEvent","name":"Lakers at Celtics"}</script>"#;
        let blocks = extract_json_ld(html);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["name"], "Lakers at Celtics");
    }

    #[test]
    fn missing_next_data_returns_none() {
        assert!(extract_next_data("<html></html>").is_none());
    }
}
