use std::sync::LazyLock;

use regex::Regex;

static OPTION_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<key>[\w\-]+)(?:=(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>\S*)))?"#)
        .expect("option token pattern is valid")
});

/// Parse `key=value` and bare `flag` tokens in order of appearance.
///
/// Values may be double or single quoted to include spaces. A bare flag is
/// reported with the value `"true"`.
pub fn parse_options(text: &str) -> Vec<(String, String)> {
    OPTION_TOKEN
        .captures_iter(text)
        .map(|caps| {
            let key = caps["key"].to_string();
            let value = ["dq", "sq", "bare"]
                .iter()
                .find_map(|name| caps.name(name))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "true".to_string());
            (key, value)
        })
        .collect()
}
