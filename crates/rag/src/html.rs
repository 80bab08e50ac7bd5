//! HTML to plain text
//!
//! Search result pages arrive as raw HTML. Script and style bodies are
//! dropped, every tag becomes a single space, common entities are decoded
//! and whitespace is collapsed.

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid regex"));
static STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").expect("valid regex"));
static NOSCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<noscript\b[^>]*>.*?</noscript\s*>").expect("valid regex"));
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Extract visible text from an HTML document
pub fn strip_html(html: &str) -> String {
    let text = SCRIPT.replace_all(html, " ");
    let text = STYLE.replace_all(&text, " ");
    let text = NOSCRIPT.replace_all(&text, " ");
    let text = COMMENT.replace_all(&text, " ");
    let text = TAG.replace_all(&text, " ");
    let text = ENTITY.replace_all(&text, |caps: &regex::Captures| decode_entity(&caps[1], &caps[0]));
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

fn decode_entity(name: &str, raw: &str) -> String {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => num.parse::<u32>().ok(),
        };
        return code
            .and_then(char::from_u32)
            .map(|c| c.to_string())
            .unwrap_or_else(|| raw.to_string());
    }

    let decoded = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "deg" => "\u{b0}",
        _ => return raw.to_string(),
    };
    decoded.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_tags_and_scripts() {
        let html = r#"<html><head><style>p { color: red; }</style>
            <script type="text/javascript">var x = "<b>";</script></head>
            <body><h1>Title</h1><p>First&nbsp;para &amp; more</p><!-- hidden --></body></html>"#;
        assert_eq!(strip_html(html), "Title First para & more");
    }

    #[test]
    fn test_numeric_entities() {
        assert_eq!(strip_html("<p>caf&#233; &#x41;</p>"), "café A");
    }

    #[test]
    fn test_unknown_entity_kept() {
        assert_eq!(strip_html("a &bogus; b"), "a &bogus; b");
    }

    #[test]
    fn test_tags_become_separators() {
        assert_eq!(strip_html("<td>1</td><td>2</td>"), "1 2");
    }

    #[test]
    fn test_empty() {
        assert_eq!(strip_html(""), "");
    }
}
