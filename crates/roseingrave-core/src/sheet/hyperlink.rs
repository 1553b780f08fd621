//! `=HYPERLINK(...)` cell formulas.

use std::sync::LazyLock;

use regex::Regex;

static HYPERLINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^=HYPERLINK\("(.+?)", "(.+)"\)$"#).expect("valid hyperlink regex")
});

/// Cell value showing `text`, linked to `link` when one is given.
///
/// Double quotes in the display text are backslash-escaped.
#[must_use]
pub fn hyperlink(text: &str, link: Option<&str>) -> String {
    match link {
        None => text.to_string(),
        Some(link) => {
            let escaped = text.replace('"', "\\\"");
            format!("=HYPERLINK(\"{link}\", \"{escaped}\")")
        }
    }
}

/// Inverse of [`hyperlink`]: `(link, text)`, or `None` if `cell` is not a
/// hyperlink formula.
#[must_use]
pub fn parse_hyperlink(cell: &str) -> Option<(String, String)> {
    let captures = HYPERLINK_RE.captures(cell)?;
    let link = captures[1].to_string();
    let text = captures[2].replace("\\\"", "\"");
    Some((link, text))
}
