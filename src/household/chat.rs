//! `@mention` and `#tag` extraction from chat messages.

use std::sync::OnceLock;

use regex::Regex;

fn pattern(cell: &'static OnceLock<Option<Regex>>, source: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(source).ok()).as_ref()
}

fn captures(re: Option<&Regex>, text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let Some(re) = re else {
        return found;
    };
    for cap in re.captures_iter(text) {
        let word = cap[1].to_string();
        if !found.contains(&word) {
            found.push(word);
        }
    }
    found
}

/// Names mentioned as `@name`, in order of first appearance.
pub fn mentions(text: &str) -> Vec<String> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    captures(pattern(&RE, r"@(\w+)"), text)
}

/// Tags written as `#tag`, in order of first appearance.
pub fn hashtags(text: &str) -> Vec<String> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    captures(pattern(&RE, r"#(\w+)"), text)
}
