use std::sync::LazyLock;

use regex::Regex;

/// A section heading and its body text
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: String,
    pub body: String,
}

/// Render `# title` followed by one `## section` block per section
///
/// Text is inserted verbatim; nothing is escaped.
pub fn assemble(title: &str, sections: &[Section]) -> String {
    let mut markdown = format!("# {title}\n\n");
    for section in sections {
        markdown.push_str(&format!("## {}\n\n{}\n\n", section.title, section.body));
    }
    markdown
}

static H1: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^# (.+)$").unwrap());

/// Text of the first top-level `# ` heading
pub fn extract_title(markdown: &str) -> Option<&str> {
    H1.captures(markdown)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches('\r').trim())
        .filter(|t| !t.is_empty())
}
