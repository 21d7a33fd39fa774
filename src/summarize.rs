use log::{debug, info, warn};
use regex::Regex;

use crate::backend::{Backend, Provider};

const SUMMARY_TEMPERATURE: f32 = 0.5;
const ONE_LINE_TEMPERATURE: f32 = 0.3;
const TITLE_TEMPERATURE: f32 = 0.3;

pub const ONE_LINE_MAX_CHARS: usize = 60;
const TITLE_SAMPLE_CHARS: usize = 1000;
const LOG_SAMPLE_CHARS: usize = 200;

const SUMMARY_PROMPT: &str = "You turn YouTube video captions into blog posts.

Below are captions from a YouTube video. Summarize them accurately as a blog-style paragraph.

Rules:
1. Never add anything that is not in the captions.
2. Keep only the core content of the captions.
3. Do not distort the meaning of the captions.
4. Include only concepts and ideas mentioned in the captions.
5. Do not write meta commentary such as \"This summary...\" or \"This post...\".
6. Do not describe how the summary was written or how accurate it is.
7. Do not include a title, heading or subheading; the title is added separately.
8. Never write markdown headings such as \"### Title\".";

const ONE_LINE_PROMPT: &str = "Below is the content of a YouTube video. Summarize it in exactly one sentence.

Rules:
1. One sentence only, at most 60 characters.
2. Keep only the core point.
3. Do not start with \"This video...\" or \"This content...\".
4. End the sentence with a period.
5. No line breaks, numbering or lists.";

const TITLE_PROMPT: &str = "You write section titles for YouTube video captions.

Below is part of a video's captions. Write a short title (5-7 words) that best describes it.

Rules:
1. 5-7 words, short and concise.
2. Name the concrete topic; avoid generic words like \"Introduction\" or \"Conclusion\".
3. No numbers such as \"Part 1\".
4. Output only the title, without explanation.
5. No quotes or other special characters.
6. No trailing period.
7. Never answer with only a number.";

/// Summarization operations over a backend, each with a deterministic fallback
pub struct Summarizer {
    backend: Box<dyn Backend>,
}

impl Summarizer {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn provider(&self) -> Provider {
        self.backend.provider()
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    async fn ask(&self, prompt: &str, temperature: f32) -> eyre::Result<String> {
        if !self.backend.is_available() {
            eyre::bail!("{} backend is not available", self.backend.provider());
        }
        self.backend.complete(prompt, temperature).await
    }

    /// Summarize a group's caption text into a paragraph; returns `text` unchanged on failure
    pub async fn summarize(&self, text: &str, title: &str) -> String {
        info!("Summarizing '{title}' ({} chars)", text.chars().count());
        debug!("Caption sample: {}", sample(text));

        let prompt = format!("{SUMMARY_PROMPT}\n\nTitle: {title}\n\nCaptions:\n{text}\n\nSummary (content only, no title):");

        match self.ask(&prompt, SUMMARY_TEMPERATURE).await {
            Ok(response) => {
                debug!("Summary sample: {}", sample(&response));
                let body = strip_echoed_title(&response, title);
                if body.trim().is_empty() {
                    warn!("Empty summary for '{title}', keeping original text");
                    text.to_string()
                } else {
                    body
                }
            }
            Err(e) => {
                warn!("Summarizing '{title}' failed, keeping original text: {e}");
                text.to_string()
            }
        }
    }

    /// One sentence of at most 60 characters; falls back to "<title> summary."
    pub async fn summarize_one_line(&self, text: &str, title: &str) -> String {
        info!("Generating one-line summary for '{title}'");

        let prompt = format!("{ONE_LINE_PROMPT}\n\nTitle: {title}\n\nContent:\n{text}\n\nOne-line summary (60 characters max, no line breaks):");

        match self.ask(&prompt, ONE_LINE_TEMPERATURE).await {
            Ok(response) if !response.trim().is_empty() => {
                let line = clean_one_line(&response);
                debug!("One-line summary: {line}");
                line
            }
            Ok(_) => {
                warn!("Empty one-line summary for '{title}', using fallback");
                one_line_fallback(title)
            }
            Err(e) => {
                warn!("One-line summary for '{title}' failed: {e}");
                one_line_fallback(title)
            }
        }
    }

    /// Title for an unlabeled chunk; `index` is 1-based
    pub async fn section_title(&self, text: &str, index: usize) -> String {
        debug!("Generating title for section {index}");

        let excerpt = if text.chars().count() > TITLE_SAMPLE_CHARS {
            format!("{}...", text.chars().take(TITLE_SAMPLE_CHARS).collect::<String>())
        } else {
            text.to_string()
        };
        let prompt = format!("{TITLE_PROMPT}\n\nCaptions:\n{excerpt}\n\nTitle (5-7 words):");

        match self.ask(&prompt, TITLE_TEMPERATURE).await {
            Ok(response) => {
                let title = clean_section_title(&response, index);
                debug!("Section {index} title: {title}");
                title
            }
            Err(e) => {
                warn!("Title for section {index} failed: {e}");
                section_fallback(index)
            }
        }
    }
}

fn sample(text: &str) -> String {
    if text.chars().count() > LOG_SAMPLE_CHARS {
        format!("{}...", text.chars().take(LOG_SAMPLE_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn one_line_fallback(title: &str) -> String {
    format!("{title} summary.")
}

pub fn section_fallback(index: usize) -> String {
    format!("Section {index}")
}

/// Remove a leading `### title`, `## title` or bare `title` line echoed back by the model
pub fn strip_echoed_title(summary: &str, title: &str) -> String {
    let escaped = regex::escape(title.trim());
    let mut cleaned = summary.to_string();

    for prefix in [r"###\s*", r"##\s*", ""] {
        let pattern = format!(r"(?i)^{prefix}{escaped}\s*\n");
        if let Ok(re) = Regex::new(&pattern) {
            cleaned = re.replace(&cleaned, "").into_owned();
        }
    }

    cleaned
}

/// Single line, at most 60 characters including the terminal period
pub fn clean_one_line(raw: &str) -> String {
    let mut line = collapse_whitespace(raw);

    let needs_period = !line.ends_with('.');
    let budget = if needs_period { ONE_LINE_MAX_CHARS - 1 } else { ONE_LINE_MAX_CHARS };

    if line.chars().count() > budget {
        line = format!("{}...", line.chars().take(ONE_LINE_MAX_CHARS - 3).collect::<String>());
    } else if needs_period {
        line.push('.');
    }

    line
}

const QUOTES: &[char] = &['"', '\'', '`', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

pub fn clean_section_title(raw: &str, index: usize) -> String {
    let collapsed = collapse_whitespace(raw);
    let unquoted = collapsed.trim_matches(QUOTES).trim();
    let title = unquoted.strip_suffix('.').unwrap_or(unquoted).trim();

    if title.is_empty() || title.chars().all(|c| c.is_ascii_digit()) {
        section_fallback(index)
    } else {
        title.to_string()
    }
}
