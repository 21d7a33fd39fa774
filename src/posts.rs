use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{SecondsFormat, Utc};
use eyre::Result;
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::markdown;

pub const DEFAULT_TITLE: &str = "Untitled Post";
pub const DEFAULT_DESCRIPTION: &str = "Post generated from a YouTube video";
pub const NOT_FOUND_TITLE: &str = "Post not found";
const NOT_FOUND_MESSAGE: &str = "The requested post does not exist.";

/// A published post read back from disk
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub description: String,
    pub date: String,
    pub video_id: String,
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("markdown content is missing")]
    MissingMarkdown,
    #[error("video ID is missing")]
    MissingVideoId,
    #[error("invalid video ID: {0}")]
    InvalidVideoId(String),
    #[error("failed to encode front-matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),
    #[error("failed to write post: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct FrontMatter {
    title: Option<String>,
    description: Option<String>,
    date: Option<String>,
    video_id: Option<String>,
}

static SAFE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Flat directory of `<videoId>.md` files with YAML front-matter
#[derive(Debug, Clone)]
pub struct PostStore {
    dir: PathBuf,
}

impl PostStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.md"))
    }

    /// Write a post, overwriting any earlier post for the same video; returns the file name
    pub fn publish(&self, markdown: &str, video_id: &str, description: Option<&str>) -> Result<String, PublishError> {
        if markdown.trim().is_empty() {
            return Err(PublishError::MissingMarkdown);
        }
        let video_id = video_id.trim();
        if video_id.is_empty() {
            return Err(PublishError::MissingVideoId);
        }
        if !SAFE_ID.is_match(video_id) {
            return Err(PublishError::InvalidVideoId(video_id.to_string()));
        }

        let title = markdown::extract_title(markdown).unwrap_or(DEFAULT_TITLE);
        let description = description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(DEFAULT_DESCRIPTION);
        let front_matter = FrontMatter {
            title: Some(single_line(title)),
            description: Some(single_line(description)),
            date: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            video_id: Some(video_id.to_string()),
        };
        let content = format!("---\n{}---\n\n{markdown}", serde_yaml::to_string(&front_matter)?);

        std::fs::create_dir_all(&self.dir)?;
        let filename = format!("{video_id}.md");
        std::fs::write(self.dir.join(&filename), content)?;
        info!("Published post {}", self.dir.join(&filename).display());

        Ok(filename)
    }

    /// All posts, newest first; an absent directory is an empty list
    pub fn list(&self) -> Result<Vec<Post>> {
        if !self.dir.exists() {
            debug!("Posts directory {} does not exist", self.dir.display());
            return Ok(Vec::new());
        }

        let mut posts = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let raw = std::fs::read_to_string(&path)?;
            posts.push(parse_post(id, &raw));
        }

        posts.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(posts)
    }

    /// One post by id, or a placeholder record when it does not exist
    pub fn get(&self, id: &str) -> Result<Post> {
        if !SAFE_ID.is_match(id) {
            warn!("Rejected post id {id:?}");
            return Ok(not_found(id));
        }

        let path = self.path_for(id);
        if !path.exists() {
            return Ok(not_found(id));
        }

        let raw = std::fs::read_to_string(&path)?;
        Ok(parse_post(id, &raw))
    }
}

/// Collapse newlines and whitespace runs into single spaces
fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `---\n<yaml>\n---\n<body>` into its parts
fn split_front_matter(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix("---")?;
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;
    let (yaml, after) = match rest.strip_prefix("---") {
        Some(after) => ("", after),
        None => {
            let end = rest.find("\n---")?;
            (&rest[..end], &rest[end + 4..])
        }
    };
    let body = after
        .strip_prefix("\r\n")
        .or_else(|| after.strip_prefix('\n'))
        .unwrap_or(after);
    Some((yaml, body.strip_prefix('\n').unwrap_or(body)))
}

fn parse_post(id: &str, raw: &str) -> Post {
    let (meta, content) = match split_front_matter(raw) {
        Some((yaml, body)) if yaml.trim().is_empty() => (FrontMatter::default(), body),
        Some((yaml, body)) => {
            let meta = serde_yaml::from_str::<FrontMatter>(yaml).unwrap_or_else(|e| {
                warn!("Invalid front-matter in post {id}: {e}");
                FrontMatter::default()
            });
            (meta, body)
        }
        None => (FrontMatter::default(), raw),
    };

    Post {
        id: id.to_string(),
        title: meta.title.unwrap_or_default(),
        description: meta.description.unwrap_or_default(),
        date: meta.date.unwrap_or_default(),
        video_id: meta.video_id.unwrap_or_else(|| id.to_string()),
        content: content.to_string(),
    }
}

fn not_found(id: &str) -> Post {
    Post {
        id: id.to_string(),
        title: NOT_FOUND_TITLE.to_string(),
        description: NOT_FOUND_MESSAGE.to_string(),
        date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        video_id: id.to_string(),
        content: format!("# {NOT_FOUND_TITLE}\n\n{NOT_FOUND_MESSAGE}"),
    }
}
