use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::Serialize;

use crate::grouping::{self, CaptionGroup};
use crate::markdown::{self, Section};
use crate::summarize::Summarizer;
use crate::timestamps;
use crate::youtube::{self, VideoSource};

pub const UNTITLED_VIDEO: &str = "Untitled";

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("invalid YouTube URL")]
    InvalidUrl,
    #[error("could not fetch video information")]
    VideoUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMeta {
    pub used_mock_data: bool,
    pub captions_count: usize,
    pub timestamps_count: usize,
    pub groups_count: usize,
    pub ai_provider: String,
}

/// A generated, not yet published, post
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPost {
    pub markdown: String,
    pub description: String,
    pub meta: GenerationMeta,
    pub video_id: String,
}

/// Run the whole URL-to-markdown pipeline
///
/// At most `concurrency` section summaries are requested from the backend at once.
pub async fn generate_post(
    source: &dyn VideoSource,
    summarizer: &Summarizer,
    url: &str,
    concurrency: usize,
) -> Result<GeneratedPost, GenerateError> {
    info!("Generating post for {url} with {}", summarizer.provider());

    let video_id = crate::extract_video_id(url).ok_or(GenerateError::InvalidUrl)?;

    let details = match source.video_details(&video_id).await {
        Ok(Some(details)) => details,
        Ok(None) => {
            warn!("Video {video_id} not found");
            return Err(GenerateError::VideoUnavailable);
        }
        Err(e) => {
            warn!("Fetching metadata for {video_id} failed: {e}");
            return Err(GenerateError::VideoUnavailable);
        }
    };
    let title = if details.title.trim().is_empty() {
        UNTITLED_VIDEO.to_string()
    } else {
        details.title
    };
    info!("Video: {title} ({video_id})");

    let (captions, used_mock_data) = match source.captions(&video_id).await {
        Ok(captions) => (captions, false),
        Err(e) => {
            warn!("Caption fetch for {video_id} failed, using example captions: {e}");
            (youtube::mock_captions(), true)
        }
    };

    let markers = timestamps::parse_markers(&details.description);
    info!("Found {} timestamps in description", markers.len());

    let groups = if markers.is_empty() {
        grouping::auto_segment(&captions, summarizer).await
    } else {
        grouping::group_by_markers(&captions, &markers)
    };
    info!("Grouped {} captions into {} sections", captions.len(), groups.len());

    let sections = summarize_groups(&groups, summarizer, concurrency).await;
    let markdown = markdown::assemble(&title, &sections);
    debug!("Markdown length: {} chars", markdown.chars().count());

    let full_text = crate::join_text(captions.iter().map(|c| c.text.as_str()));
    let description = summarizer.summarize_one_line(&full_text, &title).await;

    Ok(GeneratedPost {
        markdown,
        description,
        meta: GenerationMeta {
            used_mock_data,
            captions_count: captions.len(),
            timestamps_count: markers.len(),
            groups_count: groups.len(),
            ai_provider: summarizer.provider().to_string(),
        },
        video_id,
    })
}

/// Up to `concurrency` summaries in flight; each one falls back on its own and the order is kept
async fn summarize_groups(groups: &[CaptionGroup], summarizer: &Summarizer, concurrency: usize) -> Vec<Section> {
    let futures: Vec<BoxFuture<'_, String>> = groups
        .iter()
        .map(|group| {
            async move {
                let text = group.text();
                summarizer.summarize(&text, &group.title).await
            }
            .boxed()
        })
        .collect();
    let bodies: Vec<String> = stream::iter(futures)
    .buffered(concurrency.max(1))
    .collect()
    .await;

    groups
        .iter()
        .zip(bodies)
        .map(|(group, body)| Section {
            title: group.title.clone(),
            body,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::Caption;
    use crate::backend::{Backend, Provider};
    use crate::youtube::VideoDetails;

    struct FakeSource {
        details: Option<VideoDetails>,
        details_fail: bool,
        captions: Option<Vec<Caption>>,
    }

    impl FakeSource {
        fn new(title: &str, description: &str, captions: Option<Vec<Caption>>) -> Self {
            Self {
                details: Some(VideoDetails {
                    title: title.to_string(),
                    description: description.to_string(),
                }),
                details_fail: false,
                captions,
            }
        }
    }

    #[async_trait]
    impl VideoSource for FakeSource {
        async fn video_details(&self, _video_id: &str) -> eyre::Result<Option<VideoDetails>> {
            if self.details_fail {
                eyre::bail!("quota exceeded");
            }
            Ok(self.details.clone())
        }

        async fn captions(&self, _video_id: &str) -> eyre::Result<Vec<Caption>> {
            match &self.captions {
                Some(captions) => Ok(captions.clone()),
                None => eyre::bail!("no captions"),
            }
        }
    }

    /// Canned answer per prompt kind; summarizing the "Broken" section fails
    struct Scripted;

    #[async_trait]
    impl Backend for Scripted {
        fn provider(&self) -> Provider {
            Provider::Gemini
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn complete(&self, prompt: &str, _temperature: f32) -> eyre::Result<String> {
            if prompt.contains("Title (5-7 words)") {
                Ok("\"Chunk Title.\"".to_string())
            } else if prompt.contains("One-line summary") {
                Ok("A short\nvideo description".to_string())
            } else if prompt.contains("Title: Broken") {
                eyre::bail!("backend hiccup")
            } else {
                Ok("Summarized paragraph.".to_string())
            }
        }
    }

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    fn captions(n: usize) -> Vec<Caption> {
        (0..n).map(|i| Caption::new(format!("caption {i}"), i as f64 * 5.0, 5.0)).collect()
    }

    fn summarizer() -> Summarizer {
        Summarizer::new(Box::new(Scripted))
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let source = FakeSource::new("T", "", Some(captions(3)));
        let err = generate_post(&source, &summarizer(), "https://example.com", 2).await.unwrap_err();
        assert!(matches!(err, GenerateError::InvalidUrl));
    }

    #[tokio::test]
    async fn test_unknown_video() {
        let mut source = FakeSource::new("T", "", None);
        source.details = None;
        let err = generate_post(&source, &summarizer(), URL, 2).await.unwrap_err();
        assert!(matches!(err, GenerateError::VideoUnavailable));
    }

    #[tokio::test]
    async fn test_metadata_failure_is_unavailable() {
        let mut source = FakeSource::new("T", "", None);
        source.details_fail = true;
        let err = generate_post(&source, &summarizer(), URL, 2).await.unwrap_err();
        assert!(matches!(err, GenerateError::VideoUnavailable));
    }

    #[tokio::test]
    async fn test_marker_grouping() {
        let source = FakeSource::new("Rust Talk", "Intro 0:00\nOwnership 0:50\nBroken 1:30", Some(captions(30)));
        let post = generate_post(&source, &summarizer(), URL, 2).await.unwrap();

        assert_eq!(post.video_id, "dQw4w9WgXcQ");
        assert_eq!(post.meta.timestamps_count, 3);
        assert_eq!(post.meta.groups_count, 3);
        assert_eq!(post.meta.captions_count, 30);
        assert!(!post.meta.used_mock_data);
        assert_eq!(post.meta.ai_provider, "gemini");

        // the failing group keeps its raw captions, the others are summarized
        let broken_text = (18..30).map(|i| format!("caption {i}")).collect::<Vec<_>>().join(" ");
        let expected = format!(
            "# Rust Talk\n\n## Intro\n\nSummarized paragraph.\n\n## Ownership\n\nSummarized paragraph.\n\n## Broken\n\n{broken_text}\n\n"
        );
        assert_eq!(post.markdown, expected);
        assert_eq!(post.description, "A short video description.");
    }

    #[tokio::test]
    async fn test_auto_segmentation_with_titles() {
        let source = FakeSource::new("Long Video", "no chapters here", Some(captions(65)));
        let post = generate_post(&source, &summarizer(), URL, 2).await.unwrap();

        assert_eq!(post.meta.timestamps_count, 0);
        assert_eq!(post.meta.groups_count, 3);
        assert_eq!(post.markdown.matches("## Chunk Title\n").count(), 3);
    }

    #[tokio::test]
    async fn test_caption_failure_uses_mock_data() {
        let source = FakeSource::new("", "", None);
        let post = generate_post(&source, &summarizer(), URL, 2).await.unwrap();

        assert!(post.meta.used_mock_data);
        assert_eq!(post.meta.captions_count, youtube::mock_captions().len());
        assert_eq!(post.meta.groups_count, 1);
        assert!(post.markdown.starts_with("# Untitled\n\n## Full Summary\n\n"));
    }

    /// Echoes the section title back and records how many calls overlap
    struct Tracking {
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Backend for Tracking {
        fn provider(&self) -> Provider {
            Provider::Ollama
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn complete(&self, prompt: &str, _temperature: f32) -> eyre::Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let title = prompt
                .split("Title: ")
                .nth(1)
                .and_then(|rest| rest.lines().next())
                .unwrap_or_default();
            if title == "Broken" {
                eyre::bail!("backend hiccup");
            }
            Ok(format!("About {title}."))
        }
    }

    #[tokio::test]
    async fn test_summaries_are_bounded_and_ordered() {
        let peak = Arc::new(AtomicUsize::new(0));
        let summarizer = Summarizer::new(Box::new(Tracking {
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: peak.clone(),
        }));
        let groups: Vec<CaptionGroup> = ["One", "Two", "Broken", "Four", "Five", "Six"]
            .iter()
            .map(|title| CaptionGroup {
                title: title.to_string(),
                captions: vec![format!("{title} raw")],
            })
            .collect();

        let sections = summarize_groups(&groups, &summarizer, 2).await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two", "Broken", "Four", "Five", "Six"]);
        assert_eq!(sections[0].body, "About One.");
        assert_eq!(sections[2].body, "Broken raw");
        assert_eq!(sections[5].body, "About Six.");
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_summarizes() {
        let groups = vec![CaptionGroup {
            title: "Only".to_string(),
            captions: vec!["text".to_string()],
        }];
        let sections = summarize_groups(&groups, &summarizer(), 0).await;
        assert_eq!(sections[0].body, "Summarized paragraph.");
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let post = GeneratedPost {
            markdown: "# T\n\n".to_string(),
            description: "D.".to_string(),
            meta: GenerationMeta {
                used_mock_data: true,
                captions_count: 1,
                timestamps_count: 0,
                groups_count: 1,
                ai_provider: "ollama".to_string(),
            },
            video_id: "abc".to_string(),
        };
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["videoId"], "abc");
        assert_eq!(json["meta"]["usedMockData"], true);
        assert_eq!(json["meta"]["captionsCount"], 1);
        assert_eq!(json["meta"]["aiProvider"], "ollama");
    }
}
