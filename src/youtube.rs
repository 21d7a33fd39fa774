use async_trait::async_trait;
use eyre::{Result, bail};
use log::{debug, info};
use regex::Regex;
use serde::Deserialize;

use crate::Caption;
use crate::config::Config;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

pub const DATA_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Title and description of a video
#[derive(Debug, Clone, PartialEq)]
pub struct VideoDetails {
    pub title: String,
    pub description: String,
}

/// Where video metadata and captions come from
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// `Ok(None)` when the id does not resolve to a video
    async fn video_details(&self, video_id: &str) -> Result<Option<VideoDetails>>;

    async fn captions(&self, video_id: &str) -> Result<Vec<Caption>>;
}

#[derive(Debug, Deserialize)]
struct DataApiResponse {
    #[serde(default)]
    items: Vec<DataApiItem>,
}

#[derive(Debug, Deserialize)]
struct DataApiItem {
    snippet: Option<DataApiSnippet>,
}

#[derive(Debug, Deserialize)]
struct DataApiSnippet {
    title: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InnerTubePlayerResponse {
    captions: Option<CaptionsData>,
    #[serde(rename = "videoDetails")]
    video_details: Option<PlayerVideoDetails>,
}

#[derive(Debug, Deserialize)]
struct PlayerVideoDetails {
    title: Option<String>,
    #[serde(rename = "shortDescription")]
    short_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks")]
    caption_tracks: Option<Vec<CaptionTrack>>,
}

#[derive(Debug, Clone, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
    /// "asr" for auto-generated tracks
    kind: Option<String>,
}

impl CaptionTrack {
    fn is_auto(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// YouTube metadata and caption client
///
/// Metadata comes from the Data API when an API key is configured, otherwise from the
/// InnerTube player response. Captions always come from InnerTube caption tracks.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    client: reqwest::Client,
    api_key: Option<String>,
    api_base: String,
    caption_langs: Vec<String>,
}

impl YouTubeClient {
    pub fn new(client: reqwest::Client, api_key: Option<String>, caption_langs: Vec<String>) -> Self {
        Self {
            client,
            api_key,
            api_base: DATA_API_BASE.to_string(),
            caption_langs,
        }
    }

    pub fn from_config(client: reqwest::Client, config: &Config) -> Self {
        let yt = Self::new(client, config.youtube_api_key(), config.caption_langs());
        match &config.youtube_api_base {
            Some(base) => yt.with_api_base(base.clone()),
            None => yt,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn data_api_details(&self, api_key: &str, video_id: &str) -> Result<Option<VideoDetails>> {
        let url = format!("{}/videos", self.api_base.trim_end_matches('/'));
        debug!("Fetching metadata for {video_id} from the Data API");

        let resp: DataApiResponse = self
            .client
            .get(&url)
            .query(&[("part", "snippet"), ("id", video_id), ("key", api_key)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(details_from_data_api(resp))
    }

    async fn player_response(&self, video_id: &str) -> Result<InnerTubePlayerResponse> {
        let watch_url = format!("https://www.youtube.com/watch?v={video_id}");
        debug!("Fetching watch page: {watch_url}");

        let page_html = self
            .client
            .get(&watch_url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let api_key = extract_api_key(&page_html)?;
        debug!("Extracted InnerTube API key: {api_key}");

        let player_url = format!("https://www.youtube.com/youtubei/v1/player?key={api_key}&prettyPrint=false");
        let hl = self.caption_langs.first().map(String::as_str).unwrap_or("en");
        let body = serde_json::json!({
            "context": {
                "client": {
                    "hl": hl,
                    "gl": "US",
                    "clientName": "WEB",
                    "clientVersion": "2.20241126.01.00"
                }
            },
            "videoId": video_id
        });

        let resp: InnerTubePlayerResponse = self
            .client
            .post(&player_url)
            .header("User-Agent", USER_AGENT)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp)
    }

    async fn fetch_track(&self, track: &CaptionTrack) -> Result<Vec<Caption>> {
        let caption_xml = self
            .client
            .get(&track.base_url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let captions = parse_caption_xml(&caption_xml)?;
        if captions.is_empty() {
            bail!("caption track is empty");
        }
        Ok(captions)
    }
}

#[async_trait]
impl VideoSource for YouTubeClient {
    async fn video_details(&self, video_id: &str) -> Result<Option<VideoDetails>> {
        if let Some(api_key) = &self.api_key {
            return self.data_api_details(api_key, video_id).await;
        }

        debug!("No YouTube API key configured, reading metadata from the player response");
        let resp = self.player_response(video_id).await?;
        Ok(resp.video_details.map(|vd| VideoDetails {
            title: vd.title.unwrap_or_default(),
            description: vd.short_description.unwrap_or_default(),
        }))
    }

    /// Try each configured language, manual captions before auto-generated ones; first success wins
    async fn captions(&self, video_id: &str) -> Result<Vec<Caption>> {
        let resp = self.player_response(video_id).await?;
        let tracks = resp
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .and_then(|r| r.caption_tracks)
            .unwrap_or_default();

        if tracks.is_empty() {
            bail!("no captions available for video {video_id}");
        }

        for (lang, auto) in fallback_chain(&self.caption_langs) {
            let label = if auto { "auto-generated" } else { "manual" };
            let Some(track) = select_track(&tracks, &lang, auto) else {
                debug!("No {label} '{lang}' captions for {video_id}");
                continue;
            };

            match self.fetch_track(track).await {
                Ok(captions) => {
                    info!("Fetched {} {label} '{lang}' captions for {video_id}", captions.len());
                    return Ok(captions);
                }
                Err(e) => debug!("Fetching {label} '{lang}' captions failed: {e}"),
            }
        }

        bail!("no usable captions for video {video_id} in {:?}", self.caption_langs);
    }
}

fn details_from_data_api(resp: DataApiResponse) -> Option<VideoDetails> {
    let snippet = resp.items.into_iter().next()?.snippet;
    Some(VideoDetails {
        title: snippet.as_ref().and_then(|s| s.title.clone()).unwrap_or_default(),
        description: snippet.and_then(|s| s.description).unwrap_or_default(),
    })
}

/// (language, auto-generated) attempts in order
fn fallback_chain(langs: &[String]) -> Vec<(String, bool)> {
    langs
        .iter()
        .flat_map(|lang| [(lang.clone(), false), (lang.clone(), true)])
        .collect()
}

fn select_track<'a>(tracks: &'a [CaptionTrack], lang: &str, auto: bool) -> Option<&'a CaptionTrack> {
    tracks
        .iter()
        .find(|t| t.language_code == lang && t.is_auto() == auto)
}

fn extract_api_key(html: &str) -> Result<String> {
    let re = Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#)?;
    if let Some(caps) = re.captures(html) {
        return Ok(caps[1].to_string());
    }

    // Fallback: try the newer pattern
    let re2 = Regex::new(r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#)?;
    if let Some(caps) = re2.captures(html) {
        return Ok(caps[1].to_string());
    }

    bail!("could not extract InnerTube API key from watch page");
}

fn parse_caption_xml(xml: &str) -> Result<Vec<Caption>> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    let mut captions = Vec::new();
    let mut current_start: Option<f64> = None;
    let mut current_dur: Option<f64> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"text" => {
                current_start = None;
                current_dur = None;
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
                    match attr.key.as_ref() {
                        b"start" => current_start = value,
                        b"dur" => current_dur = value,
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(start) = current_start.take() {
                    let raw_text = e.unescape().unwrap_or_default().to_string();
                    let text = html_escape::decode_html_entities(&raw_text).replace('\n', " ");
                    let text = text.trim();
                    if !text.is_empty() {
                        captions.push(Caption::new(text, start, current_dur.take().unwrap_or(0.0)));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!("error parsing caption XML: {e}"),
            _ => {}
        }
    }

    Ok(captions)
}

/// Built-in example captions used when no real captions can be fetched
pub fn mock_captions() -> Vec<Caption> {
    vec![
        Caption::new("Hello everyone", 0.0, 2.0),
        Caption::new("Today we're going to talk about an interesting topic", 2.0, 3.0),
        Caption::new("Before we start, please like and subscribe", 5.0, 2.5),
        Caption::new("Today's topic is artificial intelligence and future technology", 7.5, 3.0),
        Caption::new("AI is changing many parts of our daily lives", 10.5, 3.5),
        Caption::new("Natural language processing in particular has advanced a lot", 14.0, 3.0),
        Caption::new("Computers can now understand and generate human language", 17.0, 4.0),
        Caption::new("This is used for translation, summarization, question answering and more", 21.0, 4.0),
        Caption::new("I'm excited to see how future technology will change our lives", 25.0, 4.0),
        Caption::new("Leave your thoughts in the comments", 29.0, 3.0),
        Caption::new("See you in the next video!", 32.0, 2.0),
    ]
}
