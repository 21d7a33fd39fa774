use log::{debug, info};
use serde::Serialize;

use crate::Caption;
use crate::summarize::Summarizer;
use crate::timestamps::Marker;

/// Below this many captions, automatic segmentation keeps everything in one group
pub const MIN_CAPTIONS_FOR_CHUNKING: usize = 20;
pub const CHUNK_SIZE: usize = 30;
pub const SINGLE_GROUP_TITLE: &str = "Full Summary";

/// A titled bucket of caption texts that becomes one markdown section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionGroup {
    pub title: String,
    pub captions: Vec<String>,
}

impl CaptionGroup {
    pub fn text(&self) -> String {
        crate::join_text(self.captions.iter().map(String::as_str))
    }
}

/// Assign each caption to the marker window `[marker[i], marker[i+1])` containing its start
///
/// The last window is open-ended. Captions that start before the first marker are not in any group.
pub fn group_by_markers(captions: &[Caption], markers: &[Marker]) -> Vec<CaptionGroup> {
    markers
        .iter()
        .enumerate()
        .map(|(i, marker)| {
            let start = f64::from(marker.seconds);
            let end = markers
                .get(i + 1)
                .map_or(f64::INFINITY, |next| f64::from(next.seconds));

            let captions = captions
                .iter()
                .filter(|c| c.start >= start && c.start < end)
                .map(|c| c.text.clone())
                .collect();

            CaptionGroup {
                title: marker.title.clone(),
                captions,
            }
        })
        .collect()
}

/// Split captions into fixed-size chunks, or a single chunk when there are too few to split
pub fn chunk_captions(captions: &[Caption]) -> Vec<&[Caption]> {
    if captions.len() < MIN_CAPTIONS_FOR_CHUNKING {
        return vec![captions];
    }
    captions.chunks(CHUNK_SIZE).collect()
}

/// Segment captions without markers, titling each chunk through the summarizer
pub async fn auto_segment(captions: &[Caption], summarizer: &Summarizer) -> Vec<CaptionGroup> {
    if captions.len() < MIN_CAPTIONS_FOR_CHUNKING {
        info!("Only {} captions, using a single section", captions.len());
        return vec![CaptionGroup {
            title: SINGLE_GROUP_TITLE.to_string(),
            captions: captions.iter().map(|c| c.text.clone()).collect(),
        }];
    }

    let chunks = chunk_captions(captions);
    info!("Split {} captions into {} chunks", captions.len(), chunks.len());

    let mut groups = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.into_iter().enumerate() {
        let texts: Vec<String> = chunk.iter().map(|c| c.text.clone()).collect();
        let joined = crate::join_text(texts.iter().map(String::as_str));
        let title = summarizer.section_title(&joined, i + 1).await;
        debug!("Chunk {} titled '{title}'", i + 1);
        groups.push(CaptionGroup { title, captions: texts });
    }

    groups
}
