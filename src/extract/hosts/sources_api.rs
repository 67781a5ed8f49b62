//! `getSources` JSON shared by the vidcloud family of players.
//!
//! ```json
//! {"sources": "U2FsdGVk..." | [{"file": "...m3u8", "type": "hls"}],
//!  "tracks": [{"file": "...vtt", "label": "English", "kind": "captions"}],
//!  "encrypted": true,
//!  "intro": {"start": 0, "end": 85}, "outro": {"start": 1300, "end": 1390}}
//! ```

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::origin;
use crate::download::remux::{chapters_from_markers, Remuxer, SubtitleTrack};
use crate::error::{ExtractError, Result};
use crate::extract::{ExtractContext, MediaDescriptor};

#[derive(Debug, Deserialize)]
pub(crate) struct SourcesResponse {
    #[serde(default)]
    pub sources: Value,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub encrypted: bool,
    pub intro: Option<Marker>,
    pub outro: Option<Marker>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Track {
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct Marker {
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
}

impl Marker {
    pub fn bounds(self) -> (f64, f64) {
        (self.start, self.end)
    }
}

impl SourcesResponse {
    /// The encrypted `sources` blob, if the server sent one.
    pub fn ciphertext(&self) -> Option<&str> {
        self.sources.as_str()
    }
}

/// `kind == "captions"` tracks as subtitle inputs, labelled by language.
pub(crate) fn subtitle_tracks(tracks: &[Track]) -> Vec<SubtitleTrack> {
    tracks
        .iter()
        .filter(|t| t.kind == "captions" && !t.file.is_empty())
        .map(|t| SubtitleTrack {
            lang: t.label.clone().unwrap_or_else(|| "und".to_string()),
            url: t.file.clone(),
        })
        .collect()
}

/// First `file` of a decoded sources array.
pub(crate) fn first_file(sources: &Value) -> Result<String> {
    sources
        .as_array()
        .and_then(|list| list.iter().find_map(|s| s.get("file")?.as_str()))
        .map(str::to_string)
        .ok_or(ExtractError::NoSources)
}

/// Descriptor for `sources`, with captions and intro/outro chapters
/// attached as a remux step when the response carried any.
pub(crate) fn descriptor_from(
    ctx: &ExtractContext<'_>,
    url: &Url,
    response: &SourcesResponse,
    sources: &Value,
) -> Result<MediaDescriptor> {
    let file = first_file(sources)?;
    let chapters = chapters_from_markers(
        response.intro.map(Marker::bounds),
        response.outro.map(Marker::bounds),
    )?;
    let remuxer = Remuxer::new(ctx.services().ffmpeg())
        .with_subtitles(subtitle_tracks(&response.tracks))
        .with_chapters(chapters);

    let origin = origin(url);
    let mut descriptor = MediaDescriptor::new(file)
        .ok_or(ExtractError::NoSources)?
        .with_referer(format!("{origin}/"))
        .with_headers(ctx.http().profile().downloader_headers(Some(&origin)));
    if !remuxer.is_empty() {
        descriptor = descriptor.with_after_download(Arc::new(remuxer));
    }
    Ok(descriptor)
}
