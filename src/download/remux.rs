//! Subtitle and chapter remuxing after a finished download.
//!
//! The raw stream is combined with remote subtitle tracks and an
//! `FFMETADATA1` chapter sidecar into a sibling `.mkv`. The raw file is only
//! removed once ffmpeg exits zero.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::RemuxError;
use crate::extract::{MediaDescriptor, PostProcess};

/// A titled span of the video, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    start: f64,
    end: f64,
    title: String,
}

impl Chapter {
    /// Fails unless `0 <= start <= end`.
    pub fn new(start: f64, end: f64, title: impl Into<String>) -> Result<Self, RemuxError> {
        // Written so NaN falls into the error branch.
        if !(start >= 0.0 && end >= 0.0 && start <= end) {
            return Err(RemuxError::InvalidChapter { start, end });
        }
        Ok(Self {
            start,
            end,
            title: title.into(),
        })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

/// Intro / episode / outro chapters from skip markers.
///
/// The API reports a missing marker as `(0, 0)`. Any other marker must be
/// a valid chapter, and the outro may not start before the intro ends.
pub fn chapters_from_markers(
    intro: Option<(f64, f64)>,
    outro: Option<(f64, f64)>,
) -> Result<Vec<Chapter>, RemuxError> {
    let present = |m: &(f64, f64)| *m != (0.0, 0.0);
    let intro = intro
        .filter(present)
        .map(|(start, end)| Chapter::new(start, end, "Intro"))
        .transpose()?;
    let outro = outro
        .filter(present)
        .map(|(start, end)| Chapter::new(start, end, "Outro"))
        .transpose()?;

    let body_start = intro.as_ref().map_or(0.0, Chapter::end);
    let mut chapters = Vec::new();
    chapters.extend(intro);
    if let Some(outro) = outro {
        if outro.start < body_start {
            return Err(RemuxError::OverlappingChapters {
                intro_end: body_start,
                outro_start: outro.start,
            });
        }
        if outro.start > body_start {
            chapters.push(Chapter::new(body_start, outro.start, "Episode")?);
        }
        chapters.push(outro);
    }
    Ok(chapters)
}

fn escape_metadata(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '=' | ';' | '#' | '\\' | '\n') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Render chapters as an ffmpeg metadata file with millisecond timebase.
pub fn ffmetadata(chapters: &[Chapter]) -> String {
    let mut out = String::from(";FFMETADATA1\n");
    for chapter in chapters {
        // Bounds are validated non-negative, so the casts cannot wrap.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (start, end) = (
            (chapter.start * 1000.0).round() as u64,
            (chapter.end * 1000.0).round() as u64,
        );
        let _ = write!(
            out,
            "[CHAPTER]\nTIMEBASE=1/1000\nSTART={start}\nEND={end}\ntitle={}\n",
            escape_metadata(&chapter.title)
        );
    }
    out
}

/// A remote subtitle file to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleTrack {
    pub lang: String,
    pub url: String,
}

/// ffmpeg stream-copy remux of a raw download.
#[derive(Debug, Clone)]
pub struct Remuxer {
    ffmpeg: PathBuf,
    subtitles: Vec<SubtitleTrack>,
    chapters: Vec<Chapter>,
}

impl Remuxer {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            subtitles: Vec::new(),
            chapters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_subtitles(mut self, subtitles: Vec<SubtitleTrack>) -> Self {
        self.subtitles = subtitles;
        self
    }

    #[must_use]
    pub fn with_chapters(mut self, chapters: Vec<Chapter>) -> Self {
        self.chapters = chapters;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.subtitles.is_empty() && self.chapters.is_empty()
    }

    /// `episode.mp4` -> `episode.mkv`; an `.mkv` input gets `.remux.mkv`.
    pub fn output_path(raw: &Path) -> PathBuf {
        let out = raw.with_extension("mkv");
        if out == raw {
            raw.with_extension("remux.mkv")
        } else {
            out
        }
    }

    pub fn metadata_path(raw: &Path) -> PathBuf {
        raw.with_extension("ffmetadata")
    }

    /// Build ffmpeg command arguments
    pub fn build_args(&self, raw: &Path, metadata: Option<&Path>, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
            .iter()
            .map(ToString::to_string)
            .collect();
        args.push(raw.to_string_lossy().into_owned());

        for sub in &self.subtitles {
            args.push("-i".into());
            args.push(sub.url.clone());
        }
        if let Some(meta) = metadata {
            args.push("-i".into());
            args.push(meta.to_string_lossy().into_owned());
        }

        args.push("-map".into());
        args.push("0".into());
        for i in 0..self.subtitles.len() {
            args.push("-map".into());
            args.push((i + 1).to_string());
        }
        if metadata.is_some() {
            let index = (self.subtitles.len() + 1).to_string();
            args.extend(["-map_metadata".into(), index.clone(), "-map_chapters".into(), index]);
        }

        args.push("-c".into());
        args.push("copy".into());
        for (i, sub) in self.subtitles.iter().enumerate() {
            args.push(format!("-metadata:s:s:{i}"));
            args.push(format!("language={}", sub.lang));
        }

        args.push(output.to_string_lossy().into_owned());
        args
    }

    /// Remux `raw` and return the final artifact path.
    pub async fn remux(&self, raw: &Path) -> Result<PathBuf, RemuxError> {
        if self.is_empty() {
            return Ok(raw.to_path_buf());
        }

        let metadata = if self.chapters.is_empty() {
            None
        } else {
            let path = Self::metadata_path(raw);
            tokio::fs::write(&path, ffmetadata(&self.chapters)).await?;
            Some(path)
        };

        let output = Self::output_path(raw);
        let args = self.build_args(raw, metadata.as_deref(), &output);
        debug!("ffmpeg args: {:?}", args);
        info!(
            subtitles = self.subtitles.len(),
            chapters = self.chapters.len(),
            "Embedding subtitles and chapters"
        );

        let result = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        if let Some(meta) = &metadata {
            if let Err(e) = tokio::fs::remove_file(meta).await {
                warn!("Could not remove {}: {}", meta.display(), e);
            }
        }

        let output_status = result.map_err(|source| RemuxError::Spawn {
            program: self.ffmpeg.display().to_string(),
            source,
        })?;

        if !output_status.status.success() {
            return Err(RemuxError::Failed {
                command: command_line(&self.ffmpeg, &args),
                code: output_status.status.code(),
                stderr: String::from_utf8_lossy(&output_status.stderr).into_owned(),
            });
        }

        tokio::fs::remove_file(raw).await?;
        info!("Remuxed into {}", output.display());
        Ok(output)
    }
}

#[async_trait]
impl PostProcess for Remuxer {
    async fn after_download(
        &self,
        path: &Path,
        _descriptor: &MediaDescriptor,
    ) -> Result<(), RemuxError> {
        self.remux(path).await.map(|_| ())
    }
}

/// Shell-style rendering of a command for diagnostics.
pub fn command_line(program: &Path, args: &[String]) -> String {
    std::iter::once(program.to_string_lossy().into_owned())
        .chain(args.iter().map(|a| {
            if a.is_empty() || a.contains(char::is_whitespace) || a.contains('"') {
                format!("\"{}\"", a.replace('"', "\\\""))
            } else {
                a.clone()
            }
        }))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_chapter_is_rejected() {
        let err = Chapter::new(10.0, 5.0, "Intro").unwrap_err();
        assert!(matches!(err, RemuxError::InvalidChapter { start, end } if start == 10.0 && end == 5.0));
    }

    #[test]
    fn negative_and_nan_chapters_are_rejected() {
        assert!(Chapter::new(-1.0, 5.0, "x").is_err());
        assert!(Chapter::new(0.0, f64::NAN, "x").is_err());
        assert!(Chapter::new(3.0, 3.0, "point").is_ok());
    }

    #[test]
    fn malformed_marker_fails_whole_construction() {
        assert!(chapters_from_markers(Some((90.0, 30.0)), None).is_err());
    }

    #[test]
    fn markers_produce_intro_body_outro() {
        let chapters = chapters_from_markers(Some((0.0, 90.0)), Some((1300.0, 1390.0))).unwrap();
        let titles: Vec<_> = chapters.iter().map(Chapter::title).collect();
        assert_eq!(titles, ["Intro", "Episode", "Outro"]);
        assert_eq!(chapters[1].start(), 90.0);
        assert_eq!(chapters[1].end(), 1300.0);
    }

    #[test]
    fn reversed_markers_are_not_dropped() {
        let err = chapters_from_markers(Some((10.0, 0.0)), None).unwrap_err();
        assert!(matches!(err, RemuxError::InvalidChapter { start, end } if start == 10.0 && end == 0.0));
        assert!(chapters_from_markers(None, Some((1400.0, 0.0))).is_err());
    }

    #[test]
    fn outro_inside_intro_is_rejected() {
        let err = chapters_from_markers(Some((0.0, 90.0)), Some((50.0, 60.0))).unwrap_err();
        assert!(matches!(
            err,
            RemuxError::OverlappingChapters { intro_end, outro_start }
                if intro_end == 90.0 && outro_start == 50.0
        ));
    }

    #[test]
    fn outro_right_after_intro_has_no_body() {
        let chapters = chapters_from_markers(Some((0.0, 90.0)), Some((90.0, 120.0))).unwrap();
        let titles: Vec<_> = chapters.iter().map(Chapter::title).collect();
        assert_eq!(titles, ["Intro", "Outro"]);
    }

    #[test]
    fn zero_markers_mean_absent() {
        assert!(chapters_from_markers(Some((0.0, 0.0)), Some((0.0, 0.0))).unwrap().is_empty());
    }

    #[test]
    fn ffmetadata_uses_millisecond_timebase() {
        let chapters = vec![Chapter::new(0.0, 89.5, "Intro; part=1").unwrap()];
        assert_eq!(
            ffmetadata(&chapters),
            ";FFMETADATA1\n[CHAPTER]\nTIMEBASE=1/1000\nSTART=0\nEND=89500\ntitle=Intro\\; part\\=1\n"
        );
    }

    #[test]
    fn build_args_maps_every_input() {
        let remuxer = Remuxer::new("ffmpeg").with_subtitles(vec![
            SubtitleTrack {
                lang: "English".into(),
                url: "https://cdn.test/en.vtt".into(),
            },
            SubtitleTrack {
                lang: "Spanish".into(),
                url: "https://cdn.test/es.vtt".into(),
            },
        ]);
        let args = remuxer.build_args(
            Path::new("ep.mp4"),
            Some(Path::new("ep.ffmetadata")),
            Path::new("ep.mkv"),
        );
        assert_eq!(
            args,
            [
                "-hide_banner",
                "-loglevel",
                "error",
                "-y",
                "-i",
                "ep.mp4",
                "-i",
                "https://cdn.test/en.vtt",
                "-i",
                "https://cdn.test/es.vtt",
                "-i",
                "ep.ffmetadata",
                "-map",
                "0",
                "-map",
                "1",
                "-map",
                "2",
                "-map_metadata",
                "3",
                "-map_chapters",
                "3",
                "-c",
                "copy",
                "-metadata:s:s:0",
                "language=English",
                "-metadata:s:s:1",
                "language=Spanish",
                "ep.mkv",
            ]
        );
    }

    #[test]
    fn output_path_changes_container() {
        assert_eq!(Remuxer::output_path(Path::new("/tmp/01.mp4")), PathBuf::from("/tmp/01.mkv"));
        assert_eq!(
            Remuxer::output_path(Path::new("/tmp/01.mkv")),
            PathBuf::from("/tmp/01.remux.mkv")
        );
    }

    #[test]
    fn command_line_quotes_spaces() {
        let line = command_line(
            Path::new("yt-dlp"),
            &["--downloader-args".into(), "-hide_banner -nostats".into()],
        );
        assert_eq!(line, "yt-dlp --downloader-args \"-hide_banner -nostats\"");
    }
}
