//! Downloader progress stream parsing and stall detection.
//!
//! ffmpeg (driven by yt-dlp) is run with `-progress -`, which prints blocks
//! of `key=value` lines, each block terminated by `progress=continue` or
//! `progress=end`:
//!
//! ```text
//! fps=0.00
//! total_size=1048576
//! out_time=00:00:04.004000
//! speed=2.01x
//! progress=continue
//! ```

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Why an attempt was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallKind {
    /// `total_size` did not move for the size threshold.
    SizeStalled,
    /// `speed` stayed below the floor for the speed threshold.
    SpeedTooLow,
}

impl fmt::Display for StallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StallKind::SizeStalled => f.write_str("Stalled for too long"),
            StallKind::SpeedTooLow => f.write_str("Speed too low"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StallThresholds {
    pub size_stall_secs: u64,
    pub slow_speed_secs: u64,
    /// Speed multiplier below which a download counts as slow.
    pub speed_floor: f64,
}

impl Default for StallThresholds {
    fn default() -> Self {
        Self {
            size_stall_secs: 30,
            slow_speed_secs: 60,
            speed_floor: 1.0,
        }
    }
}

/// Latest values of one progress block. Keys persist across blocks, a
/// value is only replaced when the downloader reports it again.
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    values: HashMap<String, String>,
}

/// Result of feeding one line into a [`ProgressState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// A `key=value` pair was stored.
    Value,
    /// The `progress=` terminator; the block is complete.
    EndOfBlock,
    /// Not a progress line.
    Other,
}

impl ProgressState {
    pub fn set(&mut self, key: &str, value: &str) {
        self.values
            .insert(key.trim().to_string(), value.trim().to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn feed_line(&mut self, line: &str) -> LineKind {
        let line = line.trim();
        if line.starts_with("progress=") {
            return LineKind::EndOfBlock;
        }
        match line.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                self.set(key, value);
                LineKind::Value
            }
            _ => LineKind::Other,
        }
    }

    /// `speed=2.01x` as `2.01`.
    pub fn speed(&self) -> Option<f64> {
        parse_speed(self.get("speed")?)
    }

    fn padded(&self, key: &str, width: usize) -> Option<String> {
        self.get(key).map(|v| format!("{v:>width$}"))
    }
}

fn parse_speed(raw: &str) -> Option<f64> {
    let mut chars = raw.chars();
    chars.next_back()?;
    chars.as_str().trim().parse().ok()
}

impl fmt::Display for ProgressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out: Vec<String> = Vec::new();
        if let Some(time) = self.get("out_time") {
            out.push(format!("time={time}"));
        }
        out.push("|".into());
        for (name, key, width) in [("fps", "fps", 6), ("speed", "speed", 5), ("bitrate", "bitrate", 6)] {
            if let Some(v) = self.padded(key, width) {
                out.push(format!("{name}={v}"));
            }
        }
        out.push("|".into());
        if let Some(bytes) = self.get("total_size").and_then(|s| s.trim().parse::<f64>().ok()) {
            out.push(format!("size={}", human_byte_size(bytes)));
        }
        f.write_str(&out.join(" "))
    }
}

/// Format a byte count: `B`/`KiB` whole, `MiB` one decimal, larger two.
pub fn human_byte_size(bytes: f64) -> String {
    const UNITS: [(&str, usize); 6] = [
        ("B", 0),
        ("KiB", 0),
        ("MiB", 1),
        ("GiB", 2),
        ("TiB", 2),
        ("PiB", 2),
    ];

    let mut num = bytes;
    let mut unit = UNITS[0];
    for (i, candidate) in UNITS.iter().enumerate() {
        unit = *candidate;
        if num < 1024.0 || i == UNITS.len() - 1 {
            break;
        }
        num /= 1024.0;
    }
    let (suffix, precision) = unit;
    format!("{num:.precision$} {suffix}")
}

/// Tracks progress blocks of one attempt and decides when it has stalled.
#[derive(Debug)]
pub struct StallDetector {
    thresholds: StallThresholds,
    last_size_change: Instant,
    last_fast: Instant,
    prev_size: Option<String>,
    prev_speed: Option<String>,
}

impl StallDetector {
    pub fn new(thresholds: StallThresholds, started: Instant) -> Self {
        Self {
            thresholds,
            last_size_change: started,
            last_fast: started,
            prev_size: None,
            prev_speed: None,
        }
    }

    /// Feed the state after a complete block was read at `now`.
    ///
    /// A size that holds while the speed also holds is ffmpeg finalizing
    /// the file, not a stall.
    pub fn observe(&mut self, state: &ProgressState, now: Instant) -> Option<StallKind> {
        let cur_size = state.get("total_size").map(str::to_string);
        let cur_speed = state.get("speed").map(str::to_string);
        let speed = cur_speed.as_deref().and_then(parse_speed);

        if cur_size != self.prev_size {
            self.last_size_change = now;
        }
        if speed.is_some_and(|s| s > self.thresholds.speed_floor) {
            self.last_fast = now;
        }

        let mut verdict = None;

        if self.prev_size.is_some() && cur_size == self.prev_size {
            let finalizing = self.prev_speed == cur_speed;
            let held = now.saturating_duration_since(self.last_size_change);
            if !finalizing && held >= Duration::from_secs(self.thresholds.size_stall_secs) {
                verdict = Some(StallKind::SizeStalled);
            }
        }

        if verdict.is_none()
            && self.prev_speed.is_some()
            && speed.is_some_and(|s| s < self.thresholds.speed_floor)
        {
            let slow_for = now.saturating_duration_since(self.last_fast);
            if slow_for >= Duration::from_secs(self.thresholds.slow_speed_secs) {
                verdict = Some(StallKind::SpeedTooLow);
            }
        }

        self.prev_size = cur_size;
        self.prev_speed = cur_speed;
        verdict
    }

    /// Check a downloader that has printed nothing since the last block.
    ///
    /// Silence after the first block means the size is not moving, so the
    /// finalizing exemption of [`observe`](Self::observe) does not apply.
    /// Before the first block nothing is judged.
    pub fn idle(&self, now: Instant) -> Option<StallKind> {
        self.prev_size.as_ref()?;
        let held = now.saturating_duration_since(self.last_size_change);
        if held >= Duration::from_secs(self.thresholds.size_stall_secs) {
            return Some(StallKind::SizeStalled);
        }
        let slow = self
            .prev_speed
            .as_deref()
            .and_then(parse_speed)
            .is_some_and(|s| s < self.thresholds.speed_floor);
        let slow_for = now.saturating_duration_since(self.last_fast);
        if slow && slow_for >= Duration::from_secs(self.thresholds.slow_speed_secs) {
            return Some(StallKind::SpeedTooLow);
        }
        None
    }
}
