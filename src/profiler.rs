//! Frame-timing profiler: a per-frame record of where the time went, an
//! in-buffer HUD showing the *previous* frame's numbers, and an optional
//! JSON dump of the whole run's timings on shutdown.

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use crate::cell::CellBuffer;
use crate::renderer::DiffStats;

/// Durations and diff stats for one frame. `node_count` is only populated
/// when the render loop was asked to count nodes (it costs an extra walk).
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameRecord {
    pub layout: Duration,
    pub paint: Duration,
    pub diff: Duration,
    pub write: Duration,
    pub diff_stats: DiffStats,
    pub node_count: Option<usize>,
}

impl FrameRecord {
    fn total_ms(&self) -> f64 {
        (self.layout + self.paint + self.diff + self.write).as_secs_f64() * 1000.0
    }
}

/// Accumulates frame records and renders the HUD overlay. Disabled by
/// default — enabling it costs one extra `Instant::now()` pair per frame
/// plus the record push, negligible next to a frame's own work.
pub struct Profiler {
    enabled: bool,
    last: Option<FrameRecord>,
    frames: Vec<FrameRecord>,
}

impl Profiler {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, last: None, frames: Vec::new() }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Record a completed frame. Always updates the HUD's "previous frame"
    /// snapshot; only retained for the JSON dump when enabled.
    pub fn record(&mut self, frame: FrameRecord) {
        if self.enabled {
            self.frames.push(frame);
        }
        self.last = Some(frame);
    }

    /// Draw a single-row HUD into `buf`'s top row, showing the frame
    /// *before* this one — the frame currently being painted hasn't
    /// finished yet, so measuring it would perturb what it's measuring.
    pub fn draw_hud(&self, buf: &mut CellBuffer) {
        let Some(last) = self.last else { return };
        if buf.cols() == 0 {
            return;
        }
        let text = format!(
            " layout {:.2}ms paint {:.2}ms diff {:.2}ms write {:.2}ms ops {} ",
            last.layout.as_secs_f64() * 1000.0,
            last.paint.as_secs_f64() * 1000.0,
            last.diff.as_secs_f64() * 1000.0,
            last.write.as_secs_f64() * 1000.0,
            last.diff_stats.ops,
        );
        for (col, ch) in text.chars().take(buf.cols() as usize).enumerate() {
            buf.set_code_point(0, col as u16, ch as u32, None, None);
        }
    }

    /// Write a JSON summary (p50/p95/p99/max of total frame time, plus the
    /// raw per-frame arrays) to `path`. No-op if profiling was disabled.
    pub fn flush_json(&self, path: impl AsRef<Path>) -> io::Result<()> {
        if !self.enabled || self.frames.is_empty() {
            return Ok(());
        }

        let mut totals: Vec<f64> = self.frames.iter().map(FrameRecord::total_ms).collect();
        totals.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let p = |q: f64| -> f64 {
            let idx = ((totals.len() - 1) as f64 * q).round() as usize;
            totals[idx]
        };

        let mut json = String::new();
        json.push_str("{\n");
        let _ = writeln!(json, "  \"p50\": {:.3},", p(0.50));
        let _ = writeln!(json, "  \"p95\": {:.3},", p(0.95));
        let _ = writeln!(json, "  \"p99\": {:.3},", p(0.99));
        let _ = writeln!(json, "  \"max\": {:.3},", totals.last().copied().unwrap_or(0.0));
        json.push_str("  \"frames\": [\n");
        for (i, f) in self.frames.iter().enumerate() {
            let comma = if i + 1 == self.frames.len() { "" } else { "," };
            let _ = writeln!(
                json,
                "    {{\"layoutMs\": {:.3}, \"paintMs\": {:.3}, \"diffMs\": {:.3}, \"writeMs\": {:.3}, \"ops\": {}}}{comma}",
                f.layout.as_secs_f64() * 1000.0,
                f.paint.as_secs_f64() * 1000.0,
                f.diff.as_secs_f64() * 1000.0,
                f.write.as_secs_f64() * 1000.0,
                f.diff_stats.ops,
            );
        }
        json.push_str("  ]\n}\n");

        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ms: u64) -> FrameRecord {
        FrameRecord {
            layout: Duration::from_millis(ms),
            ..Default::default()
        }
    }

    #[test]
    fn disabled_profiler_tracks_last_but_not_history() {
        let mut p = Profiler::new(false);
        p.record(frame(5));
        p.record(frame(10));
        assert!(p.last.is_some());
        assert!(p.frames.is_empty());
    }

    #[test]
    fn hud_draws_previous_frame_numbers() {
        let mut p = Profiler::new(true);
        p.record(frame(3));
        let mut buf = CellBuffer::new(1, 80);
        p.draw_hud(&mut buf);
        assert_eq!(buf.get(0, 1).unwrap().glyph, "l");
    }

    #[test]
    fn flush_json_noop_when_disabled() {
        let p = Profiler::new(false);
        let dir = std::env::temp_dir().join("btuin_profiler_test_disabled.json");
        p.flush_json(&dir).unwrap();
        assert!(!dir.exists());
    }
}
