//! Text rendering of steps and results.

use std::time::Duration;

use netsight_sequencer::{Step, StepStatus};

use crate::scenario::StepDetail;

/// Glyph shown for a step status.
pub fn status_glyph(status: StepStatus) -> char {
    match status {
        StepStatus::Pending => '○',
        StepStatus::Active => '●',
        StepStatus::Completed => '✓',
    }
}

/// One glyph per step, e.g. `✓✓●○○`.
pub fn status_strip(statuses: &[StepStatus]) -> String {
    statuses.iter().map(|s| status_glyph(*s)).collect()
}

/// Fixed-width progress bar.
pub fn progress_bar(done: usize, total: usize, width: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        (done.min(total) * width) / total
    };
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

/// Format a size given in kilobytes.
///
/// - Values below 1024 display as "N KB"
/// - Values below 1024² display as "X.X MB"
/// - Larger values display as "X.X GB"
pub fn format_size_kb(kb: u64) -> String {
    if kb >= 1024 * 1024 {
        format!("{:.1} GB", kb as f64 / (1024.0 * 1024.0))
    } else if kb >= 1024 {
        format!("{:.1} MB", kb as f64 / 1024.0)
    } else {
        format!("{kb} KB")
    }
}

/// Format a step duration: "800ms", "2.5s".
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

/// Line printed when a step becomes active.
///
/// ```text
/// ✓✓●○○ [3/5] Root Server: Query root nameserver (42 ms)
/// ```
pub fn step_line(
    statuses: &[StepStatus],
    index: usize,
    step: &Step<StepDetail>,
    detail: Option<&str>,
) -> String {
    let mut line = format!(
        "{} [{}/{}] {}",
        status_strip(statuses),
        index + 1,
        statuses.len(),
        step.label
    );
    if !step.payload.description.is_empty() {
        line.push_str(": ");
        line.push_str(&step.payload.description);
    }
    if let Some(detail) = detail {
        line.push_str(" (");
        line.push_str(detail);
        line.push(')');
    }
    line
}

/// Header printed before a phase starts.
pub fn phase_header(name: &str, number: usize, total: usize, steps: usize) -> String {
    if total > 1 {
        format!("== {name} (phase {number}/{total}, {steps} steps) ==")
    } else {
        format!("== {name} ({steps} steps) ==")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use StepStatus::{Active, Completed, Pending};

    #[test]
    fn test_glyphs() {
        assert_eq!(status_glyph(StepStatus::Pending), '○');
        assert_eq!(status_glyph(StepStatus::Active), '●');
        assert_eq!(status_glyph(StepStatus::Completed), '✓');
        assert_eq!(status_strip(&[Pending; 3]), "○○○");
    }

    #[test]
    fn test_status_strip() {
        assert_eq!(status_strip(&[Completed, Active, Pending, Pending]), "✓●○○");
        assert_eq!(status_strip(&[Completed; 3]), "✓✓✓");
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0, 4, 8), "[--------]");
        assert_eq!(progress_bar(2, 4, 8), "[####----]");
        assert_eq!(progress_bar(9, 4, 8), "[########]");
        assert_eq!(progress_bar(0, 0, 4), "[----]");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size_kb(15), "15 KB");
        assert_eq!(format_size_kb(2560), "2.5 MB");
        assert_eq!(format_size_kb(25600), "25.0 MB");
        assert_eq!(format_size_kb(3 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(800)), "800ms");
        assert_eq!(format_duration(Duration::from_millis(2000)), "2s");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
    }

    #[test]
    fn test_step_line() {
        let step = Step::new(
            "root",
            "Root Server",
            Duration::from_millis(960),
            StepDetail {
                description: "Query root nameserver".to_string(),
            },
        );
        let run = [Completed, Completed, Active, Pending, Pending];

        assert_eq!(
            step_line(&run, 2, &step, Some("42 ms")),
            "✓✓●○○ [3/5] Root Server: Query root nameserver (42 ms)"
        );

        let bare = step.clone().map_payload(|_| StepDetail::default());
        assert_eq!(step_line(&run, 2, &bare, None), "✓✓●○○ [3/5] Root Server");
    }

    #[test]
    fn test_phase_header() {
        assert_eq!(
            phase_header("Three-way handshake", 1, 2, 5),
            "== Three-way handshake (phase 1/2, 5 steps) =="
        );
        assert_eq!(phase_header("Edge delivery", 1, 1, 5), "== Edge delivery (5 steps) ==");
    }
}
