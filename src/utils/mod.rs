use std::time::Instant;
use tracing::debug;

/// Logs how long a scoped operation took when dropped.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!("{} took {:.2?}", self.label, self.start.elapsed());
    }
}

/// Compact countdown: "2d 3h", "1h 05m", "12m". Sub-minute rounds up to "1m".
pub fn fmt_countdown(d: chrono::Duration) -> String {
    let total_mins = (d.num_seconds().max(0) + 59) / 60;
    let days = total_mins / (24 * 60);
    let hours = (total_mins / 60) % 24;
    let mins = total_mins % 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {:02}m", hours, mins)
    } else {
        format!("{}m", mins.max(1))
    }
}

/// Signed percentage with two decimals, or a dash.
pub fn fmt_pct(v: Option<f64>) -> String {
    match v {
        Some(p) => format!("{:+.2}%", p),
        None => "—".to_string(),
    }
}
