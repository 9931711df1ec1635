//! Text exposition rendering
//!
//! Renders a gauge snapshot in the Prometheus text format: one `# HELP`,
//! one `# TYPE` and one value line per gauge, blocks separated by a blank line.

use std::fmt::Write;

use super::gauges::GaugeSnapshot;

/// Content type served for text exposition
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render every gauge of the snapshot in fixed order
pub fn render_snapshot(snapshot: &GaugeSnapshot) -> String {
    let mut out = String::with_capacity(1024);
    for (tracked, value) in snapshot.iter() {
        let _ = writeln!(out, "# HELP {} {}", tracked.metric, tracked.help);
        let _ = writeln!(out, "# TYPE {} gauge", tracked.metric);
        let _ = writeln!(out, "{} {}", tracked.metric, value);
        out.push('\n');
    }
    out
}
