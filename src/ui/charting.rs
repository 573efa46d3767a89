use popwheel::metrics::MetricsEntry;

/// (seconds into the session, reaction ms) for every correct hit
pub fn reaction_points(entries: &[MetricsEntry]) -> Vec<(f64, f64)> {
    entries
        .iter()
        .filter(|e| e.is_correct)
        .map(|e| (e.timestamp_ms as f64 / 1000.0, e.reaction_time_ms as f64))
        .collect()
}

/// Compute X (seconds) and Y (reaction ms) bounds for the results chart
pub fn compute_chart_params(points: &[(f64, f64)], duration_secs: f64) -> (f64, f64) {
    let mut slowest = 0.0;
    for &(_, ms) in points {
        if ms > slowest {
            slowest = ms;
        }
    }

    let mut overall_duration = match points.last() {
        Some(p) => p.0.max(duration_secs),
        None => duration_secs,
    };
    if overall_duration < 1.0 {
        overall_duration = 1.0;
    }

    (overall_duration, slowest.round())
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
