use crate::model::BucketIndex;

/// Label for a bucket row: its start offset from the first bucket of the
/// session.
pub fn bucket_label(index: BucketIndex, min_bucket: BucketIndex, bucket_width_ns: u64) -> String {
    let offset = index.saturating_sub(min_bucket).saturating_mul(bucket_width_ns);
    format!("+{}", format_time_label(offset))
}

/// Format a duration in nanoseconds as a human-readable label.
pub fn format_time_label(ns: u64) -> String {
    let ns_f = ns as f64;
    if ns >= 60_000_000_000 {
        let mins = ns / 60_000_000_000;
        let secs = (ns % 60_000_000_000) as f64 / 1e9;
        format!("{mins}m{secs:.1}s")
    } else if ns >= 1_000_000_000 {
        format!("{:.3}s", ns_f / 1e9)
    } else if ns >= 1_000_000 {
        format!("{:.2}ms", ns_f / 1e6)
    } else if ns >= 1_000 {
        format!("{:.1}µs", ns_f / 1e3)
    } else {
        format!("{ns}ns")
    }
}
