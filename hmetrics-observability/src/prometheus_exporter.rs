//! Prometheus text exposition of metric snapshots.
//!
//! See the [text format details] for the grammar produced here. Output is a
//! pure function of the snapshot list: any permutation of the same
//! snapshots renders to the same bytes.
//!
//! [text format details]: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#text-format-details

use crate::sources::SnapshotSource;
use hmetrics_core::{MetricSnapshot, MetricType};
use std::collections::HashMap;
use std::fmt::Write;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Pull a snapshot from `source` and render it.
pub fn render(source: &dyn SnapshotSource) -> String {
    translate(source.snapshot())
}

/// Render snapshots in the Prometheus text format.
pub fn translate(snapshots: Vec<MetricSnapshot>) -> String {
    let mut buf = String::new();
    write_text(&mut buf, snapshots);
    buf
}

/// Append the text rendering of `snapshots` to `w`.
///
/// Series are grouped by metric name (groups in ascending name order,
/// series within a group by ascending id). Each group gets one optional
/// `# HELP` line and one `# TYPE` line, taken from its first series.
///
/// # Panics
///
/// Panics if a histogram snapshot has fewer than `bounds.len() + 1` counts.
pub fn write_text(w: &mut String, mut snapshots: Vec<MetricSnapshot>) {
    // Sort by name, breaking ties by id. `sort_by` is stable.
    snapshots.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

    for group in snapshots.chunk_by(|a, b| a.name == b.name) {
        write_group(w, group);
    }
}

fn write_group(w: &mut String, group: &[MetricSnapshot]) {
    let metric = &group[0];

    if !metric.help.is_empty() {
        w.push_str("# HELP ");
        w.push_str(&metric.name);
        w.push(' ');
        escape_help(w, &metric.help);
        w.push('\n');
    }

    w.push_str("# TYPE ");
    w.push_str(&metric.name);
    w.push(' ');
    w.push_str(metric.metric_type.as_str());
    w.push('\n');

    let is_histogram = metric.metric_type == MetricType::Histogram;
    for (idx, series) in group.iter().enumerate() {
        if is_histogram {
            write_histogram(w, series);
            if idx != group.len() - 1 {
                w.push('\n');
            }
        } else {
            write_entry(w, &series.name, "", &series.labels, None, Sample::Value(series.value));
        }
    }
    w.push('\n');
}

// The bucket with le="+Inf" must exist and equal x_count; buckets appear in
// increasing order of their bound.
fn write_histogram(w: &mut String, series: &MetricSnapshot) {
    let mut has_inf = false;
    let mut count: u64 = 0;
    for (idx, bound) in series.bounds.iter().enumerate() {
        count += series.counts[idx];
        write_entry(w, &series.name, "_bucket", &series.labels, Some(*bound), Sample::Count(count));
        if *bound == f64::INFINITY {
            has_inf = true;
        }
    }

    // Overflow bucket.
    count += series.counts[series.bounds.len()];
    if !has_inf {
        write_entry(
            w,
            &series.name,
            "_bucket",
            &series.labels,
            Some(f64::INFINITY),
            Sample::Count(count),
        );
    }
    write_entry(w, &series.name, "_sum", &series.labels, None, Sample::Value(series.value));
    write_entry(w, &series.name, "_count", &series.labels, None, Sample::Count(count));
}

enum Sample {
    Value(f64),
    Count(u64),
}

/// `name[suffix]{labels[,le="bound"]} value`
fn write_entry(
    w: &mut String,
    name: &str,
    suffix: &str,
    labels: &HashMap<String, String>,
    le: Option<f64>,
    sample: Sample,
) {
    w.push_str(name);
    w.push_str(suffix);
    write_labels(w, labels, le);
    w.push(' ');
    match sample {
        Sample::Value(v) => write_float(w, v),
        Sample::Count(n) => w.push_str(itoa::Buffer::new().format(n)),
    }
    w.push('\n');
}

fn write_labels(w: &mut String, labels: &HashMap<String, String>, le: Option<f64>) {
    if labels.is_empty() && le.is_none() {
        return;
    }

    let mut names: Vec<&String> = labels.keys().collect();
    names.sort();

    let mut separator = '{';
    for name in names {
        w.push(separator);
        w.push_str(name);
        w.push_str("=\"");
        escape_label_value(w, &labels[name]);
        w.push('"');
        separator = ',';
    }
    if let Some(bound) = le {
        w.push(separator);
        w.push_str("le=\"");
        write_float(w, bound);
        w.push('"');
    }
    w.push('}');
}

/// Shortest decimal that round-trips the value; never exponent notation.
fn write_float(w: &mut String, v: f64) {
    if v.is_nan() {
        w.push_str("NaN");
    } else if v == f64::INFINITY {
        w.push_str("+Inf");
    } else if v == f64::NEG_INFINITY {
        w.push_str("-Inf");
    } else {
        let _ = write!(w, "{v}");
    }
}

/// `\` → `\\`, `"` → `\"`, newline → `\n`.
fn escape_label_value(w: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '\\' => w.push_str("\\\\"),
            '"' => w.push_str("\\\""),
            '\n' => w.push_str("\\n"),
            c => w.push(c),
        }
    }
}

/// HELP text escapes `\` and newline only.
fn escape_help(w: &mut String, help: &str) {
    for c in help.chars() {
        match c {
            '\\' => w.push_str("\\\\"),
            '\n' => w.push_str("\\n"),
            c => w.push(c),
        }
    }
}
