//! Parser for the `/api/metrics` text exposition.
//!
//! Each sample line is `name value` or `name{label="v",...} value`, optionally
//! followed by a timestamp. Blank lines and `#` comments are ignored, as are
//! lines that do not parse.

use std::collections::BTreeMap;

use tracing::debug;

use crate::types::MetricSample;

pub fn parse_metrics(text: &str) -> Vec<MetricSample> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let sample = parse_line(line);
            if sample.is_none() {
                debug!(line, "Skipping unparsable metrics line");
            }
            sample
        })
        .collect()
}

/// Sum of every sample with this name, across label sets.
pub fn metric_total(samples: &[MetricSample], name: &str) -> Option<f64> {
    let mut matched = samples.iter().filter(|s| s.name == name).peekable();
    matched.peek()?;
    Some(matched.map(|s| s.value).sum())
}

fn parse_line(line: &str) -> Option<MetricSample> {
    let (name, labels, rest) = match line.find('{') {
        Some(open) => {
            let close = open + line[open..].find('}')?;
            let labels = parse_labels(&line[open + 1..close])?;
            (&line[..open], labels, &line[close + 1..])
        }
        None => {
            let split = line.find(char::is_whitespace)?;
            (&line[..split], BTreeMap::new(), &line[split..])
        }
    };

    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = parse_value(rest.split_whitespace().next()?)?;

    Some(MetricSample {
        name: name.to_string(),
        labels,
        value,
    })
}

fn parse_labels(raw: &str) -> Option<BTreeMap<String, String>> {
    let mut labels = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=')?;
        let value = value.trim().trim_matches('"');
        labels.insert(key.trim().to_string(), value.to_string());
    }
    Some(labels)
}

fn parse_value(raw: &str) -> Option<f64> {
    match raw {
        "+Inf" | "Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => raw.parse().ok(),
    }
}
