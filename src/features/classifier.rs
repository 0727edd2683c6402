use std::collections::HashSet;

use serde::Serialize;

use crate::features::explanations::{lookup, FALLBACK_EXPLANATION};

/// Suffix of data-sufficiency flags: `<feature>_has_data`.
pub const FLAG_SUFFIX: &str = "_has_data";

/// Substrings marking derived/rolling computations.
pub const ENGINEERING_MARKERS: &[&str] = &[
    "_ma_",           // moving average
    "_spike",
    "_trend",
    "_count_",        // rolling count
    "_velocity",
    "_acceleration",
    "_flip",
    "_roc",           // rate of change
    "_approach",
    "_age",
    "_breakout",
    "_distance",
];

/// Derived features whose names carry no windowed marker.
pub const NAMED_ENGINEERING: &[&str] = &[
    "cumulative_delta",
    "net_volume",
    "buy_dominance",
    "buy_sell_ratio",
    "rolling_high",
    "rolling_high_distance",
    "rolling_high_breakout",
    "rolling_high_age",
];

/// Raw inputs known to the summary counter.
pub const BASE_FEATURES: &[&str] = &[
    "price_open",
    "price_high",
    "price_low",
    "price_close",
    "volume",
    "buy_volume",
    "sell_volume",
    "buy_pressure",
    "sell_pressure",
    "trade_count",
    "spread",
    "mid_price",
    "order_imbalance",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    /// Raw market input.
    Base,
    /// Computed from base features over a window.
    Engineering,
    /// 1/0 indicator of whether a windowed feature had enough history.
    Flag,
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FeatureKind::Base => "base",
            FeatureKind::Engineering => "engineering",
            FeatureKind::Flag => "flag",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeatureCounts {
    pub base: usize,
    pub engineering: usize,
    pub flag: usize,
    /// Unique feature names counted.
    pub total: usize,
}

impl FeatureCounts {
    fn add(&mut self, kind: FeatureKind) {
        match kind {
            FeatureKind::Base => self.base += 1,
            FeatureKind::Engineering => self.engineering += 1,
            FeatureKind::Flag => self.flag += 1,
        }
        self.total += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedFeature {
    pub name: String,
    pub kind: FeatureKind,
    pub explanation: String,
}

fn is_flag(name: &str) -> bool {
    name.ends_with(FLAG_SUFFIX)
}

fn is_engineering(name: &str) -> bool {
    ENGINEERING_MARKERS.iter().any(|m| name.contains(m)) || NAMED_ENGINEERING.contains(&name)
}

/// Per-row classification: flag, then engineering, else base.
pub fn classify(name: &str) -> FeatureKind {
    if is_flag(name) {
        FeatureKind::Flag
    } else if is_engineering(name) {
        FeatureKind::Engineering
    } else {
        FeatureKind::Base
    }
}

/// Summary-badge classification: flag, then catalogued base names, else
/// engineering. Agrees with [`classify`] on every catalogued name but sends
/// uncatalogued names to engineering instead of base.
pub fn classify_for_summary(name: &str) -> FeatureKind {
    if is_flag(name) {
        FeatureKind::Flag
    } else if BASE_FEATURES.contains(&name) {
        FeatureKind::Base
    } else {
        FeatureKind::Engineering
    }
}

pub fn explain(name: &str) -> String {
    if let Some(base) = name.strip_suffix(FLAG_SUFFIX) {
        return format!(
            "Data-sufficiency flag for {base}: 1 when enough history exists to fill its window, \
             0 when not (e.g. a newly listed market)."
        );
    }
    lookup(name).unwrap_or(FALLBACK_EXPLANATION).to_string()
}

/// Per-kind counts over the unique names in `features`.
pub fn count_features<S: AsRef<str>>(features: &[S]) -> FeatureCounts {
    count_with(features, classify)
}

/// Same as [`count_features`] but using [`classify_for_summary`].
pub fn summary_counts<S: AsRef<str>>(features: &[S]) -> FeatureCounts {
    count_with(features, classify_for_summary)
}

fn count_with<S: AsRef<str>>(features: &[S], kind_of: fn(&str) -> FeatureKind) -> FeatureCounts {
    let unique: HashSet<&str> = features.iter().map(AsRef::as_ref).collect();
    let mut counts = FeatureCounts::default();
    for name in unique {
        counts.add(kind_of(name));
    }
    counts
}

/// Unique features in first-seen order with kind and explanation, for tables.
pub fn classify_all<S: AsRef<str>>(features: &[S]) -> Vec<ClassifiedFeature> {
    let mut seen: HashSet<&str> = HashSet::new();
    features
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| seen.insert(*name))
        .map(|name| ClassifiedFeature {
            name: name.to_string(),
            kind: classify(name),
            explanation: explain(name),
        })
        .collect()
}
