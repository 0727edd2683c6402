pub mod classifier;
pub mod explanations;

pub use classifier::{
    classify, classify_all, classify_for_summary, count_features, explain, summary_counts,
    ClassifiedFeature, FeatureCounts, FeatureKind,
};
