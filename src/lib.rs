//! Client-side core of the training service dashboard: an entity
//! store synchronised with the REST API, a background poller, a job waiter,
//! and the feature-taxonomy classifier.

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod jobs;
pub mod poller;
pub mod state;
pub mod types;
