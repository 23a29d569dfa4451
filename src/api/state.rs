use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::pipeline::AnalyticsBundle;

#[derive(Clone)]
pub struct AppState {
    pub bundle: Arc<AnalyticsBundle>,
    pub cors_origin: Arc<str>,
    pub loaded_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(bundle: Arc<AnalyticsBundle>, cors_origin: &str) -> Self {
        Self {
            bundle,
            cors_origin: Arc::from(cors_origin),
            loaded_at: Utc::now(),
        }
    }
}
