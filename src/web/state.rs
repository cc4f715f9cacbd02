use std::sync::Arc;

use crate::config::Settings;
use crate::forecast::ProfitForecaster;
use crate::notifications::NotificationTracker;
use crate::upstream::BotApi;

/// Combined application state for the web server
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub api: Arc<dyn BotApi>,
    /// `None` when no language model is configured.
    pub forecaster: Option<Arc<ProfitForecaster>>,
    pub notifications: NotificationTracker,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        api: Arc<dyn BotApi>,
        forecaster: Option<Arc<ProfitForecaster>>,
    ) -> Self {
        Self {
            settings,
            api,
            forecaster,
            notifications: NotificationTracker::new(),
        }
    }
}
