use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::types::BotModel;

const MAX_NOTIFICATIONS: usize = 100;

/// Raised when a bot's closed-trade count grows between two polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradesCompleted {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub model: BotModel,
    pub new_trades: u64,
    pub total_trades: u64,
}

impl TradesCompleted {
    pub fn new(model: BotModel, new_trades: u64, total_trades: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            model,
            new_trades,
            total_trades,
        }
    }

    pub fn title(&self) -> String {
        let noun = if self.new_trades == 1 { "trade" } else { "trades" };
        format!("{}: {} new completed {}", self.model.display_name(), self.new_trades, noun)
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    last_counts: HashMap<BotModel, u64>,
    unread: u64,
    notifications: Vec<TradesCompleted>,
}

/// Badge counter for newly completed trades.
///
/// The first count seen for a model is only a baseline; later increases add
/// to the unread badge until it is cleared.
#[derive(Clone, Default)]
pub struct NotificationTracker {
    state: Arc<RwLock<TrackerState>>,
}

impl NotificationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn observe(&self, model: BotModel, total_trades: u64) -> Option<TradesCompleted> {
        let mut state = self.state.write().await;
        let previous = state.last_counts.insert(model, total_trades)?;

        if total_trades <= previous {
            return None;
        }

        let notification = TradesCompleted::new(model, total_trades - previous, total_trades);
        info!("{}", notification.title());

        state.unread += notification.new_trades;
        state.notifications.insert(0, notification.clone());
        state.notifications.truncate(MAX_NOTIFICATIONS);

        Some(notification)
    }

    pub async fn unread_count(&self) -> u64 {
        self.state.read().await.unread
    }

    pub async fn get_recent(&self, limit: usize) -> Vec<TradesCompleted> {
        let state = self.state.read().await;
        state.notifications.iter().take(limit).cloned().collect()
    }

    /// Reset the badge; history and baselines are kept.
    pub async fn clear(&self) {
        self.state.write().await.unread = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_observation_is_baseline() {
        let tracker = NotificationTracker::new();
        assert!(tracker.observe(BotModel::ChatGpt, 12).await.is_none());
        assert_eq!(tracker.unread_count().await, 0);
    }

    #[tokio::test]
    async fn test_increases_accumulate_across_models() {
        let tracker = NotificationTracker::new();
        tracker.observe(BotModel::ChatGpt, 5).await;
        tracker.observe(BotModel::Gemini, 2).await;

        let n = tracker.observe(BotModel::ChatGpt, 7).await.unwrap();
        assert_eq!(n.new_trades, 2);
        assert_eq!(n.total_trades, 7);
        assert_eq!(n.title(), "ChatGPT: 2 new completed trades");

        tracker.observe(BotModel::Gemini, 3).await;
        assert_eq!(tracker.unread_count().await, 3);

        let recent = tracker.get_recent(10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].model, BotModel::Gemini);
    }

    #[tokio::test]
    async fn test_decrease_resets_baseline() {
        let tracker = NotificationTracker::new();
        tracker.observe(BotModel::Gemini, 10).await;
        assert!(tracker.observe(BotModel::Gemini, 4).await.is_none());
        assert!(tracker.observe(BotModel::Gemini, 4).await.is_none());

        let n = tracker.observe(BotModel::Gemini, 5).await.unwrap();
        assert_eq!(n.new_trades, 1);
        assert_eq!(n.title(), "Gemini: 1 new completed trade");
    }

    #[tokio::test]
    async fn test_clear_resets_badge_only() {
        let tracker = NotificationTracker::new();
        tracker.observe(BotModel::ChatGpt, 1).await;
        tracker.observe(BotModel::ChatGpt, 3).await;
        tracker.clear().await;

        assert_eq!(tracker.unread_count().await, 0);
        assert_eq!(tracker.get_recent(5).await.len(), 1);
        assert!(tracker.observe(BotModel::ChatGpt, 3).await.is_none());
    }
}
