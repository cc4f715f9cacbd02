pub mod client;

pub use client::*;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use crate::error::UpstreamError;
use crate::types::BotModel;

/// REST resources exposed by a trading bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Status,
    Stats,
    Trades,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Status => "/status",
            Endpoint::Stats => "/stats",
            Endpoint::Trades => "/trades",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Raw access to the bots' REST APIs. Callers decide how to degrade on error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn fetch_json(&self, model: BotModel, endpoint: Endpoint) -> Result<Value, UpstreamError>;
}
