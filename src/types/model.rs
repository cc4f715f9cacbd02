use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelParseError;

/// The trading bots the dashboard follows, keyed by the model driving them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotModel {
    ChatGpt,
    Gemini,
}

impl BotModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotModel::ChatGpt => "chatgpt",
            BotModel::Gemini => "gemini",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BotModel::ChatGpt => "ChatGPT",
            BotModel::Gemini => "Gemini",
        }
    }

    pub fn all() -> Vec<BotModel> {
        vec![BotModel::ChatGpt, BotModel::Gemini]
    }
}

impl fmt::Display for BotModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BotModel {
    type Err = ModelParseError;

    /// Exact match only: the route rejects `ChatGPT` the same way it rejects `unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chatgpt" => Ok(BotModel::ChatGpt),
            "gemini" => Ok(BotModel::Gemini),
            other => Err(ModelParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_models() {
        assert_eq!("chatgpt".parse::<BotModel>(), Ok(BotModel::ChatGpt));
        assert_eq!("gemini".parse::<BotModel>(), Ok(BotModel::Gemini));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("unknown".parse::<BotModel>().is_err());
        assert!("".parse::<BotModel>().is_err());
        assert!("Gemini".parse::<BotModel>().is_err());
    }

    #[test]
    fn test_serde_names_match_query_keys() {
        for model in BotModel::all() {
            let json = serde_json::to_string(&model).unwrap();
            assert_eq!(json, format!("\"{}\"", model.as_str()));
        }
    }
}
