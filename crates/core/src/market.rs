//! Market-wide indicators shared by every issuer.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::SentinelError;

/// Coarse reading of an indicator against its own history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Weak,
    Neutral,
    Strong,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Weak => "weak",
            Level::Neutral => "neutral",
            Level::Strong => "strong",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weak" => Ok(Level::Weak),
            "neutral" => Ok(Level::Neutral),
            "strong" => Ok(Level::Strong),
            other => Err(SentinelError::InvalidIndicator(other.to_string())),
        }
    }
}

/// Expected direction of capital flows into equities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowBias {
    Bullish,
    Neutral,
    Bearish,
}

impl FlowBias {
    /// A weak dollar pushes capital into equities; a strong one keeps it in cash.
    pub fn from_dollar(strength: Level) -> Self {
        match strength {
            Level::Weak => FlowBias::Bullish,
            Level::Neutral => FlowBias::Neutral,
            Level::Strong => FlowBias::Bearish,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowBias::Bullish => "bullish",
            FlowBias::Neutral => "neutral",
            FlowBias::Bearish => "bearish",
        }
    }
}

impl FromStr for FlowBias {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bullish" => Ok(FlowBias::Bullish),
            "neutral" => Ok(FlowBias::Neutral),
            "bearish" => Ok(FlowBias::Bearish),
            other => Err(SentinelError::InvalidIndicator(other.to_string())),
        }
    }
}

/// One trading day's macro backdrop: the dollar index and an equity-market
/// proxy for GDP sentiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroSnapshot {
    pub as_of: NaiveDate,
    pub dollar_index: f64,
    /// Percent change over the last 30 sessions; negative means weakening.
    pub dollar_30d_change: f64,
    /// Percent above or below the trailing-year mean.
    pub dollar_vs_year_avg: f64,
    pub dollar_strength: Level,
    pub gdp_proxy_trend: Level,
    pub equity_flow_bias: FlowBias,
}

impl MacroSnapshot {
    /// The classified part of the snapshot. Predictions only move when this does.
    pub fn regime(&self) -> (Level, Level, FlowBias) {
        (self.dollar_strength, self.gdp_proxy_trend, self.equity_flow_bias)
    }
}
