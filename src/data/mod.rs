//! Response models for the StockChat analysis service
//!
//! Every operation of the service answers with the same envelope: a daily price
//! series, the generated commentary, and (for fresh submissions) a share id
//! that can later be used to fetch the same analysis again.

use serde::{Deserialize, Serialize};

/// One trading day in the returned price series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Trading date (YYYY-MM-DD)
    pub date: String,
    /// Closing price
    pub price: f64,
    /// Opening price
    pub open: f64,
    /// Intraday high
    pub high: f64,
    /// Intraday low
    pub low: f64,
    /// Traded volume
    pub volume: u64,
    /// Daily return in percent
    #[serde(default)]
    pub returns: f64,
    /// 20-day moving average
    pub ma20: f64,
    /// 50-day moving average
    pub ma50: f64,
    /// 200-day moving average
    pub ma200: f64,
}

/// Generated commentary for a stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisText {
    /// Short overall summary
    pub summary: String,
    /// Bullet points derived from technical indicators
    #[serde(default)]
    pub technical_factors: Vec<String>,
    /// Bullet points derived from fundamentals
    #[serde(default)]
    pub fundamental_factors: Vec<String>,
    /// Forward-looking outlook
    pub outlook: String,
    /// When the commentary was generated (ISO 8601, as sent by the service)
    pub timestamp: String,
}

/// Response envelope shared by all service operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    /// Daily price series, oldest first
    #[serde(default)]
    pub stock_data: Vec<PricePoint>,
    /// Commentary for the series
    pub analysis_text: AnalysisText,
    /// Shareable id, only present on fresh submissions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_id: Option<String>,
    /// Server-side response timestamp, sent by the read endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ApiResponse {
    /// Returns the most recent point of the price series, if any
    pub fn latest(&self) -> Option<&PricePoint> {
        self.stock_data.last()
    }
}

/// Body of an analysis submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Free-form question, e.g. "How is AAPL doing?"
    pub message: String,
}
