//! Plain-text output for the CLI

use std::fmt::Write;

use crate::api::{ApiError, ErrorClass};
use crate::data::ApiResponse;

/// Formats an analysis as a short text report
pub fn render_report(response: &ApiResponse) -> String {
    let analysis = &response.analysis_text;
    let mut out = String::new();

    let _ = writeln!(out, "Summary");
    let _ = writeln!(out, "  {}", analysis.summary);

    if !analysis.technical_factors.is_empty() {
        let _ = writeln!(out, "\nTechnical factors");
        for factor in &analysis.technical_factors {
            let _ = writeln!(out, "  - {}", factor);
        }
    }

    if !analysis.fundamental_factors.is_empty() {
        let _ = writeln!(out, "\nFundamental factors");
        for factor in &analysis.fundamental_factors {
            let _ = writeln!(out, "  - {}", factor);
        }
    }

    let _ = writeln!(out, "\nOutlook");
    let _ = writeln!(out, "  {}", analysis.outlook);

    if let Some(latest) = response.latest() {
        let _ = writeln!(
            out,
            "\nLast close {:.2} on {} ({:+.2}%), {} trading days",
            latest.price,
            latest.date,
            latest.returns,
            response.stock_data.len()
        );
    }

    if let Some(share_id) = &response.share_id {
        let _ = writeln!(out, "\nShare id: {}", share_id);
    }

    out
}

/// Formats a failure for stderr, with a hint matching its class
pub fn render_error(err: &ApiError) -> String {
    let hint = match err.class() {
        ErrorClass::NotFound => "no analysis exists for that id",
        ErrorClass::Transient => "the service had a problem; try again shortly",
        ErrorClass::Client => "the request was rejected",
        ErrorClass::Network => "could not reach the service; is it running?",
    };
    match err.status_code() {
        Some(status) => format!("error [{}]: {} ({})", status, err, hint),
        None => format!("error: {} ({})", err, hint),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: serde_json::Value) -> ApiResponse {
        serde_json::from_value(json).expect("valid envelope")
    }

    #[test]
    fn test_report_includes_all_sections() {
        let report = render_report(&response(serde_json::json!({
            "stockData": [
                {"date": "2024-01-03", "price": 184.25, "open": 184.22, "high": 185.88,
                 "low": 183.43, "volume": 58414500, "returns": -0.75, "ma20": 184.95,
                 "ma50": 184.95, "ma200": 184.95}
            ],
            "analysisText": {
                "summary": "Apple is consolidating.",
                "technicalFactors": ["Price below MA20"],
                "fundamentalFactors": ["P/E of 29"],
                "outlook": "Neutral",
                "timestamp": "2024-01-03T16:00:00"
            },
            "shareId": "6f1c"
        })));

        assert!(report.contains("Apple is consolidating."));
        assert!(report.contains("  - Price below MA20"));
        assert!(report.contains("  - P/E of 29"));
        assert!(report.contains("Neutral"));
        assert!(report.contains("Last close 184.25 on 2024-01-03 (-0.75%)"));
        assert!(report.contains("Share id: 6f1c"));
    }

    #[test]
    fn test_report_skips_empty_sections() {
        let report = render_report(&response(serde_json::json!({
            "stockData": [],
            "analysisText": {"summary": "s", "outlook": "o", "timestamp": "t"}
        })));

        assert!(!report.contains("Technical factors"));
        assert!(!report.contains("Last close"));
        assert!(!report.contains("Share id"));
    }

    #[test]
    fn test_error_rendering_distinguishes_classes() {
        let not_found = render_error(&ApiError::status(404));
        assert!(not_found.starts_with("error [404]"));
        assert!(not_found.contains("no analysis exists"));

        let network = render_error(&ApiError::Network {
            message: "connection refused".to_string(),
        });
        assert!(network.starts_with("error: "));
        assert!(network.contains("could not reach"));
    }
}
