use std::fmt;

use clickhouse::Row;
use serde::Deserialize;

pub const EVENTS_BY_TYPE_QUERY: &str = "
    SELECT
        eventType,
        count() AS count
    FROM analytics_events
    GROUP BY eventType
    ORDER BY count DESC
";

pub const BID_PERFORMANCE_QUERY: &str = "
    SELECT
        bidderCode,
        adUnitCode,
        round(avg(cpm), 2) AS avg_cpm,
        count() AS bid_count
    FROM bid_responses_mv
    WHERE serverTimestamp > now() - INTERVAL 1 HOUR
    GROUP BY bidderCode, adUnitCode
    ORDER BY avg_cpm DESC
    LIMIT 10
";

pub const WIN_RATE_QUERY: &str = "
    SELECT
        b.bidderCode AS bidderCode,
        countIf(w.bidderCode != '') AS wins,
        count() AS bids,
        round(countIf(w.bidderCode != '') * 100.0 / count(), 2) AS win_rate
    FROM bid_responses_mv b
    LEFT JOIN bid_wins_mv w ON
        b.bidderCode = w.bidderCode AND
        b.adUnitCode = w.adUnitCode AND
        abs(dateDiff('second', b.serverTimestamp, w.serverTimestamp)) < 5
    GROUP BY b.bidderCode
    HAVING bids > 0
    ORDER BY win_rate DESC
";

#[derive(Debug, Clone, PartialEq, Row, Deserialize)]
pub struct EventTypeCount {
    #[serde(rename = "eventType")]
    pub event_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Row, Deserialize)]
pub struct BidPerformance {
    #[serde(rename = "bidderCode")]
    pub bidder_code: String,
    #[serde(rename = "adUnitCode")]
    pub ad_unit_code: String,
    pub avg_cpm: f64,
    pub bid_count: u64,
}

#[derive(Debug, Clone, PartialEq, Row, Deserialize)]
pub struct WinRate {
    #[serde(rename = "bidderCode")]
    pub bidder_code: String,
    pub wins: u64,
    pub bids: u64,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsReport {
    pub events_by_type: Vec<EventTypeCount>,
    pub bid_performance: Vec<BidPerformance>,
    pub win_rates: Vec<WinRate>,
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Analytics Statistics ===")?;

        writeln!(f, "\nEvents by Type:")?;
        for row in &self.events_by_type {
            writeln!(f, "  {}: {}", row.event_type, row.count)?;
        }

        if !self.bid_performance.is_empty() {
            writeln!(f, "\nRecent Bid Performance (Last Hour):")?;
            writeln!(
                f,
                "  {:<15} {:<40} {:<10} {:<10}",
                "Bidder", "Ad Unit", "Avg CPM", "Count"
            )?;
            writeln!(f, "  {}", "-".repeat(75))?;
            for row in &self.bid_performance {
                writeln!(
                    f,
                    "  {:<15} {:<40} ${:<9} {:<10}",
                    row.bidder_code, row.ad_unit_code, row.avg_cpm, row.bid_count
                )?;
            }
        }

        if !self.win_rates.is_empty() {
            writeln!(f, "\nWin Rate by Bidder:")?;
            writeln!(
                f,
                "  {:<15} {:<10} {:<10} {:<10}",
                "Bidder", "Wins", "Bids", "Win Rate %"
            )?;
            writeln!(f, "  {}", "-".repeat(45))?;
            for row in &self.win_rates {
                writeln!(
                    f,
                    "  {:<15} {:<10} {:<10} {:<10}",
                    row.bidder_code, row.wins, row.bids, row.win_rate
                )?;
            }
        }

        Ok(())
    }
}
