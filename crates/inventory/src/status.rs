//! Display status of a stock item.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use clinic_core::ValueObject;

/// Items expiring within this many days report [`StockStatus::ExpiringSoon`].
pub const EXPIRING_SOON_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
    Expired,
    ExpiringSoon,
}

impl ValueObject for StockStatus {}

impl StockStatus {
    pub fn display_name(self) -> &'static str {
        match self {
            StockStatus::InStock => "In Stock",
            StockStatus::LowStock => "Low Stock",
            StockStatus::OutOfStock => "Out of Stock",
            StockStatus::Expired => "Expired",
            StockStatus::ExpiringSoon => "Expiring Soon",
        }
    }
}

impl core::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Derive the one status an item reports.
///
/// Priority: OutOfStock > Expired > ExpiringSoon > LowStock > InStock.
pub fn derive_status(
    quantity: i64,
    threshold: i64,
    expiry: Option<NaiveDate>,
    today: NaiveDate,
) -> StockStatus {
    derive_status_within(quantity, threshold, expiry, today, EXPIRING_SOON_DAYS)
}

/// [`derive_status`] with a configurable expiring-soon window.
pub fn derive_status_within(
    quantity: i64,
    threshold: i64,
    expiry: Option<NaiveDate>,
    today: NaiveDate,
    window_days: i64,
) -> StockStatus {
    if quantity <= 0 {
        return StockStatus::OutOfStock;
    }
    if let Some(expiry) = expiry {
        if expiry < today {
            return StockStatus::Expired;
        }
        if expiry < today + Duration::days(window_days) {
            return StockStatus::ExpiringSoon;
        }
    }
    if quantity <= threshold {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn days(n: i64) -> NaiveDate {
        today() + Duration::days(n)
    }

    #[test]
    fn out_of_stock_wins_over_expired() {
        assert_eq!(derive_status(0, 5, Some(days(-1)), today()), StockStatus::OutOfStock);
        assert_eq!(derive_status(-2, 5, None, today()), StockStatus::OutOfStock);
    }

    #[test]
    fn expired_wins_over_low_stock() {
        assert_eq!(derive_status(1, 5, Some(days(-1)), today()), StockStatus::Expired);
    }

    #[test]
    fn expiring_soon_window_is_half_open() {
        assert_eq!(derive_status(20, 5, Some(today()), today()), StockStatus::ExpiringSoon);
        assert_eq!(derive_status(20, 5, Some(days(10)), today()), StockStatus::ExpiringSoon);
        assert_eq!(derive_status(20, 5, Some(days(29)), today()), StockStatus::ExpiringSoon);
        assert_eq!(derive_status(20, 5, Some(days(30)), today()), StockStatus::InStock);
    }

    #[test]
    fn expiring_soon_wins_over_low_stock() {
        assert_eq!(derive_status(2, 5, Some(days(3)), today()), StockStatus::ExpiringSoon);
    }

    #[test]
    fn threshold_is_inclusive() {
        assert_eq!(derive_status(5, 5, None, today()), StockStatus::LowStock);
        assert_eq!(derive_status(3, 5, None, today()), StockStatus::LowStock);
        assert_eq!(derive_status(6, 5, None, today()), StockStatus::InStock);
    }

    #[test]
    fn custom_window() {
        assert_eq!(
            derive_status_within(20, 5, Some(days(10)), today(), 7),
            StockStatus::InStock
        );
    }
}
