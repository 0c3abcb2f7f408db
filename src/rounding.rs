use tracing::debug;

use crate::fmt::dollars;
use crate::models::{RoundingFix, Transaction};
use crate::parse::{parse_currency, parse_quantity};
use crate::settings::Settings;

pub struct RoundingReport {
    pub rows: Vec<Transaction>,
    pub fixes: Vec<RoundingFix>,
}

/// Corrects amounts that disagree with quantity x price by a few cents.
#[derive(Debug, Clone, Copy)]
pub struct RoundingReconciler {
    min_diff: f64,
    max_diff: f64,
}

impl Default for RoundingReconciler {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl RoundingReconciler {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            min_diff: settings.min_rounding_diff,
            max_diff: settings.max_rounding_diff,
        }
    }

    /// Recorded amount, expected amount and their distance, when every
    /// numeric field parses. Sales (amount >= 0) expect gross - fees,
    /// purchases expect -(gross + fees).
    pub fn expected_amount(row: &Transaction) -> Option<(f64, f64, f64)> {
        let price = parse_currency(&row.price)?;
        let quantity = parse_quantity(&row.quantity)?;
        let amount = parse_currency(&row.amount)?;
        let fees = if row.fees.trim().is_empty() {
            0.0
        } else {
            parse_currency(&row.fees)?
        };
        let gross = quantity * price;
        let expected = if amount >= 0.0 {
            gross - fees
        } else {
            -(gross + fees)
        };
        Some((amount, expected, (expected - amount).abs()))
    }

    /// Corrected amount text for `row`, or `None` when no fix applies.
    pub fn fix_for(&self, row: &Transaction) -> Option<(String, f64)> {
        if row.price.trim().is_empty() || row.quantity.trim().is_empty() || row.amount.trim().is_empty() {
            return None;
        }
        let Some((recorded, expected, diff)) = Self::expected_amount(row) else {
            debug!("skipping rounding check on unparsable row: {:?}", row.amount);
            return None;
        };
        if !(self.min_diff < diff && diff < self.max_diff) {
            return None;
        }
        let magnitude = dollars(expected.abs());
        let fixed = if recorded < 0.0 { format!("-{magnitude}") } else { magnitude };
        Some((fixed, diff))
    }

    pub fn reconcile(&self, rows: Vec<Transaction>) -> RoundingReport {
        let mut fixes = Vec::new();
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(idx, row)| {
                let Some((new_amount, difference)) = self.fix_for(&row) else {
                    return row;
                };
                let row_num = idx + 2;
                debug!(
                    "row {row_num}: {} amount {} -> {new_amount} (diff: ${difference:.3})",
                    row.symbol, row.amount
                );
                fixes.push(RoundingFix {
                    row: row_num,
                    symbol: row.symbol.clone(),
                    description: row.description.clone(),
                    old_amount: row.amount.clone(),
                    new_amount: new_amount.clone(),
                    difference,
                });
                row.with_amount(new_amount)
            })
            .collect();
        RoundingReport { rows, fixes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(action: &str, price: &str, qty: &str, fees: &str, amount: &str) -> Transaction {
        Transaction {
            date: "01/15/2024".into(),
            action: action.into(),
            symbol: "MSFT".into(),
            description: "MICROSOFT CORP".into(),
            price: price.into(),
            quantity: qty.into(),
            fees: fees.into(),
            amount: amount.into(),
        }
    }

    #[test]
    fn test_fix_dividend_reinvestment_rounding() {
        // 0.571 x 54.34 = 31.02814; recorded 31.04 is 0.01186 off.
        let rows = vec![trade("Reinvest Shares", "$54.34", "0.571", "", "-$31.04")];
        let report = RoundingReconciler::default().reconcile(rows);
        assert_eq!(report.fixes.len(), 1);
        assert_eq!(report.rows[0].amount, "-$31.03");
        let fix = &report.fixes[0];
        assert_eq!(fix.row, 2);
        assert_eq!(fix.old_amount, "-$31.04");
        assert_eq!(fix.new_amount, "-$31.03");
        assert!((fix.difference - 0.01186).abs() < 1e-9);
    }

    #[test]
    fn test_fix_is_idempotent() {
        let rows = vec![trade("Reinvest Shares", "$54.34", "0.571", "", "-$31.04")];
        let reconciler = RoundingReconciler::default();
        let once = reconciler.reconcile(rows);
        let twice = reconciler.reconcile(once.rows.clone());
        assert!(twice.fixes.is_empty());
        assert_eq!(twice.rows, once.rows);
    }

    #[test]
    fn test_no_fix_with_fees() {
        // 160 x 489.55 - 0.66 = 78327.34
        let rows = vec![trade("Sell", "$489.55", "160", "$0.66", "$78327.34")];
        let report = RoundingReconciler::default().reconcile(rows);
        assert!(report.fixes.is_empty());
    }

    #[test]
    fn test_sale_fix_keeps_positive_sign() {
        // 10 x 15.333 - 0 = 153.33; recorded 153.50
        let rows = vec![trade("Sell", "$15.333", "10", "", "$153.50")];
        let report = RoundingReconciler::default().reconcile(rows);
        assert_eq!(report.rows[0].amount, "$153.33");
    }

    #[test]
    fn test_purchase_includes_fees() {
        // -(10 x 150 + 1.00) = -1501.00; recorded -1501.25
        let rows = vec![trade("Buy", "$150.00", "10", "$1.00", "-$1,501.25")];
        let report = RoundingReconciler::default().reconcile(rows);
        assert_eq!(report.rows[0].amount, "-$1501.00");
    }

    #[test]
    fn test_sign_follows_parsed_amount() {
        // `$-31.04` is a purchase even though the text starts with `$`.
        let reconciler = RoundingReconciler::default();
        let fixed = reconciler.fix_for(&trade("Reinvest Shares", "$54.34", "0.571", "", "$-31.04"));
        assert_eq!(fixed.map(|(amt, _)| amt), Some("-$31.03".to_string()));
    }

    #[test]
    fn test_ignores_large_differences() {
        // Bond priced per $100 of face value.
        let rows = vec![trade("Buy", "$9917.27", "40000", "", "-$3987500.00")];
        let report = RoundingReconciler::default().reconcile(rows);
        assert!(report.fixes.is_empty());
        assert_eq!(report.rows[0].amount, "-$3987500.00");
    }

    #[test]
    fn test_boundaries_are_strict() {
        let reconciler = RoundingReconciler::default();
        // diff exactly 1.00
        assert!(reconciler.fix_for(&trade("Sell", "$10.00", "1", "", "$11.00")).is_none());
        // diff 0.005
        assert!(reconciler.fix_for(&trade("Sell", "$10.005", "1", "", "$10.00")).is_none());
        // diff 0.50
        assert!(reconciler.fix_for(&trade("Sell", "$10.50", "1", "", "$10.00")).is_some());
    }

    #[test]
    fn test_skips_missing_or_unparsable_fields() {
        let reconciler = RoundingReconciler::default();
        let rows = vec![
            trade("Buy", "", "10", "", "-$100.50"),
            trade("Buy", "$10.00", "", "", "-$100.50"),
            trade("Buy", "$10.00", "10", "", ""),
            trade("Buy", "$10.00", "ten", "", "-$100.50"),
            trade("Buy", "$10.00", "10", "n/a", "-$100.50"),
        ];
        let report = reconciler.reconcile(rows.clone());
        assert!(report.fixes.is_empty());
        assert_eq!(report.rows, rows);
    }

    #[test]
    fn test_custom_bounds() {
        let settings = Settings {
            max_rounding_diff: 5.0,
            ..Settings::default()
        };
        let reconciler = RoundingReconciler::from_settings(&settings);
        let fixed = reconciler.fix_for(&trade("Sell", "$10.00", "1", "", "$12.00"));
        assert_eq!(fixed.map(|(amt, _)| amt), Some("$10.00".to_string()));
    }
}
