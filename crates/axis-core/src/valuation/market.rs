//! EMV computation from selected comparables.

use serde::{Deserialize, Serialize};

use crate::comps::CompSelection;

/// Number of comps required before outlier trimming is applied.
const TRIM_THRESHOLD: usize = 5;

/// Share of the sorted prices dropped from each tail, in percent.
const TRIM_TAIL_PERCENT: usize = 10;

/// Market analysis for one subject asset.
///
/// `comps_used` counts the comps the selector produced; the outlier trim
/// shapes only the median input, and the untrimmed ids and prices are
/// preserved for the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalysis {
    /// Estimated market value: median of accepted comp prices, `0.0` when
    /// there are no comps. Unrounded; rounding is display-only.
    pub emv: f64,

    /// `(emv - asking_price) / emv × 100`; `0.0` when `emv` is zero.
    /// Positive means below market.
    pub bmv_percent: f64,

    /// Number of comps selected for this valuation.
    pub comps_used: u32,

    /// Transaction ids of the selected comps.
    pub comp_ids: Vec<String>,

    /// Raw prices of the selected comps, in selection order.
    pub comp_prices: Vec<i64>,

    /// Radius of the fallback level that produced the comps, in miles.
    pub comp_radius_miles: f64,

    /// Date window of the fallback level, in months.
    pub comp_date_range_months: u32,

    /// Fallback level used, 1..=6.
    pub fallback_level: u8,
}

/// Computes the market analysis for a selection of comps.
///
/// - zero comps: `emv = 0`, `bmv_percent = 0`
/// - five or more comps: the bottom and top decile of the sorted prices
///   (at least one sale from each tail) are excluded, then the median of
///   the rest is taken
/// - one to four comps: plain median, no trimming
#[must_use]
pub fn analyse(selection: &CompSelection, asking_price: i64) -> MarketAnalysis {
    let prices: Vec<i64> = selection.comps.iter().map(|c| c.price).collect();
    let emv = estimated_market_value(&prices);
    let bmv_percent = below_market_percent(emv, asking_price);

    MarketAnalysis {
        emv,
        bmv_percent,
        comps_used: u32::try_from(selection.comps.len()).unwrap_or(u32::MAX),
        comp_ids: selection
            .comps
            .iter()
            .map(|c| c.transaction_id.clone())
            .collect(),
        comp_prices: prices,
        comp_radius_miles: selection.radius_miles,
        comp_date_range_months: selection.window_months,
        fallback_level: selection.fallback_level,
    }
}

/// Median of accepted prices after outlier trimming. `0.0` for no prices.
fn estimated_market_value(prices: &[i64]) -> f64 {
    if prices.is_empty() {
        return 0.0;
    }
    let mut sorted = prices.to_vec();
    sorted.sort_unstable();

    let accepted: &[i64] = if sorted.len() >= TRIM_THRESHOLD {
        let cutoff = tail_cutoff(sorted.len());
        &sorted[cutoff..sorted.len() - cutoff]
    } else {
        &sorted
    };

    median(accepted)
}

/// Number of sales dropped from each tail: `floor(n × 10 / 100)`, never
/// less than one once trimming applies at all. At n = 5..=9 each tail
/// loses exactly one sale, at n = 12 one, at n = 22 two.
fn tail_cutoff(n: usize) -> usize {
    (n * TRIM_TAIL_PERCENT / 100).max(1)
}

/// `(emv − asking) / emv × 100`; zero when there is no EMV.
fn below_market_percent(emv: f64, asking_price: i64) -> f64 {
    if emv <= 0.0 {
        return 0.0;
    }
    (emv - to_f64(asking_price)) / emv * 100.0
}

/// Median; the mean of the two middle values for even-length input.
fn median(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        to_f64(values[mid])
    } else {
        (to_f64(values[mid - 1]) + to_f64(values[mid])) / 2.0
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_f64(value: i64) -> f64 {
    value as f64
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::comps::{CompSelection, ComparableSale};
    use crate::schema::{PropertyType, Tenure};

    fn selection_of(prices: &[i64]) -> CompSelection {
        let comps = prices
            .iter()
            .enumerate()
            .map(|(i, price)| ComparableSale {
                transaction_id: format!("t{i}"),
                postcode: "N8 7EX".to_string(),
                latitude: 51.583,
                longitude: -0.121,
                price: *price,
                sale_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                property_type: PropertyType::Terraced,
                tenure: Tenure::Freehold,
                new_build: false,
            })
            .collect();
        CompSelection {
            comps,
            radius_miles: 0.5,
            window_months: 12,
            fallback_level: 1,
        }
    }

    #[test]
    fn zero_comps_yield_zero_emv_and_zero_bmv() {
        let analysis = analyse(&CompSelection::empty(), 220_000);
        assert_eq!(analysis.emv, 0.0);
        assert_eq!(analysis.bmv_percent, 0.0);
        assert_eq!(analysis.comps_used, 0);
        assert_eq!(analysis.fallback_level, 6);
    }

    #[test]
    fn small_sets_use_plain_median() {
        // Even-length: mean of the two middle values.
        let analysis = analyse(&selection_of(&[400_000, 420_000, 440_000, 480_000]), 430_000);
        assert_eq!(analysis.emv, 430_000.0);
        assert_eq!(analysis.comps_used, 4);

        // Odd-length: middle value.
        let analysis = analyse(&selection_of(&[400_000, 440_000, 480_000]), 430_000);
        assert_eq!(analysis.emv, 440_000.0);
    }

    #[test]
    fn six_comps_drop_single_tail_each_side() {
        // The strong-deal scenario: trim 305k and 420k, median of the
        // remaining four is (360k + 365k) / 2.
        let analysis = analyse(
            &selection_of(&[305_000, 340_000, 360_000, 365_000, 380_000, 420_000]),
            300_000,
        );
        assert_eq!(analysis.emv, 362_500.0);
        assert!((analysis.bmv_percent - 17.241_379).abs() < 1e-3);
        // comps_used counts the selection, not the trimmed median input.
        assert_eq!(analysis.comps_used, 6);
        assert_eq!(analysis.comp_prices.len(), 6);
    }

    #[test]
    fn five_comps_drop_lowest_and_highest() {
        let analysis = analyse(
            &selection_of(&[100_000, 300_000, 310_000, 320_000, 900_000]),
            280_000,
        );
        // Median of [300k, 310k, 320k].
        assert_eq!(analysis.emv, 310_000.0);
    }

    #[test]
    fn uniform_prices_keep_their_median_through_trimming() {
        let analysis = analyse(
            &selection_of(&[250_000, 250_000, 250_000, 250_000, 250_000, 250_000]),
            200_000,
        );
        assert_eq!(analysis.emv, 250_000.0);
        assert!((analysis.bmv_percent - 20.0).abs() < 1e-9);
    }

    #[test]
    fn twelve_comps_drop_exactly_one_from_each_tail() {
        // floor(12 / 10) = 1, so ten of twelve sales feed the median.
        let analysis = analyse(
            &selection_of(&[
                100_000, 200_000, 210_000, 220_000, 230_000, 240_000, 250_000, 260_000, 270_000,
                280_000, 290_000, 900_000,
            ]),
            220_000,
        );
        // Median of [200k..=290k] is (240k + 250k) / 2.
        assert_eq!(analysis.emv, 245_000.0);
        assert_eq!(analysis.comps_used, 12);
        assert_eq!(analysis.comp_prices.len(), 12);
    }

    #[test]
    fn twenty_two_comps_drop_two_from_each_tail() {
        // floor(22 / 10) = 2 from each tail, eighteen remain.
        let mut prices = vec![50_000, 60_000];
        prices.extend((0..18).map(|i| 200_000 + i * 10_000));
        prices.extend([800_000, 900_000]);
        let analysis = analyse(&selection_of(&prices), 250_000);
        // Median of [200k..=370k] is (280k + 290k) / 2.
        assert_eq!(analysis.emv, 285_000.0);
        assert_eq!(analysis.comps_used, 22);
    }

    #[test]
    fn overpriced_asset_has_negative_bmv() {
        let analysis = analyse(
            &selection_of(&[430_000, 440_000, 440_000, 450_000]),
            500_000,
        );
        assert_eq!(analysis.emv, 440_000.0);
        assert!((analysis.bmv_percent - (-13.636_363)).abs() < 1e-3);
    }

    #[test]
    fn emv_is_unrounded() {
        let analysis = analyse(&selection_of(&[300_001, 300_002]), 250_000);
        assert_eq!(analysis.emv, 300_001.5);
    }
}
