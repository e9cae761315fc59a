use chrono::NaiveDate;

use crate::date_util::ideal_target_spend_to_date;
use crate::metrics::types::{BurnMetrics, Health, Variance};

/// Upper edge of the healthy band. Burn above this is OVER.
pub const OVER_THRESHOLD: f64 = 1.10;
/// Lower edge of the healthy band. Burn below this is UNDER.
pub const UNDER_THRESHOLD: f64 = 0.90;

/// Fraction of the retainer consumed. Zero retainer means no burn.
pub fn burn_pct(spend_cents: i64, retainer_cents: i64) -> f64 {
    if retainer_cents == 0 {
        return 0.0;
    }
    spend_cents as f64 / retainer_cents as f64
}

pub fn variance(spend_cents: i64, target_cents: i64) -> Variance {
    let variance_pct = if target_cents > 0 {
        spend_cents as f64 / target_cents as f64 - 1.0
    } else {
        0.0
    };
    Variance {
        variance_cents: spend_cents - target_cents,
        variance_pct,
    }
}

pub fn health(burn_pct_mtd: f64) -> Health {
    if burn_pct_mtd > OVER_THRESHOLD {
        Health::Over
    } else if burn_pct_mtd < UNDER_THRESHOLD {
        Health::Under
    } else {
        Health::OnTrack
    }
}

/// Full burn bundle for one client as of `as_of`.
pub fn calculate_client_metrics(
    spend_cents: i64,
    retainer_cents: i64,
    as_of: NaiveDate,
) -> BurnMetrics {
    let burn_pct_mtd = burn_pct(spend_cents, retainer_cents);
    let ideal = ideal_target_spend_to_date(retainer_cents, as_of);
    let Variance {
        variance_cents,
        variance_pct,
    } = variance(spend_cents, ideal);

    BurnMetrics {
        burn_pct_mtd,
        ideal_target_spend_to_date_cents: ideal,
        variance_cents,
        variance_pct,
        health: health(burn_pct_mtd),
    }
}
