//! Unit and currency conversions.
//!
//! The host platform submits weights in ounces and monetary amounts in the
//! tenant's operating currency; Canada Post wants kilograms and CAD.

/// Fixed host-platform ratio between ounces and kilograms.
pub const OUNCES_PER_KILOGRAM: f64 = 35.273_961_95;

/// Converts ounces to kilograms, rounded to two decimals as the carrier
/// expects.
pub fn ounces_to_kilograms(ounces: f64) -> f64 {
    round2(ounces / OUNCES_PER_KILOGRAM)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Total due from a price quote, in CAD cents.
pub fn cad_cents_from_amount(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Converts an amount in tenant-currency cents to CAD cents using the
/// tenant's `rate_to_cad` multiplier.
pub fn currency_cents_to_cad_cents(amount_cents: i64, rate_to_cad: f64) -> i64 {
    let rate = if rate_to_cad > 0.0 { rate_to_cad } else { 1.0 };
    (amount_cents as f64 * rate).round() as i64
}

/// Converts CAD cents back into tenant-currency cents for display,
/// rounding to the nearest cent.
pub fn cad_cents_to_display_cents(price_cents: i64, rate_to_cad: f64) -> i64 {
    let rate = if rate_to_cad > 0.0 { rate_to_cad } else { 1.0 };
    (price_cents as f64 / rate).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_kilogram_of_ounces_rounds_to_one() {
        assert_eq!(ounces_to_kilograms(OUNCES_PER_KILOGRAM), 1.00);
    }

    #[test]
    fn ounces_round_to_two_decimals() {
        assert_eq!(ounces_to_kilograms(17.64), 0.50);
        assert_eq!(ounces_to_kilograms(1.0), 0.03);
    }

    #[test]
    fn due_amount_becomes_cad_cents() {
        assert_eq!(cad_cents_from_amount(14.30), 1430);
        assert_eq!(cad_cents_from_amount(25.00), 2500);
    }

    #[test]
    fn display_conversion_rounds_to_nearest_cent() {
        assert_eq!(cad_cents_to_display_cents(2500, 1.35), 1852);
        assert_eq!(cad_cents_to_display_cents(1430, 1.0), 1430);
    }

    #[test]
    fn tenant_cents_convert_to_cad_cents() {
        assert_eq!(currency_cents_to_cad_cents(1000, 1.35), 1350);
        // A non-positive rate is treated as identity rather than zeroing
        // the amount.
        assert_eq!(currency_cents_to_cad_cents(1000, 0.0), 1000);
    }
}
