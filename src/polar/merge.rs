//! Joining a Type 1 and a Type 2 polar into one polar.

use super::Polar;

/// Splices two polars at `switch_cl`.
///
/// Rows of `leading` with `cl <= switch_cl` come first, followed by the rows of
/// `receiving` with `cl > switch_cl`. The result carries the metadata of
/// `receiving` together with the supplied switch value and `max_re`. Nothing is
/// interpolated at the join, so the two halves may disagree at the switch row.
///
/// The merged polar has no cached features; run [`super::analyze`] on it.
#[must_use]
pub fn merge_polars(leading: &Polar, receiving: &Polar, switch_cl: f64, max_re: f64) -> Polar {
    log::debug!("merging polars at Cl = {switch_cl}");

    let mut merged = Polar::new(receiving.name.clone(), receiving.regime, receiving.re);
    merged.airfoil_name = receiving.airfoil_name.clone();
    merged.ncrit = receiving.ncrit;
    merged.switch_cl = switch_cl;
    merged.max_re = max_re;

    for row in leading.rows().iter().filter(|row| row.cl <= switch_cl) {
        merged.push_row(*row);
        merged.switch_index = merged.len() - 1;
    }

    for row in receiving.rows().iter().filter(|row| row.cl > switch_cl) {
        merged.push_row(*row);
    }

    log::debug!(
        "merged polar has {} rows, switching at row {}",
        merged.len(),
        merged.switch_index
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polar::fixtures::{sample_polar, sample_polar_scaled};
    use crate::polar::{PolarRow, Regime};

    #[test]
    fn merged_length_counts_both_sides() {
        let t1 = sample_polar_scaled("t1", 0.9);
        let mut t2 = sample_polar("t2");
        t2.airfoil_name = "rg15".to_owned();
        let switch_cl = 0.35;

        let merged = merge_polars(&t1, &t2, switch_cl, 450_000.0);

        let expected = t1.lifts().filter(|cl| *cl <= switch_cl).count()
            + t2.lifts().filter(|cl| *cl > switch_cl).count();
        assert_eq!(merged.len(), expected);
        assert_eq!(merged.switch_index, 3);
        assert_eq!(merged.airfoil_name, "rg15");
        assert_eq!(merged.regime, Regime::Type2);
        assert!((merged.max_re - 450_000.0).abs() < f64::EPSILON);
        assert!(!merged.is_analyzed());

        let lifts: Vec<f64> = merged.lifts().collect();
        let join = merged.switch_index;
        assert!(lifts[join] <= lifts[join + 1]);
    }

    #[test]
    fn rows_come_from_the_right_source() {
        let t1 = sample_polar_scaled("t1", 0.5);
        let t2 = sample_polar("t2");
        let merged = merge_polars(&t1, &t2, 0.35, 450_000.0);

        assert_eq!(merged.rows()[0], t1.rows()[0]);
        assert_eq!(merged.rows()[4], t2.rows()[4]);
    }

    #[test]
    fn missing_leading_rows_keep_switch_index_at_zero() {
        let mut leading = Polar::new("t1", Regime::Type1, 4.0e5);
        leading.push_row(PolarRow::new(5.0, 0.8, 0.01));
        let receiving = sample_polar("t2");

        let merged = merge_polars(&leading, &receiving, 0.1, 4.0e5);
        assert_eq!(merged.switch_index, 0);
        assert_eq!(merged.len(), receiving.len() - 2);
    }
}
