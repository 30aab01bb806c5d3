//! Characteristic points of a polar: max speed (minimum drag), max glide,
//! max lift and the "pre max lift" point the optimizer can still reach.

use serde::{Deserialize, Serialize};

use super::{Polar, PolarResult, PolarRow};

/// Peak height margin used when searching the glide-ratio peak.
pub const MAX_GLIDE_PEAK_MARGIN: f64 = 2.0;
/// Peak height margin used when searching the lift peak.
pub const MAX_LIFT_PEAK_MARGIN: f64 = 0.025;
/// Fraction of the maximum lift that defines the pre-max-lift point.
pub const PRE_MAX_LIFT_FRACTION: f64 = 0.99;

/// Outcome of [`locate_peak`].
///
/// Only `max_index` is consumed by the feature extraction. The borders mark
/// where the series first rises above and then falls back below
/// `max - height_margin`; they are reported for callers that want the width
/// of the peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeakSearch {
    pub max_index: usize,
    pub left_border: usize,
    pub right_border: usize,
}

/// Locates the absolute maximum of `series` and the borders of its peak.
///
/// The running maximum starts at zero, so a series without positive values
/// reports index 0.
#[must_use]
pub fn locate_peak(series: &[f64], height_margin: f64) -> PeakSearch {
    let mut peak_max = 0.0;
    let mut max_index = 0;
    for (idx, &value) in series.iter().enumerate() {
        if value > peak_max {
            peak_max = value;
            max_index = idx;
        }
    }

    let peak_limit = peak_max - height_margin;
    let mut left_border = 0;
    let mut right_border = 0;
    let mut search_left = true;
    let mut search_right = false;

    for (idx, &value) in series.iter().enumerate() {
        if search_left && value >= peak_limit {
            left_border = idx;
            right_border = idx;
            search_left = false;
            search_right = true;
        }
        if search_right && value <= peak_limit {
            right_border = idx;
            search_right = false;
        }
    }

    PeakSearch {
        max_index,
        left_border,
        right_border,
    }
}

/// A feature located on a polar.
///
/// For the pre-max-lift feature `cl` is the requested lift (99 % of max lift),
/// while `alpha`, `cd` and `cl_cd` belong to the first row reaching it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeaturePoint {
    pub index: usize,
    pub alpha: f64,
    pub cl: f64,
    pub cd: f64,
    pub cl_cd: f64,
}

impl FeaturePoint {
    fn from_row(index: usize, row: &PolarRow) -> Self {
        Self {
            index,
            alpha: row.alpha,
            cl: row.cl,
            cd: row.cd,
            cl_cd: row.cl_cd,
        }
    }
}

/// All features of an analyzed polar.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PolarFeatures {
    pub max_speed: FeaturePoint,
    pub max_glide: FeaturePoint,
    pub max_lift: FeaturePoint,
    pub pre_max_lift: FeaturePoint,
}

/// Global minimum of the drag series.
pub fn determine_max_speed(polar: &Polar) -> PolarResult<FeaturePoint> {
    polar.ensure_not_empty()?;
    let rows = polar.rows();

    let mut best = 0;
    for (idx, row) in rows.iter().enumerate() {
        if row.cd < rows[best].cd {
            best = idx;
        }
    }

    let feature = FeaturePoint::from_row(best, &rows[best]);
    log::debug!(
        "max speed, Cd = {:.6} @ Cl = {:.4}",
        feature.cd,
        feature.cl
    );
    Ok(feature)
}

/// Peak of the glide ratio.
pub fn determine_max_glide(polar: &Polar) -> PolarResult<FeaturePoint> {
    polar.ensure_not_empty()?;
    let series: Vec<f64> = polar.glide_ratios().collect();
    let peak = locate_peak(&series, MAX_GLIDE_PEAK_MARGIN);

    let feature = FeaturePoint::from_row(peak.max_index, &polar.rows()[peak.max_index]);
    log::debug!(
        "max glide, Cl/Cd = {:.3} @ Cl = {:.4} (peak between rows {} and {})",
        feature.cl_cd,
        feature.cl,
        peak.left_border,
        peak.right_border
    );
    Ok(feature)
}

/// Peak of the lift series, plus the pre-max-lift point.
pub fn determine_max_lift(polar: &Polar) -> PolarResult<(FeaturePoint, FeaturePoint)> {
    polar.ensure_not_empty()?;
    let series: Vec<f64> = polar.lifts().collect();
    let peak = locate_peak(&series, MAX_LIFT_PEAK_MARGIN);
    let rows = polar.rows();

    let max_lift = FeaturePoint::from_row(peak.max_index, &rows[peak.max_index]);

    let pre_cl = max_lift.cl * PRE_MAX_LIFT_FRACTION;
    let pre_index = polar.find_index_at_or_above(pre_cl);
    let pre_max_lift = FeaturePoint {
        cl: pre_cl,
        ..FeaturePoint::from_row(pre_index, &rows[pre_index])
    };

    log::debug!(
        "max lift, Cl = {:.4} @ alpha = {:.3}, pre max lift alpha = {:.3}",
        max_lift.cl,
        max_lift.alpha,
        pre_max_lift.alpha
    );
    Ok((max_lift, pre_max_lift))
}

/// Runs all feature searches and caches the result on the polar.
pub fn analyze(polar: &mut Polar) -> PolarResult<PolarFeatures> {
    log::debug!("analysing polar {}", polar.name);
    let max_speed = determine_max_speed(polar)?;
    let max_glide = determine_max_glide(polar)?;
    let (max_lift, pre_max_lift) = determine_max_lift(polar)?;

    let features = PolarFeatures {
        max_speed,
        max_glide,
        max_lift,
        pre_max_lift,
    };
    polar.set_features(features);
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polar::fixtures::sample_polar;
    use crate::polar::{PolarError, Regime};

    #[test]
    fn peak_search_reports_max_and_borders() {
        let series = [0.0, 1.0, 4.5, 5.0, 4.5, 2.0, 1.0];
        let peak = locate_peak(&series, 1.0);
        assert_eq!(peak.max_index, 3);
        assert_eq!(peak.left_border, 2);
        assert_eq!(peak.right_border, 5);
    }

    #[test]
    fn peak_search_keeps_first_of_equal_maxima() {
        let peak = locate_peak(&[1.0, 3.0, 3.0, 2.0], 0.5);
        assert_eq!(peak.max_index, 1);
    }

    #[test]
    fn max_speed_is_global_drag_minimum() {
        let polar = sample_polar("root");
        let feature = determine_max_speed(&polar).unwrap();
        assert_eq!(feature.index, 4);
        assert!(polar.drags().all(|cd| cd >= feature.cd));
    }

    #[test]
    fn analyze_finds_all_features() {
        let mut polar = sample_polar("root");
        let features = analyze(&mut polar).unwrap();

        assert_eq!(features.max_glide.index, 9);
        assert!((features.max_glide.cl - 0.9).abs() < 1e-12);
        assert_eq!(features.max_lift.index, 14);
        assert!((features.max_lift.alpha - 12.0).abs() < 1e-12);

        assert_eq!(features.pre_max_lift.index, 13);
        assert!((features.pre_max_lift.cl - 1.27 * 0.99).abs() < 1e-12);
        assert!((features.pre_max_lift.alpha - 11.0).abs() < 1e-12);
        assert!(polar.is_analyzed());
    }

    #[test]
    fn empty_polar_is_rejected() {
        let mut polar = Polar::new("empty", Regime::Type1, 1.0e5);
        assert!(matches!(
            analyze(&mut polar),
            Err(PolarError::EmptyCurve(name)) if name == "empty"
        ));
    }
}
