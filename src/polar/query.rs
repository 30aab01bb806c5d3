//! Lookups on a polar: interpolated drag and glide ratio over lift, lift over
//! alpha and index searches.

use super::{Polar, PolarError, PolarResult};

impl Polar {
    /// Drag at `cl`, linearly interpolated on the rising part of the polar.
    ///
    /// Requires an analyzed polar. Outside the covered lift range the value
    /// of the nearest end is returned.
    pub fn find_drag(&self, cl: f64) -> PolarResult<f64> {
        let (lifts, drags) = self.rising_branch(|row| row.cd)?;
        Ok(interpolate(cl, &lifts, &drags))
    }

    /// Glide ratio at `cl`, interpolated like [`Polar::find_drag`].
    pub fn find_glide_ratio(&self, cl: f64) -> PolarResult<f64> {
        let (lifts, ratios) = self.rising_branch(|row| row.cl_cd)?;
        Ok(interpolate(cl, &lifts, &ratios))
    }

    /// Lift of the first row whose alpha is at least `alpha`.
    ///
    /// No interpolation takes place. `None` means the polar ends before the
    /// requested angle.
    #[must_use]
    pub fn find_lift(&self, alpha: f64) -> Option<f64> {
        self.rows()
            .iter()
            .find(|row| row.alpha >= alpha)
            .map(|row| row.cl)
    }

    /// Like [`Polar::find_lift`], turning a miss into [`PolarError::LiftNotFound`].
    pub fn require_lift(&self, alpha: f64) -> PolarResult<f64> {
        self.find_lift(alpha).ok_or_else(|| PolarError::LiftNotFound {
            polar: self.name.clone(),
            alpha,
        })
    }

    /// Index of the first row whose lift is at least `cl`.
    ///
    /// Falls back to 0 when no row reaches `cl`.
    #[must_use]
    pub fn find_index_at_or_above(&self, cl: f64) -> usize {
        self.rows()
            .iter()
            .position(|row| row.cl >= cl)
            .unwrap_or(0)
    }

    /// Lift/value pairs up to and including the max-lift row. The last pair is
    /// repeated so the upper end of the interpolation stays flat.
    fn rising_branch(
        &self,
        value: impl Fn(&super::PolarRow) -> f64,
    ) -> PolarResult<(Vec<f64>, Vec<f64>)> {
        let max_lift_index = self.features()?.max_lift.index;
        let rows = &self.rows()[..=max_lift_index];

        let mut lifts: Vec<f64> = rows.iter().map(|row| row.cl).collect();
        let mut values: Vec<f64> = rows.iter().map(value).collect();
        if let (Some(&cl), Some(&last)) = (lifts.last(), values.last()) {
            lifts.push(cl);
            values.push(last);
        }
        Ok((lifts, values))
    }
}

/// Piecewise linear interpolation of `x` over increasing `xs`, clamped to the
/// first and last value outside the range.
#[must_use]
pub fn interpolate(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let (Some(&first_x), Some(&last_x)) = (xs.first(), xs.last()) else {
        return f64::NAN;
    };
    if x.is_nan() {
        return f64::NAN;
    }
    if x <= first_x {
        return ys[0];
    }
    if x >= last_x {
        return ys[ys.len() - 1];
    }

    let upper = xs.partition_point(|&v| v <= x);
    let lower = upper - 1;
    let dx = xs[upper] - xs[lower];
    if dx == 0.0 {
        return ys[lower];
    }
    let t = (x - xs[lower]) / dx;
    ys[lower] + t * (ys[upper] - ys[lower])
}
