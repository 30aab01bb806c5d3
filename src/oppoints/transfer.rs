//! Transferring the operating points of the root airfoil to a strak airfoil.
//!
//! The strak airfoil runs at a lower Reynolds number and cannot reach the root
//! polar everywhere. Its targets are therefore a mix of the root polar and the
//! polar of the not yet optimized strak airfoil, controlled by the gains in
//! [`GainParameters`].

use crate::config::GainParameters;
use crate::polar::Polar;

use super::{OpMode, OpPointResult, OperatingPointSet, names};

/// Points whose drag targets scale with the max-glide ratio.
pub const GLIDE_POINTS: [&str; 7] = [
    names::PRE_GLIDE,
    names::HELPER_PRE_GLIDE,
    names::MAX_GLIDE,
    names::HELPER_KEEP_GLIDE,
    names::KEEP_GLIDE,
    names::HELPER_PRE_MAX_LIFT,
    names::PRE_MAX_LIFT,
];

/// Points whose drag targets blend between root and strak polar.
pub const SPEED_POINTS: [&str; 3] = [names::KEEP_SPEED, names::MAX_SPEED, names::PRE_SPEED];

fn blend(gain: f64, root: f64, strak: f64) -> f64 {
    gain * root + (1.0 - gain) * strak
}

/// Root and strak polar a set is transferred between.
#[derive(Debug, Clone, Copy)]
pub struct ShapeTransfer<'a> {
    root: &'a Polar,
    strak: &'a Polar,
    is_root: bool,
    gains: &'a GainParameters,
}

impl<'a> ShapeTransfer<'a> {
    /// `is_root` marks the strak polar as the root polar itself; the transfer
    /// is then a no-op.
    #[must_use]
    pub fn new(root: &'a Polar, strak: &'a Polar, is_root: bool, gains: &'a GainParameters) -> Self {
        Self {
            root,
            strak,
            is_root,
            gains,
        }
    }

    /// Runs the lift, glide and speed transfer in that order.
    pub fn apply(&self, set: &mut OperatingPointSet) -> OpPointResult<()> {
        if self.is_root {
            log::debug!("polar {} is the root polar, keeping op points", self.strak.name);
            return Ok(());
        }
        self.transfer_max_lift(set)?;
        self.transfer_max_glide(set)?;
        self.transfer_max_speed(set)
    }

    /// Blends the max-lift anchors between root and strak polar.
    ///
    /// `preClmax` is only handled as a `spec-al` point; a `spec-cl` pre-max-lift
    /// point keeps its values.
    pub fn transfer_max_lift(&self, set: &mut OperatingPointSet) -> OpPointResult<()> {
        if self.is_root {
            return Ok(());
        }
        let root = self.root.features()?;
        let strak = self.strak.features()?;
        let gain = self.gains.max_lift_gain;

        match set.mode(names::PRE_MAX_LIFT) {
            Some(OpMode::SpecAlpha) => {
                let alpha = blend(gain, root.pre_max_lift.alpha, strak.pre_max_lift.alpha);
                match self.root.find_lift(alpha) {
                    Some(cl) => {
                        set.set_point_value(names::PRE_MAX_LIFT, alpha);
                        set.set_target_value(names::PRE_MAX_LIFT, cl);
                    }
                    None => log::info!("op point {} was skipped", names::PRE_MAX_LIFT),
                }
            }
            Some(OpMode::SpecCl) => {
                log::debug!("op point {} is spec-cl, lift transfer skipped", names::PRE_MAX_LIFT);
            }
            None => log::info!("op point {} was skipped", names::PRE_MAX_LIFT),
        }

        let cl = blend(gain, root.max_lift.cl, strak.max_lift.cl);
        match set.mode(names::MAX_LIFT) {
            Some(OpMode::SpecAlpha) => {
                let alpha = blend(gain, root.max_lift.alpha, strak.max_lift.alpha);
                set.set_point_value(names::MAX_LIFT, alpha);
                set.set_target_value(names::MAX_LIFT, cl);
            }
            Some(OpMode::SpecCl) => {
                let cd = self.root.find_drag(cl)?;
                set.set_point_value(names::MAX_LIFT, cl);
                set.set_target_value(names::MAX_LIFT, cd);
            }
            None => log::info!("op point {} was skipped", names::MAX_LIFT),
        }
        Ok(())
    }

    /// Scales the drag targets around max glide by the ratio of the max-glide
    /// values of both polars, including the projected glide loss.
    pub fn transfer_max_glide(&self, set: &mut OperatingPointSet) -> OpPointResult<()> {
        if self.is_root {
            return Ok(());
        }
        let root_glide = self.root.features()?.max_glide.cl_cd;
        let strak_glide = self.strak.features()?.max_glide.cl_cd;
        let factor = root_glide / (strak_glide * (1.0 - self.gains.max_glide_loss));
        log::debug!("scaling glide targets by {factor:.5}");

        set.scale_targets(factor, &GLIDE_POINTS);
        Ok(())
    }

    /// Blends the drag targets of the speed points between root and strak polar.
    pub fn transfer_max_speed(&self, set: &mut OperatingPointSet) -> OpPointResult<()> {
        if self.is_root {
            return Ok(());
        }
        for name in SPEED_POINTS {
            let Some(cl) = set.value(name) else {
                log::info!("op point {name} was skipped");
                continue;
            };
            let cd_root = self.root.find_drag(cl)?;
            let cd_strak = self.strak.find_drag(cl)?;
            set.set_target_value(name, blend(self.gains.max_speed_gain, cd_root, cd_strak));
        }
        Ok(())
    }
}

/// Adapts `set`, built against `root`, to the strak polar `strak` while keeping
/// the shape of the root polar.
pub fn transfer_keep_shape(
    set: &mut OperatingPointSet,
    root: &Polar,
    strak: &Polar,
    is_root: bool,
    gains: &GainParameters,
) -> OpPointResult<()> {
    ShapeTransfer::new(root, strak, is_root, gains).apply(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oppoints::{
        AnchorTargets, OperatingPoint, OptimizationGoal, adapt_all_to_curve, distribute_intermediate,
        generate_evenly_spaced, place_anchors,
    };
    use crate::polar::fixtures::{model_drag, sample_polar, sample_polar_scaled};
    use crate::polar::{PolarRow, Regime, analyze};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!((actual - expected).abs() < tol, "expected {expected}, got {actual}");
    }

    fn polars() -> (Polar, Polar) {
        let mut root = sample_polar("root");
        analyze(&mut root).unwrap();

        // strak airfoil: more drag and an earlier stall
        let mut rows = sample_polar_scaled("strak", 1.2).rows().to_vec();
        rows[13] = PolarRow::new(11.0, 1.24, model_drag(1.24) * 1.2);
        rows[14] = PolarRow::new(12.0, 1.23, model_drag(1.23) * 1.2);
        let mut strak = Polar::from_rows("strak", Regime::Type2, 100_000.0, rows);
        analyze(&mut strak).unwrap();
        (root, strak)
    }

    fn root_set(root: &Polar) -> OperatingPointSet {
        let features = *root.features().unwrap();
        let mut set = OperatingPointSet::new();
        generate_evenly_spaced(&mut set, 16, -0.1, features.max_lift.cl, features.max_lift.alpha).unwrap();
        place_anchors(&mut set, &AnchorTargets::from_features(&features)).unwrap();
        distribute_intermediate(&mut set).unwrap();
        adapt_all_to_curve(&mut set, root).unwrap();
        set
    }

    #[test]
    fn root_polar_keeps_the_set() {
        let (root, _) = polars();
        let gains = GainParameters::default();
        let mut set = root_set(&root);
        let before = set.clone();

        ShapeTransfer::new(&root, &root, true, &gains).apply(&mut set).unwrap();
        assert_eq!(set, before);
    }

    #[test]
    fn glide_targets_scale_with_glide_ratio() {
        let (root, strak) = polars();
        let gains = GainParameters::default();
        let mut set = root_set(&root);
        let before = set.target(names::MAX_GLIDE).unwrap();

        ShapeTransfer::new(&root, &strak, false, &gains)
            .transfer_max_glide(&mut set)
            .unwrap();

        let factor = root.features().unwrap().max_glide.cl_cd
            / (strak.features().unwrap().max_glide.cl_cd * (1.0 - gains.max_glide_loss));
        assert_close(set.target(names::MAX_GLIDE).unwrap(), before * factor, 1e-6);
        assert!(factor > 1.0);
    }

    #[test]
    fn speed_targets_blend_both_polars() {
        let (root, strak) = polars();
        let gains = GainParameters::default();
        let mut set = root_set(&root);

        ShapeTransfer::new(&root, &strak, false, &gains)
            .transfer_max_speed(&mut set)
            .unwrap();

        let cl = set.value(names::MAX_SPEED).unwrap();
        let expected = gains.max_speed_gain * root.find_drag(cl).unwrap()
            + (1.0 - gains.max_speed_gain) * strak.find_drag(cl).unwrap();
        assert_close(set.target(names::MAX_SPEED).unwrap(), expected, 1e-6);
    }

    #[test]
    fn max_lift_anchor_blends_angle_and_lift() {
        let (root, strak) = polars();
        let gains = GainParameters::default();
        let mut set = root_set(&root);

        ShapeTransfer::new(&root, &strak, false, &gains)
            .transfer_max_lift(&mut set)
            .unwrap();

        let root_features = root.features().unwrap();
        let strak_features = strak.features().unwrap();
        let gain = gains.max_lift_gain;
        assert_close(
            set.value(names::MAX_LIFT).unwrap(),
            gain * root_features.max_lift.alpha + (1.0 - gain) * strak_features.max_lift.alpha,
            1e-4,
        );
        assert_close(
            set.target(names::MAX_LIFT).unwrap(),
            gain * root_features.max_lift.cl + (1.0 - gain) * strak_features.max_lift.cl,
            1e-4,
        );
    }

    #[test]
    fn spec_cl_pre_max_lift_is_left_alone() {
        let (root, strak) = polars();
        let gains = GainParameters::default();
        let mut set = root_set(&root);
        let before = set.point(names::PRE_MAX_LIFT).cloned();

        ShapeTransfer::new(&root, &strak, false, &gains)
            .transfer_max_lift(&mut set)
            .unwrap();

        assert_eq!(set.point(names::PRE_MAX_LIFT).cloned(), before);
    }

    fn spec_alpha_template() -> OperatingPointSet {
        OperatingPointSet::from_points([
            OperatingPoint::new(names::MAX_SPEED, OpMode::SpecCl, 0.4, OptimizationGoal::TargetDrag, 0.0),
            OperatingPoint::new(names::PRE_MAX_LIFT, OpMode::SpecAlpha, 11.0, OptimizationGoal::TargetLift, 1.26),
            OperatingPoint::new(names::MAX_LIFT, OpMode::SpecAlpha, 12.0, OptimizationGoal::TargetLift, 1.27),
        ])
        .unwrap()
    }

    fn polar_with_rows(name: &str, rows: Vec<PolarRow>) -> Polar {
        let mut polar = Polar::from_rows(name, Regime::Type2, 100_000.0, rows);
        analyze(&mut polar).unwrap();
        polar
    }

    #[test]
    fn spec_alpha_pre_max_lift_blends_angle() {
        let (root, _) = polars();
        // stall at 10 degrees
        let mut rows = sample_polar_scaled("strak", 1.2).rows().to_vec();
        rows[13] = PolarRow::new(11.0, 1.19, model_drag(1.19) * 1.2);
        rows[14] = PolarRow::new(12.0, 1.18, model_drag(1.18) * 1.2);
        rows[15] = PolarRow::new(13.0, 1.17, model_drag(1.17) * 1.2);
        let strak = polar_with_rows("strak", rows);
        let gains = GainParameters::default();
        let mut set = spec_alpha_template();

        ShapeTransfer::new(&root, &strak, false, &gains)
            .transfer_max_lift(&mut set)
            .unwrap();

        let root_alpha = root.features().unwrap().pre_max_lift.alpha;
        let strak_alpha = strak.features().unwrap().pre_max_lift.alpha;
        assert_close(strak_alpha, 10.0, 1e-12);
        let expected = gains.max_lift_gain * root_alpha + (1.0 - gains.max_lift_gain) * strak_alpha;
        let value = set.value(names::PRE_MAX_LIFT).unwrap();
        assert_close(value, expected, 1e-9);
        assert_close(value, 10.3, 1e-9);
        assert_eq!(set.target(names::PRE_MAX_LIFT), root.find_lift(value));
        assert_eq!(set.target(names::PRE_MAX_LIFT), Some(1.26));
    }

    #[test]
    fn spec_alpha_pre_max_lift_beyond_root_polar_is_skipped() {
        let (root, _) = polars();
        // keeps lifting up to 16 degrees, past the end of the root polar
        let mut rows = sample_polar_scaled("strak", 1.2).rows().to_vec();
        for (alpha, cl) in [(14.0, 1.3), (15.0, 1.35), (16.0, 1.4)] {
            rows.push(PolarRow::new(alpha, cl, model_drag(cl) * 1.2));
        }
        let strak = polar_with_rows("strak", rows);
        let gains = GainParameters {
            max_lift_gain: 0.0,
            ..GainParameters::default()
        };
        let mut set = spec_alpha_template();
        let before = set.point(names::PRE_MAX_LIFT).cloned();

        ShapeTransfer::new(&root, &strak, false, &gains)
            .transfer_max_lift(&mut set)
            .unwrap();

        assert_eq!(strak.features().unwrap().pre_max_lift.alpha, 16.0);
        assert_eq!(set.point(names::PRE_MAX_LIFT).cloned(), before);
        // the max-lift anchor needs no lookup and still follows the strak polar
        assert_close(set.value(names::MAX_LIFT).unwrap(), 16.0, 1e-9);
        assert_close(set.target(names::MAX_LIFT).unwrap(), 1.4, 1e-9);
    }

    #[test]
    fn missing_named_points_are_skipped() {
        let (root, strak) = polars();
        let gains = GainParameters::default();
        let mut set = OperatingPointSet::new();
        generate_evenly_spaced(&mut set, 5, 0.0, 1.0, 10.0).unwrap();
        let before = set.clone();

        ShapeTransfer::new(&root, &strak, false, &gains).apply(&mut set).unwrap();
        assert_eq!(set, before);
    }
}
