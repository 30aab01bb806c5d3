//! Recomputing target values of an operating point set against a polar.

use crate::polar::Polar;

use super::{OpMode, OpPointError, OpPointResult, OperatingPointSet, names};

/// Sets the target of `name` to the value the polar shows at its op point:
/// lift at the angle of a `spec-al` point, drag at the lift of a `spec-cl` point.
pub fn adapt_target_to_curve(set: &mut OperatingPointSet, name: &str, polar: &Polar) -> OpPointResult<()> {
    let point = set.require_point(name)?;
    let target = match point.mode {
        OpMode::SpecAlpha => polar.find_lift(point.value).ok_or_else(|| OpPointError::LiftNotFound {
            name: name.to_owned(),
            alpha: point.value,
        })?,
        OpMode::SpecCl => polar.find_drag(point.value)?,
    };

    set.set_target_value(name, target);
    Ok(())
}

/// Adapts every target of `set` to `polar`, then moves the low-lift points to
/// the Type 1 Reynolds number (see [`adapt_scale_numbers`]).
pub fn adapt_all_to_curve(set: &mut OperatingPointSet, polar: &Polar) -> OpPointResult<()> {
    log::debug!("adapting {} operating points to polar {}", set.len(), polar.name);
    let point_names: Vec<String> = set.points().iter().map(|point| point.name.clone()).collect();
    for name in &point_names {
        adapt_target_to_curve(set, name, polar)?;
    }
    adapt_scale_numbers(set, polar)
}

/// Gives every `spec-cl` point at or below the switch lift of `polar` the
/// polar's max Reynolds number, so the optimizer evaluates it like the Type 1
/// part of the merged polar.
pub fn adapt_scale_numbers(set: &mut OperatingPointSet, polar: &Polar) -> OpPointResult<()> {
    if polar.max_re <= 0.0 {
        log::debug!("polar {} has no Type 1 part, keeping Reynolds numbers", polar.name);
        return Ok(());
    }
    let indices: Vec<usize> = set
        .points()
        .iter()
        .enumerate()
        .filter(|(_, point)| point.mode == OpMode::SpecCl && point.value <= polar.switch_cl)
        .map(|(idx, _)| idx)
        .collect();

    for idx in indices {
        set.set_reynolds(idx, Some(polar.max_re.trunc()))?;
        log::info!(
            "adapted op point @ Cl = {:.3}, Type 1, Re = {:.0}",
            set.points()[idx].value,
            polar.max_re.trunc()
        );
    }
    Ok(())
}

/// Moves `alphaClmax` and `preClmax` onto the max-lift features of `polar` and
/// adapts their targets.
pub fn adapt_max_lift(set: &mut OperatingPointSet, polar: &Polar) -> OpPointResult<()> {
    let features = *polar.features()?;

    let value = match set.require_point(names::MAX_LIFT)?.mode {
        OpMode::SpecAlpha => features.max_lift.alpha,
        OpMode::SpecCl => features.max_lift.cl,
    };
    set.set_point_value(names::MAX_LIFT, value);
    adapt_target_to_curve(set, names::MAX_LIFT, polar)?;

    let value = match set.require_point(names::PRE_MAX_LIFT)?.mode {
        OpMode::SpecAlpha => features.pre_max_lift.alpha,
        OpMode::SpecCl => features.pre_max_lift.cl,
    };
    set.set_point_value(names::PRE_MAX_LIFT, value);
    adapt_target_to_curve(set, names::PRE_MAX_LIFT, polar)
}

/// Moves `maxSpeed` onto the max-speed lift of `polar`.
pub fn adapt_max_speed(set: &mut OperatingPointSet, polar: &Polar) -> OpPointResult<()> {
    let cl = polar.features()?.max_speed.cl;
    set.require_point(names::MAX_SPEED)?;
    set.set_point_value(names::MAX_SPEED, cl);
    adapt_target_to_curve(set, names::MAX_SPEED, polar)
}

/// Moves `maxGlide` onto the max-glide lift of `polar`. The optional
/// `alphaMaxGlide` and `slopeMaxGlide` points follow when present.
pub fn adapt_max_glide(set: &mut OperatingPointSet, polar: &Polar) -> OpPointResult<()> {
    let max_glide = polar.features()?.max_glide;

    set.require_point(names::MAX_GLIDE)?;
    set.set_point_value(names::MAX_GLIDE, max_glide.cl);
    adapt_target_to_curve(set, names::MAX_GLIDE, polar)?;

    if set.point(names::ALPHA_MAX_GLIDE).is_some() {
        set.set_point_value(names::ALPHA_MAX_GLIDE, max_glide.alpha);
        adapt_target_to_curve(set, names::ALPHA_MAX_GLIDE, polar)?;
    } else {
        log::info!("op point {} was skipped", names::ALPHA_MAX_GLIDE);
    }

    if !set.set_point_value(names::SLOPE_MAX_GLIDE, max_glide.cl) {
        log::info!("op point {} was skipped", names::SLOPE_MAX_GLIDE);
    }
    Ok(())
}
