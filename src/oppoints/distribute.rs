//! Building an operating point set from polar features: evenly spaced points,
//! anchors on max speed / max glide / max lift and the points in between.

use crate::config::WeightingMode;
use crate::polar::{Polar, PolarFeatures};

use super::{
    AnchorIndices, CD_DECIMALS, CL_DECIMALS, OpMode, OpPointError, OpPointResult, OperatingPoint,
    OperatingPointSet, OptimizationGoal, names, round_to,
};

/// Lift of the pre-max-lift anchor relative to the pre-max-lift value of the polar.
pub const PRE_MAX_LIFT_ANCHOR_FACTOR: f64 = 0.98;
/// Weighting of the first point under [`WeightingMode::LinearProgression`].
pub const MIN_LINEAR_WEIGHT: f64 = 0.7;
/// Weighting of the max-lift anchor under [`WeightingMode::LinearProgression`].
pub const MAX_LINEAR_WEIGHT: f64 = 3.0;

/// Polar values the anchors are placed on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorTargets {
    pub max_speed_cl: f64,
    pub max_glide_cl: f64,
    pub pre_max_lift_cl: f64,
    pub pre_max_lift_alpha: f64,
    pub max_lift_cl: f64,
    pub max_lift_alpha: f64,
}

impl AnchorTargets {
    #[must_use]
    pub fn from_features(features: &PolarFeatures) -> Self {
        Self {
            max_speed_cl: features.max_speed.cl,
            max_glide_cl: features.max_glide.cl,
            pre_max_lift_cl: features.pre_max_lift.cl,
            pre_max_lift_alpha: features.pre_max_lift.alpha,
            max_lift_cl: features.max_lift.cl,
            max_lift_alpha: features.max_lift.alpha,
        }
    }
}

/// Replaces the content of `set` with `count` points from `cl_min` to `cl_max`.
///
/// All points are `spec-cl` / `target-drag`, except the last one, which is a
/// `spec-al` point at `alpha_cl_max` with a `target-lift` of `cl_max`.
pub fn generate_evenly_spaced(
    set: &mut OperatingPointSet,
    count: usize,
    cl_min: f64,
    cl_max: f64,
    alpha_cl_max: f64,
) -> OpPointResult<()> {
    if count < 2 {
        return Err(OpPointError::TooFewPoints(count));
    }

    set.remove_all_points();
    let diff = (cl_max - cl_min) / (count - 1) as f64;

    for i in 0..count {
        let name = format!("op_{i}");
        let point = if i == count - 1 {
            OperatingPoint::new(
                name,
                OpMode::SpecAlpha,
                round_to(alpha_cl_max, super::ALPHA_DECIMALS),
                OptimizationGoal::TargetLift,
                cl_max,
            )
        } else {
            OperatingPoint::new(
                name,
                OpMode::SpecCl,
                round_to(cl_min + i as f64 * diff, CL_DECIMALS),
                OptimizationGoal::TargetDrag,
                0.0,
            )
        };
        set.add_point(point)?;
    }

    log::debug!("generated {count} operating points from Cl {cl_min} to {cl_max}");
    Ok(())
}

/// Index of the point whose lift is closest to `cl`.
///
/// Looks for the neighbouring pair enclosing `cl`; a tie goes to the lower
/// index. Values outside the covered range snap to the nearest end.
fn closest_cl_index(set: &OperatingPointSet, cl: f64) -> usize {
    let lifts: Vec<f64> = set.points().iter().map(OperatingPoint::effective_cl).collect();

    for i in 1..lifts.len() {
        let (left, right) = (lifts[i - 1], lifts[i]);
        if cl >= left && cl <= right {
            return if cl - left <= right - cl { i - 1 } else { i };
        }
    }

    match lifts.first() {
        Some(&first) if cl <= first => 0,
        _ => lifts.len().saturating_sub(1),
    }
}

/// Turns four points of `set` into the max-speed, max-glide, pre-max-lift and
/// max-lift anchors.
///
/// The last point becomes the max-lift anchor (at the pre-max-lift angle, with
/// the pre-max-lift value as target) and the one before it the pre-max-lift
/// anchor. Max glide and max speed go to the points closest in lift; when an
/// anchor would land on or behind its right neighbour it is moved one index
/// below that neighbour.
///
/// Needs at least four points; the resulting indices are always strictly
/// increasing. Anchors of an earlier placement give up their names when they
/// move. On error `set` is left unchanged.
pub fn place_anchors(set: &mut OperatingPointSet, targets: &AnchorTargets) -> OpPointResult<AnchorIndices> {
    let mut placed = set.clone();
    let anchors = place_anchors_in(&mut placed, targets)?;
    *set = placed;
    Ok(anchors)
}

fn place_anchors_in(set: &mut OperatingPointSet, targets: &AnchorTargets) -> OpPointResult<AnchorIndices> {
    let len = set.len();
    if len < 4 {
        return Err(OpPointError::AnchorPlacement(format!(
            "four anchors need at least 4 operating points, got {len}"
        )));
    }

    let max_lift = len - 1;
    set.set_value_at(max_lift, targets.pre_max_lift_alpha)?;
    set.set_target_at(max_lift, targets.pre_max_lift_cl)?;

    let pre_max_lift = max_lift - 1;

    // max glide never takes index 0, the max speed anchor needs a slot below it
    let mut max_glide = closest_cl_index(set, targets.max_glide_cl).max(1);
    if max_glide >= pre_max_lift {
        max_glide = pre_max_lift - 1;
    }

    let mut max_speed = closest_cl_index(set, targets.max_speed_cl);
    if max_speed >= max_glide {
        max_speed = max_glide - 1;
    }

    let anchors = AnchorIndices::new(max_speed, max_glide, pre_max_lift, max_lift)?;

    set.set_value_at(pre_max_lift, targets.pre_max_lift_cl * PRE_MAX_LIFT_ANCHOR_FACTOR)?;
    set.set_value_at(max_glide, targets.max_glide_cl)?;
    set.set_value_at(max_speed, targets.max_speed_cl)?;

    release_anchor_names(set, &anchors)?;
    set.rename_point(max_lift, names::MAX_LIFT)?;
    set.rename_point(pre_max_lift, names::PRE_MAX_LIFT)?;
    set.rename_point(max_glide, names::MAX_GLIDE)?;
    set.rename_point(max_speed, names::MAX_SPEED)?;

    log::debug!(
        "anchors placed: maxSpeed @ {max_speed}, maxGlide @ {max_glide}, preClmax @ {pre_max_lift}, alphaClmax @ {max_lift}"
    );
    set.set_anchor_indices(anchors);
    Ok(anchors)
}

/// Gives anchor names held by points other than their new anchor the plain
/// `op_<index>` name back.
fn release_anchor_names(set: &mut OperatingPointSet, anchors: &AnchorIndices) -> OpPointResult<()> {
    let slots = [
        (names::MAX_SPEED, anchors.max_speed()),
        (names::MAX_GLIDE, anchors.max_glide()),
        (names::PRE_MAX_LIFT, anchors.pre_max_lift()),
        (names::MAX_LIFT, anchors.max_lift()),
    ];
    for (name, index) in slots {
        if let Some(previous) = set.index_of(name).filter(|&previous| previous != index) {
            log::debug!("anchor {name} moves from index {previous} to {index}");
            set.rename_point(previous, format!("op_{previous}"))?;
        }
    }
    Ok(())
}

/// Spreads the `spec-cl` points strictly between `start` and `end` evenly over
/// the lift range of the two boundary points.
///
/// `min-glide-slope` points keep their value.
pub fn distribute_equally(set: &mut OperatingPointSet, start: usize, end: usize) -> OpPointResult<()> {
    if end <= start {
        return Err(OpPointError::DegenerateInterval { start, end });
    }

    let cl_start = set.point_at(start)?.effective_cl();
    let cl_end = set.point_at(end)?.effective_cl();
    let cl_interval = (cl_end - cl_start) / (end - start) as f64;
    log::debug!(
        "distributing points {start}..{end} from Cl {cl_start} to {cl_end}, step {cl_interval}"
    );

    let mut num = 1.0;
    for idx in start + 1..end {
        let point = set.point_at(idx)?;
        if point.mode == OpMode::SpecCl && point.goal != OptimizationGoal::MinGlideSlope {
            set.set_value_at(idx, cl_start + num * cl_interval)?;
            num += 1.0;
        }
    }
    Ok(())
}

/// Redistributes the points between the anchors placed by [`place_anchors`].
pub fn distribute_intermediate(set: &mut OperatingPointSet) -> OpPointResult<()> {
    let anchors = set.require_anchors()?;

    if anchors.max_speed() > 0 {
        distribute_equally(set, 0, anchors.max_speed())?;
    } else {
        log::debug!("max speed anchor is the first point, nothing to distribute below it");
    }
    distribute_equally(set, anchors.max_speed(), anchors.max_glide())?;
    distribute_equally(set, anchors.max_glide(), anchors.pre_max_lift())
}

/// Assigns weightings from `min_weight` at index 0 up to `max_weight` at
/// `max_lift_index` in equal steps.
pub fn set_linear_weights(
    set: &mut OperatingPointSet,
    max_lift_index: usize,
    min_weight: f64,
    max_weight: f64,
) -> OpPointResult<()> {
    if max_lift_index == 0 {
        return Err(OpPointError::DegenerateInterval {
            start: 0,
            end: max_lift_index,
        });
    }

    let diff = (max_weight - min_weight) / max_lift_index as f64;
    for idx in 0..=max_lift_index {
        set.set_weight(idx, min_weight + idx as f64 * diff)?;
    }
    Ok(())
}

/// Applies the configured weighting policy. Constant weighting leaves the set
/// untouched.
pub fn set_weightings(set: &mut OperatingPointSet, mode: WeightingMode) -> OpPointResult<()> {
    match mode {
        WeightingMode::Constant => Ok(()),
        WeightingMode::LinearProgression => {
            let anchors = set.require_anchors()?;
            set_linear_weights(set, anchors.max_lift(), MIN_LINEAR_WEIGHT, MAX_LINEAR_WEIGHT)
        }
    }
}

/// Replaces the content of `set` with `count` `target-drag` points sampled from
/// the polar between its first lift value and max lift.
pub fn set_from_polar(set: &mut OperatingPointSet, polar: &Polar, count: usize) -> OpPointResult<()> {
    if count == 0 {
        return Err(OpPointError::TooFewPoints(count));
    }
    let features = polar.features()?;
    let cl_min = polar.rows()[0].cl;
    let cl_increment = (features.max_lift.cl - cl_min) / count as f64;

    set.remove_all_points();
    for i in 0..count {
        let cl = round_to(cl_min + i as f64 * cl_increment, CL_DECIMALS);
        let cd = round_to(polar.find_drag(cl)?, CD_DECIMALS);
        set.add_point(OperatingPoint::new(
            format!("target_polar_{i}"),
            OpMode::SpecCl,
            cl,
            OptimizationGoal::TargetDrag,
            cd,
        ))?;
    }
    Ok(())
}
