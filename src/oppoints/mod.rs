//! Operating points for the airfoil optimizer and the ordered set holding them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::polar::PolarError;

pub mod adapt;
pub mod distribute;
pub mod transfer;

pub use adapt::{
    adapt_all_to_curve, adapt_max_glide, adapt_max_lift, adapt_max_speed, adapt_scale_numbers,
    adapt_target_to_curve,
};
pub use distribute::{
    AnchorTargets, distribute_equally, distribute_intermediate, generate_evenly_spaced,
    place_anchors, set_from_polar, set_linear_weights, set_weightings,
};
pub use transfer::{ShapeTransfer, transfer_keep_shape};

/// Decimals kept for lift values (op point or target).
pub const CL_DECIMALS: i32 = 4;
/// Decimals kept for drag targets.
pub const CD_DECIMALS: i32 = 6;
/// Decimals kept for alpha op points.
pub const ALPHA_DECIMALS: i32 = 4;

/// Names given to the four anchor points by [`place_anchors`].
pub mod names {
    pub const MAX_SPEED: &str = "maxSpeed";
    pub const MAX_GLIDE: &str = "maxGlide";
    pub const PRE_MAX_LIFT: &str = "preClmax";
    pub const MAX_LIFT: &str = "alphaClmax";

    pub const KEEP_SPEED: &str = "keepSpeed";
    pub const PRE_SPEED: &str = "preSpeed";
    pub const PRE_GLIDE: &str = "preGlide";
    pub const HELPER_PRE_GLIDE: &str = "helperPreGlide";
    pub const HELPER_KEEP_GLIDE: &str = "helperKeepGlide";
    pub const KEEP_GLIDE: &str = "keepGlide";
    pub const HELPER_PRE_MAX_LIFT: &str = "helperPreClmax";
    pub const ALPHA_MAX_GLIDE: &str = "alphaMaxGlide";
    pub const SLOPE_MAX_GLIDE: &str = "slopeMaxGlide";
}

/// Result type for operating-point manipulation.
pub type OpPointResult<T> = Result<T, OpPointError>;

/// Errors raised while building or adapting an [`OperatingPointSet`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OpPointError {
    #[error("operating point `{0}` not found")]
    PointNotFound(String),
    #[error("operating point `{0}` already exists")]
    DuplicateName(String),
    #[error("index {index} is out of range for a set of {len} operating points")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("cannot distribute points between index {start} and {end}")]
    DegenerateInterval { start: usize, end: usize },
    #[error("anchor placement failed: {0}")]
    AnchorPlacement(String),
    #[error("anchor points have not been placed yet")]
    AnchorsNotPlaced,
    #[error("at least 2 operating points are required, got {0}")]
    TooFewPoints(usize),
    #[error("no lift found for operating point `{name}` at alpha = {alpha}")]
    LiftNotFound { name: String, alpha: f64 },
    #[error("unknown op mode `{0}`")]
    UnknownMode(String),
    #[error(transparent)]
    Polar(#[from] PolarError),
}

/// Rounds `value` to `decimals` decimal places.
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// What the op point value of an [`OperatingPoint`] specifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpMode {
    /// The value is a lift coefficient; the target is a drag value.
    #[serde(rename = "spec-cl")]
    SpecCl,
    /// The value is an angle of attack; the target is a lift value.
    #[serde(rename = "spec-al")]
    SpecAlpha,
}

impl OpMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SpecCl => "spec-cl",
            Self::SpecAlpha => "spec-al",
        }
    }

    const fn value_decimals(self) -> i32 {
        match self {
            Self::SpecCl => CL_DECIMALS,
            Self::SpecAlpha => ALPHA_DECIMALS,
        }
    }

    const fn target_decimals(self) -> i32 {
        match self {
            Self::SpecCl => CD_DECIMALS,
            Self::SpecAlpha => CL_DECIMALS,
        }
    }
}

impl fmt::Display for OpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpMode {
    type Err = OpPointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spec-cl" => Ok(Self::SpecCl),
            "spec-al" => Ok(Self::SpecAlpha),
            other => Err(OpPointError::UnknownMode(other.to_owned())),
        }
    }
}

/// Optimization goal of an operating point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OptimizationGoal {
    TargetDrag,
    TargetLift,
    TargetGlide,
    MinGlideSlope,
    MinDrag,
    MaxGlide,
    MaxLift,
    MinSink,
    Other(String),
}

impl OptimizationGoal {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::TargetDrag => "target-drag",
            Self::TargetLift => "target-lift",
            Self::TargetGlide => "target-glide",
            Self::MinGlideSlope => "min-glide-slope",
            Self::MinDrag => "min-drag",
            Self::MaxGlide => "max-glide",
            Self::MaxLift => "max-lift",
            Self::MinSink => "min-sink",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for OptimizationGoal {
    fn from(value: String) -> Self {
        match value.trim() {
            "target-drag" => Self::TargetDrag,
            "target-lift" => Self::TargetLift,
            "target-glide" => Self::TargetGlide,
            "min-glide-slope" => Self::MinGlideSlope,
            "min-drag" => Self::MinDrag,
            "max-glide" => Self::MaxGlide,
            "max-lift" => Self::MaxLift,
            "min-sink" => Self::MinSink,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for OptimizationGoal {
    fn from(value: &str) -> Self {
        Self::from(value.to_owned())
    }
}

impl From<OptimizationGoal> for String {
    fn from(goal: OptimizationGoal) -> Self {
        goal.as_str().to_owned()
    }
}

impl fmt::Display for OptimizationGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single optimizer target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingPoint {
    pub name: String,
    pub mode: OpMode,
    /// Lift coefficient (`SpecCl`) or angle of attack (`SpecAlpha`).
    pub value: f64,
    pub goal: OptimizationGoal,
    /// Drag (`SpecCl`) or lift (`SpecAlpha`) the optimizer should reach.
    pub target: f64,
    pub weighting: f64,
    /// Reynolds number override for this point.
    pub reynolds: Option<f64>,
}

impl OperatingPoint {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        mode: OpMode,
        value: f64,
        goal: impl Into<OptimizationGoal>,
        target: f64,
    ) -> Self {
        Self {
            name: name.into(),
            mode,
            value,
            goal: goal.into(),
            target,
            weighting: 1.0,
            reynolds: None,
        }
    }

    #[must_use]
    pub fn with_weighting(mut self, weighting: f64) -> Self {
        self.weighting = weighting;
        self
    }

    /// Lift this point stands for: the op point of a `SpecCl` point, the target
    /// of a `SpecAlpha` point.
    #[must_use]
    pub fn effective_cl(&self) -> f64 {
        match self.mode {
            OpMode::SpecCl => self.value,
            OpMode::SpecAlpha => self.target,
        }
    }

    fn set_value_rounded(&mut self, value: f64) {
        self.value = round_to(value, self.mode.value_decimals());
    }

    fn set_target_rounded(&mut self, target: f64) {
        self.target = round_to(target, self.mode.target_decimals());
    }
}

/// Indices of the four anchor points, strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorIndices {
    max_speed: usize,
    max_glide: usize,
    pre_max_lift: usize,
    max_lift: usize,
}

impl AnchorIndices {
    /// Validates the ordering `max_speed < max_glide < pre_max_lift < max_lift`.
    pub fn new(
        max_speed: usize,
        max_glide: usize,
        pre_max_lift: usize,
        max_lift: usize,
    ) -> OpPointResult<Self> {
        if max_speed < max_glide && max_glide < pre_max_lift && pre_max_lift < max_lift {
            Ok(Self {
                max_speed,
                max_glide,
                pre_max_lift,
                max_lift,
            })
        } else {
            Err(OpPointError::AnchorPlacement(format!(
                "anchor indices out of order: {max_speed}, {max_glide}, {pre_max_lift}, {max_lift}"
            )))
        }
    }

    #[must_use]
    pub const fn max_speed(&self) -> usize {
        self.max_speed
    }

    #[must_use]
    pub const fn max_glide(&self) -> usize {
        self.max_glide
    }

    #[must_use]
    pub const fn pre_max_lift(&self) -> usize {
        self.pre_max_lift
    }

    #[must_use]
    pub const fn max_lift(&self) -> usize {
        self.max_lift
    }
}

/// Ordered collection of operating points with unique names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatingPointSet {
    points: Vec<OperatingPoint>,
    anchors: Option<AnchorIndices>,
}

impl OperatingPointSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from template points, rejecting duplicate names.
    pub fn from_points(points: impl IntoIterator<Item = OperatingPoint>) -> OpPointResult<Self> {
        let mut set = Self::new();
        for point in points {
            set.add_point(point)?;
        }
        Ok(set)
    }

    pub fn add_point(&mut self, point: OperatingPoint) -> OpPointResult<()> {
        if self.index_of(&point.name).is_some() {
            return Err(OpPointError::DuplicateName(point.name));
        }
        self.points.push(point);
        Ok(())
    }

    pub fn remove_all_points(&mut self) {
        self.points.clear();
        self.anchors = None;
    }

    /// Drops points whose weighting is below `min_weighting`.
    ///
    /// Presets switch points off by giving them a (near) zero weighting.
    pub fn remove_deactivated(&mut self, min_weighting: f64) {
        let before = self.points.len();
        self.points.retain(|point| point.weighting >= min_weighting);
        if self.points.len() != before {
            log::debug!(
                "removed {} deactivated operating points",
                before - self.points.len()
            );
            self.anchors = None;
        }
    }

    pub fn rename_point(&mut self, index: usize, name: impl Into<String>) -> OpPointResult<()> {
        let name = name.into();
        if let Some(existing) = self.index_of(&name) {
            if existing == index {
                return Ok(());
            }
            return Err(OpPointError::DuplicateName(name));
        }
        self.point_at_mut(index)?.name = name;
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn points(&self) -> &[OperatingPoint] {
        &self.points
    }

    #[must_use]
    pub fn anchor_indices(&self) -> Option<AnchorIndices> {
        self.anchors
    }

    pub(crate) fn set_anchor_indices(&mut self, anchors: AnchorIndices) {
        self.anchors = Some(anchors);
    }

    /// Anchor indices, or [`OpPointError::AnchorsNotPlaced`].
    pub fn require_anchors(&self) -> OpPointResult<AnchorIndices> {
        self.anchors.ok_or(OpPointError::AnchorsNotPlaced)
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.points.iter().position(|point| point.name == name)
    }

    #[must_use]
    pub fn point(&self, name: &str) -> Option<&OperatingPoint> {
        self.points.iter().find(|point| point.name == name)
    }

    pub fn point_mut(&mut self, name: &str) -> Option<&mut OperatingPoint> {
        self.points.iter_mut().find(|point| point.name == name)
    }

    /// Like [`OperatingPointSet::point`], for points a caller cannot do without.
    pub fn require_point(&self, name: &str) -> OpPointResult<&OperatingPoint> {
        self.point(name)
            .ok_or_else(|| OpPointError::PointNotFound(name.to_owned()))
    }

    pub fn point_at(&self, index: usize) -> OpPointResult<&OperatingPoint> {
        let len = self.points.len();
        self.points
            .get(index)
            .ok_or(OpPointError::IndexOutOfRange { index, len })
    }

    fn point_at_mut(&mut self, index: usize) -> OpPointResult<&mut OperatingPoint> {
        let len = self.points.len();
        self.points
            .get_mut(index)
            .ok_or(OpPointError::IndexOutOfRange { index, len })
    }

    #[must_use]
    pub fn value(&self, name: &str) -> Option<f64> {
        self.point(name).map(|point| point.value)
    }

    #[must_use]
    pub fn target(&self, name: &str) -> Option<f64> {
        self.point(name).map(|point| point.target)
    }

    #[must_use]
    pub fn mode(&self, name: &str) -> Option<OpMode> {
        self.point(name).map(|point| point.mode)
    }

    /// Sets the op point value of `name`, rounded according to its mode.
    ///
    /// Returns `false` (and logs) when no point has that name.
    pub fn set_point_value(&mut self, name: &str, value: f64) -> bool {
        match self.point_mut(name) {
            Some(point) => {
                point.set_value_rounded(value);
                true
            }
            None => {
                log::warn!("cannot set op point of `{name}`: no such operating point");
                false
            }
        }
    }

    /// Sets the target value of `name`, rounded according to its mode.
    ///
    /// Returns `false` (and logs) when no point has that name.
    pub fn set_target_value(&mut self, name: &str, target: f64) -> bool {
        match self.point_mut(name) {
            Some(point) => {
                point.set_target_rounded(target);
                true
            }
            None => {
                log::warn!("cannot set target value of `{name}`: no such operating point");
                false
            }
        }
    }

    pub fn set_value_at(&mut self, index: usize, value: f64) -> OpPointResult<()> {
        self.point_at_mut(index)?.set_value_rounded(value);
        Ok(())
    }

    pub fn set_target_at(&mut self, index: usize, target: f64) -> OpPointResult<()> {
        self.point_at_mut(index)?.set_target_rounded(target);
        Ok(())
    }

    pub fn set_weight(&mut self, index: usize, weighting: f64) -> OpPointResult<()> {
        self.point_at_mut(index)?.weighting = weighting;
        Ok(())
    }

    pub fn set_reynolds(&mut self, index: usize, reynolds: Option<f64>) -> OpPointResult<()> {
        self.point_at_mut(index)?.reynolds = reynolds;
        Ok(())
    }

    /// Adds `diff` to the op point of every listed point; absent names are skipped.
    pub fn shift_values(&mut self, diff: f64, names: &[&str]) {
        for name in names {
            match self.value(name) {
                Some(value) => {
                    self.set_point_value(name, value + diff);
                }
                None => log::info!("op point {name} was skipped"),
            }
        }
    }

    /// Multiplies the target of every listed point by `factor`; absent names
    /// are skipped.
    pub fn scale_targets(&mut self, factor: f64, names: &[&str]) {
        for name in names {
            match self.target(name) {
                Some(target) => {
                    self.set_target_value(name, target * factor);
                }
                None => log::info!("op point {name} was skipped"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_points() -> OperatingPointSet {
        OperatingPointSet::from_points([
            OperatingPoint::new("a", OpMode::SpecCl, 0.1, "target-drag", 0.006),
            OperatingPoint::new("b", OpMode::SpecCl, 0.4, "target-drag", 0.007),
            OperatingPoint::new("c", OpMode::SpecAlpha, 10.0, "target-lift", 1.1),
        ])
        .unwrap()
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut set = three_points();
        let err = set
            .add_point(OperatingPoint::new("b", OpMode::SpecCl, 0.5, "target-drag", 0.0))
            .unwrap_err();
        assert_eq!(err, OpPointError::DuplicateName("b".to_owned()));
        assert!(matches!(
            set.rename_point(0, "c"),
            Err(OpPointError::DuplicateName(_))
        ));
        set.rename_point(0, "a").unwrap();
        set.rename_point(0, "first").unwrap();
        assert_eq!(set.index_of("first"), Some(0));
    }

    #[test]
    fn setters_round_by_mode() {
        let mut set = three_points();
        assert!(set.set_point_value("a", 0.123_456_7));
        assert!(set.set_target_value("a", 0.006_543_21));
        assert!(set.set_point_value("c", 11.234_567));
        assert!(set.set_target_value("c", 1.234_567));

        assert_eq!(set.value("a"), Some(0.1235));
        assert_eq!(set.target("a"), Some(0.006_543));
        assert_eq!(set.value("c"), Some(11.2346));
        assert_eq!(set.target("c"), Some(1.2346));
    }

    #[test]
    fn setters_on_missing_names_report_false() {
        let mut set = three_points();
        let before = set.clone();
        assert!(!set.set_point_value("missing", 1.0));
        assert!(!set.set_target_value("missing", 1.0));
        assert_eq!(set, before);
    }

    #[test]
    fn index_setters_check_bounds() {
        let mut set = three_points();
        assert_eq!(
            set.set_weight(7, 2.0),
            Err(OpPointError::IndexOutOfRange { index: 7, len: 3 })
        );
        set.set_weight(1, 2.5).unwrap();
        assert_eq!(set.points()[1].weighting, 2.5);
    }

    #[test]
    fn deactivated_points_are_removed() {
        let mut set = three_points();
        set.set_weight(1, 0.0).unwrap();
        set.remove_deactivated(0.001);
        assert_eq!(set.len(), 2);
        assert!(set.point("b").is_none());
    }

    #[test]
    fn list_helpers_skip_missing_points() {
        let mut set = three_points();
        set.scale_targets(2.0, &["a", "unknown", "b"]);
        set.shift_values(0.05, &["b", "nothing"]);
        assert_eq!(set.target("a"), Some(0.012));
        assert_eq!(set.target("b"), Some(0.014));
        assert_eq!(set.value("b"), Some(0.45));
    }

    #[test]
    fn anchor_indices_must_be_strictly_ordered() {
        assert!(AnchorIndices::new(1, 2, 3, 4).is_ok());
        assert!(AnchorIndices::new(1, 1, 3, 4).is_err());
        assert!(AnchorIndices::new(3, 2, 1, 4).is_err());
    }

    #[test]
    fn goals_round_trip_through_strings() {
        assert_eq!(OptimizationGoal::from("min-glide-slope"), OptimizationGoal::MinGlideSlope);
        let custom = OptimizationGoal::from("max-xtr");
        assert_eq!(custom.as_str(), "max-xtr");
        assert_eq!("spec-al".parse::<OpMode>().unwrap(), OpMode::SpecAlpha);
        assert!("spec-x".parse::<OpMode>().is_err());
    }
}
