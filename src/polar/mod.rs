//! Polar data: the measured Cl/Cd/alpha curve of one airfoil at one Reynolds
//! regime, together with the characteristic points found on it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::oppoints::OperatingPointSet;

pub mod features;
pub mod merge;
pub mod query;

pub use features::{
    FeaturePoint, PeakSearch, PolarFeatures, analyze, determine_max_glide, determine_max_lift,
    determine_max_speed, locate_peak,
};
pub use merge::merge_polars;

/// Result type for polar analysis and lookups.
pub type PolarResult<T> = Result<T, PolarError>;

/// Errors raised while analysing or querying a polar.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolarError {
    /// Feature extraction was requested on a polar without rows.
    #[error("polar `{0}` contains no data points")]
    EmptyCurve(String),
    /// A lookup needs the cached features, but `analyze` has not run yet.
    #[error("polar `{0}` has not been analyzed")]
    MissingFeatures(String),
    /// `find_lift` scanned past the last row without reaching the angle.
    #[error("no lift value found in polar `{polar}` for alpha = {alpha}")]
    LiftNotFound { polar: String, alpha: f64 },
}

/// Simulation regime a polar was generated with.
///
/// Type 1 polars run at a fixed Reynolds number and are used for the low-lift
/// part of the merged polar. Type 2 polars run at a fixed `Re * sqrt(Cl)` and
/// cover the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Regime {
    #[serde(rename = "T1")]
    Type1,
    #[default]
    #[serde(rename = "T2")]
    Type2,
}

impl Regime {
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Type1 => 1,
            Self::Type2 => 2,
        }
    }
}

/// One sample of a polar.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PolarRow {
    pub alpha: f64,
    pub cl: f64,
    pub cd: f64,
    /// Glide ratio, `cl / cd`.
    pub cl_cd: f64,
    pub cdp: f64,
    pub cm: f64,
    pub top_xtr: f64,
    pub bot_xtr: f64,
}

impl PolarRow {
    /// Creates a row from the three primary values; the glide ratio is derived.
    #[must_use]
    pub fn new(alpha: f64, cl: f64, cd: f64) -> Self {
        Self {
            alpha,
            cl,
            cd,
            cl_cd: cl / cd,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_details(mut self, cdp: f64, cm: f64, top_xtr: f64, bot_xtr: f64) -> Self {
        self.cdp = cdp;
        self.cm = cm;
        self.top_xtr = top_xtr;
        self.bot_xtr = bot_xtr;
        self
    }
}

/// A polar together with its metadata and cached analysis results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Polar {
    pub name: String,
    pub airfoil_name: String,
    pub regime: Regime,
    pub re: f64,
    pub max_re: f64,
    pub ncrit: f64,
    /// Lift coefficient at which the Type 1 and Type 2 data were joined.
    pub switch_cl: f64,
    /// Row index of the last Type 1 sample in a merged polar.
    pub switch_index: usize,
    rows: Vec<PolarRow>,
    #[serde(skip)]
    features: Option<PolarFeatures>,
    /// Operating points that target this polar, kept for reporting.
    pub op_points: Option<OperatingPointSet>,
}

impl Polar {
    #[must_use]
    pub fn new(name: impl Into<String>, regime: Regime, re: f64) -> Self {
        Self {
            name: name.into(),
            regime,
            re,
            ncrit: 9.0,
            switch_cl: f64::INFINITY,
            ..Self::default()
        }
    }

    /// Builds a polar from already parsed rows.
    #[must_use]
    pub fn from_rows(name: impl Into<String>, regime: Regime, re: f64, rows: Vec<PolarRow>) -> Self {
        let mut polar = Self::new(name, regime, re);
        polar.rows = rows;
        polar
    }

    pub fn push_row(&mut self, row: PolarRow) {
        self.rows.push(row);
        self.features = None;
    }

    #[must_use]
    pub fn rows(&self) -> &[PolarRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn alphas(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|row| row.alpha)
    }

    pub fn lifts(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|row| row.cl)
    }

    pub fn drags(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|row| row.cd)
    }

    pub fn glide_ratios(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|row| row.cl_cd)
    }

    /// Cached features, available after [`analyze`] ran on this polar.
    pub fn features(&self) -> PolarResult<&PolarFeatures> {
        self.features
            .as_ref()
            .ok_or_else(|| PolarError::MissingFeatures(self.name.clone()))
    }

    #[must_use]
    pub fn is_analyzed(&self) -> bool {
        self.features.is_some()
    }

    pub(crate) fn set_features(&mut self, features: PolarFeatures) {
        self.features = Some(features);
    }

    pub(crate) fn ensure_not_empty(&self) -> PolarResult<()> {
        if self.rows.is_empty() {
            Err(PolarError::EmptyCurve(self.name.clone()))
        } else {
            Ok(())
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_polar;
    use super::*;

    #[test]
    fn deserialized_polar_must_be_analyzed_again() {
        let mut polar = sample_polar("root");
        analyze(&mut polar).unwrap();
        let json = serde_json::to_string(&polar).unwrap();
        assert!(!json.contains("max_lift"));

        let mut restored: Polar = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.len(), polar.len());
        assert!(!restored.is_analyzed());
        assert!(matches!(
            restored.find_drag(0.5),
            Err(PolarError::MissingFeatures(_))
        ));

        analyze(&mut restored).unwrap();
        assert_eq!(restored.features().unwrap(), polar.features().unwrap());
    }

    #[test]
    fn stale_feature_cache_in_input_is_ignored() {
        let mut polar = sample_polar("root");
        analyze(&mut polar).unwrap();
        let mut value = serde_json::to_value(&polar).unwrap();
        let mut features = serde_json::to_value(polar.features().unwrap()).unwrap();
        features["max_lift"]["index"] = serde_json::json!(500);
        value["features"] = serde_json::json!(features);

        let restored: Polar = serde_json::from_value(value).unwrap();
        assert!(!restored.is_analyzed());
        assert!(restored.find_drag(0.5).is_err());
    }
}
