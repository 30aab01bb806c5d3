//! Strak parameters as read from the strak data JSON file.
//!
//! Keys follow the names used by existing strak data files (`ReNumbers`,
//! `maxReFactor`, `Cl_min`, ...). Flags are accepted either as JSON booleans or
//! as the strings `"true"` / `"false"`; numbers may also be given as strings.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest number of operating points a strak set may have.
pub const MIN_OP_POINTS: usize = 5;

/// Result type for configuration handling.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or evaluating a [`StrakConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid strak data JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid strak configuration: {0}")]
    Invalid(String),
}

/// How the weighting of the op points evolves over the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WeightingMode {
    #[default]
    Constant,
    LinearProgression,
}

impl WeightingMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::LinearProgression => "linear_progression",
        }
    }
}

impl From<String> for WeightingMode {
    fn from(value: String) -> Self {
        if value.trim() == "linear_progression" {
            Self::LinearProgression
        } else {
            Self::Constant
        }
    }
}

impl From<WeightingMode> for String {
    fn from(mode: WeightingMode) -> Self {
        mode.as_str().to_owned()
    }
}

/// Which polar the op points of a strak airfoil are adapted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperatingMode {
    /// Adapt to the root polar, then transfer to the strak polar keeping shape.
    #[default]
    Default,
    /// Adapt directly to the polar of each strak airfoil.
    MatchPolarFoils,
}

impl OperatingMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::MatchPolarFoils => "matchpolarfoils",
        }
    }
}

impl From<String> for OperatingMode {
    fn from(value: String) -> Self {
        if value.trim() == "matchpolarfoils" {
            Self::MatchPolarFoils
        } else {
            Self::Default
        }
    }
}

impl From<OperatingMode> for String {
    fn from(mode: OperatingMode) -> Self {
        mode.as_str().to_owned()
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gains and sizes used while building and transferring op point sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GainParameters {
    /// Glide ratio the strak airfoil is expected to lose against the root airfoil.
    pub max_glide_loss: f64,
    /// Weight of the root polar when blending speed targets.
    pub max_speed_gain: f64,
    /// Weight of the root polar when blending the max-lift anchor.
    pub max_lift_gain: f64,
    pub num_op_points: usize,
    pub cl_min: f64,
    pub weighting_mode: WeightingMode,
}

impl Default for GainParameters {
    fn default() -> Self {
        Self {
            max_glide_loss: 0.008,
            max_speed_gain: 0.5,
            max_lift_gain: 0.3,
            num_op_points: 16,
            cl_min: -0.1,
            weighting_mode: WeightingMode::Constant,
        }
    }
}

/// Values computed from a [`StrakConfig`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedValues {
    pub re_numbers: Vec<f64>,
    pub max_re_numbers: Vec<f64>,
    /// Lift at which the Type 2 polar hands over to the Type 1 polar.
    pub switch_cl: f64,
}

/// Content of a strak data file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StrakConfig {
    #[serde(rename = "inputFolder")]
    pub input_folder: String,
    #[serde(rename = "outputFolder")]
    pub output_folder: String,
    #[serde(rename = "strakInputFileName")]
    pub strak_input_file_name: String,
    #[serde(rename = "ReNumbers")]
    pub re_numbers: Vec<f64>,
    #[serde(rename = "maxReFactor", deserialize_with = "deserialize_number")]
    pub max_re_factor: f64,
    #[serde(rename = "chordLengths")]
    pub chord_lengths: Vec<f64>,
    #[serde(rename = "ReSqrtCl", deserialize_with = "deserialize_number")]
    pub re_sqrt_cl: f64,
    #[serde(rename = "seedFoilName")]
    pub seed_foil_name: String,
    #[serde(rename = "strakType")]
    pub strak_type: String,
    #[serde(rename = "operatingMode")]
    pub operating_mode: OperatingMode,
    #[serde(rename = "matchPolarFoilName")]
    pub match_polar_foil_name: String,
    #[serde(rename = "useAlwaysRootfoil", deserialize_with = "deserialize_flag")]
    pub use_always_rootfoil: bool,
    #[serde(rename = "adaptInitialPerturb", deserialize_with = "deserialize_flag")]
    pub adapt_initial_perturb: bool,
    pub weighting_mode: WeightingMode,
    #[serde(rename = "maxGlideLoss", deserialize_with = "deserialize_number")]
    pub max_glide_loss: f64,
    #[serde(rename = "maxSpeedGain", deserialize_with = "deserialize_number")]
    pub max_speed_gain: f64,
    #[serde(rename = "maxLiftGain", deserialize_with = "deserialize_number")]
    pub max_lift_gain: f64,
    #[serde(rename = "numOpPoints")]
    pub num_op_points: usize,
    #[serde(rename = "Cl_min", deserialize_with = "deserialize_number")]
    pub cl_min: f64,
}

impl Default for StrakConfig {
    fn default() -> Self {
        let gains = GainParameters::default();
        Self {
            input_folder: String::new(),
            output_folder: String::new(),
            strak_input_file_name: "i-strak.txt".to_owned(),
            re_numbers: Vec::new(),
            max_re_factor: 3.0,
            chord_lengths: Vec::new(),
            re_sqrt_cl: 150_000.0,
            seed_foil_name: String::new(),
            strak_type: "F3F".to_owned(),
            operating_mode: OperatingMode::Default,
            match_polar_foil_name: String::new(),
            use_always_rootfoil: false,
            adapt_initial_perturb: true,
            weighting_mode: gains.weighting_mode,
            max_glide_loss: gains.max_glide_loss,
            max_speed_gain: gains.max_speed_gain,
            max_lift_gain: gains.max_lift_gain,
            num_op_points: gains.num_op_points,
            cl_min: gains.cl_min,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Bool(bool),
    Text(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match FlagValue::deserialize(deserializer)? {
        FlagValue::Bool(value) => value,
        FlagValue::Text(text) => text.trim().eq_ignore_ascii_case("true"),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberValue {
    Number(f64),
    Text(String),
}

fn deserialize_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberValue::deserialize(deserializer)? {
        NumberValue::Number(value) => Ok(value),
        NumberValue::Text(text) => text
            .trim()
            .parse()
            .map_err(|err| de::Error::custom(format!("`{text}` is not a number: {err}"))),
    }
}

impl StrakConfig {
    /// Parses and validates a strak data document.
    pub fn from_json_str(input: &str) -> ConfigResult<Self> {
        let mut config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("read strak data from {}", path.display());
        Self::from_json_str(&input)
    }

    /// Applies the corrections the strak machine makes to user input and
    /// rejects values nothing sensible can be computed from.
    pub fn validate(&mut self) -> ConfigResult<()> {
        if self.num_op_points < MIN_OP_POINTS {
            log::warn!(
                "numOpPoints = {} is too small, using {MIN_OP_POINTS}",
                self.num_op_points
            );
            self.num_op_points = MIN_OP_POINTS;
        }
        if self.operating_mode == OperatingMode::MatchPolarFoils && !self.use_always_rootfoil {
            log::debug!("operating mode matchpolarfoils always refers to the root airfoil");
            self.use_always_rootfoil = true;
        }
        self.ensure_finite()?;
        if !(self.max_re_factor > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "maxReFactor must be positive, got {}",
                self.max_re_factor
            )));
        }
        if !(0.0..1.0).contains(&self.max_glide_loss) {
            return Err(ConfigError::Invalid(format!(
                "maxGlideLoss must be in [0, 1), got {}",
                self.max_glide_loss
            )));
        }
        Ok(())
    }

    fn ensure_finite(&self) -> ConfigResult<()> {
        let scalars = [
            ("maxReFactor", self.max_re_factor),
            ("ReSqrtCl", self.re_sqrt_cl),
            ("maxGlideLoss", self.max_glide_loss),
            ("maxSpeedGain", self.max_speed_gain),
            ("maxLiftGain", self.max_lift_gain),
            ("Cl_min", self.cl_min),
        ];
        let lists = [
            ("ReNumbers", &self.re_numbers),
            ("chordLengths", &self.chord_lengths),
        ];
        let values = scalars.into_iter().chain(
            lists
                .into_iter()
                .flat_map(|(key, list)| list.iter().map(move |&value| (key, value))),
        );
        for (key, value) in values {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!("{key} must be a finite number, got {value}")));
            }
        }
        Ok(())
    }

    /// Reynolds numbers (from the chord lengths, when given), max Reynolds
    /// numbers and the Type 2 / Type 1 switch lift.
    pub fn derived(&self) -> ConfigResult<DerivedValues> {
        let re_numbers = if self.chord_lengths.is_empty() {
            self.re_numbers.clone()
        } else {
            let root_chord = self.chord_lengths[0];
            if !(root_chord > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "chord length of the root airfoil must be positive, got {root_chord}"
                )));
            }
            self.chord_lengths
                .iter()
                .map(|chord| self.re_sqrt_cl * chord / root_chord)
                .collect()
        };

        let Some(&root_re) = re_numbers.first() else {
            return Err(ConfigError::Invalid(
                "neither ReNumbers nor chordLengths are given".to_owned(),
            ));
        };

        let max_re_numbers: Vec<f64> = re_numbers.iter().map(|re| re * self.max_re_factor).collect();
        let root_max_re = max_re_numbers[0];
        let switch_cl = (root_re * root_re) / (root_max_re * root_max_re);
        log::info!("polar generation switches from Type 2 to Type 1 at Cl = {switch_cl:.3}");

        Ok(DerivedValues {
            re_numbers,
            max_re_numbers,
            switch_cl,
        })
    }

    #[must_use]
    pub fn gains(&self) -> GainParameters {
        GainParameters {
            max_glide_loss: self.max_glide_loss,
            max_speed_gain: self.max_speed_gain,
            max_lift_gain: self.max_lift_gain,
            num_op_points: self.num_op_points,
            cl_min: self.cl_min,
            weighting_mode: self.weighting_mode,
        }
    }

    /// Name of the optimizer input file for the airfoil at `re`, e.g.
    /// `i-strak_150k.txt`.
    #[must_use]
    pub fn input_file_name(&self, re: f64) -> String {
        let stem = self
            .strak_input_file_name
            .strip_suffix(".txt")
            .unwrap_or(&self.strak_input_file_name);
        format!("{stem}_{:03}k.txt", thousands(re))
    }

    /// Name of the strak airfoil at position `idx`, e.g. `JX-GP-055-strak-100k`.
    /// In `matchpolarfoils` mode the airfoils are named after the match polar
    /// airfoil.
    #[must_use]
    pub fn foil_name(&self, idx: usize, re: f64) -> String {
        let base = match self.operating_mode {
            OperatingMode::MatchPolarFoils => &self.match_polar_foil_name,
            OperatingMode::Default => &self.seed_foil_name,
        };
        let stem = base.strip_suffix(".dat").unwrap_or(base);
        let kind = if idx == 0 { "root" } else { "strak" };
        format!("{stem}-{kind}-{:03}k", thousands(re))
    }

    /// Directory the polars of the root airfoil are kept in.
    #[must_use]
    pub fn polar_dir_name(&self) -> String {
        let re = self.re_numbers.first().copied().unwrap_or_default();
        format!("{}_polars", self.foil_name(0, re))
    }

    /// Whether `file_name` is the preset input file of the configured strak
    /// type.
    #[must_use]
    pub fn is_preset_file(&self, file_name: &str) -> bool {
        !self.strak_type.is_empty() && file_name.contains(&self.strak_type)
    }
}

/// File names of the Type 1 and Type 2 polar generated for `re` / `max_re`.
#[must_use]
pub fn polar_file_names(re: f64, max_re: f64) -> (String, String) {
    (
        format!("T1_Re0.{:03}_M0.00_N9.0.txt", thousands(max_re)),
        format!("T2_Re0.{:03}_M0.00_N9.0.txt", thousands(re)),
    )
}

#[allow(clippy::cast_possible_truncation)]
fn thousands(re: f64) -> i64 {
    (re / 1000.0).trunc() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_strak_machine() {
        let config = StrakConfig::from_json_str(r#"{ "ReNumbers": [150000] }"#).unwrap();
        assert_eq!(config.gains(), GainParameters::default());
        assert_eq!(config.strak_type, "F3F");
        assert!(config.adapt_initial_perturb);
        assert!(!config.use_always_rootfoil);
        assert_eq!(config.operating_mode, OperatingMode::Default);
    }

    #[test]
    fn string_flags_and_numbers_are_accepted() {
        let config = StrakConfig::from_json_str(
            r#"{
                "ReNumbers": [150000, 100000],
                "useAlwaysRootfoil": "true",
                "adaptInitialPerturb": false,
                "ReSqrtCl": "120000",
                "weighting_mode": "linear_progression",
                "maxLiftGain": 0.5
            }"#,
        )
        .unwrap();
        assert!(config.use_always_rootfoil);
        assert!(!config.adapt_initial_perturb);
        assert_eq!(config.re_sqrt_cl, 120_000.0);
        assert_eq!(config.weighting_mode, WeightingMode::LinearProgression);
        assert_eq!(config.gains().max_lift_gain, 0.5);
    }

    #[test]
    fn unknown_modes_fall_back_to_defaults() {
        let config = StrakConfig::from_json_str(
            r#"{ "ReNumbers": [1], "weighting_mode": "quadratic", "operatingMode": "other" }"#,
        )
        .unwrap();
        assert_eq!(config.weighting_mode, WeightingMode::Constant);
        assert_eq!(config.operating_mode, OperatingMode::Default);
    }

    #[test]
    fn too_few_op_points_are_raised_to_minimum() {
        let config = StrakConfig::from_json_str(r#"{ "ReNumbers": [1], "numOpPoints": 3 }"#).unwrap();
        assert_eq!(config.num_op_points, MIN_OP_POINTS);
    }

    #[test]
    fn foil_names_follow_the_seed_or_match_airfoil() {
        let config = StrakConfig::from_json_str(
            r#"{ "ReNumbers": [220000, 80000], "seedFoilName": "JX-GP-055.dat", "matchPolarFoilName": "SD7003.dat" }"#,
        )
        .unwrap();
        assert_eq!(config.foil_name(0, 220_000.0), "JX-GP-055-root-220k");
        assert_eq!(config.foil_name(1, 80_000.0), "JX-GP-055-strak-080k");
        assert_eq!(config.polar_dir_name(), "JX-GP-055-root-220k_polars");

        let config = StrakConfig {
            operating_mode: OperatingMode::MatchPolarFoils,
            ..config
        };
        assert_eq!(config.foil_name(1, 80_000.0), "SD7003-strak-080k");
    }

    #[test]
    fn preset_file_is_chosen_by_strak_type() {
        let config = StrakConfig::from_json_str(r#"{ "ReNumbers": [1], "strakType": "F3B" }"#).unwrap();
        assert!(config.is_preset_file("iFile_F3B.txt"));
        assert!(!config.is_preset_file("iFile_F3F.txt"));

        let config = StrakConfig {
            strak_type: String::new(),
            ..config
        };
        assert!(!config.is_preset_file("iFile_F3B.txt"));
    }

    #[test]
    fn match_polar_foils_always_uses_root() {
        let config =
            StrakConfig::from_json_str(r#"{ "ReNumbers": [1], "operatingMode": "matchpolarfoils" }"#)
                .unwrap();
        assert!(config.use_always_rootfoil);
    }

    #[test]
    fn derived_values_from_chords() {
        let config = StrakConfig::from_json_str(
            r#"{ "chordLengths": [0.2, 0.1], "ReSqrtCl": 150000, "maxReFactor": 3.0 }"#,
        )
        .unwrap();
        let derived = config.derived().unwrap();
        assert_eq!(derived.re_numbers, vec![150_000.0, 75_000.0]);
        assert_eq!(derived.max_re_numbers, vec![450_000.0, 225_000.0]);
        assert!((derived.switch_cl - 1.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn derived_values_need_reynolds_numbers() {
        let config = StrakConfig::from_json_str("{}").unwrap();
        assert!(matches!(config.derived(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_json_is_reported() {
        assert!(matches!(
            StrakConfig::from_json_str("{ ReNumbers: }"),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            StrakConfig::from_json_str(r#"{ "maxReFactor": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        for input in [
            r#"{ "ReNumbers": [150000], "Cl_min": "NaN" }"#,
            r#"{ "ReNumbers": [150000], "maxLiftGain": "inf" }"#,
            r#"{ "ReNumbers": [150000], "ReSqrtCl": "-inf" }"#,
        ] {
            let err = StrakConfig::from_json_str(input).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{input}: {err}");
        }
    }

    #[test]
    fn file_names_follow_reynolds_numbers() {
        let config = StrakConfig::default();
        assert_eq!(config.input_file_name(150_000.0), "i-strak_150k.txt");
        assert_eq!(config.input_file_name(75_500.0), "i-strak_075k.txt");

        let (t1, t2) = polar_file_names(150_000.0, 450_000.0);
        assert_eq!(t1, "T1_Re0.450_M0.00_N9.0.txt");
        assert_eq!(t2, "T2_Re0.150_M0.00_N9.0.txt");
    }
}
