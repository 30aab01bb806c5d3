//! The strak pipeline: merged polars of the root airfoil at every Reynolds
//! number in, one operating point set per strak airfoil out.

use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, DerivedValues, GainParameters, OperatingMode, StrakConfig};
use crate::oppoints::{
    AnchorTargets, OpPointError, OperatingPointSet, adapt_all_to_curve, distribute_intermediate,
    generate_evenly_spaced, place_anchors, set_weightings, transfer_keep_shape,
};
use crate::parse::namelist::{NamelistDocument, NamelistError};
use crate::parse::polar_file::ParseError;
use crate::polar::query::interpolate;
use crate::polar::{Polar, PolarError, analyze, merge_polars};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Reynolds number differences the perturbation table is defined for.
const RE_DIFF_RANGE: [f64; 2] = [30_000.0, 150_000.0];
const PERTURB_RANGE: [f64; 2] = [0.002, 0.01];
const PSO_TOL_RANGE: [f64; 2] = [0.0003, 0.0015];

/// Preset op points with a weighting below this are switched off.
pub const DEACTIVATED_WEIGHTING: f64 = 0.001;

const OPTIMIZATION_OPTIONS: &str = "optimization_options";
const PARTICLE_SWARM_OPTIONS: &str = "particle_swarm_options";

/// Result type for the strak pipeline.
pub type StrakResult<T> = Result<T, StrakError>;

/// Any error the strak pipeline can run into.
#[derive(Debug, Error)]
pub enum StrakError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Polar(#[from] PolarError),
    #[error(transparent)]
    OpPoint(#[from] OpPointError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Namelist(#[from] NamelistError),
    #[error("{expected} Reynolds numbers are configured, but {found} polars were given")]
    PolarCount { expected: usize, found: usize },
}

/// Optimizer start values derived from the Reynolds number step between two
/// airfoils.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InitialPerturb {
    pub initial_perturb: f64,
    pub pso_tol: f64,
}

/// Interpolates the initial perturbation and the particle swarm tolerance
/// for a Reynolds number step of `re_diff`, clamped to the table ends.
#[must_use]
pub fn initial_perturb(re_diff: f64) -> InitialPerturb {
    let initial_perturb = interpolate(re_diff, &RE_DIFF_RANGE, &PERTURB_RANGE);
    let pso_tol = crate::oppoints::round_to(interpolate(re_diff, &RE_DIFF_RANGE, &PSO_TOL_RANGE), 6);
    log::info!(
        "Re diff is {re_diff:.0}, setting initial_perturb to {initial_perturb:.4} and pso_tol to {pso_tol:.5}"
    );
    InitialPerturb {
        initial_perturb,
        pso_tol,
    }
}

/// Merges the Type 1 and Type 2 polar of one Reynolds number and analyzes the
/// result.
pub fn merge_regime_pair(type1: &Polar, type2: &Polar, switch_cl: f64, max_re: f64) -> StrakResult<Polar> {
    let mut merged = merge_polars(type1, type2, switch_cl, max_re);
    analyze(&mut merged)?;
    merged.name = format!(
        "mergedPolar T1/T2, ReSqrt(Cl) = {:.0}, Re = {:.0}",
        type2.re, type1.re
    );
    Ok(merged)
}

/// Merges every configured Reynolds number pair.
pub fn merge_all(config: &StrakConfig, type1: &[Polar], type2: &[Polar]) -> StrakResult<Vec<Polar>> {
    let derived = config.derived()?;
    let expected = derived.re_numbers.len();
    for found in [type1.len(), type2.len()] {
        if found != expected {
            return Err(StrakError::PolarCount { expected, found });
        }
    }

    type1
        .iter()
        .zip(type2)
        .zip(&derived.max_re_numbers)
        .map(|((t1, t2), &max_re)| merge_regime_pair(t1, t2, derived.switch_cl, max_re))
        .collect()
}

/// Builds a fresh set on the root polar: evenly spaced points, anchors on its
/// features, equally spaced points in between and the configured weighting.
pub fn build_root_set(root: &Polar, gains: &GainParameters) -> StrakResult<OperatingPointSet> {
    let features = root.features()?;
    let mut set = OperatingPointSet::new();
    generate_evenly_spaced(
        &mut set,
        gains.num_op_points,
        gains.cl_min,
        features.max_lift.cl,
        features.max_lift.alpha,
    )?;
    place_anchors(&mut set, &AnchorTargets::from_features(features))?;
    distribute_intermediate(&mut set)?;
    set_weightings(&mut set, gains.weighting_mode)?;
    Ok(set)
}

/// Reads the preset input file of a strak type. Op points the preset switches
/// off are dropped.
pub fn load_preset(input: &str) -> StrakResult<NamelistDocument> {
    let mut preset = NamelistDocument::parse(input)?;
    let mut set = preset.operating_conditions()?;
    set.remove_deactivated(DEACTIVATED_WEIGHTING);
    preset.set_operating_conditions(&set);
    log::debug!(
        "preset with {} groups and {} active op points",
        preset.groups().len(),
        set.len()
    );
    Ok(preset)
}

/// Op points of one strak airfoil together with what is needed to write its
/// optimizer input file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrakSet {
    pub re: f64,
    pub foil_name: String,
    pub polar_name: String,
    pub input_file_name: String,
    pub op_points: OperatingPointSet,
    pub perturb: Option<InitialPerturb>,
}

impl StrakSet {
    /// The optimizer input file based on `preset`.
    ///
    /// Only the op points of `&operating_conditions` and the perturbation keys
    /// `initial_perturb` and `pso_tol` are replaced; every other group and key
    /// of the preset is kept.
    #[must_use]
    pub fn to_input_file(&self, preset: &NamelistDocument) -> NamelistDocument {
        let mut document = preset.clone();
        if let Some(perturb) = self.perturb {
            document.set_real(OPTIMIZATION_OPTIONS, "initial_perturb", perturb.initial_perturb);
            document.set_real(PARTICLE_SWARM_OPTIONS, "pso_tol", perturb.pso_tol);
        }
        document.set_operating_conditions(&self.op_points);
        document
    }

    /// Input file text without a preset.
    #[must_use]
    pub fn to_namelist(&self) -> String {
        self.to_input_file(&NamelistDocument::new()).to_string()
    }
}

fn re_diff(config: &StrakConfig, re_numbers: &[f64], idx: usize) -> f64 {
    if idx == 0 {
        0.0
    } else if config.use_always_rootfoil {
        re_numbers[0] - re_numbers[idx]
    } else {
        re_numbers[idx - 1] - re_numbers[idx]
    }
}

fn build_strak_set(
    config: &StrakConfig,
    gains: &GainParameters,
    derived: &DerivedValues,
    polars: &[Polar],
    idx: usize,
) -> StrakResult<StrakSet> {
    let root = &polars[0];
    let strak = &polars[idx];
    log::info!("building op points for {}", strak.name);

    let mut set = build_root_set(root, gains)?;
    match config.operating_mode {
        OperatingMode::MatchPolarFoils => adapt_all_to_curve(&mut set, strak)?,
        OperatingMode::Default => {
            adapt_all_to_curve(&mut set, root)?;
            transfer_keep_shape(&mut set, root, strak, idx == 0, gains)?;
        }
    }

    let re = derived.re_numbers[idx];
    let perturb = config
        .adapt_initial_perturb
        .then(|| initial_perturb(re_diff(config, &derived.re_numbers, idx)));

    Ok(StrakSet {
        re,
        foil_name: config.foil_name(idx, re),
        polar_name: strak.name.clone(),
        input_file_name: config.input_file_name(re),
        op_points: set,
        perturb,
    })
}

#[cfg(feature = "parallel")]
fn build_all(
    config: &StrakConfig,
    gains: &GainParameters,
    derived: &DerivedValues,
    polars: &[Polar],
) -> StrakResult<Vec<StrakSet>> {
    (0..polars.len())
        .into_par_iter()
        .map(|idx| build_strak_set(config, gains, derived, polars, idx))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn build_all(
    config: &StrakConfig,
    gains: &GainParameters,
    derived: &DerivedValues,
    polars: &[Polar],
) -> StrakResult<Vec<StrakSet>> {
    (0..polars.len())
        .map(|idx| build_strak_set(config, gains, derived, polars, idx))
        .collect()
}

/// Generates the op point sets of all strak airfoils.
///
/// `polars` are the merged polars, root airfoil first, one per configured
/// Reynolds number. Polars that have not been analyzed yet are analyzed here.
/// Each polar keeps a copy of the set targeting it.
pub fn generate_op_point_sets(config: &StrakConfig, polars: &mut [Polar]) -> StrakResult<Vec<StrakSet>> {
    let derived = config.derived()?;
    if polars.len() != derived.re_numbers.len() {
        return Err(StrakError::PolarCount {
            expected: derived.re_numbers.len(),
            found: polars.len(),
        });
    }
    for polar in polars.iter_mut().filter(|polar| !polar.is_analyzed()) {
        analyze(polar)?;
    }

    let gains = config.gains();
    let sets = build_all(config, &gains, &derived, polars)?;

    for (polar, set) in polars.iter_mut().zip(&sets) {
        polar.op_points = Some(set.op_points.clone());
    }
    log::info!("generated {} op point sets", sets.len());
    Ok(sets)
}
