#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod oppoints;
pub mod parse;
pub mod polar;
pub mod strak;

use std::fmt;

use config::{ConfigError, StrakConfig};
use parse::{NamelistDocument, polar_file};
use polar::Polar;
use serde::Serialize;
use strak::{StrakResult, StrakSet};
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            // no-op fallback when panic hook is disabled
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {
    // no-op fallback when debug logs are disabled
}

/// Characteristic values of a merged polar, as handed to the UI.
#[derive(Debug, Serialize)]
struct PolarSummary<'a> {
    name: &'a str,
    re: f64,
    max_re: f64,
    switch_cl: f64,
    max_speed_cl: f64,
    max_speed_cd: f64,
    max_glide_cl: f64,
    max_glide_ratio: f64,
    max_lift_cl: f64,
    max_lift_alpha: f64,
}

impl<'a> PolarSummary<'a> {
    fn from_polar(polar: &'a Polar) -> Option<Self> {
        let features = polar.features().ok()?;
        Some(Self {
            name: &polar.name,
            re: polar.re,
            max_re: polar.max_re,
            switch_cl: polar.switch_cl,
            max_speed_cl: features.max_speed.cl,
            max_speed_cd: features.max_speed.cd,
            max_glide_cl: features.max_glide.cl,
            max_glide_ratio: features.max_glide.cl_cd,
            max_lift_cl: features.max_lift.cl,
            max_lift_alpha: features.max_lift.alpha,
        })
    }
}

/// Public entry point for consumers.
///
/// Polar pairs are added root airfoil first, in the order of the configured
/// Reynolds numbers.
#[wasm_bindgen]
#[derive(Debug, Default)]
pub struct StrakEngine {
    config: Option<StrakConfig>,
    type1: Vec<Polar>,
    type2: Vec<Polar>,
    merged: Vec<Polar>,
    sets: Vec<StrakSet>,
    preset: Option<NamelistDocument>,
}

#[wasm_bindgen]
impl StrakEngine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> StrakEngine {
        StrakEngine::default()
    }

    /// Loads strak data JSON; previous results are discarded.
    #[wasm_bindgen]
    pub fn load_config(&mut self, json: &str) -> Result<(), JsValue> {
        self.configure(json).map_err(to_js_error)
    }

    /// Loads the preset input file the optimizer input files are based on.
    #[wasm_bindgen]
    pub fn load_preset(&mut self, text: &str) -> Result<(), JsValue> {
        let preset = strak::load_preset(text).map_err(to_js_error)?;
        self.set_preset(preset);
        Ok(())
    }

    /// Adds the Type 1 and Type 2 polar files of the next Reynolds number and
    /// returns the number of pairs loaded so far.
    #[wasm_bindgen]
    pub fn add_polar_pair(&mut self, type1: &str, type2: &str) -> Result<usize, JsValue> {
        let type1 = polar_file::parse_str(type1).map_err(to_js_error)?;
        let type2 = polar_file::parse_str(type2).map_err(to_js_error)?;
        Ok(self.push_polar_pair(type1, type2))
    }

    #[wasm_bindgen]
    pub fn clear_polars(&mut self) {
        self.type1.clear();
        self.type2.clear();
        self.merged.clear();
        self.sets.clear();
    }

    /// Merges the polar pairs and builds the op point sets of all airfoils.
    #[wasm_bindgen]
    pub fn synthesize(&mut self) -> Result<JsValue, JsValue> {
        let sets = self.run().map_err(to_js_error)?;
        serde_wasm_bindgen::to_value(sets).map_err(|err| JsError::new(&err.to_string()).into())
    }

    /// Feature summary of every merged polar.
    #[wasm_bindgen]
    pub fn get_polars(&self) -> Result<JsValue, JsValue> {
        let summaries: Vec<PolarSummary<'_>> = self
            .merged
            .iter()
            .filter_map(PolarSummary::from_polar)
            .collect();
        serde_wasm_bindgen::to_value(&summaries).map_err(|err| JsError::new(&err.to_string()).into())
    }

    /// Optimizer input file of the airfoil at `index`, based on the preset
    /// when one is loaded.
    #[wasm_bindgen]
    pub fn namelist(&self, index: usize) -> Result<String, JsValue> {
        let Some(set) = self.sets.get(index) else {
            return Err(js_error("no op point set at this index, run synthesize first"));
        };
        Ok(match &self.preset {
            Some(preset) => set.to_input_file(preset).to_string(),
            None => set.to_namelist(),
        })
    }
}

impl StrakEngine {
    pub fn configure(&mut self, json: &str) -> StrakResult<()> {
        let config = StrakConfig::from_json_str(json)?;
        self.config = Some(config);
        self.merged.clear();
        self.sets.clear();
        Ok(())
    }

    pub fn set_preset(&mut self, preset: NamelistDocument) {
        log::debug!("preset loaded with {} groups", preset.groups().len());
        self.preset = Some(preset);
    }

    #[must_use]
    pub fn preset(&self) -> Option<&NamelistDocument> {
        self.preset.as_ref()
    }

    pub fn push_polar_pair(&mut self, type1: Polar, type2: Polar) -> usize {
        self.type1.push(type1);
        self.type2.push(type2);
        self.merged.clear();
        self.sets.clear();
        self.type1.len()
    }

    pub fn run(&mut self) -> StrakResult<&[StrakSet]> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("no strak data loaded".to_owned()))?;

        let mut merged = strak::merge_all(config, &self.type1, &self.type2)?;
        let sets = strak::generate_op_point_sets(config, &mut merged)?;
        self.merged = merged;
        self.sets = sets;
        Ok(&self.sets)
    }

    #[must_use]
    pub fn config(&self) -> Option<&StrakConfig> {
        self.config.as_ref()
    }

    #[must_use]
    pub fn merged_polars(&self) -> &[Polar] {
        &self.merged
    }

    #[must_use]
    pub fn sets(&self) -> &[StrakSet] {
        &self.sets
    }
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
        JsValue::NULL
    }
}
