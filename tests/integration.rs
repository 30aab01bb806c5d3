use std::fmt::Write as _;

use strak_engine::StrakEngine;
use strak_engine::config::StrakConfig;
use strak_engine::oppoints::{OpMode, names};
use strak_engine::parse::{NamelistDocument, namelist, polar_file};
use strak_engine::polar::{Polar, Regime};
use strak_engine::strak::{self, StrakError};

const STRAK_DATA: &str = r#"{
    "ReNumbers": [150000, 100000],
    "maxReFactor": 3.0,
    "numOpPoints": 16,
    "useAlwaysRootfoil": "false",
    "adaptInitialPerturb": "true",
    "weighting_mode": "constant"
}"#;

fn lift(step: u32) -> f64 {
    match step {
        0..=12 => f64::from(step) / 10.0,
        13 => 1.26,
        14 => 1.27,
        _ => 1.22,
    }
}

/// XFOIL polar text with a parabolic drag curve around Cl = 0.4.
fn polar_text(regime: Regime, re_text: &str, drag_factor: f64) -> String {
    let header = match regime {
        Regime::Type1 => " 1 1 Reynolds number fixed          Mach number fixed",
        Regime::Type2 => " 2 2 Reynolds number ~ 1/sqrt(CL)   Mach number fixed",
    };
    let mut text = format!(
        "\n       XFOIL         Version 6.99\n\n Calculated polar for: JX-GP-055\n\n{header}\n\n \
         xtrf =   1.000 (top)        1.000 (bottom)\n \
         Mach =   0.000     Re =     {re_text}     Ncrit =   9.000\n\n  \
         alpha    CL        CD       CDp       Cm    Top_Xtr  Bot_Xtr\n \
         ------ -------- --------- --------- -------- -------- --------\n"
    );
    for step in 0..16 {
        let alpha = f64::from(step) - 2.0;
        let cl = lift(step);
        let cd = (0.006 + 0.01 * (cl - 0.4) * (cl - 0.4)) * drag_factor;
        let _ = writeln!(
            text,
            "{alpha:8.3}{cl:9.4}{cd:10.5}{:10.5}{:9.4}{:9.4}{:9.4}",
            cd * 0.4,
            -0.05,
            0.8,
            0.2
        );
    }
    text
}

fn polar_pairs() -> Vec<(Polar, Polar)> {
    vec![
        (
            polar_file::parse_str(&polar_text(Regime::Type1, "0.450 e 6", 0.8)).unwrap(),
            polar_file::parse_str(&polar_text(Regime::Type2, "0.150 e 6", 1.0)).unwrap(),
        ),
        (
            polar_file::parse_str(&polar_text(Regime::Type1, "0.300 e 6", 0.9)).unwrap(),
            polar_file::parse_str(&polar_text(Regime::Type2, "0.100 e 6", 1.2)).unwrap(),
        ),
    ]
}

#[test]
fn polar_files_are_parsed_with_regime() {
    let (type1, type2) = polar_pairs().remove(0);
    assert_eq!(type1.regime, Regime::Type1);
    assert_eq!(type2.regime, Regime::Type2);
    assert!((type1.re - 450_000.0).abs() < 1e-6);
    assert_eq!(type2.len(), 16);
    assert_eq!(type2.airfoil_name, "JX-GP-055");
}

#[test]
fn engine_runs_the_whole_strak() {
    let mut engine = StrakEngine::new();
    engine.configure(STRAK_DATA).unwrap();
    for (type1, type2) in polar_pairs() {
        engine.push_polar_pair(type1, type2);
    }

    let sets = engine.run().unwrap().to_vec();
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].input_file_name, "i-strak_150k.txt");
    assert_eq!(sets[1].input_file_name, "i-strak_100k.txt");

    let merged = engine.merged_polars();
    assert_eq!(
        merged[0].name,
        "mergedPolar T1/T2, ReSqrt(Cl) = 150000, Re = 450000"
    );
    assert!((merged[0].switch_cl - 1.0 / 9.0).abs() < 1e-12);
    assert!(merged.iter().all(|polar| polar.op_points.is_some()));

    for set in &sets {
        let anchors = set.op_points.require_anchors().unwrap();
        assert!(anchors.max_speed() < anchors.max_glide());
        assert!(anchors.max_glide() < anchors.pre_max_lift());
        assert!(anchors.pre_max_lift() < anchors.max_lift());
        assert_eq!(set.op_points.len(), 16);
        assert_eq!(set.op_points.mode(names::MAX_LIFT), Some(OpMode::SpecAlpha));
    }

    // points below the switch lift run at the Type 1 Reynolds number
    assert_eq!(sets[0].op_points.points()[0].reynolds, Some(450_000.0));
    assert_eq!(sets[1].op_points.points()[0].reynolds, Some(450_000.0));
    assert_eq!(
        sets[0].op_points.point(names::MAX_GLIDE).unwrap().reynolds,
        None
    );

    // the strak airfoil has more drag, so its speed targets rise
    let root_speed = sets[0].op_points.target(names::MAX_SPEED).unwrap();
    let tip_speed = sets[1].op_points.target(names::MAX_SPEED).unwrap();
    assert!(tip_speed > root_speed);

    let perturb = sets[1].perturb.unwrap();
    assert!((perturb.initial_perturb - 0.002 - 0.008 / 6.0).abs() < 1e-12);
    assert_eq!(perturb.pso_tol, 0.0005);
}

#[test]
fn engine_needs_config_and_matching_polars() {
    let mut engine = StrakEngine::new();
    assert!(matches!(engine.run(), Err(StrakError::Config(_))));

    engine.configure(STRAK_DATA).unwrap();
    let (type1, type2) = polar_pairs().remove(0);
    assert_eq!(engine.push_polar_pair(type1, type2), 1);
    assert!(matches!(
        engine.run(),
        Err(StrakError::PolarCount {
            expected: 2,
            found: 1
        })
    ));
}

#[test]
fn input_file_reads_back() {
    let config = StrakConfig::from_json_str(STRAK_DATA).unwrap();
    let (type1, type2): (Vec<Polar>, Vec<Polar>) = polar_pairs().into_iter().unzip();
    let mut merged = strak::merge_all(&config, &type1, &type2).unwrap();
    let sets = strak::generate_op_point_sets(&config, &mut merged).unwrap();

    let text = sets[1].to_namelist();
    assert!(text.contains("&particle_swarm_options"));
    assert!(text.contains("reynolds(1) = 450000.0"));

    let reread = namelist::parse_operating_conditions(&text).unwrap();
    let written = &sets[1].op_points;
    assert_eq!(reread.len(), written.len());
    for (read, original) in reread.points().iter().zip(written.points()) {
        assert_eq!(read.mode, original.mode);
        assert_eq!(read.goal, original.goal);
        assert_eq!(read.value, original.value);
        assert_eq!(read.target, original.target);
        assert_eq!(read.reynolds, original.reynolds);
    }
}

#[test]
fn engine_writes_input_files_from_a_preset() {
    const PRESET: &str = "
! F3F preset
&optimization_options
  search_type = 'global'
  initial_perturb = 0.0025
/
&operating_conditions
  noppoint = 3
  op_mode = 'spec-cl', 'spec-cl', 'spec-al'
  op_point = 0.1, 0.2, 10.0
  weighting = 1.0, 0.0005, 1.0
  re_default_as_resqrtcl = .true.
/
&particle_swarm_options
  pso_pop = 30
  pso_tol = 0.001
/
&xfoil_run_options
  ncrit = 9.0
/
";
    let preset = strak::load_preset(PRESET).unwrap();
    assert_eq!(preset.operating_conditions().unwrap().len(), 2);

    let mut engine = StrakEngine::new();
    engine.configure(STRAK_DATA).unwrap();
    engine.set_preset(preset);
    for (type1, type2) in polar_pairs() {
        engine.push_polar_pair(type1, type2);
    }
    engine.run().unwrap();

    let text = engine.namelist(1).unwrap();
    let document = NamelistDocument::parse(&text).unwrap();
    let names: Vec<&str> = document.groups().iter().map(|group| group.name()).collect();
    assert_eq!(
        names,
        ["optimization_options", "operating_conditions", "particle_swarm_options", "xfoil_run_options"]
    );
    assert!(text.contains("pso_pop = 30"));
    assert!(text.contains("ncrit = 9.0"));
    assert!(text.contains("re_default_as_resqrtcl = .true."));
    assert!(!text.contains("initial_perturb = 0.0025"));
    assert!(!text.contains("pso_tol = 0.001\n"));

    let reread = document.operating_conditions().unwrap();
    assert_eq!(reread.len(), engine.sets()[1].op_points.len());
}
