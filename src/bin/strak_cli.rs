#[cfg(target_arch = "wasm32")]
fn main() {
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    native::init_logger();
    if let Err(err) = native::run() {
        eprintln!("strak_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::fs;
    use std::path::{Path, PathBuf};

    use strak_engine::config::{StrakConfig, polar_file_names};
    use strak_engine::oppoints::adapt_all_to_curve;
    use strak_engine::parse::{NamelistDocument, polar_file};
    use strak_engine::polar::{Polar, analyze};
    use strak_engine::strak::{self, merge_regime_pair};
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    const USAGE: &str = r#"strak_cli (strak-engine)

USAGE:
  strak_cli analyze <polar-file>
  strak_cli merge <t1-polar> <t2-polar> --switch-cl <cl> --max-re <re> [--json <path>]
  strak_cli run <strakdata.json> [--polar-dir <dir>] [--preset <file>] [--out-dir <dir>] [--overwrite]
  strak_cli adapt <input-file> <polar-file> [--out <path>] [--overwrite]

COMMANDS:
  analyze   Print max speed, max glide and max lift of a polar
  merge     Merge a Type 1 and a Type 2 polar and print the result's features
  run       Build the optimizer input files of all strak airfoils; the polar
            directory holds T1_Re0.<maxRe/1000>_M0.00_N9.0.txt and
            T2_Re0.<Re/1000>_M0.00_N9.0.txt for every Reynolds number
            (default: <root airfoil>_polars). The input files are based on
            the preset file, by default the first file in inputFolder whose
            name contains strakType
  adapt     Set all targets of an input file to the values of a polar

OPTIONS:
  --overwrite        Overwrite existing output files
  -h, --help         Show this help

Log output is controlled by RUST_LOG (default: info).
"#;

    pub fn init_logger() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .without_time()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_filter(filter),
            )
            .try_init();
    }

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "analyze" => cmd_analyze(&mut args),
            "merge" => cmd_merge(&mut args),
            "run" => cmd_run(&mut args),
            "adapt" => cmd_adapt(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn load_polar(path: &Path) -> Result<Polar, String> {
        let mut polar = polar_file::parse_file(path).map_err(|e| e.to_string())?;
        analyze(&mut polar).map_err(|e| e.to_string())?;
        Ok(polar)
    }

    fn print_features(polar: &Polar) -> Result<(), String> {
        let features = polar.features().map_err(|e| e.to_string())?;
        println!("{} (T{}, Re = {:.0})", polar.name, polar.regime.number(), polar.re);
        println!(
            "  max speed   Cl = {:.4}  Cd = {:.6}",
            features.max_speed.cl, features.max_speed.cd
        );
        println!(
            "  max glide   Cl = {:.4}  Cl/Cd = {:.2}  alpha = {:.2}",
            features.max_glide.cl, features.max_glide.cl_cd, features.max_glide.alpha
        );
        println!(
            "  max lift    Cl = {:.4}  alpha = {:.2}",
            features.max_lift.cl, features.max_lift.alpha
        );
        println!(
            "  pre max lift Cl = {:.4}  alpha = {:.2}",
            features.pre_max_lift.cl, features.pre_max_lift.alpha
        );
        Ok(())
    }

    fn cmd_analyze(args: &mut Args) -> Result<(), String> {
        let path = PathBuf::from(args.next().ok_or("missing polar file")?);
        if let Some(extra) = args.next() {
            return Err(format!("unexpected argument `{extra}`\n\n{USAGE}"));
        }
        print_features(&load_polar(&path)?)
    }

    fn cmd_merge(args: &mut Args) -> Result<(), String> {
        let type1 = PathBuf::from(args.next().ok_or("missing Type 1 polar")?);
        let type2 = PathBuf::from(args.next().ok_or("missing Type 2 polar")?);

        let mut switch_cl: Option<f64> = None;
        let mut max_re: Option<f64> = None;
        let mut json_path: Option<PathBuf> = None;
        let mut overwrite = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--switch-cl" => switch_cl = Some(args.number("--switch-cl")?),
                "--max-re" => max_re = Some(args.number("--max-re")?),
                "--json" => json_path = Some(PathBuf::from(args.value("--json")?)),
                "--overwrite" => overwrite = true,
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let type1 = load_polar(&type1)?;
        let type2 = load_polar(&type2)?;
        let switch_cl = switch_cl.ok_or("missing --switch-cl")?;
        let max_re = max_re.unwrap_or(type1.re);

        let merged = merge_regime_pair(&type1, &type2, switch_cl, max_re).map_err(|e| e.to_string())?;
        print_features(&merged)?;

        if let Some(path) = json_path {
            let json = serde_json::to_string_pretty(&merged).map_err(|e| e.to_string())?;
            write_text_file(&path, &json, overwrite)?;
        }
        Ok(())
    }

    fn cmd_run(args: &mut Args) -> Result<(), String> {
        let config_path = PathBuf::from(args.next().ok_or("missing strak data file")?);

        let mut polar_dir: Option<PathBuf> = None;
        let mut preset_path: Option<PathBuf> = None;
        let mut out_dir: Option<PathBuf> = None;
        let mut overwrite = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--polar-dir" => polar_dir = Some(PathBuf::from(args.value("--polar-dir")?)),
                "--preset" => preset_path = Some(PathBuf::from(args.value("--preset")?)),
                "--out-dir" => out_dir = Some(PathBuf::from(args.value("--out-dir")?)),
                "--overwrite" => overwrite = true,
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let config = StrakConfig::from_file(&config_path).map_err(|e| e.to_string())?;
        let polar_dir = polar_dir.unwrap_or_else(|| PathBuf::from(config.polar_dir_name()));
        let preset_path = match preset_path {
            Some(path) => Some(path),
            None => find_preset(&config)?,
        };
        let preset = match &preset_path {
            Some(path) => {
                let text =
                    fs::read_to_string(path).map_err(|e| format!("read {}: {e}", path.display()))?;
                log::info!("using preset {}", path.display());
                strak::load_preset(&text).map_err(|e| e.to_string())?
            }
            None => {
                log::warn!("no inputFolder configured, writing input files without a preset");
                NamelistDocument::new()
            }
        };
        let out_dir = out_dir.unwrap_or_else(|| PathBuf::from(&config.output_folder));
        let derived = config.derived().map_err(|e| e.to_string())?;

        let mut type1 = Vec::with_capacity(derived.re_numbers.len());
        let mut type2 = Vec::with_capacity(derived.re_numbers.len());
        for (&re, &max_re) in derived.re_numbers.iter().zip(&derived.max_re_numbers) {
            let (t1_name, t2_name) = polar_file_names(re, max_re);
            type1.push(polar_file::parse_file(polar_dir.join(t1_name)).map_err(|e| e.to_string())?);
            type2.push(polar_file::parse_file(polar_dir.join(t2_name)).map_err(|e| e.to_string())?);
        }

        let mut merged = strak::merge_all(&config, &type1, &type2).map_err(|e| e.to_string())?;
        let sets = strak::generate_op_point_sets(&config, &mut merged).map_err(|e| e.to_string())?;

        for set in &sets {
            let path = out_dir.join(&set.input_file_name);
            let text = set.to_input_file(&preset).to_string();
            write_text_file(&path, &text, overwrite)?;
            println!("{} ({}) -> {}", set.foil_name, set.polar_name, path.display());
        }
        Ok(())
    }

    /// First file in the input folder, by name, that belongs to the
    /// configured strak type.
    fn find_preset(config: &StrakConfig) -> Result<Option<PathBuf>, String> {
        if config.input_folder.is_empty() {
            return Ok(None);
        }
        let folder = Path::new(&config.input_folder);
        let entries = fs::read_dir(folder).map_err(|e| format!("read {}: {e}", folder.display()))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| format!("read {}: {e}", folder.display()))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        names
            .into_iter()
            .find(|name| config.is_preset_file(name))
            .map(|name| Some(folder.join(name)))
            .ok_or_else(|| {
                format!(
                    "no preset file for strak type `{}` in {}",
                    config.strak_type,
                    folder.display()
                )
            })
    }

    fn cmd_adapt(args: &mut Args) -> Result<(), String> {
        let input_path = PathBuf::from(args.next().ok_or("missing input file")?);
        let polar_path = PathBuf::from(args.next().ok_or("missing polar file")?);

        let mut out_path: Option<PathBuf> = None;
        let mut overwrite = false;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--out" => out_path = Some(PathBuf::from(args.value("--out")?)),
                "--overwrite" => overwrite = true,
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let input = fs::read_to_string(&input_path)
            .map_err(|e| format!("read {}: {e}", input_path.display()))?;
        let mut document = strak::load_preset(&input).map_err(|e| e.to_string())?;
        let mut set = document.operating_conditions().map_err(|e| e.to_string())?;
        let polar = load_polar(&polar_path)?;
        adapt_all_to_curve(&mut set, &polar).map_err(|e| e.to_string())?;
        document.set_operating_conditions(&set);

        let text = document.to_string();
        match out_path {
            Some(path) => write_text_file(&path, &text, overwrite),
            None => {
                print!("{text}");
                Ok(())
            }
        }
    }

    fn write_text_file(path: &Path, text: &str, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }
        fs::write(path, text).map_err(|e| format!("write {}: {e}", path.display()))
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next()
                .ok_or_else(|| format!("missing value for {flag}"))
        }

        fn number(&mut self, flag: &str) -> Result<f64, String> {
            let value = self.value(flag)?;
            value
                .parse()
                .map_err(|e| format!("invalid value `{value}` for {flag}: {e}"))
        }
    }
}
