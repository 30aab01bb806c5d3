//! Reader for XFOIL polar files.
//!
//! ```text
//!  Calculated polar for: RG15
//!
//!  1 1 Reynolds number fixed          Mach number fixed
//!
//!  Mach =   0.000     Re =     0.450 e 6     Ncrit =   9.000
//!
//!   alpha    CL        CD       CDp       Cm    Top_Xtr  Bot_Xtr
//!  ------ -------- --------- --------- -------- -------- --------
//!   -2.000  -0.0812   0.00869   0.00302  -0.0471   0.8931   0.1442
//! ```

use std::fs;
use std::num::ParseFloatError;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::polar::{Polar, PolarRow, Regime};

const AIRFOIL_NAME_TAG: &str = "Calculated polar for:";
const REYNOLDS_TAG: &str = "Re =";
const NCRIT_TAG: &str = "Ncrit =";
const DATA_SECTION_TAG: &str = "-------";
const TYPE1_TAG: &str = "Reynolds number fixed";
const TYPE2_TAG: &str = "1/sqrt(CL)";
const COLUMNS: usize = 7;

/// Result type for polar file parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors raised while reading a polar file.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: invalid number: {source}")]
    Number {
        line: usize,
        #[source]
        source: ParseFloatError,
    },
    #[error("line {line}: malformed Reynolds number `{text}`")]
    Reynolds { line: usize, text: String },
    #[error("line {line}: expected 7 columns, found {found}")]
    MissingColumns { line: usize, found: usize },
    #[error("line {line}: drag is zero")]
    ZeroDrag { line: usize },
    #[error("polar contains no data section")]
    NoData,
}

/// Parses the text of a polar file. The polar is named after the airfoil.
pub fn parse_str(input: &str) -> ParseResult<Polar> {
    let mut polar = Polar::new("", Regime::Type2, 0.0);
    polar.airfoil_name = "airfoil".to_owned();
    let mut in_data = false;

    for (idx, raw) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();

        if in_data {
            if line.is_empty() {
                continue;
            }
            polar.push_row(parse_row(line, line_no)?);
            continue;
        }

        if let Some((_, name)) = line.split_once(AIRFOIL_NAME_TAG) {
            polar.airfoil_name = name.trim().to_owned();
        }
        if line.contains(TYPE1_TAG) {
            polar.regime = Regime::Type1;
        } else if line.contains(TYPE2_TAG) {
            polar.regime = Regime::Type2;
        }
        if let Some((_, rest)) = line.split_once(REYNOLDS_TAG) {
            let text = rest.split(NCRIT_TAG).next().unwrap_or_default().trim();
            polar.re = parse_reynolds(text).ok_or_else(|| ParseError::Reynolds {
                line: line_no,
                text: text.to_owned(),
            })?;
        }
        if let Some((_, rest)) = line.split_once(NCRIT_TAG) {
            if let Some(value) = rest.split_whitespace().next() {
                polar.ncrit = parse_number(value, line_no)?;
            }
        }
        if line.contains(DATA_SECTION_TAG) {
            in_data = true;
        }
    }

    if !in_data {
        return Err(ParseError::NoData);
    }
    polar.name = polar.airfoil_name.clone();
    log::debug!(
        "parsed polar of {} (T{}, Re = {:.0}) with {} rows",
        polar.airfoil_name,
        polar.regime.number(),
        polar.re,
        polar.len()
    );
    Ok(polar)
}

/// Reads a polar file; the polar is named after the file.
pub fn parse_file(path: impl AsRef<Path>) -> ParseResult<Polar> {
    let path = path.as_ref();
    log::info!("importing polar {}", path.display());
    let input = fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut polar = parse_str(&input)?;
    if let Some(stem) = path.file_stem() {
        polar.name = stem.to_string_lossy().into_owned();
    }
    Ok(polar)
}

/// `0.150 e 6` and plain `150000` are both accepted.
fn parse_reynolds(text: &str) -> Option<f64> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let compact = compact.to_ascii_lowercase();
    match compact.split_once('e') {
        Some((mantissa, exponent)) => {
            let mantissa: f64 = mantissa.parse().ok()?;
            let exponent: i32 = exponent.parse().ok()?;
            Some(mantissa * 10f64.powi(exponent))
        }
        None => compact.parse().ok(),
    }
}

fn parse_number(text: &str, line: usize) -> ParseResult<f64> {
    text.parse()
        .map_err(|source| ParseError::Number { line, source })
}

fn parse_row(line: &str, line_no: usize) -> ParseResult<PolarRow> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < COLUMNS {
        return Err(ParseError::MissingColumns {
            line: line_no,
            found: fields.len(),
        });
    }

    let mut values = [0.0; COLUMNS];
    for (value, field) in values.iter_mut().zip(&fields) {
        *value = parse_number(field, line_no)?;
    }
    let [alpha, cl, cd, cdp, cm, top_xtr, bot_xtr] = values;
    if cd == 0.0 {
        return Err(ParseError::ZeroDrag { line: line_no });
    }
    Ok(PolarRow::new(alpha, cl, cd).with_details(cdp, cm, top_xtr, bot_xtr))
}
