//! Text formats read and written by the strak engine.

pub mod namelist;
pub mod polar_file;

pub use namelist::{
    MAX_OP_POINTS, NamelistDocument, NamelistError, NamelistGroup, parse_operating_conditions,
    write_operating_conditions,
};
pub use polar_file::ParseError;
