/*! The data model: category codes, characters, tokens and units. */

pub mod catcodes;
pub mod characters;
pub mod tokens;
pub mod units;
