#![deny(warnings, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analysis;
pub mod classification;
pub mod classifier;
pub mod config;
pub mod corpus;
pub mod evaluation;
pub mod fixtures;
pub mod observability;
pub mod pipeline;
pub mod sampling;
pub mod util;
