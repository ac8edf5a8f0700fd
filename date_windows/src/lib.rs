#![cfg_attr(feature = "strict", deny(warnings))]
#![cfg_attr(feature = "strict", deny(clippy::all))]
#![cfg_attr(feature = "strict", deny(missing_docs))]

//! This crate computes weekday aligned date windows, e.g. "the last four weeks, in each of the last
//! ten years". All functions take the reference date explicitly and never look at the clock.

mod generator;
pub use generator::*;

pub mod request;
pub use request::{
    window_to_bounds, window_to_strings, BoundRepresentation, NextWeeks, PreviousWeeks, WindowRequest,
};
