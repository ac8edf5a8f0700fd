#![cfg_attr(feature = "strict", deny(warnings))]
#![cfg_attr(feature = "strict", deny(clippy::all))]
#![cfg_attr(feature = "strict", deny(missing_docs))]

//! This crate matches the date column of a [common::Table] against a list of date ranges and keeps
//! the rows which fall into one of them, annotated with the first range they matched.

pub mod bounds;
pub use bounds::{classify_ranges, RangeBounds};

mod matcher;
pub use matcher::*;
