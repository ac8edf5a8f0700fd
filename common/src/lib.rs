#![cfg_attr(feature = "strict", deny(warnings))]
#![cfg_attr(feature = "strict", deny(clippy::all))]
#![cfg_attr(feature = "strict", deny(missing_docs))]

//! This crate contains everything which might be needed across different tasks inside our project.

mod error;

pub use error::{AwError, AwResult};

pub mod table;
pub use table::{Column, Table, Value};

pub mod logging;
pub mod util;
