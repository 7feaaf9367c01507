//! Output formatting
//!
//! - `text`: human-readable report on stdout
//! - `json`: machine-readable report file
//!
//! Both walk the result table in ascending partition id and take partition
//! names from the dataset.

pub mod json;
pub mod text;
