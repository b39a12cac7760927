/// Admission filters for newly launched tokens

pub mod filter;

pub use filter::FilterEngine;
