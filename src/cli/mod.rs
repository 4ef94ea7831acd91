//! Terminal output
//!
//! Human-readable rendering of scheduler progress.

pub mod display;

pub use display::CycleDisplay;
