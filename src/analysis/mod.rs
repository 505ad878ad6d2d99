//! Turns stored focus events into time allocations.
//!
//! Everything except [report] is pure and synchronous: callers fetch events first and pass them
//! in. [report] is the glue that fetches from the stores and runs the rest.

pub mod categories;
pub mod durations;
pub mod error;
pub mod report;
pub mod summary;
