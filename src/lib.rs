//! Turns recorded window focus and keyboard activity into reports: time per app, time per
//! category according to user rules and an activity heatmap over a range of days.
//!

pub mod analysis;
pub mod cli;
pub mod fs;
pub mod storage;
pub mod utils;
