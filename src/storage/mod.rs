//!  Storage is organized through [event_store::FileEventStore] and [settings::SettingsStore].
//!  The basic idea is:
//!   - Events are written by an external capture daemon (or `focuslog import`) and never edited
//!     by the reports.
//!   - Records are grouped by logical date: one file per table and date.
//!   - Settings live in a single json file next to the records.

pub mod entities;
pub mod event_store;
pub mod settings;
