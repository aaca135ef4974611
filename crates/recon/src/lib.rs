//! `tally-recon`: Phone-keyed lead/payment reconciliation engine.
//!
//! Pure engine crate: receives decoded sheets, returns attributed rows and a
//! channel report. No CLI or IO dependencies.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod locate;
pub mod model;
pub mod normalize;
pub mod plan;
pub mod select;
pub mod table;

pub use aggregate::{aggregate, Bucket, BucketRules, Percent, Report};
pub use config::RunConfig;
pub use engine::{reconcile, run};
pub use error::ReconError;
pub use locate::{FieldKind, Locator};
pub use model::{InputFile, OutputRow, ReconInput, ReconResult, RunOutcome, SourceTable};
pub use normalize::{normalize_amount, normalize_phone, NormalizedPhone, PhoneLocale};
pub use table::{Cell, RawSheet, Row, Table};
