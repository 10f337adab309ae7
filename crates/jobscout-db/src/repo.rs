//! Repository traits and PostgreSQL implementations.

pub mod job;
pub mod logs;
pub mod run;
pub mod settings;

pub use job::{JobRepo, JobRecord, PgJobRepo};
pub use logs::{LogRecord, LogRepo, PgLogRepo};
pub use run::{PgRunRepo, RunRecord, RunRepo};
pub use settings::{CompanySettingRecord, PgSettingsRepo, SettingsRepo};
