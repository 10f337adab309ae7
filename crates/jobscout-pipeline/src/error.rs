//! Pipeline error type: the stages touch both the store and the
//! adapters, so both taxonomies fold in here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Db(#[from] jobscout_db::DbError),

    #[error(transparent)]
    Adapter(#[from] jobscout_core::Error),

    #[error("message payload: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
