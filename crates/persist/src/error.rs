/// Errors from pet record persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("schema version mismatch: file has v{file_version}, expected at most v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("stored record for {owner} is unreadable: {reason}")]
    Corrupt { owner: String, reason: String },
    #[error("no storage backend is available")]
    NoBackendAvailable,
    #[error("persistence worker has stopped")]
    WorkerGone,
}
