use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("unsupported {database} schema version v{version} (latest known is v{latest})")]
    UnsupportedDatabaseVersion {
        database: String,
        version: usize,
        latest: usize,
    },

    #[error("no upgrade table registered for any prefix of '{0}'")]
    UnknownUpgradeNamespace(String),

    #[error("template '{template}' does not contain placeholder '{{{keyword}}}'")]
    MissingPlaceholder { template: String, keyword: String },

    #[error("client error: {0}")]
    Client(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),
}
