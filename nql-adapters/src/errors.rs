use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("engine error: {0}")]
    Engine(#[from] nql_core::EngineError),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, AdapterError>;
