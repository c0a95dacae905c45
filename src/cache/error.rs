use bb8_redis::bb8;
use bb8_redis::redis;
use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    ConnectionError(String),

    #[error("cache serialization error: {0}")]
    SerializationError(String),

    #[error("cache operation error: {0}")]
    OperationError(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(error: redis::RedisError) -> Self {
        CacheError::OperationError(error.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(error: serde_json::Error) -> Self {
        CacheError::SerializationError(error.to_string())
    }
}

impl From<bb8::RunError<redis::RedisError>> for CacheError {
    fn from(error: bb8::RunError<redis::RedisError>) -> Self {
        CacheError::ConnectionError(error.to_string())
    }
}
