use tagscope_domain::{NodeRefError, TagNameError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Access denied: {message}")]
	AccessDenied { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Aggregation of tag scope {scope} failed: {message}")]
	Aggregation { scope: String, message: String },
}
impl From<tagscope_storage::Error> for Error {
	fn from(err: tagscope_storage::Error) -> Self {
		match err {
			tagscope_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			tagscope_storage::Error::Json(inner) => Self::Storage { message: inner.to_string() },
			tagscope_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			tagscope_storage::Error::NotFound(message) => Self::NotFound { message },
			tagscope_storage::Error::Conflict(message) => Self::Conflict { message },
			tagscope_storage::Error::AccessDenied(message) => Self::AccessDenied { message },
		}
	}
}

impl From<TagNameError> for Error {
	fn from(err: TagNameError) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}

impl From<NodeRefError> for Error {
	fn from(err: NodeRefError) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}
