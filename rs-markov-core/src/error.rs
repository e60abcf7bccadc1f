use thiserror::Error;

/// Errors raised inside the crate.
///
/// Training and generation never fail; these only surface from model
/// construction, merging, configuration and persistence. `ModelStore` logs
/// them and turns them into `false` / `None` at its public boundary.
#[derive(Error, Debug)]
pub enum ChainError {
	/// A model was built with an order below 2.
	#[error("order must be >= 2, got {0}")]
	InvalidOrder(usize),
	/// Two models of different orders were merged.
	#[error("order mismatch: expected {expected}, got {got}")]
	OrderMismatch {
		/// Order of the receiving model
		expected: usize,
		/// Order of the merged model
		got: usize,
	},
	/// File system failure.
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
	/// JSON encoding or decoding failure.
	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),
	/// Binary snapshot encoding or decoding failure.
	#[error("binary snapshot error: {0}")]
	Binary(#[from] postcard::Error),
	/// Invalid TOML configuration.
	#[error("config error: {0}")]
	Config(#[from] toml::de::Error),
	/// The temporary file could not replace the target.
	#[error("persist error: {0}")]
	Persist(#[from] tempfile::PersistError),
	/// A persisted payload has no `chain` field.
	#[error("payload has no chain")]
	MissingChain,
	/// A persisted context key does not hold `order - 1` words.
	#[error("context key {key:?} does not have {expected} words")]
	MalformedKey {
		/// Offending key
		key: String,
		/// Word count required by the order
		expected: usize,
	},
}

/// Result alias over [`ChainError`].
pub type Result<T> = std::result::Result<T, ChainError>;
