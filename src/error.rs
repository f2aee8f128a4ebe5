//! Error types for the sync engine.
//!
//! `SyncError` carries a closed [`ErrorKind`] plus a human-readable message
//! and an optional retryable flag, per the error handling design: within a
//! component, recover from transient IO; across component boundaries,
//! surface the typed error rather than a string.

use std::error::Error as StdError;
use std::fmt;
use std::io;

use crate::exclusion::ExclusionError;
use crate::validation::ValidationError;

/// The closed set of error kinds propagated across component boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Io,
	Network,
	ProtocolViolation,
	/// Hash or chunk mismatch.
	Integrity,
	/// Rate-limit, replay, unpaired peer.
	Policy,
	Conflict,
	NotFound,
	Cancelled,
	TimedOut,
	/// Sanitization / bounds failure in persisted configuration.
	Config,
	/// Retries, disk space, or queue capacity exhausted.
	Exhausted,
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ErrorKind::Io => "io",
			ErrorKind::Network => "network",
			ErrorKind::ProtocolViolation => "protocol_violation",
			ErrorKind::Integrity => "integrity",
			ErrorKind::Policy => "policy",
			ErrorKind::Conflict => "conflict",
			ErrorKind::NotFound => "not_found",
			ErrorKind::Cancelled => "cancelled",
			ErrorKind::TimedOut => "timed_out",
			ErrorKind::Config => "config",
			ErrorKind::Exhausted => "exhausted",
		};
		write!(f, "{s}")
	}
}

/// The unified error type for sync operations.
#[derive(Debug, Clone)]
pub struct SyncError {
	pub kind: ErrorKind,
	pub message: String,
	pub retryable: bool,
}

impl SyncError {
	pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
		SyncError { kind, message: message.into(), retryable: false }
	}

	pub fn retryable(mut self) -> Self {
		self.retryable = true;
		self
	}

	pub fn io(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Io, message).retryable()
	}

	pub fn not_found(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::NotFound, message)
	}

	pub fn network(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Network, message).retryable()
	}

	pub fn integrity(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Integrity, message).retryable()
	}

	pub fn policy(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Policy, message)
	}

	pub fn config(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Config, message)
	}

	pub fn protocol_violation(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::ProtocolViolation, message)
	}

	pub fn exhausted(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Exhausted, message)
	}

	pub fn cancelled() -> Self {
		Self::new(ErrorKind::Cancelled, "operation cancelled")
	}

	pub fn timed_out(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::TimedOut, message).retryable()
	}

	pub fn conflict(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Conflict, message)
	}

	/// Whether a user-visible retry loop should keep trying this error,
	/// per the error handling design's user-visible retry policy.
	pub fn is_retryable(&self) -> bool {
		self.retryable
			|| matches!(self.kind, ErrorKind::Network | ErrorKind::TimedOut)
	}

	/// Fatal errors are reported and, if peer-sourced, bar that peer for
	/// the session rather than being retried.
	pub fn is_fatal(&self) -> bool {
		matches!(self.kind, ErrorKind::Config | ErrorKind::Policy | ErrorKind::ProtocolViolation)
	}
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.kind, self.message)
	}
}

impl StdError for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		match e.kind() {
			io::ErrorKind::NotFound => SyncError::not_found(e.to_string()),
			io::ErrorKind::TimedOut => SyncError::timed_out(e.to_string()),
			_ => SyncError::io(e.to_string()),
		}
	}
}

impl From<ExclusionError> for SyncError {
	fn from(e: ExclusionError) -> Self {
		SyncError::new(ErrorKind::Config, e.to_string())
	}
}

impl From<ValidationError> for SyncError {
	fn from(e: ValidationError) -> Self {
		SyncError::new(ErrorKind::Config, e.to_string())
	}
}

impl From<redb::Error> for SyncError {
	fn from(e: redb::Error) -> Self {
		SyncError::io(e.to_string())
	}
}

impl From<redb::DatabaseError> for SyncError {
	fn from(e: redb::DatabaseError) -> Self {
		SyncError::io(e.to_string())
	}
}

impl From<redb::TransactionError> for SyncError {
	fn from(e: redb::TransactionError) -> Self {
		SyncError::io(e.to_string())
	}
}

impl From<redb::TableError> for SyncError {
	fn from(e: redb::TableError) -> Self {
		SyncError::io(e.to_string())
	}
}

impl From<redb::StorageError> for SyncError {
	fn from(e: redb::StorageError) -> Self {
		SyncError::io(e.to_string())
	}
}

impl From<redb::CommitError> for SyncError {
	fn from(e: redb::CommitError) -> Self {
		SyncError::io(e.to_string())
	}
}

impl From<serde_json::Error> for SyncError {
	fn from(e: serde_json::Error) -> Self {
		SyncError::config(e.to_string())
	}
}

impl From<toml::de::Error> for SyncError {
	fn from(e: toml::de::Error) -> Self {
		SyncError::config(e.to_string())
	}
}


// vim: ts=4
