use llrt_gc::{AllocationError, RootError};
use thiserror::Error;

use crate::ObjectRef;

/// Contract violations and resource exhaustion. None of these can be recovered
/// from by the running program.
#[derive(Error, Debug)]
pub enum RuntimeError {
	#[error(transparent)]
	Allocation(#[from] AllocationError),
	#[error(transparent)]
	Root(#[from] RootError),
	#[error("Cant cast {class} to {interface}")]
	InterfaceMiss { class: String, interface: String },
	#[error("Initialization loop")]
	InitializationLoop,
	#[error("Negative array dimension {0}")]
	NegativeDimension(i32),
	#[error("Array needs at least one dimension")]
	NoDimensions,
	#[error("Array element class is missing")]
	MissingElementClass,
	#[error("Unknown array element kind {0}")]
	UnknownKind(u8),
	#[error("Class {0} cannot be instantiated")]
	NotInstantiable(String),
	#[error("Invalid class {name}: {reason}")]
	InvalidClass { name: String, reason: String },
	#[error("Runtime is not started")]
	NotStarted,
}

/// How a checked operation can go wrong.
#[derive(Error, Debug)]
pub enum Failure {
	/// A language-level error object, to be raised in the running program.
	#[error("Exception {0:?}")]
	Exception(ObjectRef),
	#[error(transparent)]
	Fatal(#[from] RuntimeError),
}

impl From<AllocationError> for Failure {
	fn from(value: AllocationError) -> Self {
		Failure::Fatal(value.into())
	}
}

impl From<RootError> for Failure {
	fn from(value: RootError) -> Self {
		Failure::Fatal(value.into())
	}
}
