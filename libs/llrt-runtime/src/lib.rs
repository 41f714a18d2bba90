use llrt_gc::{GCStatistics, GarbageCollector, GcConfig};
use tracing::{debug, info};

pub mod abi;
mod array;
mod check;
mod class;
pub mod config;
mod error;
mod object;
mod table;

pub use array::*;
pub use check::*;
pub use class::*;
pub use error::*;
pub use object::*;
pub use table::*;

pub type Gc = GarbageCollector<ObjectModel>;

/// Everything generated code talks to: the managed heap with its roots, and
/// the class descriptors objects on it point at.
pub struct Runtime {
	pub gc: Gc,
	pub classes: ClassTable,
}

impl Runtime {
	pub fn new(config: &GcConfig, classes: ClassTable) -> Runtime {
		info!(
			"Starting runtime with a {} byte heap, up to {} bytes",
			config.soft_limit, config.hard_limit
		);
		Runtime {
			gc: GarbageCollector::new(config),
			classes,
		}
	}

	/// Raw zeroed storage. The object has no class until [`Runtime::init_object`].
	pub fn allocate(&mut self, size: usize) -> Result<ObjectRef, RuntimeError> {
		Ok(ObjectRef::new(self.gc.allocate(size)?))
	}

	pub fn init_object(&self, object: ObjectRef, class: &'static Class) {
		object.set_class(class);
	}

	/// Allocates a zeroed instance of `class`.
	pub fn new_object(&mut self, class: &'static Class) -> Result<ObjectRef, RuntimeError> {
		if class.kind() != ClassKind::Instance {
			return Err(RuntimeError::NotInstantiable(class.name().to_string()));
		}
		let object = self.allocate(class.instance_size())?;
		self.init_object(object, class);
		Ok(object)
	}

	/// A slot pointing at `object`, ready to be stored into a field or array.
	pub fn reference_to(&self, object: ObjectRef) -> ReferenceSlot {
		ReferenceSlot {
			vtable: load_vtable(object),
			object,
		}
	}

	pub fn gc(&mut self) -> GCStatistics {
		let statistics = self.gc.gc();
		debug!(
			"Collection {} freed {} bytes",
			self.gc.collections(),
			statistics.bytes_freed
		);
		statistics
	}

	/// A runtime over the bootstrap classes.
	pub fn bootstrap(config: &GcConfig) -> Result<Runtime, RuntimeError> {
		Ok(Runtime::new(config, ClassTable::new(CoreClasses::bootstrap()?)))
	}
}

impl Default for Runtime {
	fn default() -> Self {
		llrt_core::init();
		match Runtime::bootstrap(&GcConfig::default()) {
			Ok(runtime) => runtime,
			Err(error) => unreachable!("bootstrap classes are well formed: {error}"),
		}
	}
}
