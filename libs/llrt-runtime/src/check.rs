use tracing::error;

use crate::{ArrayRef, Class, DispatchTable, Failure, ObjectRef, Runtime, RuntimeError};

/// Whether `sub` is `sup` or derives from it. Arrays are covariant in their element class.
pub fn is_subclass(sup: &Class, sub: &Class) -> bool {
	if sup.same(sub) {
		return true;
	}
	if let (Some(sup_element), Some(sub_element)) = (sup.element_class(), sub.element_class()) {
		return is_subclass(sup_element, sub_element);
	}
	sub.chain().any(|class| class.same(sup))
}

pub fn implements(class: &Class, interface: &Class) -> bool {
	class
		.interfaces()
		.iter()
		.any(|entry| entry.interface.same(interface))
}

/// Instance test against a class or an interface. Null is an instance of nothing.
pub fn is_instance(object: ObjectRef, target: &Class) -> bool {
	let Some(class) = object.class() else {
		return false;
	};
	if target.is_interface() {
		implements(class, target)
	} else {
		is_subclass(target, class)
	}
}

/// The table to call `interface` methods on `object` through. None for null.
pub fn iface_vtable(
	object: ObjectRef,
	interface: &Class,
) -> Result<Option<&'static DispatchTable>, RuntimeError> {
	let Some(class) = object.class() else {
		return Ok(None);
	};
	match class
		.interfaces()
		.iter()
		.find(|entry| entry.interface.same(interface))
	{
		Some(entry) => Ok(Some(entry.vtable)),
		None => Err(RuntimeError::InterfaceMiss {
			class: class.name().to_string(),
			interface: interface.name().to_string(),
		}),
	}
}

pub fn load_vtable(object: ObjectRef) -> Option<&'static DispatchTable> {
	object.vtable()
}

pub fn init_loop() -> RuntimeError {
	RuntimeError::InitializationLoop
}

/// The report for an exception nobody caught.
pub fn uncaught(object: ObjectRef) -> String {
	let name = object.class().map(|class| class.name()).unwrap_or("<null>");
	error!("Uncaught exception: {name}");
	format!("Uncaught exception: {name}")
}

impl Runtime {
	/// Allocates an error object of `class` for the running program to handle.
	pub fn raise(&mut self, class: &'static Class) -> Failure {
		match self.new_object(class) {
			Ok(exception) => Failure::Exception(exception),
			Err(error) => Failure::Fatal(error),
		}
	}

	pub fn assert_not_null(&mut self, object: ObjectRef) -> Result<(), Failure> {
		if object.is_null() {
			return Err(self.raise(self.classes.core().null_pointer));
		}
		Ok(())
	}

	pub fn assert_array_bounds(&mut self, array: ArrayRef, index: i32) -> Result<(), Failure> {
		if index < 0 || index >= array.length() {
			return Err(self.raise(self.classes.core().index_out_of_bounds));
		}
		Ok(())
	}
}
