use ahash::AHashMap;
use llrt_core::Kind;

use crate::{array_of, Class, ClassBuilder, RuntimeError};

/// The classes the runtime itself needs to know about.
#[derive(Copy, Clone, Debug)]
pub struct CoreClasses {
	/// The root of every class chain.
	pub object: &'static Class,
	pub null_pointer: &'static Class,
	pub index_out_of_bounds: &'static Class,
}

impl CoreClasses {
	/// Minimal stand-ins, for hosts that do not provide their own.
	pub fn bootstrap() -> Result<CoreClasses, RuntimeError> {
		let object = ClassBuilder::new("java.lang.Object").build()?;
		Ok(CoreClasses {
			object,
			null_pointer: ClassBuilder::new("java.lang.NullPointerException")
				.extends(object)
				.build()?,
			index_out_of_bounds: ClassBuilder::new("java.lang.ArrayIndexOutOfBoundsException")
				.extends(object)
				.build()?,
		})
	}
}

/// Every class descriptor the runtime can look up by name.
pub struct ClassTable {
	core: CoreClasses,
	primitive_arrays: [&'static Class; 8],
	by_name: AHashMap<String, &'static Class>,
}

impl ClassTable {
	pub fn new(core: CoreClasses) -> ClassTable {
		let primitive_arrays = Kind::PRIMITIVES
			.map(|kind| Class::new_array(format!("[{kind}"), core.object, None, kind));

		let mut table = ClassTable {
			core,
			primitive_arrays,
			by_name: AHashMap::new(),
		};
		table.register(core.object);
		table.register(core.null_pointer);
		table.register(core.index_out_of_bounds);
		for class in primitive_arrays {
			table.register(class);
		}
		table
	}

	pub fn core(&self) -> &CoreClasses {
		&self.core
	}

	pub fn object(&self) -> &'static Class {
		self.core.object
	}

	/// Makes a class available through [`ClassTable::get`]. A later class with
	/// the same name replaces the earlier one.
	pub fn register(&mut self, class: &'static Class) {
		self.by_name.insert(class.name().to_string(), class);
	}

	pub fn get(&self, name: &str) -> Option<&'static Class> {
		if let Some(class) = self.by_name.get(name) {
			return Some(*class);
		}
		// Derived array classes are only known once asked for.
		let element = self.get(name.strip_prefix('[')?)?;
		element.array_cache().get().copied()
	}

	/// The singleton class of arrays holding `kind`. None for references.
	pub fn primitive_array(&self, kind: Kind) -> Option<&'static Class> {
		Kind::PRIMITIVES
			.iter()
			.position(|primitive| *primitive == kind)
			.map(|i| self.primitive_arrays[i])
	}

	pub fn array_of(&self, element: &'static Class) -> &'static Class {
		array_of(element, self.core.object)
	}

	pub fn len(&self) -> usize {
		self.by_name.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_name.is_empty()
	}
}
