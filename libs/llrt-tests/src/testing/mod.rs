use std::ffi::c_void;
use std::ptr::null;

use llrt_runtime::{Class, ClassBuilder, MethodPtr, ObjectRef, Runtime};

/// Stands in for a generated method; nothing here ever calls through it.
pub const METHOD: MethodPtr = MethodPtr(null::<c_void>());

/// A small hierarchy shaped like generated code would lay it out.
///
/// ```text
/// Object
/// └─ Animal        1 reference field
///    ├─ Dog        2 reference fields, implements Pet
///    │  └─ Puppy   1 reference field
///    └─ Cat        no fields, implements Pet and Walker
/// ```
pub struct Zoo {
	pub pet: &'static Class,
	pub walker: &'static Class,
	pub animal: &'static Class,
	pub dog: &'static Class,
	pub puppy: &'static Class,
	pub cat: &'static Class,
}

impl Zoo {
	pub fn new(runtime: &mut Runtime) -> Zoo {
		let object = runtime.classes.object();
		let pet = ClassBuilder::interface("Pet").build().unwrap();
		let walker = ClassBuilder::interface("Walker").build().unwrap();
		let animal = ClassBuilder::new("Animal")
			.extends(object)
			.reference_fields(1)
			.primitive_bytes(4)
			.method(METHOD)
			.build()
			.unwrap();
		let dog = ClassBuilder::new("Dog")
			.extends(animal)
			.reference_fields(2)
			.implements(pet, vec![METHOD])
			.build()
			.unwrap();
		let puppy = ClassBuilder::new("Puppy")
			.extends(dog)
			.reference_fields(1)
			.build()
			.unwrap();
		let cat = ClassBuilder::new("Cat")
			.extends(animal)
			.implements(pet, vec![METHOD])
			.implements(walker, vec![METHOD, METHOD])
			.build()
			.unwrap();

		for class in [pet, walker, animal, dog, puppy, cat] {
			runtime.classes.register(class);
		}
		Zoo {
			pet,
			walker,
			animal,
			dog,
			puppy,
			cat,
		}
	}

	/// The instance classes, root included.
	pub fn classes(&self, runtime: &Runtime) -> Vec<&'static Class> {
		vec![
			runtime.classes.object(),
			self.animal,
			self.dog,
			self.puppy,
			self.cat,
		]
	}
}

/// Stores `to` into reference field `index` declared by `owner`.
pub fn link(runtime: &Runtime, from: ObjectRef, owner: &Class, index: usize, to: ObjectRef) {
	from.set_field(owner, index, runtime.reference_to(to))
		.unwrap_or_else(|| panic!("{from:?} has no field {index} in {owner}"));
}

pub fn field(from: ObjectRef, owner: &Class, index: usize) -> ObjectRef {
	from.get_field(owner, index)
		.unwrap_or_else(|| panic!("{from:?} has no field {index} in {owner}"))
		.object
}
