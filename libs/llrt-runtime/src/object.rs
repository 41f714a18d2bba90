use std::fmt::{Debug, Formatter};
use std::mem::size_of;

use llrt_gc::{GcRef, GcUser};

use crate::{ArrayRef, Class, ClassKind, DispatchTable};

/// Every object starts with its class. Null until the object is initialized.
#[derive(Copy, Clone)]
#[repr(C)]
pub struct ObjectHeader {
	pub class: *const Class,
}

impl ObjectHeader {
	pub const SIZE: usize = size_of::<ObjectHeader>();
}

/// A pointer to a managed object, as generated code sees it.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct ObjectRef(GcRef<ObjectModel>);

impl ObjectRef {
	pub const NULL: ObjectRef = ObjectRef(GcRef::NULL);

	pub fn new(reference: GcRef<ObjectModel>) -> ObjectRef {
		ObjectRef(reference)
	}

	pub fn gc_ref(&self) -> GcRef<ObjectModel> {
		self.0
	}

	pub fn is_null(&self) -> bool {
		self.0.is_null()
	}

	pub fn as_ptr(&self) -> *mut u8 {
		self.0.as_ptr()
	}

	pub(crate) fn header(&self) -> *mut ObjectHeader {
		self.0.data_ptr() as *mut ObjectHeader
	}

	/// The class of the object, None for null or not yet initialized objects.
	pub fn class(&self) -> Option<&'static Class> {
		if self.is_null() {
			return None;
		}
		unsafe { (*self.header()).class.as_ref() }
	}

	pub(crate) fn set_class(&self, class: &'static Class) {
		unsafe { (*self.header()).class = class };
	}

	pub fn vtable(&self) -> Option<&'static DispatchTable> {
		self.class().map(|class| class.vtable())
	}

	fn slot_ptr(&self, owner: &Class, index: usize) -> Option<*mut ReferenceSlot> {
		let class = self.class()?;
		if class.is_array() || !class.chain().any(|level| level.same(owner)) {
			return None;
		}
		let offset = owner.fields().slot_offset(index)?;
		Some(unsafe { self.0.data_ptr().add(offset) as *mut ReferenceSlot })
	}

	/// Reads reference field `index` among those declared by `owner`, which
	/// must be the object's class or one of its superclasses.
	pub fn get_field(&self, owner: &Class, index: usize) -> Option<ReferenceSlot> {
		self.slot_ptr(owner, index).map(|ptr| unsafe { ptr.read() })
	}

	pub fn set_field(&self, owner: &Class, index: usize, value: ReferenceSlot) -> Option<()> {
		self.slot_ptr(owner, index).map(|ptr| unsafe { ptr.write(value) })
	}
}

impl Debug for ObjectRef {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self.class() {
			Some(class) => write!(f, "{}@{:?}", class.name(), self.0),
			None => write!(f, "{:?}", self.0),
		}
	}
}

/// One reference-typed storage location. The table is cached next to the
/// object to save a lookup on every call.
#[derive(Copy, Clone, Debug)]
#[repr(C)]
pub struct ReferenceSlot {
	pub vtable: Option<&'static DispatchTable>,
	pub object: ObjectRef,
}

impl ReferenceSlot {
	pub const NULL: ReferenceSlot = ReferenceSlot {
		vtable: None,
		object: ObjectRef::NULL,
	};
}

/// Teaches the collector where objects keep their references.
pub struct ObjectModel {}

impl GcUser for ObjectModel {
	fn visit_refs(reference: &GcRef<Self>, mut visitor: impl FnMut(GcRef<Self>)) {
		let object = ObjectRef(*reference);
		let Some(class) = object.class() else {
			// Allocated but not initialized yet.
			return;
		};

		match class.kind() {
			ClassKind::Array => {
				if class.element_class().is_none() {
					return;
				}
				let array = unsafe { ArrayRef::new_unchecked(object) };
				for i in 0..array.length() {
					if let Some(slot) = array.get::<ReferenceSlot>(i) {
						visitor(slot.object.0);
					}
				}
			}
			_ => {
				for level in class.chain() {
					let fields = level.fields();
					for i in 0..fields.count {
						let slot = unsafe {
							(object.0.data_ptr().add(fields.offset) as *const ReferenceSlot)
								.add(i)
								.read()
						};
						visitor(slot.object.0);
					}
				}
			}
		}
	}
}
