use std::ffi::c_void;
use std::fmt::{Debug, Display, Formatter};
use std::iter::successors;
use std::mem::size_of;
use std::ptr;
use std::sync::OnceLock;

use llrt_core::{align_size, Kind};

use crate::{ArrayHeader, ObjectHeader, ObjectRef, ReferenceSlot, RuntimeError};

/// A method entry point produced by code generation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(transparent)]
pub struct MethodPtr(pub *const c_void);

// Entry points are immutable code addresses.
unsafe impl Send for MethodPtr {}
unsafe impl Sync for MethodPtr {}

/// Ordered method slots used for virtual and interface calls.
pub struct DispatchTable {
	methods: Vec<MethodPtr>,
}

impl DispatchTable {
	pub fn new(methods: Vec<MethodPtr>) -> DispatchTable {
		DispatchTable { methods }
	}

	pub fn get(&self, slot: usize) -> Option<MethodPtr> {
		self.methods.get(slot).copied()
	}

	pub fn len(&self) -> usize {
		self.methods.len()
	}

	pub fn is_empty(&self) -> bool {
		self.methods.is_empty()
	}

	fn leak(self) -> &'static DispatchTable {
		Box::leak(Box::new(self))
	}
}

impl Debug for DispatchTable {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "DispatchTable({:p}, {} slots)", self, self.methods.len())
	}
}

/// Runs the constructor of a freshly allocated object, used for the error
/// objects the runtime raises itself.
pub type Initializer = extern "C" fn(ObjectRef, Option<&'static DispatchTable>);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClassKind {
	Instance,
	Interface,
	Array,
}

/// An interface a class implements, with the table calls through it use.
#[derive(Copy, Clone, Debug)]
pub struct InterfaceEntry {
	pub interface: &'static Class,
	pub vtable: &'static DispatchTable,
}

/// Where the reference fields a class declares itself live inside an instance.
///
/// They are a contiguous block of [`ReferenceSlot`]s starting right after the
/// superclass's instance region.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct FieldLayout {
	pub offset: usize,
	pub count: usize,
}

impl FieldLayout {
	pub const SLOT_SIZE: usize = size_of::<ReferenceSlot>();

	pub fn end(&self) -> usize {
		self.offset + self.count * Self::SLOT_SIZE
	}

	pub fn slot_offset(&self, index: usize) -> Option<usize> {
		(index < self.count).then(|| self.offset + index * Self::SLOT_SIZE)
	}
}

/// Read-only metadata describing the layout and dispatch of a type.
///
/// Descriptors live for the rest of the process and are compared by identity.
pub struct Class {
	name: String,
	kind: ClassKind,
	/// Bytes of an instance, header included. Zero for arrays and interfaces.
	instance_size: usize,
	superclass: Option<&'static Class>,
	vtable: &'static DispatchTable,
	interfaces: Vec<InterfaceEntry>,
	fields: FieldLayout,
	element_class: Option<&'static Class>,
	element_kind: Option<Kind>,
	elements_offset: usize,
	initializer: Option<Initializer>,
	array_class: OnceLock<&'static Class>,
}

impl Class {
	pub(crate) fn new_array(
		name: String,
		object: &'static Class,
		element_class: Option<&'static Class>,
		element_kind: Kind,
	) -> &'static Class {
		Box::leak(Box::new(Class {
			name,
			kind: ClassKind::Array,
			instance_size: 0,
			superclass: Some(object),
			vtable: object.vtable,
			interfaces: Vec::new(),
			fields: FieldLayout::default(),
			element_class,
			element_kind: Some(element_kind),
			elements_offset: ArrayHeader::elements_offset(element_kind),
			initializer: None,
			array_class: OnceLock::new(),
		}))
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn kind(&self) -> ClassKind {
		self.kind
	}

	pub fn is_array(&self) -> bool {
		self.kind == ClassKind::Array
	}

	pub fn is_interface(&self) -> bool {
		self.kind == ClassKind::Interface
	}

	pub fn instance_size(&self) -> usize {
		self.instance_size
	}

	pub fn superclass(&self) -> Option<&'static Class> {
		self.superclass
	}

	pub fn vtable(&self) -> &'static DispatchTable {
		self.vtable
	}

	pub fn interfaces(&self) -> &[InterfaceEntry] {
		&self.interfaces
	}

	/// The reference fields declared by this class, not its superclasses.
	pub fn fields(&self) -> FieldLayout {
		self.fields
	}

	/// Element class of a reference array. None for primitive arrays and non-arrays.
	pub fn element_class(&self) -> Option<&'static Class> {
		self.element_class
	}

	pub fn element_kind(&self) -> Option<Kind> {
		self.element_kind
	}

	/// Byte offset from the start of an array instance to its first element.
	pub fn elements_offset(&self) -> usize {
		self.elements_offset
	}

	pub fn initializer(&self) -> Option<Initializer> {
		self.initializer
	}

	/// This class followed by each superclass, ending at the root.
	pub fn chain(&self) -> impl Iterator<Item = &Class> {
		successors(Some(self), |class| class.superclass.map(|c| c as &Class))
	}

	pub(crate) fn array_cache(&self) -> &OnceLock<&'static Class> {
		&self.array_class
	}

	pub fn same(&self, other: &Class) -> bool {
		ptr::eq(self, other)
	}
}

impl Debug for Class {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?} {} ({:p})", self.kind, self.name, self)
	}
}

impl Display for Class {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.name)
	}
}

/// Builds instance and interface descriptors the way code generation lays them out.
pub struct ClassBuilder {
	name: String,
	kind: ClassKind,
	superclass: Option<&'static Class>,
	reference_fields: usize,
	primitive_bytes: usize,
	methods: Vec<MethodPtr>,
	interfaces: Vec<InterfaceEntry>,
	initializer: Option<Initializer>,
}

impl ClassBuilder {
	pub fn new(name: impl Into<String>) -> ClassBuilder {
		ClassBuilder {
			name: name.into(),
			kind: ClassKind::Instance,
			superclass: None,
			reference_fields: 0,
			primitive_bytes: 0,
			methods: Vec::new(),
			interfaces: Vec::new(),
			initializer: None,
		}
	}

	pub fn interface(name: impl Into<String>) -> ClassBuilder {
		ClassBuilder {
			kind: ClassKind::Interface,
			..ClassBuilder::new(name)
		}
	}

	pub fn extends(mut self, superclass: &'static Class) -> Self {
		self.superclass = Some(superclass);
		self
	}

	pub fn reference_fields(mut self, count: usize) -> Self {
		self.reference_fields = count;
		self
	}

	/// Bytes of non-reference fields, placed after the reference block.
	pub fn primitive_bytes(mut self, bytes: usize) -> Self {
		self.primitive_bytes = bytes;
		self
	}

	pub fn method(mut self, method: MethodPtr) -> Self {
		self.methods.push(method);
		self
	}

	pub fn implements(mut self, interface: &'static Class, methods: Vec<MethodPtr>) -> Self {
		self.interfaces.push(InterfaceEntry {
			interface,
			vtable: DispatchTable::new(methods).leak(),
		});
		self
	}

	pub fn initializer(mut self, initializer: Initializer) -> Self {
		self.initializer = Some(initializer);
		self
	}

	pub fn build(self) -> Result<&'static Class, RuntimeError> {
		let invalid = |reason: &str| RuntimeError::InvalidClass {
			name: self.name.clone(),
			reason: reason.to_string(),
		};

		match self.superclass {
			Some(superclass) if superclass.kind != ClassKind::Instance => {
				return Err(invalid("superclass is not an instance class"));
			}
			// Only the root of a chain lacks a superclass, and it holds no references.
			None if self.kind == ClassKind::Instance && self.reference_fields != 0 => {
				return Err(invalid("reference fields need a superclass"));
			}
			_ => {}
		}
		if let Some(entry) = self.interfaces.iter().find(|entry| !entry.interface.is_interface()) {
			return Err(invalid(&format!("{} is not an interface", entry.interface.name)));
		}

		let (instance_size, fields) = match self.kind {
			ClassKind::Interface => {
				if self.reference_fields != 0 || self.primitive_bytes != 0 {
					return Err(invalid("interfaces have no instance fields"));
				}
				(0, FieldLayout::default())
			}
			_ => {
				let offset = match self.superclass {
					Some(superclass) => superclass.instance_size,
					None => ObjectHeader::SIZE,
				};
				let fields = FieldLayout {
					offset,
					count: self.reference_fields,
				};
				let size = align_size(fields.end() + self.primitive_bytes, size_of::<usize>());
				(size, fields)
			}
		};

		Ok(Box::leak(Box::new(Class {
			name: self.name,
			kind: self.kind,
			instance_size,
			superclass: self.superclass,
			vtable: DispatchTable::new(self.methods).leak(),
			interfaces: self.interfaces,
			fields,
			element_class: None,
			element_kind: None,
			elements_offset: 0,
			initializer: self.initializer,
			array_class: OnceLock::new(),
		})))
	}
}
