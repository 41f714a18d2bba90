use std::mem::size_of;
use std::ops::Deref;

use llrt_core::{align_size, Kind};
use tracing::trace;

use crate::{Class, ObjectHeader, ObjectRef, ReferenceSlot, Runtime, RuntimeError};

/// The fixed part of every array instance.
#[derive(Copy, Clone)]
#[repr(C)]
pub struct ArrayHeader {
	pub object: ObjectHeader,
	pub length: i32,
}

impl ArrayHeader {
	/// Where the header's own fields end, before any padding.
	pub const END: usize = ObjectHeader::SIZE + size_of::<i32>();

	/// Offset of the first element of an array holding `kind`.
	pub fn elements_offset(kind: Kind) -> usize {
		align_size(Self::END, kind.align())
	}
}

/// Types which can be stored in an array, matched against the array's element kind.
pub trait ArrayElement: Copy {
	const KIND: Kind;
}

macro_rules! element {
	($($ty:ty => $kind:ident),*) => {
		$(impl ArrayElement for $ty {
			const KIND: Kind = Kind::$kind;
		})*
	};
}

element!(
	bool => Boolean,
	i8 => Byte,
	i16 => Short,
	u16 => Char,
	i32 => Int,
	i64 => Long,
	f32 => Float,
	f64 => Double,
	ReferenceSlot => Reference
);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct ArrayRef {
	object: ObjectRef,
}

impl Deref for ArrayRef {
	type Target = ObjectRef;

	fn deref(&self) -> &Self::Target {
		&self.object
	}
}

impl ArrayRef {
	pub fn try_new(object: ObjectRef) -> Option<ArrayRef> {
		if !object.class()?.is_array() {
			return None;
		}

		Some(unsafe { Self::new_unchecked(object) })
	}

	/// # Safety
	/// The caller must ensure that the object is not null, and that its class is an array class.
	pub unsafe fn new_unchecked(object: ObjectRef) -> ArrayRef {
		ArrayRef { object }
	}

	pub fn object(&self) -> ObjectRef {
		self.object
	}

	fn header(&self) -> *mut ArrayHeader {
		self.object.header() as *mut ArrayHeader
	}

	pub fn length(&self) -> i32 {
		unsafe { (*self.header()).length }
	}

	fn element_ptr<T: ArrayElement>(&self, index: i32) -> Option<*mut T> {
		let class = self.object.class()?;
		if class.element_kind() != Some(T::KIND) || index < 0 || index >= self.length() {
			return None;
		}
		unsafe {
			Some(
				(self.object.header() as *mut u8)
					.add(class.elements_offset())
					.cast::<T>()
					.add(index as usize),
			)
		}
	}

	/// Reads an element. None when out of bounds or when `T` is not the element type.
	pub fn get<T: ArrayElement>(&self, index: i32) -> Option<T> {
		self.element_ptr::<T>(index).map(|ptr| unsafe { ptr.read() })
	}

	pub fn set<T: ArrayElement>(&self, index: i32, value: T) -> Option<()> {
		self.element_ptr::<T>(index).map(|ptr| unsafe { ptr.write(value) })
	}
}

/// The descriptor of arrays of `element`, created the first time it is asked for.
pub fn array_of(element: &'static Class, object: &'static Class) -> &'static Class {
	element.array_cache().get_or_init(|| {
		trace!(target: "gc", "Deriving array class of {}", element.name());
		Class::new_array(
			format!("[{}", element.name()),
			object,
			Some(element),
			Kind::Reference,
		)
	})
}

impl Runtime {
	/// Allocates a possibly multi-dimensional array. The outermost dimension comes first.
	///
	/// For [`Kind::Reference`] the innermost arrays hold `element`; nested
	/// dimensions are filled with freshly allocated sub-arrays.
	pub fn new_array(
		&mut self,
		kind: Kind,
		element: Option<&'static Class>,
		dims: &[i32],
	) -> Result<ArrayRef, RuntimeError> {
		if dims.is_empty() {
			return Err(RuntimeError::NoDimensions);
		}
		if let Some(dim) = dims.iter().find(|dim| **dim < 0) {
			return Err(RuntimeError::NegativeDimension(*dim));
		}

		let innermost = match kind {
			Kind::Reference => {
				let element = element.ok_or(RuntimeError::MissingElementClass)?;
				self.classes.array_of(element)
			}
			kind => self
				.classes
				.primitive_array(kind)
				.ok_or(RuntimeError::MissingElementClass)?,
		};

		// Outermost first.
		let mut classes = vec![innermost];
		for _ in 1..dims.len() {
			let inner = classes[classes.len() - 1];
			classes.push(self.classes.array_of(inner));
		}
		classes.reverse();

		self.allocate_array(&classes, dims)
	}

	fn allocate_array(
		&mut self,
		classes: &[&'static Class],
		dims: &[i32],
	) -> Result<ArrayRef, RuntimeError> {
		let class = classes[0];
		let length = dims[0];
		if dims.len() == 1 {
			return self.allocate_flat(class, length);
		}

		let frame = self.gc.open_frame();
		let result = self.allocate_nested(classes, dims);
		self.gc.close_frame(frame)?;
		result
	}

	fn allocate_nested(
		&mut self,
		classes: &[&'static Class],
		dims: &[i32],
	) -> Result<ArrayRef, RuntimeError> {
		let array = self.allocate_flat(classes[0], dims[0])?;
		// Keeps the array and everything stored into it so far alive while
		// the sub-arrays are allocated.
		self.gc.push_operand(array.gc_ref())?;

		let vtable = classes[1].vtable();
		for i in 0..dims[0] {
			let inner = self.allocate_array(&classes[1..], &dims[1..])?;
			array.set(
				i,
				ReferenceSlot {
					vtable: Some(vtable),
					object: inner.object(),
				},
			);
		}
		Ok(array)
	}

	/// A single dimension, elements zeroed.
	fn allocate_flat(&mut self, class: &'static Class, length: i32) -> Result<ArrayRef, RuntimeError> {
		let kind = class.element_kind().ok_or(RuntimeError::MissingElementClass)?;
		let size = (length as usize)
			.checked_mul(kind.size())
			.and_then(|size| size.checked_add(class.elements_offset()))
			.ok_or(llrt_gc::AllocationError::ObjectTooBig)?;

		let object = self.allocate(size)?;
		object.set_class(class);
		let array = unsafe { ArrayRef::new_unchecked(object) };
		unsafe { (*array.header()).length = length };
		Ok(array)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn element_offsets() {
		assert_eq!(ArrayHeader::elements_offset(Kind::Boolean), 12);
		assert_eq!(ArrayHeader::elements_offset(Kind::Int), 12);
		assert_eq!(ArrayHeader::elements_offset(Kind::Long), 16);
		assert_eq!(ArrayHeader::elements_offset(Kind::Reference), 16);
		assert_eq!(size_of::<ReferenceSlot>(), Kind::Reference.size());
		assert_eq!(size_of::<ArrayRef>(), size_of::<*mut u8>());
	}

	#[test]
	fn array_class_is_memoized() {
		let runtime = Runtime::default();
		let object = runtime.classes.object();
		let first = array_of(object, object);
		let second = array_of(object, object);
		assert!(first.same(second));
		assert_eq!(first.name(), "[java.lang.Object");
		assert!(first.element_class().unwrap().same(object));
		assert!(std::ptr::eq(first.vtable(), object.vtable()));

		let nested = array_of(first, object);
		assert_eq!(nested.name(), "[[java.lang.Object");
		assert!(array_of(first, object).same(nested));
	}

	#[test]
	fn typed_access() {
		let mut runtime = Runtime::default();
		let array = runtime.new_array(Kind::Int, None, &[4]).unwrap();
		assert_eq!(array.length(), 4);
		assert_eq!(array.get::<i32>(3), Some(0));
		array.set(2, 42i32).unwrap();
		assert_eq!(array.get::<i32>(2), Some(42));

		assert_eq!(array.get::<i32>(4), None);
		assert_eq!(array.get::<i32>(-1), None);
		assert_eq!(array.get::<i64>(0), None);
		assert!(array.get::<ReferenceSlot>(0).is_none());
	}

	#[test]
	fn bad_dimensions() {
		let mut runtime = Runtime::default();
		assert!(matches!(
			runtime.new_array(Kind::Int, None, &[]),
			Err(RuntimeError::NoDimensions)
		));
		assert!(matches!(
			runtime.new_array(Kind::Int, None, &[3, -2]),
			Err(RuntimeError::NegativeDimension(-2))
		));
		assert!(matches!(
			runtime.new_array(Kind::Reference, None, &[1]),
			Err(RuntimeError::MissingElementClass)
		));
	}

	#[test]
	fn zero_length() {
		let mut runtime = Runtime::default();
		let object = runtime.classes.object();
		let array = runtime.new_array(Kind::Reference, Some(object), &[0, 5]).unwrap();
		assert_eq!(array.length(), 0);
		assert_eq!(array.class().unwrap().name(), "[[java.lang.Object");
	}
}
