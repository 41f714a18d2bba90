use crate::{align_size, GcHeader, GcUser};
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ptr::null_mut;

// This pointer points to the start of the data (NOT THE START OF THE ALLOCATION WHICH CONTAINS THE HEADER!)

// HEADER
// HEADER
// DATA <- data_ptr
// DATA
// DATA
#[repr(transparent)]
pub struct GcRef<U: GcUser> {
	data_ptr: *mut u8,
	_u: PhantomData<fn() -> U>,
}

pub const ALIGNMENT: usize = 8;

impl<U: GcUser> GcRef<U> {
	pub const NULL: Self = GcRef {
		data_ptr: null_mut(),
		_u: PhantomData,
	};

	/// Creates a GcRef from the start of an allocation.
	///
	/// # Safety
	/// The pointer needs to be null or point at a header written by the garbage collector.
	pub(crate) unsafe fn from_head(head: *mut GcHeader) -> Self {
		if head.is_null() {
			return GcRef::NULL;
		}
		Self {
			data_ptr: (head as *mut u8).add(GcHeader::SIZE),
			_u: PhantomData,
		}
	}

	pub fn header_mut(&mut self) -> &'_ mut GcHeader {
		unsafe { &mut *self.head_ptr() }
	}

	pub fn header(&self) -> &'_ GcHeader {
		unsafe { &*self.head_ptr() }
	}

	pub fn calc_total_size(data_size: usize) -> Option<usize> {
		let aligned_data_size = data_size.checked_add(ALIGNMENT - 1)? / ALIGNMENT * ALIGNMENT;
		debug_assert!(aligned_data_size == align_size(data_size, ALIGNMENT));
		aligned_data_size.checked_add(GcHeader::SIZE)
	}

	pub fn total_size(&self) -> usize {
		self.header().total_size()
	}

	pub fn data_size(&self) -> usize {
		self.header().data_size()
	}

	pub fn head_ptr(&self) -> *mut GcHeader {
		self.ensure_not_null();
		unsafe { self.data_ptr.sub(GcHeader::SIZE) as *mut GcHeader }
	}

	pub fn data_ptr(&self) -> *mut u8 {
		self.ensure_not_null();
		self.data_ptr
	}

	/// The raw data pointer, null included.
	pub fn as_ptr(&self) -> *mut u8 {
		self.data_ptr
	}

	pub fn is_null(&self) -> bool {
		self.data_ptr.is_null()
	}

	pub fn visit_refs(&self, visitor: impl FnMut(GcRef<U>)) {
		self.ensure_not_null();
		U::visit_refs(self, visitor)
	}

	fn ensure_not_null(&self) {
		if self.data_ptr.is_null() {
			panic!("Pointer is null");
		}
	}
}

impl<U: GcUser> Hash for GcRef<U> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.data_ptr.hash(state)
	}
}
impl<U: GcUser> Eq for GcRef<U> {}
impl<U: GcUser> PartialEq for GcRef<U> {
	fn eq(&self, other: &Self) -> bool {
		self.data_ptr.eq(&other.data_ptr)
	}
}
impl<U: GcUser> Copy for GcRef<U> {}
impl<U: GcUser> Clone for GcRef<U> {
	fn clone(&self) -> Self {
		*self
	}
}
impl<U: GcUser> Debug for GcRef<U> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?}", self.data_ptr)
	}
}
