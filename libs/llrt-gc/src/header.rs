use crate::ALIGNMENT;
use bitflags::bitflags;
use llrt_core::align_size;
use std::mem::size_of;

bitflags! {
	#[repr(C)]
	#[derive(Copy, Clone, Debug, Eq, PartialEq)]
	pub struct ObjectFlags: u8 {
		/// Set once the object has been reached during the current mark phase.
		/// Always clear outside of a collection.
		const MARK = 1;
	}
}

/// Prefixed to every allocation. Invisible to the object model, which only
/// ever sees the data following it.
#[repr(C)]
pub struct GcHeader {
	/// The allocation made before this one. The global allocation list runs through these.
	pub(crate) prev: *mut GcHeader,
	pub(crate) flags: ObjectFlags,
	/// The size (in bytes) of the whole allocation, header included.
	size: usize,
}

impl GcHeader {
	pub(crate) fn new(prev: *mut GcHeader, total_size: usize) -> GcHeader {
		debug_assert!(total_size % ALIGNMENT == 0, "Bad size");
		GcHeader {
			prev,
			flags: ObjectFlags::empty(),
			size: total_size,
		}
	}

	pub fn is_marked(&self) -> bool {
		self.flags.contains(ObjectFlags::MARK)
	}

	pub fn total_size(&self) -> usize {
		self.size
	}

	pub fn data_size(&self) -> usize {
		self.size - Self::SIZE
	}
}

impl GcHeader {
	pub const SIZE: usize = align_size(size_of::<GcHeader>(), ALIGNMENT);
}
