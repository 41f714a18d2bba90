use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::marker::PhantomData;
use std::ptr::null_mut;
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
	FrameMark, GcConfig, GcHeader, GcRef, GcUser, HeapLimits, ObjectFlags, RootError, Roots,
	ALIGNMENT,
};

/// The heap, its roots and the mark-sweep collector over them.
///
/// Collection is stop-the-world and runs inline whenever an allocation would
/// push the heap past its soft limit.
pub struct GarbageCollector<U: GcUser> {
	roots: Roots<U>,
	limits: HeapLimits,
	/// The most recent allocation, the list continues through [`GcHeader::prev`].
	head: *mut GcHeader,
	/// Sum of the total sizes of every allocation in the list.
	heap_size: usize,
	objects: usize,
	collections: usize,
	_u: PhantomData<fn() -> U>,
}

unsafe impl<U: GcUser> Send for GarbageCollector<U> {}

impl<U: GcUser> GarbageCollector<U> {
	pub fn new(config: &GcConfig) -> Self {
		Self {
			roots: Roots::new(config.shadow_stack_slots, config.static_roots),
			limits: HeapLimits::from(config),
			head: null_mut(),
			heap_size: 0,
			objects: 0,
			collections: 0,
			_u: PhantomData,
		}
	}

	/// Allocates `data_size` zeroed bytes, collecting first if the heap is tight.
	pub fn allocate(&mut self, data_size: usize) -> Result<GcRef<U>, AllocationError> {
		let total_size =
			GcRef::<U>::calc_total_size(data_size).ok_or(AllocationError::ObjectTooBig)?;
		let layout =
			Layout::from_size_align(total_size, ALIGNMENT).map_err(|_| AllocationError::ObjectTooBig)?;

		if self.heap_size.saturating_add(total_size) > self.limits.soft_limit() {
			self.gc();

			let needed = self.heap_size.saturating_add(total_size);
			if self.limits.grow_for(needed) {
				debug!(target: "gc", "Soft limit raised to {}", self.limits.soft_limit());
			}
			if needed > self.limits.hard_limit() {
				return Err(self.out_of_heap(total_size));
			}
		}

		let head = unsafe { alloc_zeroed(layout) } as *mut GcHeader;
		if head.is_null() {
			return Err(self.out_of_heap(total_size));
		}

		unsafe {
			head.write(GcHeader::new(self.head, total_size));
		}
		self.head = head;
		self.heap_size += total_size;
		self.objects += 1;

		let reference = unsafe { GcRef::from_head(head) };
		trace!(
			target: "gc",
			"Allocated {}+{} at {:?}, heap is now {}/{}",
			data_size,
			GcHeader::SIZE,
			reference,
			self.heap_size,
			self.limits.soft_limit()
		);
		Ok(reference)
	}

	fn out_of_heap(&self, requested: usize) -> AllocationError {
		AllocationError::OutOfHeap {
			requested,
			used: self.heap_size,
			limit: self.limits.hard_limit(),
		}
	}

	/// Runs a full mark and sweep.
	pub fn gc(&mut self) -> GCStatistics {
		debug!(target: "gc", "collecting heapsize = {}", self.heap_size);
		self.roots.shadow.dump();

		let marked = self.mark();
		trace!(target: "gc", "tracing complete, {marked} objects reached");

		let statistics = self.sweep();
		self.collections += 1;
		debug!(
			target: "gc",
			"done collecting, heapsize={} cleared={} remaining={}",
			self.heap_size,
			statistics.objects_cleared,
			statistics.objects_remaining
		);
		statistics
	}

	fn mark(&mut self) -> usize {
		let mut work = Vec::new();
		let mut marked = 0;

		debug!(target: "gc", "scanning {} static roots and {} stack slots", self.roots.statics.len(), self.roots.shadow.depth());
		self.roots.visit(|reference| {
			marked += Self::enqueue(reference, &mut work);
		});
		debug!(target: "gc", "initial workq size is {}", work.len());

		while let Some(reference) = work.pop() {
			trace!(target: "gc", "tracing {:?}", reference);
			reference.visit_refs(|child| {
				marked += Self::enqueue(child, &mut work);
			});
		}
		marked
	}

	fn enqueue(mut reference: GcRef<U>, work: &mut Vec<GcRef<U>>) -> usize {
		if reference.is_null() {
			return 0;
		}
		let header = reference.header_mut();
		if header.flags.contains(ObjectFlags::MARK) {
			// Already visited or waiting in the queue.
			return 0;
		}
		header.flags.insert(ObjectFlags::MARK);
		work.push(reference);
		1
	}

	fn sweep(&mut self) -> GCStatistics {
		let mut statistics = GCStatistics::default();
		let mut live = null_mut();
		let mut current = self.head;

		while !current.is_null() {
			let header = unsafe { &mut *current };
			let prev = header.prev;
			if header.flags.contains(ObjectFlags::MARK) {
				header.flags.remove(ObjectFlags::MARK);
				header.prev = live;
				live = current;
				statistics.objects_remaining += 1;
			} else {
				let size = header.total_size();
				self.heap_size -= size;
				statistics.bytes_freed += size;
				statistics.objects_cleared += 1;
				unsafe { Self::release(current) };
			}
			current = prev;
		}

		self.head = live;
		self.objects = statistics.objects_remaining;
		statistics.heap_size = self.heap_size;
		statistics
	}

	unsafe fn release(head: *mut GcHeader) {
		let size = (*head).total_size();
		// The layout was validated when the allocation was made.
		dealloc(
			head as *mut u8,
			Layout::from_size_align_unchecked(size, ALIGNMENT),
		);
	}

	/// Visits every allocation in the list, newest first.
	pub fn walk(&self, mut visitor: impl FnMut(GcRef<U>)) {
		let mut current = self.head;
		while !current.is_null() {
			unsafe {
				visitor(GcRef::from_head(current));
				current = (*current).prev;
			}
		}
	}

	pub fn contains(&self, reference: GcRef<U>) -> bool {
		let mut found = false;
		self.walk(|value| found |= value == reference);
		found
	}

	/// Bytes currently allocated, headers included.
	pub fn used(&self) -> usize {
		self.heap_size
	}

	pub fn objects(&self) -> usize {
		self.objects
	}

	pub fn collections(&self) -> usize {
		self.collections
	}

	pub fn limits(&self) -> &HeapLimits {
		&self.limits
	}

	pub fn roots(&self) -> &Roots<U> {
		&self.roots
	}

	pub fn open_frame(&self) -> FrameMark {
		self.roots.shadow.open_frame()
	}

	pub fn close_frame(&mut self, mark: FrameMark) -> Result<(), RootError> {
		self.roots.shadow.close_frame(mark)
	}

	pub fn push_operand(&mut self, reference: GcRef<U>) -> Result<(), RootError> {
		self.roots.shadow.push_operand(reference)
	}

	pub fn pop_operand(&mut self) -> Result<GcRef<U>, RootError> {
		self.roots.shadow.pop_operand()
	}

	/// # Safety
	/// See [`crate::ShadowStack::register_local`].
	pub unsafe fn register_local(&mut self, cell: *mut GcRef<U>) -> Result<(), RootError> {
		self.roots.shadow.register_local(cell)
	}

	/// # Safety
	/// See [`crate::StaticRoots::add`].
	pub unsafe fn add_static_root(&mut self, cell: *mut GcRef<U>) -> Result<(), RootError> {
		self.roots.statics.add(cell)
	}
}

impl<U: GcUser> Drop for GarbageCollector<U> {
	fn drop(&mut self) {
		let mut current = self.head;
		while !current.is_null() {
			unsafe {
				let prev = (*current).prev;
				Self::release(current);
				current = prev;
			}
		}
		self.head = null_mut();
	}
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[repr(C)]
pub struct GCStatistics {
	pub objects_cleared: usize,
	pub objects_remaining: usize,
	pub bytes_freed: usize,
	/// The heap size once the sweep finished.
	pub heap_size: usize,
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum AllocationError {
	#[error("Out of heap: {requested} bytes requested with {used} of {limit} bytes in use")]
	OutOfHeap {
		requested: usize,
		used: usize,
		limit: usize,
	},
	#[error("Object is too big to be allocated")]
	ObjectTooBig,
}
