use crate::{GcRef, GcUser};
use std::fmt::{Debug, Formatter};
use thiserror::Error;
use tracing::{error, trace};

/// One entry of the shadow stack.
pub enum RootSlot<U: GcUser> {
	/// A computed value which is not stored anywhere yet.
	Operand(GcRef<U>),
	/// A variable. The cell is read again at every collection because the
	/// variable may be reassigned after it was registered.
	Local(*mut GcRef<U>),
}

impl<U: GcUser> RootSlot<U> {
	/// The reference this slot keeps alive right now.
	pub fn current(&self) -> GcRef<U> {
		match self {
			RootSlot::Operand(reference) => *reference,
			RootSlot::Local(cell) => unsafe { cell.read() },
		}
	}
}

impl<U: GcUser> Copy for RootSlot<U> {}
impl<U: GcUser> Clone for RootSlot<U> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<U: GcUser> Debug for RootSlot<U> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			RootSlot::Operand(reference) => write!(f, "OPERAND {reference:?}"),
			RootSlot::Local(cell) => write!(f, "LOCAL {:?}({:?})", cell, self.current()),
		}
	}
}

/// The shadow stack depth at the time a frame was opened.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[repr(transparent)]
pub struct FrameMark(usize);

impl FrameMark {
	pub fn from_depth(depth: usize) -> FrameMark {
		FrameMark(depth)
	}

	pub fn depth(&self) -> usize {
		self.0
	}
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum RootError {
	#[error("Stack overflow")]
	Overflow,
	#[error("Stack underflow")]
	Underflow,
	#[error("Tried to pop a local cell")]
	PopMismatch,
	#[error("Frame mark {mark} lies above the stack depth {depth}")]
	FrameAboveDepth { mark: usize, depth: usize },
	#[error("Too many roots")]
	TooManyRoots,
}

/// A fixed-capacity stack of root slots, pushed and popped by generated code
/// in strict frame order.
pub struct ShadowStack<U: GcUser> {
	slots: Vec<RootSlot<U>>,
	capacity: usize,
}

impl<U: GcUser> ShadowStack<U> {
	pub fn new(capacity: usize) -> ShadowStack<U> {
		ShadowStack {
			// Reserved up front, pushing never allocates.
			slots: Vec::with_capacity(capacity),
			capacity,
		}
	}

	pub fn depth(&self) -> usize {
		self.slots.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = &RootSlot<U>> {
		self.slots.iter()
	}

	pub fn open_frame(&self) -> FrameMark {
		trace!(target: "gc", "openframe {}", self.depth());
		FrameMark(self.depth())
	}

	/// Drops every slot pushed since `mark` was taken.
	pub fn close_frame(&mut self, mark: FrameMark) -> Result<(), RootError> {
		trace!(target: "gc", "closeframe {} to {}", self.depth(), mark.0);
		if mark.0 > self.depth() {
			return Err(RootError::FrameAboveDepth {
				mark: mark.0,
				depth: self.depth(),
			});
		}
		self.slots.truncate(mark.0);
		Ok(())
	}

	pub fn push_operand(&mut self, reference: GcRef<U>) -> Result<(), RootError> {
		trace!(target: "gc", "Push {:?} depth={}", reference, self.depth());
		self.push(RootSlot::Operand(reference))
	}

	pub fn pop_operand(&mut self) -> Result<GcRef<U>, RootError> {
		trace!(target: "gc", "Pop depth={}", self.depth());
		match self.slots.last() {
			None => Err(RootError::Underflow),
			Some(RootSlot::Local(_)) => {
				error!(target: "gc", "Tried to pop a cell");
				self.dump();
				Err(RootError::PopMismatch)
			}
			Some(&RootSlot::Operand(reference)) => {
				self.slots.pop();
				Ok(reference)
			}
		}
	}

	/// # Safety
	/// `cell` must stay valid, and hold either null or a live reference, until
	/// the frame this slot belongs to is closed.
	pub unsafe fn register_local(&mut self, cell: *mut GcRef<U>) -> Result<(), RootError> {
		trace!(target: "gc", "localcell {:?}({:?})", cell, cell.read());
		self.push(RootSlot::Local(cell))
	}

	fn push(&mut self, slot: RootSlot<U>) -> Result<(), RootError> {
		if self.slots.len() == self.capacity {
			return Err(RootError::Overflow);
		}
		self.slots.push(slot);
		Ok(())
	}

	/// Logs every slot, top of the stack first.
	pub fn dump(&self) {
		let depth = self.depth();
		for (i, slot) in self.slots.iter().enumerate().rev() {
			trace!(target: "gc", "{} {} {:?}", i, depth - i, slot);
		}
	}
}

/// Cells of global and static reference storage, registered once at module
/// initialisation and never removed.
pub struct StaticRoots<U: GcUser> {
	cells: Vec<*mut GcRef<U>>,
	capacity: usize,
}

impl<U: GcUser> StaticRoots<U> {
	pub fn new(capacity: usize) -> StaticRoots<U> {
		StaticRoots {
			cells: Vec::with_capacity(capacity),
			capacity,
		}
	}

	/// # Safety
	/// `cell` must stay valid, and hold either null or a live reference, for
	/// as long as the collector exists.
	pub unsafe fn add(&mut self, cell: *mut GcRef<U>) -> Result<(), RootError> {
		if self.cells.len() == self.capacity {
			return Err(RootError::TooManyRoots);
		}
		self.cells.push(cell);
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.cells.len()
	}

	pub fn is_empty(&self) -> bool {
		self.cells.is_empty()
	}

	/// Current contents of every registered cell.
	pub fn iter(&self) -> impl Iterator<Item = GcRef<U>> + '_ {
		self.cells.iter().map(|cell| unsafe { cell.read() })
	}
}

pub struct Roots<U: GcUser> {
	pub shadow: ShadowStack<U>,
	pub statics: StaticRoots<U>,
}

impl<U: GcUser> Roots<U> {
	pub fn new(shadow_slots: usize, static_roots: usize) -> Roots<U> {
		Roots {
			shadow: ShadowStack::new(shadow_slots),
			statics: StaticRoots::new(static_roots),
		}
	}

	/// Visits static roots first, then the shadow stack from the bottom up.
	pub fn visit(&self, mut visitor: impl FnMut(GcRef<U>)) {
		for reference in self.statics.iter() {
			visitor(reference);
		}
		for slot in self.shadow.iter() {
			visitor(slot.current());
		}
	}
}
