use std::mem::size_of;

const MIB: usize = 1024 * 1024;

/// Sizes and ceilings the collector is created with.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GcConfig {
	/// The heap size which, once exceeded, triggers a collection.
	pub soft_limit: usize,
	/// The step by which the soft limit is raised when a collection leaves too little headroom.
	pub growth: usize,
	/// The heap can never grow past this.
	pub hard_limit: usize,
	pub shadow_stack_slots: usize,
	pub static_roots: usize,
}

impl Default for GcConfig {
	fn default() -> Self {
		GcConfig {
			soft_limit: 64 * MIB,
			growth: 16 * MIB,
			hard_limit: 1024 * MIB,
			// 1MB of slots
			shadow_stack_slots: MIB / (2 * size_of::<usize>()),
			static_roots: 1024,
		}
	}
}

/// The soft ceiling and how it may grow.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HeapLimits {
	soft: usize,
	growth: usize,
	hard: usize,
}

impl HeapLimits {
	pub fn new(soft: usize, growth: usize, hard: usize) -> HeapLimits {
		HeapLimits {
			soft: soft.min(hard),
			growth: growth.max(1),
			hard,
		}
	}

	pub fn soft_limit(&self) -> usize {
		self.soft
	}

	pub fn hard_limit(&self) -> usize {
		self.hard
	}

	/// Raises the soft limit in whole steps while `needed` leaves less than one
	/// step of headroom, never past the hard limit. Returns whether it grew.
	pub fn grow_for(&mut self, needed: usize) -> bool {
		let mut grew = false;
		while needed > self.soft.saturating_sub(self.growth) {
			match self.soft.checked_add(self.growth) {
				Some(soft) if soft <= self.hard => {
					self.soft = soft;
					grew = true;
				}
				_ => break,
			}
		}
		grew
	}
}

impl From<&GcConfig> for HeapLimits {
	fn from(config: &GcConfig) -> Self {
		HeapLimits::new(config.soft_limit, config.growth, config.hard_limit)
	}
}
