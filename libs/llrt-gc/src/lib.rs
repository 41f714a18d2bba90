mod collector;
mod config;
mod header;
mod reference;
mod roots;

pub use collector::*;
pub use config::*;
pub use header::*;
pub(crate) use llrt_core::align_size;
pub use reference::*;
pub use roots::*;

/// The object model living on top of the collector.
pub trait GcUser: Sized {
	// Go through all the references which this reference contains.
	fn visit_refs(reference: &GcRef<Self>, visitor: impl FnMut(GcRef<Self>));
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use rand::{thread_rng, Rng};
	use std::collections::HashSet;
	use std::mem::size_of;
	use std::ops::{Deref, DerefMut};

	// DATA layout of a test node: [ref count][tag][refs...]
	const NODE_HEADER: usize = 2 * size_of::<usize>();

	pub struct SimpleUser {}
	impl GcUser for SimpleUser {
		fn visit_refs(reference: &GcRef<Self>, mut visitor: impl FnMut(GcRef<Self>)) {
			let node = Node(*reference);
			for i in 0..node.ref_count() {
				visitor(node.get(i));
			}
		}
	}

	#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
	pub struct Node(pub GcRef<SimpleUser>);

	impl Node {
		fn words(&self) -> *mut usize {
			self.0.data_ptr() as *mut usize
		}

		pub fn ref_count(&self) -> usize {
			unsafe { self.words().read() }
		}

		pub fn tag(&self) -> usize {
			unsafe { self.words().add(1).read() }
		}

		pub fn get(&self, i: usize) -> GcRef<SimpleUser> {
			assert!(i < self.ref_count());
			unsafe {
				(self.0.data_ptr().add(NODE_HEADER) as *mut GcRef<SimpleUser>)
					.add(i)
					.read()
			}
		}

		pub fn set(&self, i: usize, value: GcRef<SimpleUser>) {
			assert!(i < self.ref_count());
			unsafe {
				(self.0.data_ptr().add(NODE_HEADER) as *mut GcRef<SimpleUser>)
					.add(i)
					.write(value)
			}
		}
	}

	pub struct Gc {
		inner: GarbageCollector<SimpleUser>,
	}

	impl Gc {
		pub fn new(size: usize) -> Gc {
			Self::with_config(GcConfig {
				soft_limit: size,
				growth: size,
				hard_limit: size,
				..GcConfig::default()
			})
		}

		pub fn with_config(config: GcConfig) -> Gc {
			llrt_core::init();
			Gc {
				inner: GarbageCollector::new(&config),
			}
		}

		pub fn alloc(&mut self, tag: usize, refs: usize) -> Node {
			self.try_alloc(tag, refs).unwrap()
		}

		pub fn try_alloc(&mut self, tag: usize, refs: usize) -> Result<Node, AllocationError> {
			let reference = self
				.inner
				.allocate(NODE_HEADER + refs * size_of::<GcRef<SimpleUser>>())?;
			let node = Node(reference);
			unsafe {
				node.words().write(refs);
				node.words().add(1).write(tag);
			}
			Ok(node)
		}

		pub fn contains(&self, node: Node) -> bool {
			self.inner.contains(node.0)
		}

		/// Sum of the sizes of everything still in the allocation list.
		pub fn walked_size(&self) -> usize {
			let mut size = 0;
			self.inner.walk(|reference| size += reference.total_size());
			size
		}
	}

	impl Deref for Gc {
		type Target = GarbageCollector<SimpleUser>;

		fn deref(&self) -> &Self::Target {
			&self.inner
		}
	}

	impl DerefMut for Gc {
		fn deref_mut(&mut self) -> &mut Self::Target {
			&mut self.inner
		}
	}

	#[test]
	fn test_simple_alloc() {
		let mut gc = Gc::new(1024);
		let result = gc.alloc(42, 3);

		assert_eq!(result.tag(), 42);
		assert_eq!(result.ref_count(), 3);
		for i in 0..3 {
			assert!(result.get(i).is_null());
		}
		assert_eq!(
			result.0.total_size(),
			GcHeader::SIZE + NODE_HEADER + 3 * size_of::<usize>()
		);
		assert_eq!(gc.used(), result.0.total_size());
		assert_eq!(gc.objects(), 1);
	}

	#[test]
	fn simple_gc() {
		let mut gc = Gc::new(1024);
		let _ = gc.alloc(1, 3);

		let stats = gc.gc();
		assert_eq!(stats.objects_cleared, 1);
		assert_eq!(stats.objects_remaining, 0);
		assert_eq!(stats.heap_size, 0);
		assert_eq!(gc.used(), 0);
	}

	#[test]
	fn statistics_layout() {
		let word = size_of::<usize>();
		assert_eq!(size_of::<GCStatistics>(), 4 * word);
		assert_eq!(std::mem::offset_of!(GCStatistics, objects_remaining), word);
		assert_eq!(std::mem::offset_of!(GCStatistics, heap_size), 3 * word);
	}

	#[test]
	fn simple_gc_rooted() {
		let mut gc = Gc::new(1024);
		let result = gc.alloc(7, 0);
		gc.push_operand(result.0).unwrap();

		let stats = gc.gc();
		assert_eq!(stats.objects_cleared, 0);
		assert_eq!(stats.objects_remaining, 1);
		assert_eq!(result.tag(), 7);
		assert!(!result.0.header().is_marked());
	}

	#[test]
	fn cyclic_gc() {
		let mut gc = Gc::new(1024);
		let _ = gc.alloc(0, 0);

		let ref_1 = gc.alloc(1, 2);
		let ref_2 = gc.alloc(2, 3);
		ref_1.set(1, ref_2.0);
		ref_2.set(2, ref_1.0);

		let frame = gc.open_frame();
		gc.push_operand(ref_1.0).unwrap();

		let stats = gc.gc();
		assert_eq!(stats.objects_cleared, 1);
		assert_eq!(stats.objects_remaining, 2);
		assert_eq!(Node(ref_1.get(1)).tag(), 2);
		assert_eq!(Node(ref_2.get(2)).tag(), 1);

		// We drop the only link to the cycle
		gc.close_frame(frame).unwrap();

		let stats = gc.gc();
		assert_eq!(stats.objects_cleared, 2);
		assert_eq!(stats.objects_remaining, 0);
	}

	#[test]
	fn child_gc() {
		let mut gc = Gc::new(1024);
		let child = gc.alloc(1, 0);
		let child2 = gc.alloc(2, 0);
		let result = gc.alloc(3, 3);
		result.set(0, child.0);
		result.set(2, child2.0);

		let stats = gc.gc();
		assert_eq!(stats.objects_cleared, 3);
		assert_eq!(stats.objects_remaining, 0);
	}

	#[test]
	fn static_root() {
		let mut gc = Gc::new(1024);
		let x = gc.alloc(99, 1);
		let child = gc.alloc(100, 0);
		x.set(0, child.0);
		let _ = gc.alloc(0, 0);

		let mut cell: Box<GcRef<SimpleUser>> = Box::new(x.0);
		let cell_ptr: *mut GcRef<SimpleUser> = &mut *cell;
		unsafe { gc.add_static_root(cell_ptr).unwrap() };

		let stats = gc.gc();
		assert_eq!(stats.objects_cleared, 1);
		assert_eq!(stats.objects_remaining, 2);
		assert!(gc.contains(x));
		assert!(gc.contains(child));
		assert_eq!(x.tag(), 99);

		unsafe { cell_ptr.write(GcRef::NULL) };
		let stats = gc.gc();
		assert_eq!(stats.objects_cleared, 2);
		assert_eq!(stats.objects_remaining, 0);
		assert!(cell.is_null());
	}

	#[test]
	fn lots_of_unrooted() {
		let mut gc = Gc::new(1024 * 1024);
		for i in 0..1000 {
			let _ = gc.alloc(i, 1);
		}
		assert_eq!(gc.objects(), 1000);

		let stats = gc.gc();
		assert_eq!(stats.objects_cleared, 1000);
		assert_eq!(stats.objects_remaining, 0);
		assert_eq!(gc.used(), 0);
	}

	#[test]
	fn collects_when_full() {
		// Room for a handful of nodes, everything unrooted.
		let mut gc = Gc::new(512);
		for i in 0..128 {
			let node = gc.alloc(i, 2);
			assert_eq!(node.tag(), i);
		}
		assert!(gc.collections() > 0);
		assert!(gc.used() <= 512);
	}

	#[test]
	fn out_of_heap() {
		let mut gc = Gc::new(256);
		let frame = gc.open_frame();
		let mut allocated = 0;
		loop {
			match gc.try_alloc(allocated, 0) {
				Ok(node) => {
					gc.push_operand(node.0).unwrap();
					allocated += 1;
				}
				Err(AllocationError::OutOfHeap { limit, .. }) => {
					assert_eq!(limit, 256);
					break;
				}
				Err(other) => panic!("{other}"),
			}
		}
		assert!(allocated > 0);
		assert!(gc.used() <= 256);

		gc.close_frame(frame).unwrap();
		assert!(gc.try_alloc(0, 0).is_ok());
	}

	#[test]
	fn growth_monotonicity() {
		let config = GcConfig {
			soft_limit: 256,
			growth: 128,
			hard_limit: 2000,
			..GcConfig::default()
		};
		let mut gc = Gc::with_config(config.clone());
		let mut last = gc.limits().soft_limit();

		for i in 0..200 {
			let node = match gc.try_alloc(i, 1) {
				Ok(node) => node,
				Err(AllocationError::OutOfHeap { .. }) => break,
				Err(other) => panic!("{other}"),
			};
			gc.push_operand(node.0).unwrap();

			let soft = gc.limits().soft_limit();
			assert!(soft >= last);
			assert_eq!((soft - config.soft_limit) % config.growth, 0);
			assert!(soft <= config.hard_limit);
			last = soft;
		}
		assert!(last > config.soft_limit);
		assert!(gc.used() <= config.hard_limit);
	}

	#[test]
	fn accounting_is_exact() {
		let mut gc = Gc::new(64 * 1024);
		let mut rng = thread_rng();
		let frame = gc.open_frame();
		for i in 0..500 {
			let node = gc.alloc(i, rng.gen_range(0..6));
			if rng.gen_bool(0.3) {
				gc.push_operand(node.0).unwrap();
			}
			if i % 97 == 0 {
				gc.gc();
				assert_eq!(gc.used(), gc.walked_size());
			}
		}

		gc.gc();
		assert_eq!(gc.used(), gc.walked_size());

		gc.close_frame(frame).unwrap();
		gc.gc();
		assert_eq!(gc.used(), 0);
		assert_eq!(gc.walked_size(), 0);
	}

	#[test]
	fn random_graphs() {
		let mut gc = Gc::new(1024 * 1024);
		let mut rng = thread_rng();

		for _ in 0..20 {
			let count = rng.gen_range(1..60);
			let nodes: Vec<Node> = (0..count).map(|i| gc.alloc(i, rng.gen_range(0..4))).collect();
			for node in &nodes {
				for i in 0..node.ref_count() {
					if rng.gen_bool(0.6) {
						node.set(i, nodes[rng.gen_range(0..count)].0);
					}
				}
			}

			let frame = gc.open_frame();
			let mut rooted = Vec::new();
			for node in &nodes {
				if rng.gen_bool(0.2) {
					gc.push_operand(node.0).unwrap();
					rooted.push(*node);
				}
			}

			// Everything reachable from the chosen roots
			let mut expected = HashSet::new();
			let mut work = rooted.clone();
			while let Some(node) = work.pop() {
				if expected.insert(node) {
					for i in 0..node.ref_count() {
						let child = node.get(i);
						if !child.is_null() {
							work.push(Node(child));
						}
					}
				}
			}

			let tags: Vec<(Node, usize)> = expected.iter().map(|node| (*node, node.tag())).collect();
			let stats = gc.gc();
			assert_eq!(stats.objects_remaining, expected.len());
			assert_eq!(gc.used(), gc.walked_size());
			for node in &nodes {
				assert_eq!(gc.contains(*node), expected.contains(node));
			}
			for (node, tag) in tags {
				assert_eq!(node.tag(), tag);
			}

			gc.close_frame(frame).unwrap();
			gc.gc();
			assert_eq!(gc.objects(), 0);
		}
	}
}
