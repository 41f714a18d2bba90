//! Memory management and object model runtime for compiled class-based programs.
//!
//! Link the static library into generated code and call `rt_startup` first, or
//! build a [`Runtime`] over your own class table and hand it to [`start`].

pub use llrt_core;
pub use llrt_gc;
pub use llrt_runtime::*;

use tracing::info;

/// Makes `runtime` the one the exported entry points use.
pub fn start(runtime: Runtime) {
	llrt_core::init();
	info!(
		"Runtime ready with {} classes, heap limit {}",
		runtime.classes.len(),
		runtime.gc.limits().hard_limit()
	);
	abi::install(runtime);
}

/// Stops the runtime, releasing everything still on its heap.
pub fn stop() {
	if let Some(runtime) = abi::uninstall() {
		info!("Runtime stopped after {} collections", runtime.gc.collections());
	}
}
