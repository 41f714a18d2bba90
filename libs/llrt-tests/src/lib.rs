use std::time::Instant;

use llrt_gc::GcConfig;
use llrt_runtime::Runtime;
use tracing::info;

pub mod testing;
#[cfg(test)]
mod tests;

const KIB: usize = 1024;

/// A runtime over the bootstrap classes whose soft limit is `heap_size` bytes.
pub fn launch(heap_size: usize) -> Runtime {
	launch_with(GcConfig {
		soft_limit: heap_size,
		growth: heap_size,
		hard_limit: heap_size.max(64 * KIB * KIB),
		..GcConfig::default()
	})
}

pub fn launch_with(config: GcConfig) -> Runtime {
	llrt_core::init();
	Runtime::bootstrap(&config).unwrap()
}

pub fn sample<F, R>(message: &str, times: usize, mut f: F) -> Vec<R>
where
	F: FnMut(usize) -> R,
{
	let mut nanos = 0;
	let mut results = Vec::with_capacity(times);

	for i in 0..times {
		let start = Instant::now();
		results.push(std::hint::black_box(f(i)));
		nanos += start.elapsed().as_nanos();
	}

	// Shown with LLRT_LOG=sample=info.
	info!(
		target: "sample",
		"{} took {}ms ({} nanos) on average",
		message,
		nanos as f32 / times as f32 / 1_000_000.0,
		nanos
	);
	results
}
