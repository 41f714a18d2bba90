use eyre::{ensure, eyre, Context};
use llrt_gc::GcConfig;

pub const HEAP_SOFT_LIMIT: &str = "LLRT_HEAP_SOFT_LIMIT";
pub const HEAP_GROWTH: &str = "LLRT_HEAP_GROWTH";
pub const HEAP_HARD_LIMIT: &str = "LLRT_HEAP_HARD_LIMIT";
pub const SHADOW_STACK_SLOTS: &str = "LLRT_SHADOW_STACK_SLOTS";
pub const STATIC_ROOTS: &str = "LLRT_STATIC_ROOTS";

/// Reads the collector configuration from the environment, defaults for anything unset.
pub fn from_env() -> eyre::Result<GcConfig> {
	from_lookup(|key| std::env::var(key).ok())
}

pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> eyre::Result<GcConfig> {
	let mut config = GcConfig::default();
	let fields: [(&str, &mut usize); 5] = [
		(HEAP_SOFT_LIMIT, &mut config.soft_limit),
		(HEAP_GROWTH, &mut config.growth),
		(HEAP_HARD_LIMIT, &mut config.hard_limit),
		(SHADOW_STACK_SLOTS, &mut config.shadow_stack_slots),
		(STATIC_ROOTS, &mut config.static_roots),
	];
	for (key, field) in fields {
		if let Some(value) = lookup(key) {
			*field = parse_size(&value).wrap_err_with(|| format!("Invalid value for {key}"))?;
		}
	}

	ensure!(config.growth > 0, "{HEAP_GROWTH} must be above zero");
	ensure!(
		config.hard_limit >= config.soft_limit,
		"{HEAP_HARD_LIMIT} ({}) is below {HEAP_SOFT_LIMIT} ({})",
		config.hard_limit,
		config.soft_limit
	);
	ensure!(config.shadow_stack_slots > 0, "{SHADOW_STACK_SLOTS} must be above zero");
	ensure!(config.static_roots > 0, "{STATIC_ROOTS} must be above zero");
	Ok(config)
}

/// A byte count with an optional binary `k`, `m` or `g` suffix.
fn parse_size(value: &str) -> eyre::Result<usize> {
	let value = value.trim();
	let (digits, shift) = match value.chars().last().map(|c| c.to_ascii_lowercase()) {
		Some('k') => (&value[..value.len() - 1], 10),
		Some('m') => (&value[..value.len() - 1], 20),
		Some('g') => (&value[..value.len() - 1], 30),
		_ => (value, 0),
	};
	let number: usize = digits
		.trim()
		.parse()
		.wrap_err_with(|| format!("{value:?} is not a size"))?;
	number
		.checked_mul(1 << shift)
		.ok_or_else(|| eyre!("{value:?} is too large"))
}
