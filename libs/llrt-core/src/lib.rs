mod kind;
mod utils;

pub use kind::*;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::filter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
pub use utils::*;

/// Environment variable holding a `tracing` target filter, e.g. `warn,gc=trace`.
pub const LOG_ENV: &str = "LLRT_LOG";

static START: Once = Once::new();

/// Installs the global log subscriber. Safe to call more than once, and a
/// subscriber installed by the host beforehand is left in place.
pub fn init() {
	START.call_once(|| {
		let filter = std::env::var(LOG_ENV)
			.ok()
			.and_then(|value| value.parse::<filter::Targets>().ok())
			.unwrap_or_else(|| {
				filter::Targets::new()
					.with_default(Level::WARN)
					.with_target("gc", Level::INFO)
			});
		let layered = tracing_subscriber::registry()
			.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
			.with(filter);

		// Someone else got there first.
		let _ = layered.try_init();
	});
}
