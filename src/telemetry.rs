//! Tracing setup.
//!
//! Call [`init`] once at startup. The filter honours `RUST_LOG`, defaulting
//! to `info`; repeated calls are harmless so tests can call it freely.

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(ErrorLayer::default())
        .try_init();
}
