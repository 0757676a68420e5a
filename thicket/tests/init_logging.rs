//! Test-only: installs a tracing subscriber from `RUST_LOG` when the test binary starts.
//!
//! Add `mod init_logging;` to an integration test file to see the search's
//! `tracing` output (iteration progress, malformed-reply warnings, retries).
//!
//! ```bash
//! RUST_LOG=thicket=debug cargo test -p thicket --test search_scenarios -- --nocapture
//! ```

use ctor::ctor;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[ctor]
fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_test_writer()
                .with_filter(filter),
        )
        .try_init();
}
