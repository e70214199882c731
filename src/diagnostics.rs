//! Logging setup and timing helpers.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "voicemail_playback=info";

/// Install the global tracing subscriber. `RUST_LOG` wins over `default_filter`.
/// Calling this twice is harmless; the second install is ignored.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

#[cfg(target_arch = "wasm32")]
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::new(default_filter);
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .without_time()
                .with_writer(console::ConsoleWriter::default),
        )
        .try_init();
}

#[cfg(target_arch = "wasm32")]
mod console {
    use std::io;

    /// Buffers one formatted event and hands it to `console.log` on drop.
    #[derive(Default)]
    pub struct ConsoleWriter {
        buffer: Vec<u8>,
    }

    impl io::Write for ConsoleWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Drop for ConsoleWriter {
        fn drop(&mut self) {
            if self.buffer.is_empty() {
                return;
            }
            let line = String::from_utf8_lossy(&self.buffer);
            web_sys::console::log_1(&line.trim_end().into());
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub type Started = std::time::Instant;

#[cfg(target_arch = "wasm32")]
pub type Started = f64;

/// Start a measurement for `log_perf`.
#[cfg(not(target_arch = "wasm32"))]
pub fn perf_start() -> Started {
    std::time::Instant::now()
}

#[cfg(target_arch = "wasm32")]
pub fn perf_start() -> Started {
    js_sys::Date::now()
}

#[cfg(not(target_arch = "wasm32"))]
fn elapsed_ms(started_at: Started) -> u64 {
    started_at.elapsed().as_millis() as u64
}

#[cfg(target_arch = "wasm32")]
fn elapsed_ms(started_at: Started) -> u64 {
    (js_sys::Date::now() - started_at).max(0.0) as u64
}

#[inline]
pub fn log_perf(scope: &str, started_at: Started, details: &str) {
    let elapsed_ms = elapsed_ms(started_at);
    if details.trim().is_empty() {
        tracing::debug!(scope, elapsed_ms, "perf");
    } else {
        tracing::debug!(scope, elapsed_ms, details, "perf");
    }
}
