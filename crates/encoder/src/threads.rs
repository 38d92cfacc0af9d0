//! Encoder thread count
//!
//! Derives the `-threads` value from configuration and the CPU core count.

use mbify_config::Config;

/// Upper bound for the automatic thread count; libvpx gains little past it
pub const MAX_AUTO_THREADS: u32 = 16;

/// Resolve the thread count for an encode
///
/// A configured value greater than zero is used as is. Zero means automatic:
/// the logical core count detected via num_cpus, clamped to `1..=16`.
pub fn resolve_threads(cfg: &Config) -> u32 {
    resolve_threads_for(cfg.encoder.threads, num_cpus::get() as u32)
}

fn resolve_threads_for(configured: u32, cores: u32) -> u32 {
    if configured > 0 {
        configured
    } else {
        cores.clamp(1, MAX_AUTO_THREADS)
    }
}
