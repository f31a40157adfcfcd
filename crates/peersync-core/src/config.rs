//! # Capability Configuration
//!
//! Resolves the feature toggles that decide which lowering strategy is legal.
//!
//! Two inputs feed the resolution:
//!
//! 1. [`StreamFeatures`]: what the execution stream API offers at all
//! 2. A [`ConfigSource`]: operator overrides (`PEERSYNC_*` keys)
//!
//! ## Priority Rules
//!
//! ```text
//! native wide write   always off (no device capability query exists)
//! inline copy         offered && !DISABLE_INLINECOPY
//! simulate write64    offered(inline copy) && SIMULATE_WRITE64 && !inline copy
//! memory barrier      offered && !DISABLE_MEMBAR
//! weak consistency    offered && !DISABLE_WEAK_CONSISTENCY   (disabled by default)
//! dump                ENABLE_DUMP_MEMOPS
//! ```
//!
//! A value that does not parse as an integer leaves the governed feature off.
//!
//! The resolved [`CapabilityConfig`] is a plain immutable value; callers
//! resolve it once at startup and pass it by reference into every lowering
//! call. [`CapabilityConfig::global`] offers a process-wide cached copy for
//! embedders that cannot thread it through.

use alloc::string::String;

use crate::MAX_INLINE_SIZE;

// =============================================================================
// CONFIGURATION KEYS
// =============================================================================

/// Prefix applied to every key by [`EnvSource`]
pub const ENV_PREFIX: &str = "PEERSYNC_";

/// Disable native 64-bit writes
pub const KEY_DISABLE_WRITE64: &str = "DISABLE_WRITE64";
/// Disable inline copies
pub const KEY_DISABLE_INLINECOPY: &str = "DISABLE_INLINECOPY";
/// Emulate 64-bit writes with 8-byte inline copies
pub const KEY_SIMULATE_WRITE64: &str = "SIMULATE_WRITE64";
/// Disable stream memory barriers
pub const KEY_DISABLE_MEMBAR: &str = "DISABLE_MEMBAR";
/// Disable weak-consistency batch submission
pub const KEY_DISABLE_WEAK_CONSISTENCY: &str = "DISABLE_WEAK_CONSISTENCY";
/// Dump every submitted batch
pub const KEY_ENABLE_DUMP_MEMOPS: &str = "ENABLE_DUMP_MEMOPS";

// =============================================================================
// CONFIG SOURCE
// =============================================================================

/// Provider of raw configuration values
pub trait ConfigSource {
    /// Look up an unprefixed key
    fn get(&self, key: &str) -> Option<String>;
}

/// Borrowed key/value pairs
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSource<'a>(pub &'a [(&'a str, &'a str)]);

impl ConfigSource for StaticSource<'_> {
    fn get(&self, key: &str) -> Option<String> {
        self.0
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| String::from(*v))
    }
}

/// Process environment, keys prefixed with [`ENV_PREFIX`]
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

#[cfg(feature = "std")]
impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        let mut name = String::from(ENV_PREFIX);
        name.push_str(key);
        std::env::var(name).ok()
    }
}

/// Parsed state of one toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Toggle {
    Unset,
    Set(bool),
    Malformed,
}

fn read_toggle(source: &dyn ConfigSource, key: &str) -> Toggle {
    let toggle = match source.get(key) {
        None => Toggle::Unset,
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(v) => Toggle::Set(v != 0),
            Err(_) => Toggle::Malformed,
        },
    };
    match toggle {
        Toggle::Malformed => log::warn!("{}{}: malformed value, feature left off", ENV_PREFIX, key),
        _ => log::debug!("{}{}={:?}", ENV_PREFIX, key, toggle),
    }
    toggle
}

/// Resolve an `ENABLE`-style toggle
fn enabled(source: &dyn ConfigSource, key: &str) -> bool {
    matches!(read_toggle(source, key), Toggle::Set(true))
}

/// Resolve a `DISABLE`-style toggle to "feature on"
fn not_disabled(source: &dyn ConfigSource, key: &str, disabled_by_default: bool) -> bool {
    match read_toggle(source, key) {
        Toggle::Unset => !disabled_by_default,
        Toggle::Set(disabled) => !disabled,
        Toggle::Malformed => false,
    }
}

// =============================================================================
// STREAM FEATURES
// =============================================================================

/// Facilities the execution stream API provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamFeatures {
    /// Inline copy operation
    pub inline_copy: bool,
    /// Memory barrier operation
    pub memory_barrier: bool,
    /// Weak-consistency batch flag
    pub weak_consistency: bool,
    /// Native 64-bit writes
    pub write64: bool,
}

impl StreamFeatures {
    /// Every extension available
    pub const fn all() -> Self {
        Self {
            inline_copy: true,
            memory_barrier: true,
            weak_consistency: true,
            write64: true,
        }
    }

    /// Baseline write/wait/flush only
    pub const fn baseline() -> Self {
        Self {
            inline_copy: false,
            memory_barrier: false,
            weak_consistency: false,
            write64: false,
        }
    }
}

// =============================================================================
// PEER CAPABILITIES
// =============================================================================

bitflags::bitflags! {
    /// Peer operations advertised to the adapter
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PeerCaps: u64 {
        /// 32-bit stores
        const STORE_DWORD = 1 << 0;
        /// 64-bit stores
        const STORE_QWORD = 1 << 1;
        /// Block copies
        const COPY_BLOCK = 1 << 2;
        /// Fences
        const FENCE = 1 << 3;
        /// AND polls
        const POLL_AND_DWORD = 1 << 4;
        /// GEQ polls
        const POLL_GEQ_DWORD = 1 << 5;
        /// NOR polls
        const POLL_NOR_DWORD = 1 << 6;
    }
}

// =============================================================================
// CAPABILITY CONFIG
// =============================================================================

/// Resolved, immutable feature toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilityConfig {
    /// Native 64-bit writes
    pub native_wide_write: bool,
    /// Inline copies
    pub inline_copy: bool,
    /// Stream memory barriers
    pub memory_barrier: bool,
    /// Weak-consistency submission
    pub weak_consistency: bool,
    /// 64-bit writes emulated by 8-byte inline copies
    pub simulate_wide_write: bool,
    /// Dump every submitted batch
    pub dump_enabled: bool,
}

static GLOBAL_CONFIG: spin::Once<CapabilityConfig> = spin::Once::new();

impl CapabilityConfig {
    /// Resolve toggles from stream features and a configuration source
    ///
    /// Pure: the same inputs always produce the same value.
    pub fn resolve(features: &StreamFeatures, source: &dyn ConfigSource) -> Self {
        // Native write64 stays off until devices can be queried for it.
        if features.write64 && not_disabled(source, KEY_DISABLE_WRITE64, false) {
            log::debug!("write64 offered by the stream, left off");
        }
        let native_wide_write = false;

        let inline_copy =
            features.inline_copy && not_disabled(source, KEY_DISABLE_INLINECOPY, false);

        let mut simulate_wide_write =
            features.inline_copy && enabled(source, KEY_SIMULATE_WRITE64);
        if simulate_wide_write && inline_copy {
            log::warn!("INLINECOPY has priority over SIMULATE_WRITE64, using the former");
            simulate_wide_write = false;
        }

        let memory_barrier =
            features.memory_barrier && not_disabled(source, KEY_DISABLE_MEMBAR, false);
        let weak_consistency = features.weak_consistency
            && not_disabled(source, KEY_DISABLE_WEAK_CONSISTENCY, true);
        let dump_enabled = enabled(source, KEY_ENABLE_DUMP_MEMOPS);

        let config = Self {
            native_wide_write,
            inline_copy,
            memory_barrier,
            weak_consistency,
            simulate_wide_write,
            dump_enabled,
        };
        log::debug!("resolved {:?}", config);
        config
    }

    /// Resolve once per process and cache the result
    ///
    /// Later calls return the first resolution regardless of arguments.
    pub fn global(features: &StreamFeatures, source: &dyn ConfigSource) -> &'static Self {
        GLOBAL_CONFIG.call_once(|| Self::resolve(features, source))
    }

    /// Cached process-wide config, if already resolved
    pub fn try_global() -> Option<&'static Self> {
        GLOBAL_CONFIG.get()
    }

    /// Check if narrow stores must go through the inline copy engine
    ///
    /// Without a memory barrier, a plain write cannot be ordered against an
    /// inline copy, so every store is diverted to the copy engine.
    #[inline]
    pub const fn emit_narrow_as_copy(&self) -> bool {
        (self.inline_copy && !self.memory_barrier)
            || (self.simulate_wide_write && !self.memory_barrier)
    }

    /// Check if the device can evaluate NOR waits
    ///
    /// No supported device does.
    #[inline]
    pub const fn nor_wait_supported(&self) -> bool {
        false
    }

    /// Peer operations to advertise to the adapter
    pub fn peer_caps(&self) -> PeerCaps {
        let mut caps =
            PeerCaps::STORE_DWORD | PeerCaps::STORE_QWORD | PeerCaps::FENCE | PeerCaps::POLL_AND_DWORD;

        if self.nor_wait_supported() {
            caps |= PeerCaps::POLL_NOR_DWORD;
        } else {
            caps |= PeerCaps::POLL_GEQ_DWORD;
        }

        if self.inline_copy {
            caps |= PeerCaps::COPY_BLOCK;
        } else if self.native_wide_write || self.simulate_wide_write {
            caps |= PeerCaps::STORE_QWORD;
        }
        caps
    }

    /// Largest block the adapter may request in one copy
    #[inline]
    pub const fn peer_dma_op_map_len(&self) -> usize {
        MAX_INLINE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_with_all_features() {
        let config = CapabilityConfig::resolve(&StreamFeatures::all(), &StaticSource(&[]));
        assert!(!config.native_wide_write);
        assert!(config.inline_copy);
        assert!(config.memory_barrier);
        assert!(!config.weak_consistency);
        assert!(!config.simulate_wide_write);
        assert!(!config.dump_enabled);
    }

    #[test]
    fn test_baseline_features() {
        let source = StaticSource(&[(KEY_SIMULATE_WRITE64, "1"), (KEY_DISABLE_WEAK_CONSISTENCY, "0")]);
        let config = CapabilityConfig::resolve(&StreamFeatures::baseline(), &source);
        assert_eq!(config, CapabilityConfig::default());
    }

    #[test]
    fn test_inline_copy_has_priority() {
        let source = StaticSource(&[(KEY_SIMULATE_WRITE64, "1")]);
        let config = CapabilityConfig::resolve(&StreamFeatures::all(), &source);
        assert!(config.inline_copy);
        assert!(!config.simulate_wide_write);

        let source = StaticSource(&[(KEY_SIMULATE_WRITE64, "1"), (KEY_DISABLE_INLINECOPY, "1")]);
        let config = CapabilityConfig::resolve(&StreamFeatures::all(), &source);
        assert!(!config.inline_copy);
        assert!(config.simulate_wide_write);
    }

    #[test]
    fn test_write64_never_native() {
        let source = StaticSource(&[(KEY_DISABLE_WRITE64, "0")]);
        let config = CapabilityConfig::resolve(&StreamFeatures::all(), &source);
        assert!(!config.native_wide_write);
    }

    #[test]
    fn test_overrides() {
        let source = StaticSource(&[
            (KEY_DISABLE_MEMBAR, "1"),
            (KEY_DISABLE_WEAK_CONSISTENCY, "0"),
            (KEY_ENABLE_DUMP_MEMOPS, " 2 "),
        ]);
        let config = CapabilityConfig::resolve(&StreamFeatures::all(), &source);
        assert!(!config.memory_barrier);
        assert!(config.weak_consistency);
        assert!(config.dump_enabled);
    }

    #[test]
    fn test_malformed_leaves_feature_off() {
        let source = StaticSource(&[
            (KEY_DISABLE_INLINECOPY, "yes"),
            (KEY_DISABLE_MEMBAR, ""),
            (KEY_ENABLE_DUMP_MEMOPS, "on"),
        ]);
        let config = CapabilityConfig::resolve(&StreamFeatures::all(), &source);
        assert!(!config.inline_copy);
        assert!(!config.memory_barrier);
        assert!(!config.dump_enabled);
    }

    #[test]
    fn test_resolution_is_stable() {
        let source = StaticSource(&[(KEY_DISABLE_MEMBAR, "1")]);
        let a = CapabilityConfig::resolve(&StreamFeatures::all(), &source);
        let b = CapabilityConfig::resolve(&StreamFeatures::all(), &source);
        assert_eq!(a, b);

        let first = CapabilityConfig::global(&StreamFeatures::all(), &source);
        let second = CapabilityConfig::global(&StreamFeatures::baseline(), &StaticSource(&[]));
        assert!(core::ptr::eq(first, second));
        assert_eq!(*first, a);
        assert_eq!(CapabilityConfig::try_global(), Some(first));
    }

    #[test]
    fn test_emit_narrow_as_copy() {
        let mut config = CapabilityConfig {
            inline_copy: true,
            ..CapabilityConfig::default()
        };
        assert!(config.emit_narrow_as_copy());
        config.memory_barrier = true;
        assert!(!config.emit_narrow_as_copy());

        let sim = CapabilityConfig {
            simulate_wide_write: true,
            ..CapabilityConfig::default()
        };
        assert!(sim.emit_narrow_as_copy());
    }

    #[test]
    fn test_peer_caps() {
        let plain = CapabilityConfig::default().peer_caps();
        assert!(plain.contains(PeerCaps::STORE_DWORD | PeerCaps::FENCE | PeerCaps::POLL_GEQ_DWORD));
        assert!(!plain.contains(PeerCaps::COPY_BLOCK));
        assert!(!plain.contains(PeerCaps::POLL_NOR_DWORD));

        let inline = CapabilityConfig {
            inline_copy: true,
            ..CapabilityConfig::default()
        };
        assert!(inline.peer_caps().contains(PeerCaps::COPY_BLOCK));
        assert_eq!(inline.peer_dma_op_map_len(), 256);
    }
}
