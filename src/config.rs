//! Decoder configuration for method bodies
//!
//! This module provides the limits and optional checks applied while lazily decoding a
//! method body. The decoders never trust counts read from the image; these limits bound the
//! work a single corrupt record can cause.

/// Configuration for method-body decoding
///
/// Structural checks (bounds, LEB128 encoding, opcode validity) are always performed. This
/// configuration adds resource limits and optional semantic checks on top.
///
/// # Examples
///
/// ```rust
/// use dexscope::DecoderConfig;
///
/// let config = DecoderConfig::strict();
/// assert!(config.validate_try_ranges);
/// assert_eq!(DecoderConfig::default().max_catch_handlers, 65535);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Maximum number of typed handlers a single catch handler record may declare
    pub max_catch_handlers: u32,

    /// Maximum number of debug items produced before the end-of-sequence marker must appear
    pub max_debug_items: usize,

    /// Reject try blocks whose protected range extends past the instruction stream
    pub validate_try_ranges: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_catch_handlers: 65535,
            max_debug_items: 1_048_576,
            validate_try_ranges: false,
        }
    }
}

impl DecoderConfig {
    /// Creates a configuration with tight limits and all optional checks enabled
    ///
    /// Suited for triage of untrusted images, where a corrupt record should fail fast.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            max_catch_handlers: 4096,
            max_debug_items: 65536,
            validate_try_ranges: true,
        }
    }

    /// Creates a configuration without practical limits
    ///
    /// Only the structural checks remain. **Warning**: a corrupt handler or debug record may
    /// cause a very long decode.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            max_catch_handlers: u32::MAX,
            max_debug_items: usize::MAX,
            validate_try_ranges: false,
        }
    }
}
