//! jsbridge Core
//!
//! Engine-independent pieces shared by the bridge crates:
//! - Host-side dynamic values (`HostValue`, `HostMap`)
//! - Wall clock used by the `timestamp_ms` global

pub mod time;
pub mod value;

pub use value::{HostMap, HostValue};

/// Bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
