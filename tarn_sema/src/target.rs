//! Target ABI descriptor

use serde::{Deserialize, Serialize};

/// ABI constants consumed by lowering. Injected by the driver rather than
/// read from globals so one process can analyze for several targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub pointer_size: u64,
    pub pointer_align: u64,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            pointer_size: 8,
            pointer_align: 8,
        }
    }
}
