//! CPU device implementation

use crate::runtime::Device;

/// CPU device (there's only one: the host)
///
/// Every `CpuDevice` compares equal, so tensors created through different
/// clients can still be mixed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CpuDevice {
    id: usize,
}

impl CpuDevice {
    /// Create a handle to the host device
    pub fn new() -> Self {
        Self { id: 0 }
    }
}

impl Device for CpuDevice {
    fn id(&self) -> usize {
        self.id
    }

    fn name(&self) -> String {
        "cpu".to_string()
    }
}
