//! Device identities.

/// Link-layer identity of a device.
///
/// Fixed when the device is provisioned and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct NodeId(pub u16);

impl NodeId {
    /// Numeric value.
    #[inline]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl From<u16> for NodeId {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
