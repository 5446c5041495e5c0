//! Variable handles.

use std::fmt;

/// Handle to a client-visible (external) variable.
///
/// Handles are plain integers handed out by a solver's variable arena. The
/// name and current value live in the solver that created the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Variable(pub(crate) u32);

impl Variable {
    /// Create a variable handle with the given arena index.
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// The arena index of this variable.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
