use serde::{Deserialize, Serialize};
use vodca::{AsRefln, Fromln};

/// Monetary amount in integer cents. Kept integral end to end; the wire layer
/// converts to dollars when rendering.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Fromln, AsRefln)]
pub struct Fine(i64);

impl Fine {
    pub fn new(cents: impl Into<i64>) -> Self {
        Self(cents.into())
    }
}
