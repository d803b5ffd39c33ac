use serde::{Deserialize, Serialize};
use vodca::{AsRefln, Fromln};

/// Copy counter used for both `total_copies` and `available_copies`.
/// The store keeps `0 <= available <= total`; this type does not enforce it
/// on its own because the two bounds live on different fields.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Fromln, AsRefln)]
pub struct CopyCount(i32);

impl CopyCount {
    pub fn new(count: impl Into<i32>) -> Self {
        Self(count.into())
    }
}
