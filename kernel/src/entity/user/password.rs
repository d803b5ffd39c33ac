use std::fmt::{Debug, Formatter};

use vodca::{AsRefln, Fromln};

/// Credential as stored at rest. Hashing happens outside this crate; the value
/// is carried opaquely and never serialized into responses.
#[derive(Clone, Eq, PartialEq, Fromln, AsRefln)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }
}

impl Debug for PasswordHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}
