use serde::{Deserialize, Serialize};
use vodca::{AsRefln, Fromln};

/// Unique within the catalogue. Uniqueness is enforced at borrow-service level
/// and backed by a unique index in the store.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Fromln, AsRefln)]
pub struct BookIsbn(String);

impl BookIsbn {
    pub fn new(isbn: impl Into<String>) -> Self {
        Self(isbn.into())
    }
}
