use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vodca::{AsRefln, Fromln};

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Fromln, AsRefln)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new(id: impl Into<Uuid>) -> Self {
        Self(id.into())
    }
}
