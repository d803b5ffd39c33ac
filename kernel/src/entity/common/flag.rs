use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::marker::PhantomData;

/// Soft-delete marker. Entities are deactivated, never removed from the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IsActive<T>(bool, PhantomData<T>);

impl<T> IsActive<T> {
    pub fn new(value: impl Into<bool>) -> Self {
        Self(value.into(), PhantomData)
    }
}

impl<T> AsRef<bool> for IsActive<T> {
    fn as_ref(&self) -> &bool {
        &self.0
    }
}

impl<T> From<IsActive<T>> for bool {
    fn from(value: IsActive<T>) -> Self {
        value.0
    }
}

impl<T> Serialize for IsActive<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for IsActive<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        bool::deserialize(deserializer).map(|value| Self(value, PhantomData))
    }
}
