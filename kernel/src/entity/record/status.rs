use serde::{Deserialize, Serialize};

/// Stored lifecycle state. There is deliberately no `Overdue` variant: overdue
/// is a read-time view of `Borrowed` with an elapsed due date.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Borrowed,
    Returned,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Borrowed => "borrowed",
            RecordStatus::Returned => "returned",
        }
    }
}

impl TryFrom<&str> for RecordStatus {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "borrowed" => Ok(RecordStatus::Borrowed),
            "returned" => Ok(RecordStatus::Returned),
            other => Err(format!("unknown record status: {other}")),
        }
    }
}
