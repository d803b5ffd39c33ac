mod borrowed_at;
mod due_date;
mod fine;
mod id;
mod notes;
mod returned_at;
mod status;

pub use self::{
    borrowed_at::*, due_date::*, fine::*, id::*, notes::*, returned_at::*, status::*,
};
use crate::entity::{BookId, UserId};
use destructure::{Destructure, Mutation};
use time::OffsetDateTime;
use vodca::References;

/// One loan of one book by one user. Created by a successful borrow, mutated
/// exactly once by a successful return (or by an administrative override),
/// never deleted.
///
/// `overdue` is not a stored state: it is always derived from
/// `status == Borrowed && now > due_at`.
#[derive(Debug, Clone, Eq, PartialEq, References, Destructure, Mutation)]
pub struct BorrowRecord {
    id: RecordId,
    user_id: UserId,
    book_id: BookId,
    borrowed_at: BorrowedAt,
    due_at: DueDate,
    returned_at: Option<ReturnedAt>,
    status: RecordStatus,
    fine: Fine,
    notes: Option<RecordNotes>,
}

impl BorrowRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: RecordId,
        user_id: UserId,
        book_id: BookId,
        borrowed_at: BorrowedAt,
        due_at: DueDate,
        returned_at: Option<ReturnedAt>,
        status: RecordStatus,
        fine: Fine,
        notes: Option<RecordNotes>,
    ) -> Self {
        Self {
            id,
            user_id,
            book_id,
            borrowed_at,
            due_at,
            returned_at,
            status,
            fine,
            notes,
        }
    }

    pub fn is_overdue(&self, now: OffsetDateTime) -> bool {
        match self.status {
            RecordStatus::Returned => false,
            RecordStatus::Borrowed => now > *self.due_at.as_ref(),
        }
    }

    /// Whole days past the due date, rounded up. Zero when returned or on time.
    pub fn days_overdue(&self, now: OffsetDateTime) -> i64 {
        if !self.is_overdue(now) {
            return 0;
        }
        let late = now - *self.due_at.as_ref();
        // Any positive lateness counts as at least one day, even sub-second.
        late.whole_seconds().div_ceil(86_400).max(1)
    }
}
