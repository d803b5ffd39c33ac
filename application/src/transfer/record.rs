use kernel::prelude::entity::{
    Book, BorrowRecord, DestructBorrowRecord, RecordStatus, SelectLimit, SelectOffset, User,
};
use time::OffsetDateTime;
use uuid::Uuid;

/// Short book view embedded in record responses.
#[derive(Debug, Clone)]
pub struct BookSummaryDto {
    pub title: String,
    pub author: String,
    pub isbn: String,
}

impl From<&Book> for BookSummaryDto {
    fn from(value: &Book) -> Self {
        Self {
            title: value.title().as_ref().clone(),
            author: value.author().as_ref().clone(),
            isbn: value.isbn().as_ref().clone(),
        }
    }
}

/// Short user view embedded in record responses.
#[derive(Debug, Clone)]
pub struct UserSummaryDto {
    pub name: String,
    pub email: String,
    pub student_id: String,
}

impl From<&User> for UserSummaryDto {
    fn from(value: &User) -> Self {
        Self {
            name: value.name().as_ref().clone(),
            email: value.email().as_ref().clone(),
            student_id: value.student_id().as_ref().clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub user: Option<UserSummaryDto>,
    pub book: Option<BookSummaryDto>,
    pub borrowed_at: OffsetDateTime,
    pub due_at: OffsetDateTime,
    pub returned_at: Option<OffsetDateTime>,
    pub status: RecordStatus,
    pub fine_cents: i64,
    pub notes: Option<String>,
    pub is_overdue: bool,
    pub days_overdue: i64,
}

impl RecordDto {
    /// Builds the outward view: stored fields plus the derived overdue state
    /// at `now` and whatever summaries could be resolved.
    pub fn from_parts(
        record: BorrowRecord,
        user: Option<&User>,
        book: Option<&Book>,
        now: OffsetDateTime,
    ) -> Self {
        let is_overdue = record.is_overdue(now);
        let days_overdue = record.days_overdue(now);
        let DestructBorrowRecord {
            id,
            user_id,
            book_id,
            borrowed_at,
            due_at,
            returned_at,
            status,
            fine,
            notes,
        } = record.into_destruct();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            book_id: book_id.into(),
            user: user.map(UserSummaryDto::from),
            book: book.map(BookSummaryDto::from),
            borrowed_at: borrowed_at.into(),
            due_at: due_at.into(),
            returned_at: returned_at.map(Into::into),
            status,
            fine_cents: fine.into(),
            notes: notes.map(Into::into),
            is_overdue,
            days_overdue,
        }
    }
}

pub struct BorrowBookDto {
    pub user_id: Uuid,
    pub book_id: Uuid,
}

pub struct ReturnBookDto {
    pub record_id: Uuid,
}

pub struct UpdateRecordDto {
    pub id: Uuid,
    pub status: Option<RecordStatus>,
    pub notes: Option<String>,
}

pub struct GetRecordDto {
    pub id: Uuid,
}

pub struct GetRecordsByUserDto {
    pub user_id: Uuid,
}

pub struct GetRecordsByBookDto {
    pub book_id: Uuid,
}

pub struct GetAllRecordDto {
    pub limit: SelectLimit,
    pub offset: SelectOffset,
}

pub struct GetOverdueRecordDto {
    pub limit: SelectLimit,
    pub offset: SelectOffset,
}
