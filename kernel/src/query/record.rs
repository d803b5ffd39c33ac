use time::OffsetDateTime;

use crate::database::Transaction;
use crate::entity::{BookId, BorrowRecord, RecordId, SelectLimit, SelectOffset, UserId};
use crate::KernelError;

#[async_trait::async_trait]
pub trait RecordQuery<Connection: Transaction>: Sync + Send + 'static {
    async fn find_by_id(
        &self,
        con: &mut Connection,
        id: &RecordId,
    ) -> error_stack::Result<Option<BorrowRecord>, KernelError>;

    /// The open (`borrowed`) record of one user for one book, if any.
    async fn find_open(
        &self,
        con: &mut Connection,
        user_id: &UserId,
        book_id: &BookId,
    ) -> error_stack::Result<Option<BorrowRecord>, KernelError>;

    /// Open records of the user whose due date has passed.
    async fn find_overdue_by_user(
        &self,
        con: &mut Connection,
        user_id: &UserId,
        now: OffsetDateTime,
    ) -> error_stack::Result<Vec<BorrowRecord>, KernelError>;

    async fn find_by_user_id(
        &self,
        con: &mut Connection,
        user_id: &UserId,
    ) -> error_stack::Result<Vec<BorrowRecord>, KernelError>;

    async fn find_by_book_id(
        &self,
        con: &mut Connection,
        book_id: &BookId,
    ) -> error_stack::Result<Vec<BorrowRecord>, KernelError>;

    async fn find_all(
        &self,
        con: &mut Connection,
        limit: &SelectLimit,
        offset: &SelectOffset,
    ) -> error_stack::Result<Vec<BorrowRecord>, KernelError>;

    /// All open records past due at `now`, oldest due date first.
    async fn find_overdue(
        &self,
        con: &mut Connection,
        now: OffsetDateTime,
        limit: &SelectLimit,
        offset: &SelectOffset,
    ) -> error_stack::Result<Vec<BorrowRecord>, KernelError>;
}

pub trait DependOnRecordQuery<Connection: Transaction>: Sync + Send + 'static {
    type RecordQuery: RecordQuery<Connection>;
    fn record_query(&self) -> &Self::RecordQuery;
}
