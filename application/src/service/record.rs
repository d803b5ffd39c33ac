use error_stack::Report;
use time::OffsetDateTime;
use uuid::Uuid;

use kernel::interface::database::{DatabaseConnection, DependOnDatabaseConnection, Transaction};
use kernel::interface::query::{
    BookQuery, DependOnBookQuery, DependOnRecordQuery, DependOnUserQuery, RecordQuery, UserQuery,
};
use kernel::interface::update::{
    BookModifier, DependOnBookModifier, DependOnRecordModifier, RecordModifier,
};
use kernel::prelude::entity::{
    BookId, BorrowRecord, BorrowedAt, DestructBorrowRecord, Fine, RecordId, RecordNotes,
    RecordStatus, ReturnedAt, UserId,
};
use kernel::prelude::policy::DependOnLoanPolicy;
use kernel::KernelError;

use crate::transfer::{
    BorrowBookDto, GetAllRecordDto, GetOverdueRecordDto, GetRecordDto, GetRecordsByBookDto,
    GetRecordsByUserDto, RecordDto, ReturnBookDto, UpdateRecordDto,
};

/// Creates a borrow record and takes one copy out of the inventory.
///
/// Preconditions run in a fixed order so every failure mode is a distinct
/// error. The final availability enforcement is the conditional decrement in
/// `BookModifier::acquire_copy`, which closes the race between the check and
/// the write; a store-level conflict is retried once before surfacing.
#[async_trait::async_trait]
pub trait BorrowService<Connection: Transaction + Send>:
    'static
    + Sync
    + Send
    + DependOnDatabaseConnection<Connection>
    + DependOnLoanPolicy
    + DependOnUserQuery<Connection>
    + DependOnBookQuery<Connection>
    + DependOnRecordQuery<Connection>
    + DependOnBookModifier<Connection>
    + DependOnRecordModifier<Connection>
{
    async fn borrow_book(
        &self,
        dto: BorrowBookDto,
        now: OffsetDateTime,
    ) -> error_stack::Result<RecordDto, KernelError> {
        match borrow_once(self, &dto, now).await {
            Err(report) if matches!(report.current_context(), KernelError::Conflict) => {
                tracing::warn!(user_id = %dto.user_id, book_id = %dto.book_id, "borrow hit a store conflict, retrying once");
                borrow_once(self, &dto, now).await
            }
            other => other,
        }
    }
}

impl<Connection: Transaction + Send, T> BorrowService<Connection> for T where
    T: DependOnDatabaseConnection<Connection>
        + DependOnLoanPolicy
        + DependOnUserQuery<Connection>
        + DependOnBookQuery<Connection>
        + DependOnRecordQuery<Connection>
        + DependOnBookModifier<Connection>
        + DependOnRecordModifier<Connection>
{
}

async fn borrow_once<Connection, T>(
    module: &T,
    dto: &BorrowBookDto,
    now: OffsetDateTime,
) -> error_stack::Result<RecordDto, KernelError>
where
    Connection: Transaction + Send,
    T: DependOnDatabaseConnection<Connection>
        + DependOnLoanPolicy
        + DependOnUserQuery<Connection>
        + DependOnBookQuery<Connection>
        + DependOnRecordQuery<Connection>
        + DependOnBookModifier<Connection>
        + DependOnRecordModifier<Connection>
        + ?Sized,
{
    let mut con = module.database_connection().transact().await?;

    let user_id = UserId::new(dto.user_id);
    let user = module
        .user_query()
        .find_by_id(&mut con, &user_id)
        .await?
        .ok_or_else(|| Report::new(KernelError::UserNotFound))?;
    if !*user.is_active().as_ref() {
        return Err(Report::new(KernelError::UserInactive));
    }

    let book_id = BookId::new(dto.book_id);
    let book = module
        .book_query()
        .find_by_id(&mut con, &book_id)
        .await?
        .filter(|book| *book.is_active().as_ref())
        .ok_or_else(|| Report::new(KernelError::BookNotFound))?;
    if !book.is_available() {
        return Err(Report::new(KernelError::BookUnavailable));
    }

    if module
        .record_query()
        .find_open(&mut con, &user_id, &book_id)
        .await?
        .is_some()
    {
        return Err(Report::new(KernelError::DuplicateBorrow));
    }

    let overdue = module
        .record_query()
        .find_overdue_by_user(&mut con, &user_id, now)
        .await?;
    if !overdue.is_empty() {
        return Err(Report::new(KernelError::OutstandingOverdue));
    }

    // Availability may have changed since the read above; the conditional
    // decrement is the authoritative check.
    if !module.book_modifier().acquire_copy(&mut con, &book_id).await? {
        return Err(Report::new(KernelError::BookUnavailable));
    }

    let borrowed_at = BorrowedAt::new(now);
    let due_at = module.loan_policy().due_date(&borrowed_at);
    let record = BorrowRecord::new(
        RecordId::new(Uuid::new_v4()),
        user_id,
        book_id,
        borrowed_at,
        due_at,
        None,
        RecordStatus::Borrowed,
        Fine::new(0i64),
        None,
    );
    module.record_modifier().create(&mut con, &record).await?;
    con.commit().await?;

    tracing::debug!(record_id = %Uuid::from(record.id().clone()), "book borrowed");
    Ok(RecordDto::from_parts(record, Some(&user), Some(&book), now))
}

/// Closes a borrow record: stamps the return, computes the fine and puts the
/// copy back into the inventory.
#[async_trait::async_trait]
pub trait ReturnService<Connection: Transaction + Send>:
    'static
    + Sync
    + Send
    + DependOnDatabaseConnection<Connection>
    + DependOnLoanPolicy
    + DependOnUserQuery<Connection>
    + DependOnBookQuery<Connection>
    + DependOnRecordQuery<Connection>
    + DependOnBookModifier<Connection>
    + DependOnRecordModifier<Connection>
{
    async fn return_book(
        &self,
        dto: ReturnBookDto,
        now: OffsetDateTime,
    ) -> error_stack::Result<RecordDto, KernelError> {
        match return_once(self, &dto, now).await {
            Err(report) if matches!(report.current_context(), KernelError::Conflict) => {
                tracing::warn!(record_id = %dto.record_id, "return hit a store conflict, retrying once");
                return_once(self, &dto, now).await
            }
            other => other,
        }
    }
}

impl<Connection: Transaction + Send, T> ReturnService<Connection> for T where
    T: DependOnDatabaseConnection<Connection>
        + DependOnLoanPolicy
        + DependOnUserQuery<Connection>
        + DependOnBookQuery<Connection>
        + DependOnRecordQuery<Connection>
        + DependOnBookModifier<Connection>
        + DependOnRecordModifier<Connection>
{
}

async fn return_once<Connection, T>(
    module: &T,
    dto: &ReturnBookDto,
    now: OffsetDateTime,
) -> error_stack::Result<RecordDto, KernelError>
where
    Connection: Transaction + Send,
    T: DependOnDatabaseConnection<Connection>
        + DependOnLoanPolicy
        + DependOnUserQuery<Connection>
        + DependOnBookQuery<Connection>
        + DependOnRecordQuery<Connection>
        + DependOnBookModifier<Connection>
        + DependOnRecordModifier<Connection>
        + ?Sized,
{
    let mut con = module.database_connection().transact().await?;

    let record_id = RecordId::new(dto.record_id);
    let record = module
        .record_query()
        .find_by_id(&mut con, &record_id)
        .await?
        .ok_or_else(|| Report::new(KernelError::BorrowNotFound))?;
    if *record.status() == RecordStatus::Returned {
        return Err(Report::new(KernelError::AlreadyReturned));
    }

    let fine = module.loan_policy().fine_for(record.due_at(), now);
    let DestructBorrowRecord {
        id,
        user_id,
        book_id,
        borrowed_at,
        due_at,
        notes,
        ..
    } = record.into_destruct();
    let record = BorrowRecord::new(
        id,
        user_id.clone(),
        book_id.clone(),
        borrowed_at,
        due_at,
        Some(ReturnedAt::new(now)),
        RecordStatus::Returned,
        fine,
        notes,
    );
    module.record_modifier().update(&mut con, &record).await?;

    if !module.book_modifier().release_copy(&mut con, &book_id).await? {
        // Count already at total; the record stays authoritative.
        tracing::warn!(?book_id, "available count was already full while closing record");
    }

    let user = module.user_query().find_by_id(&mut con, &user_id).await?;
    let book = module.book_query().find_by_id(&mut con, &book_id).await?;
    con.commit().await?;

    Ok(RecordDto::from_parts(record, user.as_ref(), book.as_ref(), now))
}

/// Administrative override of status/notes. Not a free-form edit: a status
/// change performs the matching inventory adjustment in the same transaction,
/// so the materialized available count cannot silently drift.
#[async_trait::async_trait]
pub trait UpdateRecordService<Connection: Transaction + Send>:
    'static
    + Sync
    + Send
    + DependOnDatabaseConnection<Connection>
    + DependOnUserQuery<Connection>
    + DependOnBookQuery<Connection>
    + DependOnRecordQuery<Connection>
    + DependOnBookModifier<Connection>
    + DependOnRecordModifier<Connection>
{
    async fn update_record(
        &self,
        dto: UpdateRecordDto,
        now: OffsetDateTime,
    ) -> error_stack::Result<RecordDto, KernelError> {
        let mut con = self.database_connection().transact().await?;

        let record_id = RecordId::new(dto.id);
        let record = self
            .record_query()
            .find_by_id(&mut con, &record_id)
            .await?
            .ok_or_else(|| Report::new(KernelError::BorrowNotFound))?;

        let old_status = *record.status();
        let new_status = dto.status.unwrap_or(old_status);
        let DestructBorrowRecord {
            id,
            user_id,
            book_id,
            borrowed_at,
            due_at,
            returned_at,
            fine,
            notes,
            ..
        } = record.into_destruct();

        let (returned_at, fine) = match (old_status, new_status) {
            (RecordStatus::Borrowed, RecordStatus::Returned) => {
                if !self.book_modifier().release_copy(&mut con, &book_id).await? {
                    tracing::warn!(?book_id, "available count was already full while closing record");
                }
                (returned_at.or(Some(ReturnedAt::new(now))), fine)
            }
            (RecordStatus::Returned, RecordStatus::Borrowed) => {
                if !self.book_modifier().acquire_copy(&mut con, &book_id).await? {
                    return Err(Report::new(KernelError::BookUnavailable));
                }
                (None, Fine::new(0i64))
            }
            _ => (returned_at, fine),
        };
        let notes = dto.notes.map(RecordNotes::new).or(notes);

        let record = BorrowRecord::new(
            id,
            user_id.clone(),
            book_id.clone(),
            borrowed_at,
            due_at,
            returned_at,
            new_status,
            fine,
            notes,
        );
        self.record_modifier().update(&mut con, &record).await?;

        let user = self.user_query().find_by_id(&mut con, &user_id).await?;
        let book = self.book_query().find_by_id(&mut con, &book_id).await?;
        con.commit().await?;

        Ok(RecordDto::from_parts(record, user.as_ref(), book.as_ref(), now))
    }
}

impl<Connection: Transaction + Send, T> UpdateRecordService<Connection> for T where
    T: DependOnDatabaseConnection<Connection>
        + DependOnUserQuery<Connection>
        + DependOnBookQuery<Connection>
        + DependOnRecordQuery<Connection>
        + DependOnBookModifier<Connection>
        + DependOnRecordModifier<Connection>
{
}

#[async_trait::async_trait]
pub trait GetRecordService<Connection: Transaction + Send>:
    'static
    + Sync
    + Send
    + DependOnDatabaseConnection<Connection>
    + DependOnUserQuery<Connection>
    + DependOnBookQuery<Connection>
    + DependOnRecordQuery<Connection>
{
    async fn get_all_records(
        &self,
        dto: GetAllRecordDto,
        now: OffsetDateTime,
    ) -> error_stack::Result<Vec<RecordDto>, KernelError> {
        let mut con = self.database_connection().transact().await?;
        let records = self
            .record_query()
            .find_all(&mut con, &dto.limit, &dto.offset)
            .await?;
        populate(&mut con, self.user_query(), self.book_query(), records, now).await
    }

    async fn get_records_by_user(
        &self,
        dto: GetRecordsByUserDto,
        now: OffsetDateTime,
    ) -> error_stack::Result<Vec<RecordDto>, KernelError> {
        let mut con = self.database_connection().transact().await?;
        let user_id = UserId::new(dto.user_id);
        let records = self
            .record_query()
            .find_by_user_id(&mut con, &user_id)
            .await?;
        populate(&mut con, self.user_query(), self.book_query(), records, now).await
    }

    async fn get_record(
        &self,
        dto: GetRecordDto,
        now: OffsetDateTime,
    ) -> error_stack::Result<RecordDto, KernelError> {
        let mut con = self.database_connection().transact().await?;
        let record = self
            .record_query()
            .find_by_id(&mut con, &RecordId::new(dto.id))
            .await?
            .ok_or_else(|| Report::new(KernelError::BorrowNotFound))?;
        let user = self.user_query().find_by_id(&mut con, record.user_id()).await?;
        let book = self.book_query().find_by_id(&mut con, record.book_id()).await?;
        Ok(RecordDto::from_parts(record, user.as_ref(), book.as_ref(), now))
    }

    async fn get_records_by_book(
        &self,
        dto: GetRecordsByBookDto,
        now: OffsetDateTime,
    ) -> error_stack::Result<Vec<RecordDto>, KernelError> {
        let mut con = self.database_connection().transact().await?;
        let book_id = BookId::new(dto.book_id);
        let records = self
            .record_query()
            .find_by_book_id(&mut con, &book_id)
            .await?;
        populate(&mut con, self.user_query(), self.book_query(), records, now).await
    }

    async fn get_overdue_records(
        &self,
        dto: GetOverdueRecordDto,
        now: OffsetDateTime,
    ) -> error_stack::Result<Vec<RecordDto>, KernelError> {
        let mut con = self.database_connection().transact().await?;
        let records = self
            .record_query()
            .find_overdue(&mut con, now, &dto.limit, &dto.offset)
            .await?;
        populate(&mut con, self.user_query(), self.book_query(), records, now).await
    }
}

impl<Connection: Transaction + Send, T> GetRecordService<Connection> for T where
    T: DependOnDatabaseConnection<Connection>
        + DependOnUserQuery<Connection>
        + DependOnBookQuery<Connection>
        + DependOnRecordQuery<Connection>
{
}

async fn populate<Connection, UQ, BQ>(
    con: &mut Connection,
    user_query: &UQ,
    book_query: &BQ,
    records: Vec<BorrowRecord>,
    now: OffsetDateTime,
) -> error_stack::Result<Vec<RecordDto>, KernelError>
where
    Connection: Transaction + Send,
    UQ: UserQuery<Connection>,
    BQ: BookQuery<Connection>,
{
    let mut dtos = Vec::with_capacity(records.len());
    for record in records {
        let user = user_query.find_by_id(con, record.user_id()).await?;
        let book = book_query.find_by_id(con, record.book_id()).await?;
        dtos.push(RecordDto::from_parts(
            record,
            user.as_ref(),
            book.as_ref(),
            now,
        ));
    }
    Ok(dtos)
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use time::macros::datetime;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use kernel::interface::database::{DatabaseConnection, Transaction};
    use kernel::interface::query::{BookFilter, BookQuery, RecordQuery, UserQuery};
    use kernel::interface::update::{BookModifier, RecordModifier};
    use kernel::prelude::entity::{
        Book, BookAuthor, BookCategory, BookId, BookIsbn, BookTitle, BorrowRecord, CopyCount,
        DestructBook, IsActive, PasswordHash, RecordId, SelectLimit, SelectOffset, StudentId,
        User, UserEmail, UserId, UserName, UserRole,
    };
    use kernel::prelude::policy::{DependOnLoanPolicy, LoanPolicy};
    use kernel::KernelError;

    use super::*;
    use crate::transfer::{BorrowBookDto, GetOverdueRecordDto, ReturnBookDto, UpdateRecordDto};

    const JAN_1: OffsetDateTime = datetime!(2024-01-01 12:00 UTC);
    const JAN_10: OffsetDateTime = datetime!(2024-01-10 12:00 UTC);
    const JAN_15: OffsetDateTime = datetime!(2024-01-15 12:00 UTC);
    const JAN_20: OffsetDateTime = datetime!(2024-01-20 12:00 UTC);
    const FEB_1: OffsetDateTime = datetime!(2024-02-01 12:00 UTC);

    #[derive(Default)]
    struct State {
        users: HashMap<Uuid, User>,
        books: HashMap<Uuid, Book>,
        records: HashMap<Uuid, BorrowRecord>,
    }

    struct MemTransaction(Arc<Mutex<State>>);

    #[async_trait::async_trait]
    impl Transaction for MemTransaction {
        async fn commit(self) -> error_stack::Result<(), KernelError> {
            Ok(())
        }
        async fn roll_back(self) -> error_stack::Result<(), KernelError> {
            Ok(())
        }
    }

    fn book_with_available(book: Book, delta: i32) -> Book {
        let DestructBook {
            id,
            title,
            author,
            isbn,
            category,
            total_copies,
            available_copies,
            is_active,
        } = book.into_destruct();
        let available: i32 = available_copies.into();
        Book::new(
            id,
            title,
            author,
            isbn,
            category,
            total_copies,
            CopyCount::new(available + delta),
            is_active,
        )
    }

    struct MemUserRepository;

    #[async_trait::async_trait]
    impl UserQuery<MemTransaction> for MemUserRepository {
        async fn find_by_id(
            &self,
            con: &mut MemTransaction,
            id: &UserId,
        ) -> error_stack::Result<Option<User>, KernelError> {
            Ok(con.0.lock().unwrap().users.get(id.as_ref()).cloned())
        }

        async fn find_by_email(
            &self,
            con: &mut MemTransaction,
            email: &UserEmail,
        ) -> error_stack::Result<Option<User>, KernelError> {
            Ok(con
                .0
                .lock()
                .unwrap()
                .users
                .values()
                .find(|user| user.email() == email)
                .cloned())
        }

        async fn find_all_active(
            &self,
            con: &mut MemTransaction,
            _limit: &SelectLimit,
            _offset: &SelectOffset,
        ) -> error_stack::Result<Vec<User>, KernelError> {
            Ok(con
                .0
                .lock()
                .unwrap()
                .users
                .values()
                .filter(|user| *user.is_active().as_ref())
                .cloned()
                .collect())
        }
    }

    struct MemBookRepository;

    #[async_trait::async_trait]
    impl BookQuery<MemTransaction> for MemBookRepository {
        async fn find_by_id(
            &self,
            con: &mut MemTransaction,
            id: &BookId,
        ) -> error_stack::Result<Option<Book>, KernelError> {
            Ok(con.0.lock().unwrap().books.get(id.as_ref()).cloned())
        }

        async fn find_by_isbn(
            &self,
            con: &mut MemTransaction,
            isbn: &BookIsbn,
        ) -> error_stack::Result<Option<Book>, KernelError> {
            Ok(con
                .0
                .lock()
                .unwrap()
                .books
                .values()
                .find(|book| book.isbn() == isbn)
                .cloned())
        }

        async fn find_all(
            &self,
            con: &mut MemTransaction,
            filter: &BookFilter,
            _limit: &SelectLimit,
            _offset: &SelectOffset,
        ) -> error_stack::Result<Vec<Book>, KernelError> {
            Ok(con
                .0
                .lock()
                .unwrap()
                .books
                .values()
                .filter(|book| *book.is_active().as_ref())
                .filter(|book| !filter.available_only || book.is_available())
                .cloned()
                .collect())
        }
    }

    #[async_trait::async_trait]
    impl BookModifier<MemTransaction> for MemBookRepository {
        async fn create(
            &self,
            con: &mut MemTransaction,
            book: &Book,
        ) -> error_stack::Result<(), KernelError> {
            con.0
                .lock()
                .unwrap()
                .books
                .insert(*book.id().as_ref(), book.clone());
            Ok(())
        }

        async fn update(
            &self,
            con: &mut MemTransaction,
            book: &Book,
        ) -> error_stack::Result<(), KernelError> {
            con.0
                .lock()
                .unwrap()
                .books
                .insert(*book.id().as_ref(), book.clone());
            Ok(())
        }

        async fn deactivate(
            &self,
            con: &mut MemTransaction,
            book_id: &BookId,
        ) -> error_stack::Result<(), KernelError> {
            let mut state = con.0.lock().unwrap();
            if let Some(book) = state.books.remove(book_id.as_ref()) {
                let DestructBook {
                    id,
                    title,
                    author,
                    isbn,
                    category,
                    total_copies,
                    available_copies,
                    ..
                } = book.into_destruct();
                state.books.insert(
                    *book_id.as_ref(),
                    Book::new(
                        id,
                        title,
                        author,
                        isbn,
                        category,
                        total_copies,
                        available_copies,
                        IsActive::new(false),
                    ),
                );
            }
            Ok(())
        }

        async fn acquire_copy(
            &self,
            con: &mut MemTransaction,
            book_id: &BookId,
        ) -> error_stack::Result<bool, KernelError> {
            let mut state = con.0.lock().unwrap();
            let Some(book) = state.books.get(book_id.as_ref()).cloned() else {
                return Ok(false);
            };
            if !*book.is_active().as_ref() || !book.is_available() {
                return Ok(false);
            }
            state
                .books
                .insert(*book_id.as_ref(), book_with_available(book, -1));
            Ok(true)
        }

        async fn release_copy(
            &self,
            con: &mut MemTransaction,
            book_id: &BookId,
        ) -> error_stack::Result<bool, KernelError> {
            let mut state = con.0.lock().unwrap();
            let Some(book) = state.books.get(book_id.as_ref()).cloned() else {
                return Ok(false);
            };
            if book.available_copies() >= book.total_copies() {
                return Ok(false);
            }
            state
                .books
                .insert(*book_id.as_ref(), book_with_available(book, 1));
            Ok(true)
        }
    }

    struct MemRecordRepository;

    #[async_trait::async_trait]
    impl RecordQuery<MemTransaction> for MemRecordRepository {
        async fn find_by_id(
            &self,
            con: &mut MemTransaction,
            id: &RecordId,
        ) -> error_stack::Result<Option<BorrowRecord>, KernelError> {
            Ok(con.0.lock().unwrap().records.get(id.as_ref()).cloned())
        }

        async fn find_open(
            &self,
            con: &mut MemTransaction,
            user_id: &UserId,
            book_id: &BookId,
        ) -> error_stack::Result<Option<BorrowRecord>, KernelError> {
            Ok(con
                .0
                .lock()
                .unwrap()
                .records
                .values()
                .find(|record| {
                    record.user_id() == user_id
                        && record.book_id() == book_id
                        && *record.status() == RecordStatus::Borrowed
                })
                .cloned())
        }

        async fn find_overdue_by_user(
            &self,
            con: &mut MemTransaction,
            user_id: &UserId,
            now: OffsetDateTime,
        ) -> error_stack::Result<Vec<BorrowRecord>, KernelError> {
            Ok(con
                .0
                .lock()
                .unwrap()
                .records
                .values()
                .filter(|record| record.user_id() == user_id && record.is_overdue(now))
                .cloned()
                .collect())
        }

        async fn find_by_user_id(
            &self,
            con: &mut MemTransaction,
            user_id: &UserId,
        ) -> error_stack::Result<Vec<BorrowRecord>, KernelError> {
            Ok(con
                .0
                .lock()
                .unwrap()
                .records
                .values()
                .filter(|record| record.user_id() == user_id)
                .cloned()
                .collect())
        }

        async fn find_by_book_id(
            &self,
            con: &mut MemTransaction,
            book_id: &BookId,
        ) -> error_stack::Result<Vec<BorrowRecord>, KernelError> {
            Ok(con
                .0
                .lock()
                .unwrap()
                .records
                .values()
                .filter(|record| record.book_id() == book_id)
                .cloned()
                .collect())
        }

        async fn find_all(
            &self,
            con: &mut MemTransaction,
            _limit: &SelectLimit,
            _offset: &SelectOffset,
        ) -> error_stack::Result<Vec<BorrowRecord>, KernelError> {
            let mut records: Vec<_> = con.0.lock().unwrap().records.values().cloned().collect();
            records.sort_by(|a, b| b.borrowed_at().as_ref().cmp(a.borrowed_at().as_ref()));
            Ok(records)
        }

        async fn find_overdue(
            &self,
            con: &mut MemTransaction,
            now: OffsetDateTime,
            _limit: &SelectLimit,
            _offset: &SelectOffset,
        ) -> error_stack::Result<Vec<BorrowRecord>, KernelError> {
            let mut records: Vec<_> = con
                .0
                .lock()
                .unwrap()
                .records
                .values()
                .filter(|record| record.is_overdue(now))
                .cloned()
                .collect();
            records.sort_by(|a, b| a.due_at().as_ref().cmp(b.due_at().as_ref()));
            Ok(records)
        }
    }

    #[async_trait::async_trait]
    impl RecordModifier<MemTransaction> for MemRecordRepository {
        async fn create(
            &self,
            con: &mut MemTransaction,
            record: &BorrowRecord,
        ) -> error_stack::Result<(), KernelError> {
            con.0
                .lock()
                .unwrap()
                .records
                .insert(*record.id().as_ref(), record.clone());
            Ok(())
        }

        async fn update(
            &self,
            con: &mut MemTransaction,
            record: &BorrowRecord,
        ) -> error_stack::Result<(), KernelError> {
            con.0
                .lock()
                .unwrap()
                .records
                .insert(*record.id().as_ref(), record.clone());
            Ok(())
        }
    }

    #[derive(Clone)]
    struct MemoryDatabase {
        state: Arc<Mutex<State>>,
        policy: LoanPolicy,
    }

    impl MemoryDatabase {
        fn new() -> Self {
            Self {
                state: Arc::new(Mutex::new(State::default())),
                policy: LoanPolicy::default(),
            }
        }

        fn seed_user(&self, active: bool) -> Uuid {
            let id = Uuid::new_v4();
            let user = User::new(
                UserId::new(id),
                UserName::new("Aya Tanaka"),
                UserEmail::new(format!("{id}@example.com")),
                UserRole::Student,
                StudentId::new("S-0001"),
                PasswordHash::new("hashed"),
                IsActive::new(active),
            );
            self.state.lock().unwrap().users.insert(id, user);
            id
        }

        fn seed_book(&self, total: i32, available: i32) -> Uuid {
            let id = Uuid::new_v4();
            let book = Book::new(
                BookId::new(id),
                BookTitle::new("The Name of the Wind"),
                BookAuthor::new("Patrick Rothfuss"),
                BookIsbn::new(format!("isbn-{id}")),
                BookCategory::new("Fantasy"),
                CopyCount::new(total),
                CopyCount::new(available),
                IsActive::new(true),
            );
            self.state.lock().unwrap().books.insert(id, book);
            id
        }

        fn available(&self, book_id: Uuid) -> i32 {
            let state = self.state.lock().unwrap();
            (*state.books[&book_id].available_copies().as_ref()) as i32
        }

        fn stored_record(&self, record_id: Uuid) -> BorrowRecord {
            self.state.lock().unwrap().records[&record_id].clone()
        }
    }

    #[async_trait::async_trait]
    impl DatabaseConnection<MemTransaction> for MemoryDatabase {
        async fn transact(&self) -> error_stack::Result<MemTransaction, KernelError> {
            Ok(MemTransaction(Arc::clone(&self.state)))
        }
    }

    impl DependOnLoanPolicy for MemoryDatabase {
        fn loan_policy(&self) -> &LoanPolicy {
            &self.policy
        }
    }

    impl DependOnUserQuery<MemTransaction> for MemoryDatabase {
        type UserQuery = MemUserRepository;
        fn user_query(&self) -> &MemUserRepository {
            &MemUserRepository
        }
    }

    impl DependOnBookQuery<MemTransaction> for MemoryDatabase {
        type BookQuery = MemBookRepository;
        fn book_query(&self) -> &MemBookRepository {
            &MemBookRepository
        }
    }

    impl DependOnBookModifier<MemTransaction> for MemoryDatabase {
        type BookModifier = MemBookRepository;
        fn book_modifier(&self) -> &MemBookRepository {
            &MemBookRepository
        }
    }

    impl DependOnRecordQuery<MemTransaction> for MemoryDatabase {
        type RecordQuery = MemRecordRepository;
        fn record_query(&self) -> &MemRecordRepository {
            &MemRecordRepository
        }
    }

    impl DependOnRecordModifier<MemTransaction> for MemoryDatabase {
        type RecordModifier = MemRecordRepository;
        fn record_modifier(&self) -> &MemRecordRepository {
            &MemRecordRepository
        }
    }

    async fn borrow(
        db: &MemoryDatabase,
        user_id: Uuid,
        book_id: Uuid,
        now: OffsetDateTime,
    ) -> error_stack::Result<RecordDto, KernelError> {
        db.borrow_book(BorrowBookDto { user_id, book_id }, now).await
    }

    #[tokio::test]
    async fn borrow_decrements_availability_and_sets_due_date() {
        let db = MemoryDatabase::new();
        let user = db.seed_user(true);
        let book = db.seed_book(3, 3);

        let dto = borrow(&db, user, book, JAN_1).await.unwrap();

        assert_eq!(db.available(book), 2);
        assert_eq!(dto.status, RecordStatus::Borrowed);
        assert_eq!(dto.borrowed_at, JAN_1);
        assert_eq!(dto.due_at, JAN_15);
        assert_eq!(dto.fine_cents, 0);
        assert!(dto.book.is_some());
        assert!(dto.user.is_some());
    }

    #[tokio::test]
    async fn last_copy_goes_to_the_first_borrower() {
        let db = MemoryDatabase::new();
        let first = db.seed_user(true);
        let second = db.seed_user(true);
        let book = db.seed_book(1, 1);

        borrow(&db, first, book, JAN_1).await.unwrap();
        let err = borrow(&db, second, book, JAN_1).await.unwrap_err();

        assert!(matches!(err.current_context(), KernelError::BookUnavailable));
        assert_eq!(db.available(book), 0);
    }

    #[tokio::test]
    async fn duplicate_open_borrow_is_rejected() {
        let db = MemoryDatabase::new();
        let user = db.seed_user(true);
        let book = db.seed_book(3, 3);

        borrow(&db, user, book, JAN_1).await.unwrap();
        let err = borrow(&db, user, book, JAN_10).await.unwrap_err();

        assert!(matches!(err.current_context(), KernelError::DuplicateBorrow));
        assert_eq!(db.available(book), 2);
    }

    #[tokio::test]
    async fn user_with_overdue_book_cannot_borrow_another() {
        let db = MemoryDatabase::new();
        let user = db.seed_user(true);
        let overdue_book = db.seed_book(1, 1);
        let other_book = db.seed_book(1, 1);

        borrow(&db, user, overdue_book, JAN_1).await.unwrap();
        // Due Jan 15; by Feb 1 the first loan is overdue.
        let err = borrow(&db, user, other_book, FEB_1).await.unwrap_err();

        assert!(matches!(
            err.current_context(),
            KernelError::OutstandingOverdue
        ));
        assert_eq!(db.available(other_book), 1);
    }

    #[tokio::test]
    async fn unknown_and_inactive_parties_are_distinct_failures() {
        let db = MemoryDatabase::new();
        let inactive = db.seed_user(false);
        let user = db.seed_user(true);
        let book = db.seed_book(1, 1);

        let err = borrow(&db, Uuid::new_v4(), book, JAN_1).await.unwrap_err();
        assert!(matches!(err.current_context(), KernelError::UserNotFound));

        let err = borrow(&db, inactive, book, JAN_1).await.unwrap_err();
        assert!(matches!(err.current_context(), KernelError::UserInactive));

        let err = borrow(&db, user, Uuid::new_v4(), JAN_1).await.unwrap_err();
        assert!(matches!(err.current_context(), KernelError::BookNotFound));

        assert_eq!(db.available(book), 1);
    }

    #[tokio::test]
    async fn return_on_time_restores_availability_without_fine() {
        let db = MemoryDatabase::new();
        let user = db.seed_user(true);
        let book = db.seed_book(2, 2);

        let borrowed = borrow(&db, user, book, JAN_1).await.unwrap();
        assert_eq!(db.available(book), 1);

        let returned = db
            .return_book(ReturnBookDto { record_id: borrowed.id }, JAN_10)
            .await
            .unwrap();

        assert_eq!(db.available(book), 2);
        assert_eq!(returned.status, RecordStatus::Returned);
        assert_eq!(returned.returned_at, Some(JAN_10));
        assert_eq!(returned.fine_cents, 0);
        assert!(!returned.is_overdue);
    }

    #[tokio::test]
    async fn late_return_is_fined_per_day() {
        let db = MemoryDatabase::new();
        let user = db.seed_user(true);
        let book = db.seed_book(1, 1);

        let borrowed = borrow(&db, user, book, JAN_1).await.unwrap();
        // Due Jan 15, returned Jan 20: 5 days * 50 cents.
        let returned = db
            .return_book(ReturnBookDto { record_id: borrowed.id }, JAN_20)
            .await
            .unwrap();

        assert_eq!(returned.fine_cents, 250);
        assert_eq!(db.available(book), 1);
    }

    #[tokio::test]
    async fn second_return_is_rejected_and_leaves_inventory_alone() {
        let db = MemoryDatabase::new();
        let user = db.seed_user(true);
        let book = db.seed_book(1, 1);

        let borrowed = borrow(&db, user, book, JAN_1).await.unwrap();
        db.return_book(ReturnBookDto { record_id: borrowed.id }, JAN_10)
            .await
            .unwrap();

        let err = db
            .return_book(ReturnBookDto { record_id: borrowed.id }, JAN_10)
            .await
            .unwrap_err();

        assert!(matches!(err.current_context(), KernelError::AlreadyReturned));
        assert_eq!(db.available(book), 1);
    }

    #[tokio::test]
    async fn returning_unknown_record_fails() {
        let db = MemoryDatabase::new();
        let err = db
            .return_book(ReturnBookDto { record_id: Uuid::new_v4() }, JAN_1)
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), KernelError::BorrowNotFound));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_borrows_allocate_the_last_copy_once() {
        let db = MemoryDatabase::new();
        let first = db.seed_user(true);
        let second = db.seed_user(true);
        let book = db.seed_book(1, 1);

        let a = tokio::spawn({
            let db = db.clone();
            async move { borrow(&db, first, book, JAN_1).await }
        });
        let b = tokio::spawn({
            let db = db.clone();
            async move { borrow(&db, second, book, JAN_1).await }
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
        let loser = results
            .iter()
            .find_map(|result| result.as_ref().err())
            .unwrap();
        assert!(matches!(
            loser.current_context(),
            KernelError::BookUnavailable
        ));
        assert_eq!(db.available(book), 0);
    }

    #[tokio::test]
    async fn admin_close_adjusts_inventory_and_stamps_return() {
        let db = MemoryDatabase::new();
        let user = db.seed_user(true);
        let book = db.seed_book(1, 1);

        let borrowed = borrow(&db, user, book, JAN_1).await.unwrap();
        let updated = db
            .update_record(
                UpdateRecordDto {
                    id: borrowed.id,
                    status: Some(RecordStatus::Returned),
                    notes: Some("returned at the front desk".into()),
                },
                JAN_10,
            )
            .await
            .unwrap();

        assert_eq!(updated.status, RecordStatus::Returned);
        assert_eq!(updated.returned_at, Some(JAN_10));
        assert_eq!(updated.notes.as_deref(), Some("returned at the front desk"));
        assert_eq!(db.available(book), 1);
    }

    #[tokio::test]
    async fn admin_reopen_takes_a_copy_back_out() {
        let db = MemoryDatabase::new();
        let user = db.seed_user(true);
        let book = db.seed_book(1, 1);

        let borrowed = borrow(&db, user, book, JAN_1).await.unwrap();
        db.return_book(ReturnBookDto { record_id: borrowed.id }, JAN_10)
            .await
            .unwrap();
        assert_eq!(db.available(book), 1);

        let reopened = db
            .update_record(
                UpdateRecordDto {
                    id: borrowed.id,
                    status: Some(RecordStatus::Borrowed),
                    notes: None,
                },
                JAN_10,
            )
            .await
            .unwrap();

        assert_eq!(reopened.status, RecordStatus::Borrowed);
        assert_eq!(reopened.returned_at, None);
        assert_eq!(db.available(book), 0);
        assert_eq!(
            *db.stored_record(borrowed.id).status(),
            RecordStatus::Borrowed
        );
    }

    #[tokio::test]
    async fn overdue_listing_is_derived_not_stored() {
        let db = MemoryDatabase::new();
        let user = db.seed_user(true);
        let on_time_user = db.seed_user(true);
        let late_book = db.seed_book(1, 1);
        let fresh_book = db.seed_book(1, 1);

        let late = borrow(&db, user, late_book, JAN_1).await.unwrap();
        borrow(&db, on_time_user, fresh_book, JAN_20).await.unwrap();

        let overdue = db
            .get_overdue_records(
                GetOverdueRecordDto {
                    limit: SelectLimit::default(),
                    offset: SelectOffset::default(),
                },
                JAN_20,
            )
            .await
            .unwrap();

        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, late.id);
        assert!(overdue[0].is_overdue);
        assert_eq!(overdue[0].days_overdue, 5);
        // The stored status is still `borrowed`; overdue is a read-time view.
        assert_eq!(
            *db.stored_record(late.id).status(),
            RecordStatus::Borrowed
        );
    }

    // A store that raises a conflict a fixed number of times before behaving.
    // The failure happens before the write is applied, like a rejected
    // conditional update would in the real store.
    struct FlakyBookRepository(Arc<Mutex<u32>>);
    struct FlakyRecordRepository(Arc<Mutex<u32>>);

    fn take_conflict(budget: &Mutex<u32>) -> bool {
        let mut left = budget.lock().unwrap();
        if *left > 0 {
            *left -= 1;
            true
        } else {
            false
        }
    }

    #[async_trait::async_trait]
    impl BookModifier<MemTransaction> for FlakyBookRepository {
        async fn create(
            &self,
            con: &mut MemTransaction,
            book: &Book,
        ) -> error_stack::Result<(), KernelError> {
            MemBookRepository.create(con, book).await
        }

        async fn update(
            &self,
            con: &mut MemTransaction,
            book: &Book,
        ) -> error_stack::Result<(), KernelError> {
            MemBookRepository.update(con, book).await
        }

        async fn deactivate(
            &self,
            con: &mut MemTransaction,
            book_id: &BookId,
        ) -> error_stack::Result<(), KernelError> {
            MemBookRepository.deactivate(con, book_id).await
        }

        async fn acquire_copy(
            &self,
            con: &mut MemTransaction,
            book_id: &BookId,
        ) -> error_stack::Result<bool, KernelError> {
            if take_conflict(&self.0) {
                return Err(error_stack::Report::new(KernelError::Conflict));
            }
            MemBookRepository.acquire_copy(con, book_id).await
        }

        async fn release_copy(
            &self,
            con: &mut MemTransaction,
            book_id: &BookId,
        ) -> error_stack::Result<bool, KernelError> {
            MemBookRepository.release_copy(con, book_id).await
        }
    }

    #[async_trait::async_trait]
    impl RecordModifier<MemTransaction> for FlakyRecordRepository {
        async fn create(
            &self,
            con: &mut MemTransaction,
            record: &BorrowRecord,
        ) -> error_stack::Result<(), KernelError> {
            MemRecordRepository.create(con, record).await
        }

        async fn update(
            &self,
            con: &mut MemTransaction,
            record: &BorrowRecord,
        ) -> error_stack::Result<(), KernelError> {
            if take_conflict(&self.0) {
                return Err(error_stack::Report::new(KernelError::Conflict));
            }
            MemRecordRepository.update(con, record).await
        }
    }

    struct FlakyDatabase {
        inner: MemoryDatabase,
        book_modifier: FlakyBookRepository,
        record_modifier: FlakyRecordRepository,
    }

    impl FlakyDatabase {
        fn wrapping(inner: &MemoryDatabase, conflicts: u32) -> Self {
            let budget = Arc::new(Mutex::new(conflicts));
            Self {
                inner: inner.clone(),
                book_modifier: FlakyBookRepository(Arc::clone(&budget)),
                record_modifier: FlakyRecordRepository(budget),
            }
        }

        fn conflicts_left(&self) -> u32 {
            *self.book_modifier.0.lock().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl DatabaseConnection<MemTransaction> for FlakyDatabase {
        async fn transact(&self) -> error_stack::Result<MemTransaction, KernelError> {
            self.inner.transact().await
        }
    }

    impl DependOnLoanPolicy for FlakyDatabase {
        fn loan_policy(&self) -> &LoanPolicy {
            self.inner.loan_policy()
        }
    }

    impl DependOnUserQuery<MemTransaction> for FlakyDatabase {
        type UserQuery = MemUserRepository;
        fn user_query(&self) -> &MemUserRepository {
            &MemUserRepository
        }
    }

    impl DependOnBookQuery<MemTransaction> for FlakyDatabase {
        type BookQuery = MemBookRepository;
        fn book_query(&self) -> &MemBookRepository {
            &MemBookRepository
        }
    }

    impl DependOnBookModifier<MemTransaction> for FlakyDatabase {
        type BookModifier = FlakyBookRepository;
        fn book_modifier(&self) -> &FlakyBookRepository {
            &self.book_modifier
        }
    }

    impl DependOnRecordQuery<MemTransaction> for FlakyDatabase {
        type RecordQuery = MemRecordRepository;
        fn record_query(&self) -> &MemRecordRepository {
            &MemRecordRepository
        }
    }

    impl DependOnRecordModifier<MemTransaction> for FlakyDatabase {
        type RecordModifier = FlakyRecordRepository;
        fn record_modifier(&self) -> &FlakyRecordRepository {
            &self.record_modifier
        }
    }

    #[tokio::test]
    async fn store_conflict_on_borrow_is_retried_once() {
        let inner = MemoryDatabase::new();
        let user = inner.seed_user(true);
        let book = inner.seed_book(2, 2);
        let db = FlakyDatabase::wrapping(&inner, 1);

        let dto = db
            .borrow_book(BorrowBookDto { user_id: user, book_id: book }, JAN_1)
            .await
            .unwrap();

        assert_eq!(dto.status, RecordStatus::Borrowed);
        assert_eq!(inner.available(book), 1);
        assert_eq!(db.conflicts_left(), 0);
    }

    #[tokio::test]
    async fn borrow_gives_up_after_a_second_conflict() {
        let inner = MemoryDatabase::new();
        let user = inner.seed_user(true);
        let book = inner.seed_book(2, 2);
        let db = FlakyDatabase::wrapping(&inner, 2);

        let err = db
            .borrow_book(BorrowBookDto { user_id: user, book_id: book }, JAN_1)
            .await
            .unwrap_err();

        assert!(matches!(err.current_context(), KernelError::Conflict));
        // Exactly one retry: both budgeted conflicts were consumed.
        assert_eq!(db.conflicts_left(), 0);
        assert_eq!(inner.available(book), 2);
    }

    #[tokio::test]
    async fn store_conflict_on_return_is_retried_once() {
        let inner = MemoryDatabase::new();
        let user = inner.seed_user(true);
        let book = inner.seed_book(1, 1);
        let borrowed = borrow(&inner, user, book, JAN_1).await.unwrap();
        let db = FlakyDatabase::wrapping(&inner, 1);

        let returned = db
            .return_book(ReturnBookDto { record_id: borrowed.id }, JAN_10)
            .await
            .unwrap();

        assert_eq!(returned.status, RecordStatus::Returned);
        assert_eq!(inner.available(book), 1);
        assert_eq!(db.conflicts_left(), 0);
    }
}
