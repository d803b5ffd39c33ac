use error_stack::Report;
use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

use kernel::interface::query::RecordQuery;
use kernel::interface::update::RecordModifier;
use kernel::prelude::entity::{
    BookId, BorrowRecord, BorrowedAt, DueDate, Fine, RecordId, RecordNotes, RecordStatus,
    ReturnedAt, SelectLimit, SelectOffset, UserId,
};
use kernel::KernelError;

use crate::database::postgres::PostgresConnection;
use crate::error::ConvertError;

pub struct PostgresRecordRepository;

#[async_trait::async_trait]
impl RecordQuery<PostgresConnection> for PostgresRecordRepository {
    async fn find_by_id(
        &self,
        con: &mut PostgresConnection,
        id: &RecordId,
    ) -> error_stack::Result<Option<BorrowRecord>, KernelError> {
        PgRecordInternal::find_by_id(&mut *con.0, id).await
    }

    async fn find_open(
        &self,
        con: &mut PostgresConnection,
        user_id: &UserId,
        book_id: &BookId,
    ) -> error_stack::Result<Option<BorrowRecord>, KernelError> {
        PgRecordInternal::find_open(&mut *con.0, user_id, book_id).await
    }

    async fn find_overdue_by_user(
        &self,
        con: &mut PostgresConnection,
        user_id: &UserId,
        now: OffsetDateTime,
    ) -> error_stack::Result<Vec<BorrowRecord>, KernelError> {
        PgRecordInternal::find_overdue_by_user(&mut *con.0, user_id, now).await
    }

    async fn find_by_user_id(
        &self,
        con: &mut PostgresConnection,
        user_id: &UserId,
    ) -> error_stack::Result<Vec<BorrowRecord>, KernelError> {
        PgRecordInternal::find_by_user_id(&mut *con.0, user_id).await
    }

    async fn find_by_book_id(
        &self,
        con: &mut PostgresConnection,
        book_id: &BookId,
    ) -> error_stack::Result<Vec<BorrowRecord>, KernelError> {
        PgRecordInternal::find_by_book_id(&mut *con.0, book_id).await
    }

    async fn find_all(
        &self,
        con: &mut PostgresConnection,
        limit: &SelectLimit,
        offset: &SelectOffset,
    ) -> error_stack::Result<Vec<BorrowRecord>, KernelError> {
        PgRecordInternal::find_all(&mut *con.0, limit, offset).await
    }

    async fn find_overdue(
        &self,
        con: &mut PostgresConnection,
        now: OffsetDateTime,
        limit: &SelectLimit,
        offset: &SelectOffset,
    ) -> error_stack::Result<Vec<BorrowRecord>, KernelError> {
        PgRecordInternal::find_overdue(&mut *con.0, now, limit, offset).await
    }
}

#[async_trait::async_trait]
impl RecordModifier<PostgresConnection> for PostgresRecordRepository {
    async fn create(
        &self,
        con: &mut PostgresConnection,
        record: &BorrowRecord,
    ) -> error_stack::Result<(), KernelError> {
        PgRecordInternal::create(&mut *con.0, record).await
    }

    async fn update(
        &self,
        con: &mut PostgresConnection,
        record: &BorrowRecord,
    ) -> error_stack::Result<(), KernelError> {
        PgRecordInternal::update(&mut *con.0, record).await
    }
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: Uuid,
    user_id: Uuid,
    book_id: Uuid,
    borrowed_at: OffsetDateTime,
    due_at: OffsetDateTime,
    returned_at: Option<OffsetDateTime>,
    status: String,
    fine_cents: i64,
    notes: Option<String>,
}

impl TryFrom<RecordRow> for BorrowRecord {
    type Error = Report<KernelError>;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let status = RecordStatus::try_from(row.status.as_str())
            .map_err(|message| Report::new(KernelError::Internal).attach_printable(message))?;
        Ok(BorrowRecord::new(
            RecordId::new(row.id),
            UserId::new(row.user_id),
            BookId::new(row.book_id),
            BorrowedAt::new(row.borrowed_at),
            DueDate::new(row.due_at),
            row.returned_at.map(ReturnedAt::new),
            status,
            Fine::new(row.fine_cents),
            row.notes.map(RecordNotes::new),
        ))
    }
}

static COLUMNS: &str =
    "id, user_id, book_id, borrowed_at, due_at, returned_at, status, fine_cents, notes";

pub(in crate::database) struct PgRecordInternal;

impl PgRecordInternal {
    async fn find_by_id(
        con: &mut PgConnection,
        id: &RecordId,
    ) -> error_stack::Result<Option<BorrowRecord>, KernelError> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            // language=postgresql
            r#"
            SELECT {COLUMNS}
            FROM borrow_records
            WHERE id = $1
            "#,
        ))
        .bind(id.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        row.map(BorrowRecord::try_from).transpose()
    }

    async fn find_open(
        con: &mut PgConnection,
        user_id: &UserId,
        book_id: &BookId,
    ) -> error_stack::Result<Option<BorrowRecord>, KernelError> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            // language=postgresql
            r#"
            SELECT {COLUMNS}
            FROM borrow_records
            WHERE user_id = $1 AND book_id = $2 AND status = 'borrowed'
            LIMIT 1
            "#,
        ))
        .bind(user_id.as_ref())
        .bind(book_id.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        row.map(BorrowRecord::try_from).transpose()
    }

    async fn find_overdue_by_user(
        con: &mut PgConnection,
        user_id: &UserId,
        now: OffsetDateTime,
    ) -> error_stack::Result<Vec<BorrowRecord>, KernelError> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            // language=postgresql
            r#"
            SELECT {COLUMNS}
            FROM borrow_records
            WHERE user_id = $1 AND status = 'borrowed' AND due_at < $2
            "#,
        ))
        .bind(user_id.as_ref())
        .bind(now)
        .fetch_all(con)
        .await
        .convert_error()?;
        rows.into_iter().map(BorrowRecord::try_from).collect()
    }

    async fn find_by_user_id(
        con: &mut PgConnection,
        user_id: &UserId,
    ) -> error_stack::Result<Vec<BorrowRecord>, KernelError> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            // language=postgresql
            r#"
            SELECT {COLUMNS}
            FROM borrow_records
            WHERE user_id = $1
            ORDER BY borrowed_at DESC
            "#,
        ))
        .bind(user_id.as_ref())
        .fetch_all(con)
        .await
        .convert_error()?;
        rows.into_iter().map(BorrowRecord::try_from).collect()
    }

    async fn find_by_book_id(
        con: &mut PgConnection,
        book_id: &BookId,
    ) -> error_stack::Result<Vec<BorrowRecord>, KernelError> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            // language=postgresql
            r#"
            SELECT {COLUMNS}
            FROM borrow_records
            WHERE book_id = $1
            ORDER BY borrowed_at DESC
            "#,
        ))
        .bind(book_id.as_ref())
        .fetch_all(con)
        .await
        .convert_error()?;
        rows.into_iter().map(BorrowRecord::try_from).collect()
    }

    async fn find_all(
        con: &mut PgConnection,
        limit: &SelectLimit,
        offset: &SelectOffset,
    ) -> error_stack::Result<Vec<BorrowRecord>, KernelError> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            // language=postgresql
            r#"
            SELECT {COLUMNS}
            FROM borrow_records
            ORDER BY borrowed_at DESC
            LIMIT $1 OFFSET $2
            "#,
        ))
        .bind(limit.as_ref())
        .bind(offset.as_ref())
        .fetch_all(con)
        .await
        .convert_error()?;
        rows.into_iter().map(BorrowRecord::try_from).collect()
    }

    async fn find_overdue(
        con: &mut PgConnection,
        now: OffsetDateTime,
        limit: &SelectLimit,
        offset: &SelectOffset,
    ) -> error_stack::Result<Vec<BorrowRecord>, KernelError> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            // language=postgresql
            r#"
            SELECT {COLUMNS}
            FROM borrow_records
            WHERE status = 'borrowed' AND due_at < $1
            ORDER BY due_at
            LIMIT $2 OFFSET $3
            "#,
        ))
        .bind(now)
        .bind(limit.as_ref())
        .bind(offset.as_ref())
        .fetch_all(con)
        .await
        .convert_error()?;
        rows.into_iter().map(BorrowRecord::try_from).collect()
    }

    async fn create(
        con: &mut PgConnection,
        record: &BorrowRecord,
    ) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        sqlx::query(
            r#"
            INSERT INTO borrow_records (id, user_id, book_id, borrowed_at, due_at, returned_at, status, fine_cents, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id().as_ref())
        .bind(record.user_id().as_ref())
        .bind(record.book_id().as_ref())
        .bind(record.borrowed_at().as_ref())
        .bind(record.due_at().as_ref())
        .bind(record.returned_at().as_ref().map(|at| *at.as_ref()))
        .bind(record.status().as_str())
        .bind(record.fine().as_ref())
        .bind(record.notes().as_ref().map(|notes| notes.as_ref().clone()))
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }

    async fn update(
        con: &mut PgConnection,
        record: &BorrowRecord,
    ) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        sqlx::query(
            r#"
            UPDATE borrow_records
            SET returned_at = $2, status = $3, fine_cents = $4, notes = $5
            WHERE id = $1
            "#,
        )
        .bind(record.id().as_ref())
        .bind(record.returned_at().as_ref().map(|at| *at.as_ref()))
        .bind(record.status().as_str())
        .bind(record.fine().as_ref())
        .bind(record.notes().as_ref().map(|notes| notes.as_ref().clone()))
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use error_stack::Report;
    use time::{Duration, OffsetDateTime};

    use kernel::interface::database::{DatabaseConnection, Transaction};
    use kernel::interface::query::RecordQuery;
    use kernel::interface::update::{BookModifier, RecordModifier, UserModifier};
    use kernel::prelude::entity::{
        Book, BookAuthor, BookCategory, BookId, BookIsbn, BookTitle, BorrowRecord, BorrowedAt,
        CopyCount, DueDate, Fine, IsActive, PasswordHash, RecordId, RecordStatus, StudentId, User,
        UserEmail, UserId, UserName, UserRole,
    };
    use kernel::KernelError;

    use crate::database::postgres::{
        PostgresBookRepository, PostgresDatabase, PostgresRecordRepository, PostgresUserRepository,
    };

    #[test_with::env(POSTGRES_TEST)]
    #[tokio::test]
    async fn test() -> Result<(), Report<KernelError>> {
        let db = PostgresDatabase::new().await?;
        let mut con = db.transact().await?;

        let user_id = UserId::new(uuid::Uuid::new_v4());
        let user = User::new(
            user_id.clone(),
            UserName::new("test"),
            UserEmail::new(format!("{}@example.com", rand::random::<u32>())),
            UserRole::Student,
            StudentId::new("S-0001"),
            PasswordHash::new("hashed"),
            IsActive::new(true),
        );
        PostgresUserRepository.create(&mut con, &user).await?;

        let book_id = BookId::new(uuid::Uuid::new_v4());
        let book = Book::new(
            book_id.clone(),
            BookTitle::new("test"),
            BookAuthor::new("author"),
            BookIsbn::new(format!("isbn-{}", rand::random::<u32>())),
            BookCategory::new("Fiction"),
            CopyCount::new(1),
            CopyCount::new(1),
            IsActive::new(true),
        );
        PostgresBookRepository.create(&mut con, &book).await?;

        let now = OffsetDateTime::now_utc().replace_nanosecond(0).unwrap();
        let record_id = RecordId::new(uuid::Uuid::new_v4());
        let record = BorrowRecord::new(
            record_id.clone(),
            user_id.clone(),
            book_id.clone(),
            BorrowedAt::new(now),
            DueDate::new(now + Duration::days(14)),
            None,
            RecordStatus::Borrowed,
            Fine::new(0i64),
            None,
        );
        PostgresRecordRepository.create(&mut con, &record).await?;

        let found = PostgresRecordRepository
            .find_by_id(&mut con, &record_id)
            .await?;
        assert_eq!(found, Some(record.clone()));

        let open = PostgresRecordRepository
            .find_open(&mut con, &user_id, &book_id)
            .await?;
        assert_eq!(open, Some(record));

        let overdue = PostgresRecordRepository
            .find_overdue_by_user(&mut con, &user_id, now + Duration::days(15))
            .await?;
        assert_eq!(overdue.len(), 1);

        con.roll_back().await?;
        Ok(())
    }
}
