use sqlx::PgConnection;
use uuid::Uuid;

use kernel::interface::query::{BookFilter, BookQuery};
use kernel::interface::update::BookModifier;
use kernel::prelude::entity::{
    Book, BookAuthor, BookCategory, BookId, BookIsbn, BookTitle, CopyCount, IsActive, SelectLimit,
    SelectOffset,
};
use kernel::KernelError;

use crate::database::postgres::PostgresConnection;
use crate::error::ConvertError;

pub struct PostgresBookRepository;

#[async_trait::async_trait]
impl BookQuery<PostgresConnection> for PostgresBookRepository {
    async fn find_by_id(
        &self,
        con: &mut PostgresConnection,
        id: &BookId,
    ) -> error_stack::Result<Option<Book>, KernelError> {
        PgBookInternal::find_by_id(&mut *con.0, id).await
    }

    async fn find_by_isbn(
        &self,
        con: &mut PostgresConnection,
        isbn: &BookIsbn,
    ) -> error_stack::Result<Option<Book>, KernelError> {
        PgBookInternal::find_by_isbn(&mut *con.0, isbn).await
    }

    async fn find_all(
        &self,
        con: &mut PostgresConnection,
        filter: &BookFilter,
        limit: &SelectLimit,
        offset: &SelectOffset,
    ) -> error_stack::Result<Vec<Book>, KernelError> {
        PgBookInternal::find_all(&mut *con.0, filter, limit, offset).await
    }
}

#[async_trait::async_trait]
impl BookModifier<PostgresConnection> for PostgresBookRepository {
    async fn create(
        &self,
        con: &mut PostgresConnection,
        book: &Book,
    ) -> error_stack::Result<(), KernelError> {
        PgBookInternal::create(&mut *con.0, book).await
    }

    async fn update(
        &self,
        con: &mut PostgresConnection,
        book: &Book,
    ) -> error_stack::Result<(), KernelError> {
        PgBookInternal::update(&mut *con.0, book).await
    }

    async fn deactivate(
        &self,
        con: &mut PostgresConnection,
        book_id: &BookId,
    ) -> error_stack::Result<(), KernelError> {
        PgBookInternal::deactivate(&mut *con.0, book_id).await
    }

    async fn acquire_copy(
        &self,
        con: &mut PostgresConnection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError> {
        PgBookInternal::acquire_copy(&mut *con.0, book_id).await
    }

    async fn release_copy(
        &self,
        con: &mut PostgresConnection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError> {
        PgBookInternal::release_copy(&mut *con.0, book_id).await
    }
}

#[derive(sqlx::FromRow)]
struct BookRow {
    id: Uuid,
    title: String,
    author: String,
    isbn: String,
    category: String,
    total_copies: i32,
    available_copies: i32,
    is_active: bool,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Book::new(
            BookId::new(row.id),
            BookTitle::new(row.title),
            BookAuthor::new(row.author),
            BookIsbn::new(row.isbn),
            BookCategory::new(row.category),
            CopyCount::new(row.total_copies),
            CopyCount::new(row.available_copies),
            IsActive::new(row.is_active),
        )
    }
}

pub(in crate::database) struct PgBookInternal;

impl PgBookInternal {
    async fn find_by_id(
        con: &mut PgConnection,
        id: &BookId,
    ) -> error_stack::Result<Option<Book>, KernelError> {
        let row = sqlx::query_as::<_, BookRow>(
            // language=postgresql
            r#"
            SELECT id, title, author, isbn, category, total_copies, available_copies, is_active
            FROM books
            WHERE id = $1
            "#,
        )
        .bind(id.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        Ok(row.map(Book::from))
    }

    async fn find_by_isbn(
        con: &mut PgConnection,
        isbn: &BookIsbn,
    ) -> error_stack::Result<Option<Book>, KernelError> {
        let row = sqlx::query_as::<_, BookRow>(
            // language=postgresql
            r#"
            SELECT id, title, author, isbn, category, total_copies, available_copies, is_active
            FROM books
            WHERE isbn = $1
            "#,
        )
        .bind(isbn.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        Ok(row.map(Book::from))
    }

    async fn find_all(
        con: &mut PgConnection,
        filter: &BookFilter,
        limit: &SelectLimit,
        offset: &SelectOffset,
    ) -> error_stack::Result<Vec<Book>, KernelError> {
        let rows = sqlx::query_as::<_, BookRow>(
            // language=postgresql
            r#"
            SELECT id, title, author, isbn, category, total_copies, available_copies, is_active
            FROM books
            WHERE is_active
              AND ($1::text IS NULL
                   OR title ILIKE '%' || $1 || '%'
                   OR author ILIKE '%' || $1 || '%'
                   OR isbn ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR category = $2)
              AND (NOT $3 OR available_copies > 0)
            ORDER BY title
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.search.as_deref())
        .bind(filter.category.as_deref())
        .bind(filter.available_only)
        .bind(limit.as_ref())
        .bind(offset.as_ref())
        .fetch_all(con)
        .await
        .convert_error()?;
        Ok(rows.into_iter().map(Book::from).collect())
    }

    async fn create(con: &mut PgConnection, book: &Book) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        sqlx::query(
            r#"
            INSERT INTO books (id, title, author, isbn, category, total_copies, available_copies, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(book.id().as_ref())
        .bind(book.title().as_ref())
        .bind(book.author().as_ref())
        .bind(book.isbn().as_ref())
        .bind(book.category().as_ref())
        .bind(book.total_copies().as_ref())
        .bind(book.available_copies().as_ref())
        .bind(book.is_active().as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }

    async fn update(con: &mut PgConnection, book: &Book) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        sqlx::query(
            r#"
            UPDATE books
            SET title = $2, author = $3, category = $4, total_copies = $5, available_copies = $6
            WHERE id = $1
            "#,
        )
        .bind(book.id().as_ref())
        .bind(book.title().as_ref())
        .bind(book.author().as_ref())
        .bind(book.category().as_ref())
        .bind(book.total_copies().as_ref())
        .bind(book.available_copies().as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }

    async fn deactivate(
        con: &mut PgConnection,
        book_id: &BookId,
    ) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        sqlx::query(
            r#"
            UPDATE books
            SET is_active = FALSE
            WHERE id = $1
            "#,
        )
        .bind(book_id.as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }

    async fn acquire_copy(
        con: &mut PgConnection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError> {
        // The WHERE clause is the availability check. Concurrent borrows of
        // the last copy resolve here: one row update wins, the other matches
        // nothing.
        let result = sqlx::query(
            // language=postgresql
            r#"
            UPDATE books
            SET available_copies = available_copies - 1
            WHERE id = $1 AND is_active AND available_copies > 0
            "#,
        )
        .bind(book_id.as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_copy(
        con: &mut PgConnection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError> {
        let result = sqlx::query(
            // language=postgresql
            r#"
            UPDATE books
            SET available_copies = available_copies + 1
            WHERE id = $1 AND available_copies < total_copies
            "#,
        )
        .bind(book_id.as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod test {
    use error_stack::Report;

    use kernel::interface::database::{DatabaseConnection, Transaction};
    use kernel::interface::query::BookQuery;
    use kernel::interface::update::BookModifier;
    use kernel::prelude::entity::{
        Book, BookAuthor, BookCategory, BookId, BookIsbn, BookTitle, CopyCount, IsActive,
    };
    use kernel::KernelError;

    use crate::database::postgres::{PostgresBookRepository, PostgresDatabase};

    #[test_with::env(POSTGRES_TEST)]
    #[tokio::test]
    async fn test() -> Result<(), Report<KernelError>> {
        let db = PostgresDatabase::new().await?;
        let mut con = db.transact().await?;
        let id = BookId::new(uuid::Uuid::new_v4());

        let book = Book::new(
            id.clone(),
            BookTitle::new("test"),
            BookAuthor::new("author"),
            BookIsbn::new(format!("isbn-{}", rand::random::<u32>())),
            BookCategory::new("Fiction"),
            CopyCount::new(2),
            CopyCount::new(2),
            IsActive::new(true),
        );
        PostgresBookRepository.create(&mut con, &book).await?;

        let found = PostgresBookRepository.find_by_id(&mut con, &id).await?;
        assert_eq!(found, Some(book.clone()));

        assert!(PostgresBookRepository.acquire_copy(&mut con, &id).await?);
        assert!(PostgresBookRepository.acquire_copy(&mut con, &id).await?);
        assert!(!PostgresBookRepository.acquire_copy(&mut con, &id).await?);

        assert!(PostgresBookRepository.release_copy(&mut con, &id).await?);
        assert!(PostgresBookRepository.release_copy(&mut con, &id).await?);
        assert!(!PostgresBookRepository.release_copy(&mut con, &id).await?);

        PostgresBookRepository.deactivate(&mut con, &id).await?;
        let found = PostgresBookRepository.find_by_id(&mut con, &id).await?;
        assert!(matches!(found, Some(book) if !*book.is_active().as_ref()));

        con.roll_back().await?;
        Ok(())
    }
}
