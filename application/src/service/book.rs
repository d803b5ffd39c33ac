use error_stack::Report;

use kernel::interface::database::{DatabaseConnection, DependOnDatabaseConnection, Transaction};
use kernel::interface::query::{BookFilter, BookQuery, DependOnBookQuery};
use kernel::interface::update::{BookModifier, DependOnBookModifier};
use kernel::prelude::entity::{
    Book, BookAuthor, BookCategory, BookId, BookIsbn, BookTitle, CopyCount, DestructBook, IsActive,
};
use kernel::KernelError;
use uuid::Uuid;

use crate::transfer::{BookDto, CreateBookDto, DeleteBookDto, GetAllBookDto, GetBookDto, UpdateBookDto};

#[async_trait::async_trait]
pub trait GetBookService<Connection: Transaction + Send>:
    'static + Sync + Send + DependOnDatabaseConnection<Connection> + DependOnBookQuery<Connection>
{
    async fn get_book(&self, dto: GetBookDto) -> error_stack::Result<BookDto, KernelError> {
        let mut con = self.database_connection().transact().await?;
        let book = self
            .book_query()
            .find_by_id(&mut con, &BookId::new(dto.id))
            .await?
            .filter(|book| *book.is_active().as_ref())
            .ok_or_else(|| Report::new(KernelError::BookNotFound))?;
        con.commit().await?;
        Ok(book.into())
    }

    async fn get_all_books(
        &self,
        dto: GetAllBookDto,
    ) -> error_stack::Result<Vec<BookDto>, KernelError> {
        let mut con = self.database_connection().transact().await?;
        let filter = BookFilter {
            search: dto.search,
            category: dto.category,
            available_only: dto.available_only,
        };
        let books = self
            .book_query()
            .find_all(&mut con, &filter, &dto.limit, &dto.offset)
            .await?;
        con.commit().await?;
        Ok(books.into_iter().map(BookDto::from).collect())
    }
}

impl<Connection: Transaction + Send, T> GetBookService<Connection> for T where
    T: DependOnDatabaseConnection<Connection> + DependOnBookQuery<Connection>
{
}

#[async_trait::async_trait]
pub trait CreateBookService<Connection: Transaction + Send>:
    'static
    + Sync
    + Send
    + DependOnDatabaseConnection<Connection>
    + DependOnBookQuery<Connection>
    + DependOnBookModifier<Connection>
{
    async fn create_book(&self, dto: CreateBookDto) -> error_stack::Result<BookDto, KernelError> {
        if dto.total_copies < 1 {
            return Err(Report::new(KernelError::InvalidCopyCount));
        }

        let mut con = self.database_connection().transact().await?;

        let isbn = BookIsbn::new(dto.isbn);
        if self
            .book_query()
            .find_by_isbn(&mut con, &isbn)
            .await?
            .is_some()
        {
            return Err(Report::new(KernelError::IsbnTaken));
        }

        // A new title starts with every copy on the shelf.
        let book = Book::new(
            BookId::new(Uuid::new_v4()),
            BookTitle::new(dto.title),
            BookAuthor::new(dto.author),
            isbn,
            BookCategory::new(dto.category),
            CopyCount::new(dto.total_copies),
            CopyCount::new(dto.total_copies),
            IsActive::new(true),
        );
        self.book_modifier().create(&mut con, &book).await?;
        con.commit().await?;

        tracing::debug!(book_id = %Uuid::from(book.id().clone()), "book created");
        Ok(book.into())
    }
}

impl<Connection: Transaction + Send, T> CreateBookService<Connection> for T where
    T: DependOnDatabaseConnection<Connection>
        + DependOnBookQuery<Connection>
        + DependOnBookModifier<Connection>
{
}

#[async_trait::async_trait]
pub trait UpdateBookService<Connection: Transaction + Send>:
    'static
    + Sync
    + Send
    + DependOnDatabaseConnection<Connection>
    + DependOnBookQuery<Connection>
    + DependOnBookModifier<Connection>
{
    /// Changing `total_copies` keeps the number of outstanding loans fixed:
    /// `available = max(0, new_total - borrowed)`.
    async fn update_book(&self, dto: UpdateBookDto) -> error_stack::Result<BookDto, KernelError> {
        if matches!(dto.total_copies, Some(total) if total < 1) {
            return Err(Report::new(KernelError::InvalidCopyCount));
        }

        let mut con = self.database_connection().transact().await?;

        let book = self
            .book_query()
            .find_by_id(&mut con, &BookId::new(dto.id))
            .await?
            .filter(|book| *book.is_active().as_ref())
            .ok_or_else(|| Report::new(KernelError::BookNotFound))?;

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

        let old_total: i32 = total_copies.into();
        let old_available: i32 = available_copies.into();
        let borrowed = old_total - old_available;

        let total = dto.total_copies.unwrap_or(old_total);
        let available = (total - borrowed).max(0);

        let book = Book::new(
            id,
            dto.title.map(BookTitle::new).unwrap_or(title),
            dto.author.map(BookAuthor::new).unwrap_or(author),
            isbn,
            dto.category.map(BookCategory::new).unwrap_or(category),
            CopyCount::new(total),
            CopyCount::new(available),
            is_active,
        );
        self.book_modifier().update(&mut con, &book).await?;
        con.commit().await?;

        Ok(book.into())
    }
}

impl<Connection: Transaction + Send, T> UpdateBookService<Connection> for T where
    T: DependOnDatabaseConnection<Connection>
        + DependOnBookQuery<Connection>
        + DependOnBookModifier<Connection>
{
}

#[async_trait::async_trait]
pub trait DeleteBookService<Connection: Transaction + Send>:
    'static
    + Sync
    + Send
    + DependOnDatabaseConnection<Connection>
    + DependOnBookQuery<Connection>
    + DependOnBookModifier<Connection>
{
    /// Soft delete. The row and its borrow history stay; the book disappears
    /// from listings and can no longer be borrowed.
    async fn delete_book(&self, dto: DeleteBookDto) -> error_stack::Result<(), KernelError> {
        let mut con = self.database_connection().transact().await?;

        let book_id = BookId::new(dto.id);
        self.book_query()
            .find_by_id(&mut con, &book_id)
            .await?
            .filter(|book| *book.is_active().as_ref())
            .ok_or_else(|| Report::new(KernelError::BookNotFound))?;

        self.book_modifier().deactivate(&mut con, &book_id).await?;
        con.commit().await?;

        tracing::debug!(book_id = %dto.id, "book deactivated");
        Ok(())
    }
}

impl<Connection: Transaction + Send, T> DeleteBookService<Connection> for T where
    T: DependOnDatabaseConnection<Connection>
        + DependOnBookQuery<Connection>
        + DependOnBookModifier<Connection>
{
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use uuid::Uuid;

    use kernel::interface::database::Transaction;
    use kernel::interface::query::BookQuery;
    use kernel::interface::update::BookModifier;
    use kernel::prelude::entity::{SelectLimit, SelectOffset};
    use kernel::KernelError;

    use super::*;
    use crate::transfer::{CreateBookDto, UpdateBookDto};

    #[derive(Default)]
    struct State {
        books: HashMap<Uuid, Book>,
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
            let _ = (con, book_id);
            Ok(false)
        }

        async fn release_copy(
            &self,
            con: &mut MemTransaction,
            book_id: &BookId,
        ) -> error_stack::Result<bool, KernelError> {
            let _ = (con, book_id);
            Ok(false)
        }
    }

    #[derive(Clone, Default)]
    struct MemoryDatabase {
        state: Arc<Mutex<State>>,
    }

    impl MemoryDatabase {
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

        fn stored(&self, book_id: Uuid) -> Book {
            self.state.lock().unwrap().books[&book_id].clone()
        }

        fn count(&self) -> usize {
            self.state.lock().unwrap().books.len()
        }
    }

    #[async_trait::async_trait]
    impl DatabaseConnection<MemTransaction> for MemoryDatabase {
        async fn transact(&self) -> error_stack::Result<MemTransaction, KernelError> {
            Ok(MemTransaction(Arc::clone(&self.state)))
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

    fn create_dto(total: i32) -> CreateBookDto {
        CreateBookDto {
            title: "The Fifth Season".to_string(),
            author: "N. K. Jemisin".to_string(),
            isbn: format!("isbn-{}", Uuid::new_v4()),
            category: "Fantasy".to_string(),
            total_copies: total,
        }
    }

    #[tokio::test]
    async fn new_title_starts_fully_available() {
        let db = MemoryDatabase::default();

        let dto = db.create_book(create_dto(3)).await.unwrap();

        assert_eq!(dto.total_copies, 3);
        assert_eq!(dto.available_copies, 3);
        assert!(dto.is_active);
    }

    #[tokio::test]
    async fn zero_total_copies_is_rejected() {
        let db = MemoryDatabase::default();

        let err = db.create_book(create_dto(0)).await.unwrap_err();

        assert!(matches!(
            err.current_context(),
            KernelError::InvalidCopyCount
        ));
        assert_eq!(db.count(), 0);
    }

    #[tokio::test]
    async fn negative_total_copies_is_rejected() {
        let db = MemoryDatabase::default();

        let err = db.create_book(create_dto(-3)).await.unwrap_err();

        assert!(matches!(
            err.current_context(),
            KernelError::InvalidCopyCount
        ));
        assert_eq!(db.count(), 0);
    }

    #[tokio::test]
    async fn update_cannot_drop_total_copies_below_one() {
        let db = MemoryDatabase::default();
        let book = db.seed_book(3, 3);

        let err = db
            .update_book(UpdateBookDto {
                id: book,
                title: None,
                author: None,
                category: None,
                total_copies: Some(0),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.current_context(),
            KernelError::InvalidCopyCount
        ));
        assert_eq!(*db.stored(book).total_copies(), CopyCount::new(3));
    }

    #[tokio::test]
    async fn shrinking_total_keeps_outstanding_loans() {
        let db = MemoryDatabase::default();
        // Three copies, two out on loan.
        let book = db.seed_book(3, 1);

        let dto = db
            .update_book(UpdateBookDto {
                id: book,
                title: None,
                author: None,
                category: None,
                total_copies: Some(2),
            })
            .await
            .unwrap();

        assert_eq!(dto.total_copies, 2);
        assert_eq!(dto.available_copies, 0);
    }
}
