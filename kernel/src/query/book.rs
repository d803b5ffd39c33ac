use crate::database::Transaction;
use crate::entity::{Book, BookId, BookIsbn, SelectLimit, SelectOffset};
use crate::KernelError;

/// Catalogue listing filter. `search` matches title, author or ISBN as a
/// case-insensitive substring.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub available_only: bool,
}

#[async_trait::async_trait]
pub trait BookQuery<Connection: Transaction>: Sync + Send + 'static {
    async fn find_by_id(
        &self,
        con: &mut Connection,
        id: &BookId,
    ) -> error_stack::Result<Option<Book>, KernelError>;

    async fn find_by_isbn(
        &self,
        con: &mut Connection,
        isbn: &BookIsbn,
    ) -> error_stack::Result<Option<Book>, KernelError>;

    async fn find_all(
        &self,
        con: &mut Connection,
        filter: &BookFilter,
        limit: &SelectLimit,
        offset: &SelectOffset,
    ) -> error_stack::Result<Vec<Book>, KernelError>;
}

pub trait DependOnBookQuery<Connection: Transaction>: Sync + Send + 'static {
    type BookQuery: BookQuery<Connection>;
    fn book_query(&self) -> &Self::BookQuery;
}
