use crate::database::Transaction;
use crate::entity::{Book, BookId};
use crate::KernelError;

#[async_trait::async_trait]
pub trait BookModifier<Connection: Transaction>: 'static + Sync + Send {
    async fn create(
        &self,
        con: &mut Connection,
        book: &Book,
    ) -> error_stack::Result<(), KernelError>;

    async fn update(
        &self,
        con: &mut Connection,
        book: &Book,
    ) -> error_stack::Result<(), KernelError>;

    /// Soft delete: clears the active flag, the row stays.
    async fn deactivate(
        &self,
        con: &mut Connection,
        book_id: &BookId,
    ) -> error_stack::Result<(), KernelError>;

    /// Checks `available_copies > 0` and decrements it in one store operation.
    /// Returns false when no copy was free, which closes the window between a
    /// prior availability check and the decrement.
    async fn acquire_copy(
        &self,
        con: &mut Connection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError>;

    /// Increments `available_copies` unless it already equals `total_copies`.
    /// Returns false when the count was already full.
    async fn release_copy(
        &self,
        con: &mut Connection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError>;
}

pub trait DependOnBookModifier<Connection: Transaction>: 'static + Sync + Send {
    type BookModifier: BookModifier<Connection>;
    fn book_modifier(&self) -> &Self::BookModifier;
}
