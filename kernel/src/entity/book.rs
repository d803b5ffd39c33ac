mod author;
mod category;
mod copies;
mod id;
mod isbn;
mod title;

pub use self::{author::*, category::*, copies::*, id::*, isbn::*, title::*};
use crate::entity::common::IsActive;
use destructure::{Destructure, Mutation};
use vodca::References;

#[derive(Debug, Clone, Eq, PartialEq, References, Destructure, Mutation)]
pub struct Book {
    id: BookId,
    title: BookTitle,
    author: BookAuthor,
    isbn: BookIsbn,
    category: BookCategory,
    total_copies: CopyCount,
    available_copies: CopyCount,
    is_active: IsActive<Book>,
}

impl Book {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: BookId,
        title: BookTitle,
        author: BookAuthor,
        isbn: BookIsbn,
        category: BookCategory,
        total_copies: CopyCount,
        available_copies: CopyCount,
        is_active: IsActive<Book>,
    ) -> Self {
        Self {
            id,
            title,
            author,
            isbn,
            category,
            total_copies,
            available_copies,
            is_active,
        }
    }

    pub fn is_available(&self) -> bool {
        *self.available_copies.as_ref() > 0
    }
}
