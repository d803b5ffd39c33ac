use kernel::prelude::entity::{Book, DestructBook, SelectLimit, SelectOffset};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BookDto {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
    pub total_copies: i32,
    pub available_copies: i32,
    pub is_available: bool,
    pub is_active: bool,
}

impl From<Book> for BookDto {
    fn from(value: Book) -> Self {
        let is_available = value.is_available();
        let DestructBook {
            id,
            title,
            author,
            isbn,
            category,
            total_copies,
            available_copies,
            is_active,
        } = value.into_destruct();
        Self {
            id: id.into(),
            title: title.into(),
            author: author.into(),
            isbn: isbn.into(),
            category: category.into(),
            total_copies: total_copies.into(),
            available_copies: available_copies.into(),
            is_available,
            is_active: is_active.into(),
        }
    }
}

pub struct CreateBookDto {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
    pub total_copies: i32,
}

pub struct UpdateBookDto {
    pub id: Uuid,
    pub title: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub total_copies: Option<i32>,
}

pub struct GetBookDto {
    pub id: Uuid,
}

pub struct GetAllBookDto {
    pub search: Option<String>,
    pub category: Option<String>,
    pub available_only: bool,
    pub limit: SelectLimit,
    pub offset: SelectOffset,
}

pub struct DeleteBookDto {
    pub id: Uuid,
}
