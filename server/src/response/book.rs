use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use application::transfer::BookDto;

use crate::controller::Exhaust;

#[derive(Debug, Serialize)]
pub struct BookResponse {
    id: Uuid,
    title: String,
    author: String,
    isbn: String,
    category: String,
    total_copies: i32,
    available_copies: i32,
    is_available: bool,
    is_active: bool,
}

impl From<BookDto> for BookResponse {
    fn from(dto: BookDto) -> Self {
        Self {
            id: dto.id,
            title: dto.title,
            author: dto.author,
            isbn: dto.isbn,
            category: dto.category,
            total_copies: dto.total_copies,
            available_copies: dto.available_copies,
            is_available: dto.is_available,
            is_active: dto.is_active,
        }
    }
}

impl IntoResponse for BookResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct CreatedBookResponse(BookResponse);

impl IntoResponse for CreatedBookResponse {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self)).into_response()
    }
}

pub struct BookPresenter;

impl Exhaust<BookDto> for BookPresenter {
    type To = BookResponse;
    fn emit(&self, input: BookDto) -> Self::To {
        input.into()
    }
}

impl Exhaust<Vec<BookDto>> for BookPresenter {
    type To = Json<Vec<BookResponse>>;
    fn emit(&self, input: Vec<BookDto>) -> Self::To {
        Json::from(input.into_iter().map(BookResponse::from).collect::<Vec<_>>())
    }
}

impl Exhaust<()> for BookPresenter {
    type To = StatusCode;
    fn emit(&self, _input: ()) -> Self::To {
        StatusCode::NO_CONTENT
    }
}

pub struct CreatedBookPresenter;

impl Exhaust<BookDto> for CreatedBookPresenter {
    type To = CreatedBookResponse;
    fn emit(&self, input: BookDto) -> Self::To {
        CreatedBookResponse(input.into())
    }
}
