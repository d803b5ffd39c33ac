use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use application::transfer::{BookSummaryDto, RecordDto, UserSummaryDto};
use kernel::prelude::entity::RecordStatus;

use crate::controller::Exhaust;

#[derive(Debug, Serialize)]
pub struct BookSummaryResponse {
    title: String,
    author: String,
    isbn: String,
}

impl From<BookSummaryDto> for BookSummaryResponse {
    fn from(dto: BookSummaryDto) -> Self {
        Self {
            title: dto.title,
            author: dto.author,
            isbn: dto.isbn,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserSummaryResponse {
    name: String,
    email: String,
    student_id: String,
}

impl From<UserSummaryDto> for UserSummaryResponse {
    fn from(dto: UserSummaryDto) -> Self {
        Self {
            name: dto.name,
            email: dto.email,
            student_id: dto.student_id,
        }
    }
}

/// Wire form of a borrow record. The fine is exposed in dollars; everything
/// internal counts cents.
#[derive(Debug, Serialize)]
pub struct RecordResponse {
    id: Uuid,
    user_id: Uuid,
    book_id: Uuid,
    user: Option<UserSummaryResponse>,
    book: Option<BookSummaryResponse>,
    #[serde(with = "time::serde::rfc3339")]
    borrowed_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    due_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    returned_at: Option<OffsetDateTime>,
    status: RecordStatus,
    fine: f64,
    notes: Option<String>,
    is_overdue: bool,
    days_overdue: i64,
}

impl From<RecordDto> for RecordResponse {
    fn from(dto: RecordDto) -> Self {
        Self {
            id: dto.id,
            user_id: dto.user_id,
            book_id: dto.book_id,
            user: dto.user.map(UserSummaryResponse::from),
            book: dto.book.map(BookSummaryResponse::from),
            borrowed_at: dto.borrowed_at,
            due_at: dto.due_at,
            returned_at: dto.returned_at,
            status: dto.status,
            fine: dto.fine_cents as f64 / 100.0,
            notes: dto.notes,
            is_overdue: dto.is_overdue,
            days_overdue: dto.days_overdue,
        }
    }
}

impl IntoResponse for RecordResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct CreatedRecordResponse(RecordResponse);

impl IntoResponse for CreatedRecordResponse {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ReturnedRecordResponse {
    record: RecordResponse,
    fine: f64,
}

impl IntoResponse for ReturnedRecordResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

pub struct RecordPresenter;

impl Exhaust<RecordDto> for RecordPresenter {
    type To = RecordResponse;
    fn emit(&self, input: RecordDto) -> Self::To {
        input.into()
    }
}

impl Exhaust<Vec<RecordDto>> for RecordPresenter {
    type To = Json<Vec<RecordResponse>>;
    fn emit(&self, input: Vec<RecordDto>) -> Self::To {
        Json::from(
            input
                .into_iter()
                .map(RecordResponse::from)
                .collect::<Vec<_>>(),
        )
    }
}

pub struct BorrowPresenter;

impl Exhaust<RecordDto> for BorrowPresenter {
    type To = CreatedRecordResponse;
    fn emit(&self, input: RecordDto) -> Self::To {
        CreatedRecordResponse(input.into())
    }
}

pub struct ReturnPresenter;

impl Exhaust<RecordDto> for ReturnPresenter {
    type To = ReturnedRecordResponse;
    fn emit(&self, input: RecordDto) -> Self::To {
        let record = RecordResponse::from(input);
        let fine = record.fine;
        ReturnedRecordResponse { record, fine }
    }
}
