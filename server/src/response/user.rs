use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use application::transfer::UserDto;
use kernel::prelude::entity::UserRole;

use crate::controller::Exhaust;

#[derive(Debug, Serialize)]
pub struct UserResponse {
    id: Uuid,
    name: String,
    email: String,
    role: UserRole,
    student_id: String,
    is_active: bool,
}

impl From<UserDto> for UserResponse {
    fn from(dto: UserDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            email: dto.email,
            role: dto.role,
            student_id: dto.student_id,
            is_active: dto.is_active,
        }
    }
}

impl IntoResponse for UserResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct CreatedUserResponse(UserResponse);

impl IntoResponse for CreatedUserResponse {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self)).into_response()
    }
}

pub struct UserPresenter;

impl Exhaust<UserDto> for UserPresenter {
    type To = UserResponse;
    fn emit(&self, input: UserDto) -> Self::To {
        input.into()
    }
}

impl Exhaust<Vec<UserDto>> for UserPresenter {
    type To = Json<Vec<UserResponse>>;
    fn emit(&self, input: Vec<UserDto>) -> Self::To {
        Json::from(input.into_iter().map(UserResponse::from).collect::<Vec<_>>())
    }
}

pub struct CreatedUserPresenter;

impl Exhaust<UserDto> for CreatedUserPresenter {
    type To = CreatedUserResponse;
    fn emit(&self, input: UserDto) -> Self::To {
        CreatedUserResponse(input.into())
    }
}
