use serde::Deserialize;
use uuid::Uuid;

use application::transfer::{
    CreateUserDto, GetAllUserDto, GetRecordsByUserDto, GetUserDto, SetUserStatusDto, UpdateUserDto,
};
use kernel::prelude::entity::{SelectLimit, SelectOffset, UserRole};

use crate::controller::Intake;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    name: String,
    email: String,
    role: UserRole,
    student_id: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetUserStatusRequest {
    is_active: bool,
}

#[derive(Debug)]
pub struct GetUserRequest {
    id: Uuid,
}

impl GetUserRequest {
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }
}

#[derive(Debug, Deserialize)]
pub struct GetAllUserRequest {
    #[serde(default)]
    limit: SelectLimit,
    #[serde(default)]
    offset: SelectOffset,
}

#[derive(Debug)]
pub struct GetUserRecordsRequest {
    id: Uuid,
}

impl GetUserRecordsRequest {
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }
}

pub struct UserTransformer;

impl Intake<CreateUserRequest> for UserTransformer {
    type To = CreateUserDto;
    fn emit(&self, input: CreateUserRequest) -> Self::To {
        CreateUserDto {
            name: input.name,
            email: input.email,
            role: input.role,
            student_id: input.student_id,
            password_hash: input.password,
        }
    }
}

impl Intake<(Uuid, UpdateUserRequest)> for UserTransformer {
    type To = UpdateUserDto;
    fn emit(&self, input: (Uuid, UpdateUserRequest)) -> Self::To {
        let (id, input) = input;
        UpdateUserDto {
            id,
            name: input.name,
            email: input.email,
        }
    }
}

impl Intake<(Uuid, SetUserStatusRequest)> for UserTransformer {
    type To = SetUserStatusDto;
    fn emit(&self, input: (Uuid, SetUserStatusRequest)) -> Self::To {
        let (id, input) = input;
        SetUserStatusDto {
            id,
            is_active: input.is_active,
        }
    }
}

impl Intake<GetUserRequest> for UserTransformer {
    type To = GetUserDto;
    fn emit(&self, input: GetUserRequest) -> Self::To {
        GetUserDto { id: input.id }
    }
}

impl Intake<GetAllUserRequest> for UserTransformer {
    type To = GetAllUserDto;
    fn emit(&self, input: GetAllUserRequest) -> Self::To {
        GetAllUserDto {
            limit: input.limit,
            offset: input.offset,
        }
    }
}

impl Intake<GetUserRecordsRequest> for UserTransformer {
    type To = GetRecordsByUserDto;
    fn emit(&self, input: GetUserRecordsRequest) -> Self::To {
        GetRecordsByUserDto { user_id: input.id }
    }
}
