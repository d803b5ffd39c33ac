use kernel::prelude::entity::{DestructUser, SelectLimit, SelectOffset, User, UserRole};
use uuid::Uuid;

/// User representation handed to the transport layer. The password hash never
/// crosses this boundary.
#[derive(Debug, Clone)]
pub struct UserDto {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub student_id: String,
    pub is_active: bool,
}

impl From<User> for UserDto {
    fn from(value: User) -> Self {
        let DestructUser {
            id,
            name,
            email,
            role,
            student_id,
            is_active,
            ..
        } = value.into_destruct();
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            role,
            student_id: student_id.into(),
            is_active: is_active.into(),
        }
    }
}

pub struct CreateUserDto {
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub student_id: String,
    pub password_hash: String,
}

pub struct UpdateUserDto {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
}

pub struct SetUserStatusDto {
    pub id: Uuid,
    pub is_active: bool,
}

pub struct GetUserDto {
    pub id: Uuid,
}

pub struct GetAllUserDto {
    pub limit: SelectLimit,
    pub offset: SelectOffset,
}
