mod email;
mod id;
mod name;
mod password;
mod role;
mod student_id;

pub use self::{email::*, id::*, name::*, password::*, role::*, student_id::*};
use crate::entity::common::IsActive;
use destructure::{Destructure, Mutation};
use vodca::References;

#[derive(Debug, Clone, Eq, PartialEq, References, Destructure, Mutation)]
pub struct User {
    id: UserId,
    name: UserName,
    email: UserEmail,
    role: UserRole,
    student_id: StudentId,
    password: PasswordHash,
    is_active: IsActive<User>,
}

impl User {
    pub fn new(
        id: UserId,
        name: UserName,
        email: UserEmail,
        role: UserRole,
        student_id: StudentId,
        password: PasswordHash,
        is_active: IsActive<User>,
    ) -> Self {
        Self {
            id,
            name,
            email,
            role,
            student_id,
            password,
            is_active,
        }
    }
}
