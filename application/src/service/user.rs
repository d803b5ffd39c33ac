use error_stack::Report;

use kernel::interface::database::{DatabaseConnection, DependOnDatabaseConnection, Transaction};
use kernel::interface::query::{DependOnUserQuery, UserQuery};
use kernel::interface::update::{DependOnUserModifier, UserModifier};
use kernel::prelude::entity::{
    DestructUser, IsActive, PasswordHash, StudentId, User, UserEmail, UserId, UserName,
};
use kernel::KernelError;
use uuid::Uuid;

use crate::transfer::{
    CreateUserDto, GetAllUserDto, GetUserDto, SetUserStatusDto, UpdateUserDto, UserDto,
};

#[async_trait::async_trait]
pub trait GetUserService<Connection: Transaction + Send>:
    'static + Sync + Send + DependOnDatabaseConnection<Connection> + DependOnUserQuery<Connection>
{
    async fn get_user(&self, dto: GetUserDto) -> error_stack::Result<UserDto, KernelError> {
        let mut con = self.database_connection().transact().await?;
        let user = self
            .user_query()
            .find_by_id(&mut con, &UserId::new(dto.id))
            .await?
            .ok_or_else(|| Report::new(KernelError::UserNotFound))?;
        con.commit().await?;
        Ok(user.into())
    }

    async fn get_all_users(
        &self,
        dto: GetAllUserDto,
    ) -> error_stack::Result<Vec<UserDto>, KernelError> {
        let mut con = self.database_connection().transact().await?;
        let users = self
            .user_query()
            .find_all_active(&mut con, &dto.limit, &dto.offset)
            .await?;
        con.commit().await?;
        Ok(users.into_iter().map(UserDto::from).collect())
    }
}

impl<Connection: Transaction + Send, T> GetUserService<Connection> for T where
    T: DependOnDatabaseConnection<Connection> + DependOnUserQuery<Connection>
{
}

#[async_trait::async_trait]
pub trait CreateUserService<Connection: Transaction + Send>:
    'static
    + Sync
    + Send
    + DependOnDatabaseConnection<Connection>
    + DependOnUserQuery<Connection>
    + DependOnUserModifier<Connection>
{
    async fn create_user(&self, dto: CreateUserDto) -> error_stack::Result<UserDto, KernelError> {
        let mut con = self.database_connection().transact().await?;

        let email = UserEmail::new(dto.email);
        if self
            .user_query()
            .find_by_email(&mut con, &email)
            .await?
            .is_some()
        {
            return Err(Report::new(KernelError::EmailTaken));
        }

        let user = User::new(
            UserId::new(Uuid::new_v4()),
            UserName::new(dto.name),
            email,
            dto.role,
            StudentId::new(dto.student_id),
            PasswordHash::new(dto.password_hash),
            IsActive::new(true),
        );
        self.user_modifier().create(&mut con, &user).await?;
        con.commit().await?;

        tracing::debug!(user_id = %Uuid::from(user.id().clone()), "user registered");
        Ok(user.into())
    }
}

impl<Connection: Transaction + Send, T> CreateUserService<Connection> for T where
    T: DependOnDatabaseConnection<Connection>
        + DependOnUserQuery<Connection>
        + DependOnUserModifier<Connection>
{
}

#[async_trait::async_trait]
pub trait UpdateUserService<Connection: Transaction + Send>:
    'static
    + Sync
    + Send
    + DependOnDatabaseConnection<Connection>
    + DependOnUserQuery<Connection>
    + DependOnUserModifier<Connection>
{
    async fn update_user(&self, dto: UpdateUserDto) -> error_stack::Result<UserDto, KernelError> {
        let mut con = self.database_connection().transact().await?;

        let user = self
            .user_query()
            .find_by_id(&mut con, &UserId::new(dto.id))
            .await?
            .ok_or_else(|| Report::new(KernelError::UserNotFound))?;

        if let Some(new_email) = &dto.email {
            let email = UserEmail::new(new_email.clone());
            if self
                .user_query()
                .find_by_email(&mut con, &email)
                .await?
                .filter(|other| other.id() != user.id())
                .is_some()
            {
                return Err(Report::new(KernelError::EmailTaken));
            }
        }

        let DestructUser {
            id,
            name,
            email,
            role,
            student_id,
            password,
            is_active,
        } = user.into_destruct();
        let user = User::new(
            id,
            dto.name.map(UserName::new).unwrap_or(name),
            dto.email.map(UserEmail::new).unwrap_or(email),
            role,
            student_id,
            password,
            is_active,
        );
        self.user_modifier().update(&mut con, &user).await?;
        con.commit().await?;

        Ok(user.into())
    }
}

impl<Connection: Transaction + Send, T> UpdateUserService<Connection> for T where
    T: DependOnDatabaseConnection<Connection>
        + DependOnUserQuery<Connection>
        + DependOnUserModifier<Connection>
{
}

#[async_trait::async_trait]
pub trait UserStatusService<Connection: Transaction + Send>:
    'static
    + Sync
    + Send
    + DependOnDatabaseConnection<Connection>
    + DependOnUserQuery<Connection>
    + DependOnUserModifier<Connection>
{
    /// Activates or deactivates the account. Deactivation blocks new borrows
    /// but leaves open records and history untouched.
    async fn set_user_status(
        &self,
        dto: SetUserStatusDto,
    ) -> error_stack::Result<UserDto, KernelError> {
        let mut con = self.database_connection().transact().await?;

        let user_id = UserId::new(dto.id);
        let user = self
            .user_query()
            .find_by_id(&mut con, &user_id)
            .await?
            .ok_or_else(|| Report::new(KernelError::UserNotFound))?;

        self.user_modifier()
            .set_active(&mut con, &user_id, dto.is_active)
            .await?;
        con.commit().await?;

        let DestructUser {
            id,
            name,
            email,
            role,
            student_id,
            password,
            ..
        } = user.into_destruct();
        let user = User::new(
            id,
            name,
            email,
            role,
            student_id,
            password,
            IsActive::new(dto.is_active),
        );
        tracing::debug!(user_id = %dto.id, active = dto.is_active, "user status changed");
        Ok(user.into())
    }
}

impl<Connection: Transaction + Send, T> UserStatusService<Connection> for T where
    T: DependOnDatabaseConnection<Connection>
        + DependOnUserQuery<Connection>
        + DependOnUserModifier<Connection>
{
}
