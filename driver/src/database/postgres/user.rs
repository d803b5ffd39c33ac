use error_stack::Report;
use sqlx::PgConnection;
use uuid::Uuid;

use kernel::interface::query::UserQuery;
use kernel::interface::update::UserModifier;
use kernel::prelude::entity::{
    IsActive, PasswordHash, SelectLimit, SelectOffset, StudentId, User, UserEmail, UserId,
    UserName, UserRole,
};
use kernel::KernelError;

use crate::database::postgres::PostgresConnection;
use crate::error::ConvertError;

pub struct PostgresUserRepository;

#[async_trait::async_trait]
impl UserQuery<PostgresConnection> for PostgresUserRepository {
    async fn find_by_id(
        &self,
        con: &mut PostgresConnection,
        id: &UserId,
    ) -> error_stack::Result<Option<User>, KernelError> {
        PgUserInternal::find_by_id(&mut *con.0, id).await
    }

    async fn find_by_email(
        &self,
        con: &mut PostgresConnection,
        email: &UserEmail,
    ) -> error_stack::Result<Option<User>, KernelError> {
        PgUserInternal::find_by_email(&mut *con.0, email).await
    }

    async fn find_all_active(
        &self,
        con: &mut PostgresConnection,
        limit: &SelectLimit,
        offset: &SelectOffset,
    ) -> error_stack::Result<Vec<User>, KernelError> {
        PgUserInternal::find_all_active(&mut *con.0, limit, offset).await
    }
}

#[async_trait::async_trait]
impl UserModifier<PostgresConnection> for PostgresUserRepository {
    async fn create(
        &self,
        con: &mut PostgresConnection,
        user: &User,
    ) -> error_stack::Result<(), KernelError> {
        PgUserInternal::create(&mut *con.0, user).await
    }

    async fn update(
        &self,
        con: &mut PostgresConnection,
        user: &User,
    ) -> error_stack::Result<(), KernelError> {
        PgUserInternal::update(&mut *con.0, user).await
    }

    async fn set_active(
        &self,
        con: &mut PostgresConnection,
        user_id: &UserId,
        active: bool,
    ) -> error_stack::Result<(), KernelError> {
        PgUserInternal::set_active(&mut *con.0, user_id, active).await
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    student_id: String,
    password: String,
    is_active: bool,
}

impl TryFrom<UserRow> for User {
    type Error = Report<KernelError>;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = UserRole::try_from(row.role.as_str())
            .map_err(|message| Report::new(KernelError::Internal).attach_printable(message))?;
        Ok(User::new(
            UserId::new(row.id),
            UserName::new(row.name),
            UserEmail::new(row.email),
            role,
            StudentId::new(row.student_id),
            PasswordHash::new(row.password),
            IsActive::new(row.is_active),
        ))
    }
}

pub(in crate::database) struct PgUserInternal;

impl PgUserInternal {
    async fn find_by_id(
        con: &mut PgConnection,
        id: &UserId,
    ) -> error_stack::Result<Option<User>, KernelError> {
        let row = sqlx::query_as::<_, UserRow>(
            // language=postgresql
            r#"
            SELECT id, name, email, role, student_id, password, is_active
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_email(
        con: &mut PgConnection,
        email: &UserEmail,
    ) -> error_stack::Result<Option<User>, KernelError> {
        let row = sqlx::query_as::<_, UserRow>(
            // language=postgresql
            r#"
            SELECT id, name, email, role, student_id, password, is_active
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        row.map(User::try_from).transpose()
    }

    async fn find_all_active(
        con: &mut PgConnection,
        limit: &SelectLimit,
        offset: &SelectOffset,
    ) -> error_stack::Result<Vec<User>, KernelError> {
        let rows = sqlx::query_as::<_, UserRow>(
            // language=postgresql
            r#"
            SELECT id, name, email, role, student_id, password, is_active
            FROM users
            WHERE is_active
            ORDER BY name
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit.as_ref())
        .bind(offset.as_ref())
        .fetch_all(con)
        .await
        .convert_error()?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn create(con: &mut PgConnection, user: &User) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, role, student_id, password, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id().as_ref())
        .bind(user.name().as_ref())
        .bind(user.email().as_ref())
        .bind(user.role().as_str())
        .bind(user.student_id().as_ref())
        .bind(user.password().as_ref())
        .bind(user.is_active().as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }

    async fn update(con: &mut PgConnection, user: &User) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        sqlx::query(
            r#"
            UPDATE users
            SET name = $2, email = $3
            WHERE id = $1
            "#,
        )
        .bind(user.id().as_ref())
        .bind(user.name().as_ref())
        .bind(user.email().as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }

    async fn set_active(
        con: &mut PgConnection,
        user_id: &UserId,
        active: bool,
    ) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        sqlx::query(
            r#"
            UPDATE users
            SET is_active = $2
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_ref())
        .bind(active)
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use error_stack::Report;

    use kernel::interface::database::{DatabaseConnection, Transaction};
    use kernel::interface::query::UserQuery;
    use kernel::interface::update::UserModifier;
    use kernel::prelude::entity::{
        IsActive, PasswordHash, StudentId, User, UserEmail, UserId, UserName, UserRole,
    };
    use kernel::KernelError;

    use crate::database::postgres::{PostgresDatabase, PostgresUserRepository};

    #[test_with::env(POSTGRES_TEST)]
    #[tokio::test]
    async fn test() -> Result<(), Report<KernelError>> {
        let db = PostgresDatabase::new().await?;
        let mut con = db.transact().await?;
        let id = UserId::new(uuid::Uuid::new_v4());

        let user = User::new(
            id.clone(),
            UserName::new("test"),
            UserEmail::new(format!("{}@example.com", rand::random::<u32>())),
            UserRole::Student,
            StudentId::new("S-0001"),
            PasswordHash::new("hashed"),
            IsActive::new(true),
        );
        PostgresUserRepository.create(&mut con, &user).await?;

        let found = PostgresUserRepository.find_by_id(&mut con, &id).await?;
        assert_eq!(found, Some(user.clone()));

        let found = PostgresUserRepository
            .find_by_email(&mut con, user.email())
            .await?;
        assert_eq!(found, Some(user));

        PostgresUserRepository.set_active(&mut con, &id, false).await?;
        let found = PostgresUserRepository.find_by_id(&mut con, &id).await?;
        assert!(matches!(found, Some(user) if !*user.is_active().as_ref()));

        con.roll_back().await?;
        Ok(())
    }
}
