use crate::database::Transaction;
use crate::entity::{SelectLimit, SelectOffset, User, UserEmail, UserId};
use crate::KernelError;

#[async_trait::async_trait]
pub trait UserQuery<Connection: Transaction>: Sync + Send + 'static {
    async fn find_by_id(
        &self,
        con: &mut Connection,
        id: &UserId,
    ) -> error_stack::Result<Option<User>, KernelError>;

    async fn find_by_email(
        &self,
        con: &mut Connection,
        email: &UserEmail,
    ) -> error_stack::Result<Option<User>, KernelError>;

    async fn find_all_active(
        &self,
        con: &mut Connection,
        limit: &SelectLimit,
        offset: &SelectOffset,
    ) -> error_stack::Result<Vec<User>, KernelError>;
}

pub trait DependOnUserQuery<Connection: Transaction>: Sync + Send + 'static {
    type UserQuery: UserQuery<Connection>;
    fn user_query(&self) -> &Self::UserQuery;
}
