use crate::database::Transaction;
use crate::entity::{User, UserId};
use crate::KernelError;

#[async_trait::async_trait]
pub trait UserModifier<Connection: Transaction>: 'static + Sync + Send {
    async fn create(
        &self,
        con: &mut Connection,
        user: &User,
    ) -> error_stack::Result<(), KernelError>;

    async fn update(
        &self,
        con: &mut Connection,
        user: &User,
    ) -> error_stack::Result<(), KernelError>;

    async fn set_active(
        &self,
        con: &mut Connection,
        user_id: &UserId,
        active: bool,
    ) -> error_stack::Result<(), KernelError>;
}

pub trait DependOnUserModifier<Connection: Transaction>: 'static + Sync + Send {
    type UserModifier: UserModifier<Connection>;
    fn user_modifier(&self) -> &Self::UserModifier;
}
