use crate::database::Transaction;
use crate::entity::BorrowRecord;
use crate::KernelError;

#[async_trait::async_trait]
pub trait RecordModifier<Connection: Transaction>: 'static + Sync + Send {
    async fn create(
        &self,
        con: &mut Connection,
        record: &BorrowRecord,
    ) -> error_stack::Result<(), KernelError>;

    async fn update(
        &self,
        con: &mut Connection,
        record: &BorrowRecord,
    ) -> error_stack::Result<(), KernelError>;
}

pub trait DependOnRecordModifier<Connection: Transaction>: 'static + Sync + Send {
    type RecordModifier: RecordModifier<Connection>;
    fn record_modifier(&self) -> &Self::RecordModifier;
}
