use error_stack::Report;

use kernel::KernelError;

/// Maps store-level failures onto kernel error contexts. Pool exhaustion
/// becomes [`KernelError::Timeout`]; serialization failures become
/// [`KernelError::Conflict`] so services can retry them. A unique violation
/// keeps its domain meaning when the constraint is known, so a race on
/// insert reports the same error the up-front check would have.
pub trait ConvertError {
    type Ok;
    fn convert_error(self) -> error_stack::Result<Self::Ok, KernelError>;
}

impl<T> ConvertError for Result<T, sqlx::Error> {
    type Ok = T;
    fn convert_error(self) -> error_stack::Result<T, KernelError> {
        self.map_err(|error| {
            let context = match &error {
                sqlx::Error::PoolTimedOut => KernelError::Timeout,
                sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                    match db.constraint() {
                        Some("books_isbn_key") => KernelError::IsbnTaken,
                        Some("users_email_key") => KernelError::EmailTaken,
                        _ => KernelError::Conflict,
                    }
                }
                sqlx::Error::Database(db) if db.code().as_deref() == Some("40001") => {
                    KernelError::Conflict
                }
                _ => KernelError::Internal,
            };
            Report::from(error).change_context(context)
        })
    }
}
