use std::fmt::Display;

use error_stack::Context;

/// Failure taxonomy shared by every layer. Absence, precondition violations and
/// store faults are kept as distinct variants so the transport layer can map
/// each one to a status code without unpacking messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    UserNotFound,
    BookNotFound,
    BorrowNotFound,
    UserInactive,
    BookUnavailable,
    DuplicateBorrow,
    OutstandingOverdue,
    AlreadyReturned,
    IsbnTaken,
    EmailTaken,
    InvalidCopyCount,
    Conflict,
    Timeout,
    Internal,
}

impl Display for KernelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelError::UserNotFound => write!(f, "User not found"),
            KernelError::BookNotFound => write!(f, "Book not found"),
            KernelError::BorrowNotFound => write!(f, "Borrow record not found"),
            KernelError::UserInactive => write!(f, "User account is deactivated"),
            KernelError::BookUnavailable => {
                write!(f, "Book is not available for borrowing")
            }
            KernelError::DuplicateBorrow => {
                write!(f, "You have already borrowed this book")
            }
            KernelError::OutstandingOverdue => write!(
                f,
                "You have overdue books. Please return them before borrowing new books."
            ),
            KernelError::AlreadyReturned => write!(f, "Book has already been returned"),
            KernelError::IsbnTaken => write!(f, "Book with this ISBN already exists"),
            KernelError::EmailTaken => write!(f, "User with this email already exists"),
            KernelError::InvalidCopyCount => {
                write!(f, "Total copies must be at least 1")
            }
            KernelError::Conflict => write!(f, "Concurrent modification detected"),
            KernelError::Timeout => write!(f, "Process timed out"),
            KernelError::Internal => write!(f, "Internal kernel error"),
        }
    }
}

impl Context for KernelError {}
