use std::process::{ExitCode, Termination};

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use error_stack::Report;
use serde_json::json;

use kernel::KernelError;

#[derive(Debug)]
pub struct StackTrace(Report<KernelError>);

impl From<Report<KernelError>> for StackTrace {
    fn from(e: Report<KernelError>) -> Self {
        StackTrace(e)
    }
}

impl Termination for StackTrace {
    fn report(self) -> ExitCode {
        self.0.report()
    }
}

#[derive(Debug)]
pub struct ErrorStatus(Report<KernelError>);

impl From<Report<KernelError>> for ErrorStatus {
    fn from(e: Report<KernelError>) -> Self {
        ErrorStatus(e)
    }
}

impl IntoResponse for ErrorStatus {
    fn into_response(self) -> axum::response::Response {
        let context = self.0.current_context();
        let status = match context {
            KernelError::UserNotFound
            | KernelError::BookNotFound
            | KernelError::BorrowNotFound => StatusCode::NOT_FOUND,
            KernelError::UserInactive
            | KernelError::BookUnavailable
            | KernelError::DuplicateBorrow
            | KernelError::OutstandingOverdue
            | KernelError::AlreadyReturned
            | KernelError::IsbnTaken
            | KernelError::EmailTaken
            | KernelError::InvalidCopyCount
            // A conflict that survived the service-side retry is reported like
            // any other failed precondition.
            | KernelError::Conflict => StatusCode::BAD_REQUEST,
            KernelError::Timeout => StatusCode::REQUEST_TIMEOUT,
            KernelError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Internal faults keep their stack trace in the log, not the body.
        let message = if let KernelError::Internal = context {
            tracing::error!("{:?}", self.0);
            "Internal server error".to_string()
        } else {
            context.to_string()
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod test {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use error_stack::Report;

    use kernel::KernelError;

    use super::ErrorStatus;

    fn status_for(error: KernelError) -> StatusCode {
        ErrorStatus::from(Report::new(error)).into_response().status()
    }

    #[test]
    fn absence_maps_to_not_found() {
        for error in [
            KernelError::UserNotFound,
            KernelError::BookNotFound,
            KernelError::BorrowNotFound,
        ] {
            assert_eq!(status_for(error), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn precondition_failures_map_to_bad_request() {
        for error in [
            KernelError::UserInactive,
            KernelError::BookUnavailable,
            KernelError::DuplicateBorrow,
            KernelError::OutstandingOverdue,
            KernelError::AlreadyReturned,
            KernelError::IsbnTaken,
            KernelError::EmailTaken,
            KernelError::InvalidCopyCount,
        ] {
            assert_eq!(status_for(error), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn unresolved_conflict_is_a_precondition_failure() {
        assert_eq!(status_for(KernelError::Conflict), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn faults_keep_their_transport_statuses() {
        assert_eq!(status_for(KernelError::Timeout), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            status_for(KernelError::Internal),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
