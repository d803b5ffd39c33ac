use time::{Duration, OffsetDateTime};
use vodca::References;

use crate::entity::{BorrowedAt, DueDate, Fine};

pub const DEFAULT_LOAN_PERIOD_DAYS: i64 = 14;
pub const DEFAULT_FINE_PER_DAY_CENTS: i64 = 50;

/// Lending rules applied by the borrowing lifecycle engine. A single policy is
/// constructed at startup from configuration and injected everywhere, so there
/// is exactly one due-date offset and one fine rate per deployment.
#[derive(Debug, Clone, Eq, PartialEq, References)]
pub struct LoanPolicy {
    loan_period: Duration,
    fine_per_day: Fine,
}

impl LoanPolicy {
    pub fn new(loan_period: Duration, fine_per_day: Fine) -> Self {
        Self {
            loan_period,
            fine_per_day,
        }
    }

    pub fn due_date(&self, borrowed_at: &BorrowedAt) -> DueDate {
        DueDate::new(*borrowed_at.as_ref() + self.loan_period)
    }

    /// Fine owed when closing a record at `now`: whole overdue days (rounded
    /// up) times the daily rate, zero when the due date has not passed.
    pub fn fine_for(&self, due_at: &DueDate, now: OffsetDateTime) -> Fine {
        let late = now - *due_at.as_ref();
        if !late.is_positive() {
            return Fine::new(0i64);
        }
        // Any positive lateness bills at least one day, even sub-second.
        let days = late.whole_seconds().div_ceil(86_400).max(1);
        Fine::new(days * *self.fine_per_day.as_ref())
    }
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self::new(
            Duration::days(DEFAULT_LOAN_PERIOD_DAYS),
            Fine::new(DEFAULT_FINE_PER_DAY_CENTS),
        )
    }
}

pub trait DependOnLoanPolicy: 'static + Sync + Send {
    fn loan_policy(&self) -> &LoanPolicy;
}
