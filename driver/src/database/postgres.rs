use error_stack::ResultExt;
use sqlx::{Pool, Postgres};
use time::Duration;

use kernel::interface::database::{DatabaseConnection, Transaction};
use kernel::interface::query::{DependOnBookQuery, DependOnRecordQuery, DependOnUserQuery};
use kernel::interface::update::{DependOnBookModifier, DependOnRecordModifier, DependOnUserModifier};
use kernel::prelude::entity::Fine;
use kernel::prelude::policy::{
    DependOnLoanPolicy, LoanPolicy, DEFAULT_FINE_PER_DAY_CENTS, DEFAULT_LOAN_PERIOD_DAYS,
};
use kernel::KernelError;

use crate::env;
use crate::error::ConvertError;

pub use self::{book::*, record::*, user::*};

mod book;
mod record;
mod user;

static POSTGRES_URL: &str = "POSTGRES_URL";
static LOAN_PERIOD_DAYS: &str = "LOAN_PERIOD_DAYS";
static FINE_PER_DAY_CENTS: &str = "FINE_PER_DAY_CENTS";

pub struct PostgresConnection(sqlx::Transaction<'static, Postgres>);

#[async_trait::async_trait]
impl Transaction for PostgresConnection {
    async fn commit(self) -> error_stack::Result<(), KernelError> {
        self.0.commit().await.convert_error()
    }

    async fn roll_back(self) -> error_stack::Result<(), KernelError> {
        self.0.rollback().await.convert_error()
    }
}

pub struct PostgresDatabase {
    pool: Pool<Postgres>,
    policy: LoanPolicy,
}

impl PostgresDatabase {
    pub async fn new() -> error_stack::Result<Self, KernelError> {
        let url = env(POSTGRES_URL)?;
        let pool = Pool::connect(&url).await.convert_error()?;
        tracing::debug!("connected to postgres");
        let policy = policy_from_env()?;
        tracing::debug!(
            loan_period_days = policy.loan_period().whole_days(),
            fine_per_day_cents = *policy.fine_per_day().as_ref(),
            "loan policy resolved"
        );
        Ok(Self { pool, policy })
    }
}

fn policy_from_env() -> error_stack::Result<LoanPolicy, KernelError> {
    let days = match dotenvy::var(LOAN_PERIOD_DAYS) {
        Ok(raw) => raw.parse::<i64>().change_context(KernelError::Internal)?,
        Err(_) => DEFAULT_LOAN_PERIOD_DAYS,
    };
    let cents = match dotenvy::var(FINE_PER_DAY_CENTS) {
        Ok(raw) => raw.parse::<i64>().change_context(KernelError::Internal)?,
        Err(_) => DEFAULT_FINE_PER_DAY_CENTS,
    };
    Ok(LoanPolicy::new(Duration::days(days), Fine::new(cents)))
}

#[async_trait::async_trait]
impl DatabaseConnection<PostgresConnection> for PostgresDatabase {
    async fn transact(&self) -> error_stack::Result<PostgresConnection, KernelError> {
        let transaction = self.pool.begin().await.convert_error()?;
        Ok(PostgresConnection(transaction))
    }
}

impl DependOnLoanPolicy for PostgresDatabase {
    fn loan_policy(&self) -> &LoanPolicy {
        &self.policy
    }
}

impl DependOnBookQuery<PostgresConnection> for PostgresDatabase {
    type BookQuery = PostgresBookRepository;
    fn book_query(&self) -> &PostgresBookRepository {
        &PostgresBookRepository
    }
}

impl DependOnBookModifier<PostgresConnection> for PostgresDatabase {
    type BookModifier = PostgresBookRepository;
    fn book_modifier(&self) -> &PostgresBookRepository {
        &PostgresBookRepository
    }
}

impl DependOnUserQuery<PostgresConnection> for PostgresDatabase {
    type UserQuery = PostgresUserRepository;
    fn user_query(&self) -> &PostgresUserRepository {
        &PostgresUserRepository
    }
}

impl DependOnUserModifier<PostgresConnection> for PostgresDatabase {
    type UserModifier = PostgresUserRepository;
    fn user_modifier(&self) -> &PostgresUserRepository {
        &PostgresUserRepository
    }
}

impl DependOnRecordQuery<PostgresConnection> for PostgresDatabase {
    type RecordQuery = PostgresRecordRepository;
    fn record_query(&self) -> &PostgresRecordRepository {
        &PostgresRecordRepository
    }
}

impl DependOnRecordModifier<PostgresConnection> for PostgresDatabase {
    type RecordModifier = PostgresRecordRepository;
    fn record_modifier(&self) -> &PostgresRecordRepository {
        &PostgresRecordRepository
    }
}
