use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{
    ApprovalDecision, ApprovalTicket, PaymentRequest, ReservationRecord, ReservationState,
};
use crate::error::{Result, TreasurerError};
use crate::ports::{ApprovalStore, Ledger, PolicyStore};

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a PostgreSQL store from an existing connection pool (zero-cost reuse)
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_reservation(row: &sqlx::postgres::PgRow) -> Result<ReservationRecord> {
        Ok(ReservationRecord {
            reservation_id: row.get("reservation_id"),
            request_id: row.get("request_id"),
            state: row.get::<String, _>("state").parse()?,
            settlement_reference: row.get("settlement_reference"),
            release_reason: row.get("release_reason"),
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
            resolved_at: row.get::<Option<DateTime<Utc>>, _>("resolved_at"),
        })
    }

    fn row_to_ticket(row: &sqlx::postgres::PgRow) -> Result<ApprovalTicket> {
        Ok(ApprovalTicket {
            ticket_id: row.get("ticket_id"),
            request: PaymentRequest {
                request_id: row.get("request_id"),
                requester_id: row.get("requester_id"),
                vendor_identifier: row.get("vendor_identifier"),
                amount: row.get("amount"),
                currency: row.get("currency"),
            },
            reason: row.get("reason"),
            status: row.get::<String, _>("status").parse()?,
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
            resolved_at: row.get::<Option<DateTime<Utc>>, _>("resolved_at"),
        })
    }
}

#[async_trait]
impl PolicyStore for PostgresStore {
    async fn get_limit(&self, name: &str) -> Result<Option<Decimal>> {
        let row = sqlx::query("SELECT value FROM policy_limits WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("value")))
    }

    async fn set_limit(&self, name: &str, value: Decimal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO policy_limits (name, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (name) DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = NOW()
            "#,
        )
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await?;

        debug!("Policy limit {} set to {}", name, value);
        Ok(())
    }
}

#[async_trait]
impl Ledger for PostgresStore {
    /// Idempotent on `request_id`: a second write returns the first record.
    #[instrument(skip(self, record), fields(request_id = %record.request_id))]
    async fn write_reservation(&self, record: ReservationRecord) -> Result<ReservationRecord> {
        sqlx::query(
            r#"
            INSERT INTO reservations
                (reservation_id, request_id, state, settlement_reference,
                 release_reason, created_at, resolved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (request_id) DO NOTHING
            "#,
        )
        .bind(record.reservation_id)
        .bind(record.request_id)
        .bind(record.state.as_str())
        .bind(&record.settlement_reference)
        .bind(&record.release_reason)
        .bind(record.created_at)
        .bind(record.resolved_at)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            r#"
            SELECT reservation_id, request_id, state, settlement_reference,
                   release_reason, created_at, resolved_at
            FROM reservations WHERE request_id = $1
            "#,
        )
        .bind(record.request_id)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_reservation(&row)
    }

    async fn update_reservation(
        &self,
        reservation_id: Uuid,
        state: ReservationState,
        settlement_reference: Option<String>,
        release_reason: Option<String>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET state = $2,
                settlement_reference = $3,
                release_reason = $4,
                resolved_at = NOW()
            WHERE reservation_id = $1
            "#,
        )
        .bind(reservation_id)
        .bind(state.as_str())
        .bind(&settlement_reference)
        .bind(&release_reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TreasurerError::ReservationNotFound(
                reservation_id.to_string(),
            ));
        }
        Ok(())
    }

    async fn get_reservation(&self, request_id: Uuid) -> Result<Option<ReservationRecord>> {
        let row = sqlx::query(
            r#"
            SELECT reservation_id, request_id, state, settlement_reference,
                   release_reason, created_at, resolved_at
            FROM reservations WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::row_to_reservation(&r)).transpose()
    }
}

#[async_trait]
impl ApprovalStore for PostgresStore {
    #[instrument(skip(self, ticket), fields(ticket_id = %ticket.ticket_id))]
    async fn enqueue(&self, ticket: ApprovalTicket) -> Result<Uuid> {
        sqlx::query(
            r#"
            INSERT INTO approval_tickets
                (ticket_id, request_id, requester_id, vendor_identifier, amount,
                 currency, reason, status, created_at, resolved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(ticket.ticket_id)
        .bind(ticket.request.request_id)
        .bind(&ticket.request.requester_id)
        .bind(&ticket.request.vendor_identifier)
        .bind(ticket.request.amount)
        .bind(&ticket.request.currency)
        .bind(&ticket.reason)
        .bind(ticket.status.as_str())
        .bind(ticket.created_at)
        .bind(ticket.resolved_at)
        .execute(&self.pool)
        .await?;

        Ok(ticket.ticket_id)
    }

    async fn list_pending(&self) -> Result<Vec<ApprovalTicket>> {
        let rows = sqlx::query(
            r#"
            SELECT ticket_id, request_id, requester_id, vendor_identifier, amount,
                   currency, reason, status, created_at, resolved_at
            FROM approval_tickets
            WHERE status = 'PENDING'
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_ticket).collect()
    }

    async fn get(&self, ticket_id: Uuid) -> Result<Option<ApprovalTicket>> {
        let row = sqlx::query(
            r#"
            SELECT ticket_id, request_id, requester_id, vendor_identifier, amount,
                   currency, reason, status, created_at, resolved_at
            FROM approval_tickets WHERE ticket_id = $1
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::row_to_ticket(&r)).transpose()
    }

    async fn resolve(&self, ticket_id: Uuid, decision: ApprovalDecision) -> Result<ApprovalTicket> {
        let status = decision.status();
        let row = sqlx::query(
            r#"
            UPDATE approval_tickets
            SET status = $2, resolved_at = NOW()
            WHERE ticket_id = $1 AND status = 'PENDING'
            RETURNING ticket_id, request_id, requester_id, vendor_identifier, amount,
                      currency, reason, status, created_at, resolved_at
            "#,
        )
        .bind(ticket_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Self::row_to_ticket(&r),
            None => match ApprovalStore::get(self, ticket_id).await? {
                Some(existing) => Err(TreasurerError::Validation(format!(
                    "ticket {} already {}",
                    ticket_id, existing.status
                ))),
                None => Err(TreasurerError::TicketNotFound(ticket_id.to_string())),
            },
        }
    }
}
