// src/db/finance_repo.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        response::{search_pattern, Page, Pagination},
    },
    models::finance::{Facture, FactureFilters, NewFacture, Payment, PaymentReceipt},
};

/// Faturas e pagamentos. Os campos derivados (`montantRestant`, `status`)
/// são preenchidos pelo serviço com `Facture::refresh`.
#[async_trait]
pub trait FinanceRepository: Send + Sync {
    async fn list(
        &self,
        filters: &FactureFilters,
        pagination: Pagination,
        today: NaiveDate,
    ) -> Result<Page<Facture>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Facture>, AppError>;
    /// Insere com número `FAC-YYYY-NNNNN`, sequencial dentro do ano da fatura.
    async fn create(&self, input: NewFacture) -> Result<Facture, AppError>;
    /// Soma o pagamento somente se couber no saldo; `None` se a fatura não
    /// existe ou o valor excede o restante.
    async fn record_payment(
        &self,
        facture_id: Uuid,
        montant: Decimal,
        method: Option<&str>,
    ) -> Result<Option<PaymentReceipt>, AppError>;
    async fn list_payments(&self, facture_id: Uuid) -> Result<Vec<Payment>, AppError>;
}

const FACTURE_COLUMNS: &str = "id, client_id, session_id, numero_facture, montant_total, montant_paye, date_facture, date_echeance, created_at";

// Mesma regra de FactureStatus::derive, para filtrar no banco
const FILTER_FACTURES: &str = r#"
    WHERE ($1::text IS NULL OR numero_facture ILIKE $1 ESCAPE '\')
      AND ($2::uuid IS NULL OR client_id = $2)
      AND ($3::text IS NULL OR
           CASE
               WHEN montant_total - montant_paye <= 0 THEN 'paid'
               WHEN date_echeance IS NOT NULL AND date_echeance < $4 THEN 'overdue'
               WHEN montant_paye > 0 THEN 'partial'
               ELSE 'pending'
           END = $3)
"#;

#[derive(Clone)]
pub struct PgFinanceRepository {
    pool: PgPool,
}

impl PgFinanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FinanceRepository for PgFinanceRepository {
    async fn list(
        &self,
        filters: &FactureFilters,
        pagination: Pagination,
        today: NaiveDate,
    ) -> Result<Page<Facture>, AppError> {
        let search = search_pattern(filters.search.as_deref());
        let status = filters.status.map(|s| s.as_str());

        let sql = format!(
            "SELECT {FACTURE_COLUMNS} FROM factures {FILTER_FACTURES} ORDER BY date_facture DESC, numero_facture DESC LIMIT $5 OFFSET $6"
        );
        let items = sqlx::query_as::<_, Facture>(&sql)
            .bind(&search)
            .bind(filters.client_id)
            .bind(status)
            .bind(today)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM factures {FILTER_FACTURES}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&search)
            .bind(filters.client_id)
            .bind(status)
            .bind(today)
            .fetch_one(&self.pool)
            .await?;

        Ok(Page::new(items, total, pagination))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Facture>, AppError> {
        let sql = format!("SELECT {FACTURE_COLUMNS} FROM factures WHERE id = $1");
        let facture = sqlx::query_as::<_, Facture>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(facture)
    }

    async fn create(&self, input: NewFacture) -> Result<Facture, AppError> {
        let sql = format!(
            r#"
            WITH counter AS (
                INSERT INTO facture_counters (year, last_value)
                VALUES (EXTRACT(YEAR FROM $4::date)::int, 1)
                ON CONFLICT (year) DO UPDATE SET last_value = facture_counters.last_value + 1
                RETURNING year, last_value
            )
            INSERT INTO factures (client_id, session_id, numero_facture, montant_total, date_facture, date_echeance)
            SELECT $1, $2,
                   'FAC-' || counter.year || '-' || lpad(counter.last_value::text, 5, '0'),
                   $3, $4, $5
            FROM counter
            RETURNING {FACTURE_COLUMNS}
            "#
        );
        let facture = sqlx::query_as::<_, Facture>(&sql)
            .bind(input.client_id)
            .bind(input.session_id)
            .bind(input.montant_total)
            .bind(input.date_facture)
            .bind(input.date_echeance)
            .fetch_one(&self.pool)
            .await?;
        Ok(facture)
    }

    async fn record_payment(
        &self,
        facture_id: Uuid,
        montant: Decimal,
        method: Option<&str>,
    ) -> Result<Option<PaymentReceipt>, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. Atualização condicional: o saldo nunca fica negativo
        let sql = format!(
            r#"
            UPDATE factures
            SET montant_paye = montant_paye + $2
            WHERE id = $1 AND montant_paye + $2 <= montant_total
            RETURNING {FACTURE_COLUMNS}
            "#
        );
        let facture = sqlx::query_as::<_, Facture>(&sql)
            .bind(facture_id)
            .bind(montant)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(facture) = facture else {
            tx.rollback().await?;
            return Ok(None);
        };

        // 2. Registro do pagamento
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (facture_id, montant, method)
            VALUES ($1, $2, $3)
            RETURNING id, facture_id, montant, method, paid_at
            "#,
        )
        .bind(facture_id)
        .bind(montant)
        .bind(method)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(PaymentReceipt { payment, facture }))
    }

    async fn list_payments(&self, facture_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT id, facture_id, montant, method, paid_at FROM payments WHERE facture_id = $1 ORDER BY paid_at",
        )
        .bind(facture_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }
}
