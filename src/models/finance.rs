// src/models/finance.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// --- Enums ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FactureStatus {
    #[default]
    Pending, // Nada pago
    Partial, // Pago parcialmente
    Paid,    // Quitado
    Overdue, // Vencido com saldo
}

impl FactureStatus {
    /// Status é sempre função dos montantes e do vencimento; nunca é gravado.
    pub fn derive(
        montant_total: Decimal,
        montant_paye: Decimal,
        date_echeance: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Self {
        let restant = montant_total - montant_paye;
        if restant <= Decimal::ZERO {
            FactureStatus::Paid
        } else if date_echeance.is_some_and(|due| due < today) {
            FactureStatus::Overdue
        } else if montant_paye > Decimal::ZERO {
            FactureStatus::Partial
        } else {
            FactureStatus::Pending
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FactureStatus::Pending => "pending",
            FactureStatus::Partial => "partial",
            FactureStatus::Paid => "paid",
            FactureStatus::Overdue => "overdue",
        }
    }
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Facture {
    pub id: Uuid,
    pub client_id: Uuid,
    pub session_id: Uuid,

    #[schema(example = "FAC-2026-00042")]
    pub numero_facture: String,

    #[schema(example = "10000.00")]
    pub montant_total: Decimal,
    #[schema(example = "4000.00")]
    pub montant_paye: Decimal,

    // Derivados (preenchidos por `refresh`)
    #[sqlx(skip)]
    #[schema(example = "6000.00")]
    pub montant_restant: Decimal,
    #[sqlx(skip)]
    pub status: FactureStatus,

    #[schema(value_type = String, format = Date, example = "2026-10-01")]
    pub date_facture: NaiveDate,
    #[schema(value_type = Option<String>, format = Date, example = "2026-10-31")]
    pub date_echeance: Option<NaiveDate>,

    pub created_at: DateTime<Utc>,
}

impl Facture {
    pub fn refresh(mut self, today: NaiveDate) -> Self {
        self.montant_restant = self.montant_total - self.montant_paye;
        self.status = FactureStatus::derive(
            self.montant_total,
            self.montant_paye,
            self.date_echeance,
            today,
        );
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub facture_id: Uuid,
    #[schema(example = "1500.00")]
    pub montant: Decimal,
    #[schema(example = "virement")]
    pub method: Option<String>,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub facture: Facture,
}

// --- PAYLOADS ---

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFacturePayload {
    pub client_id: Uuid,
    pub session_id: Uuid,
    #[schema(example = "10000.00")]
    pub montant_total: Decimal,
    #[schema(value_type = Option<String>, format = Date)]
    pub date_facture: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = Date)]
    pub date_echeance: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentPayload {
    #[schema(example = "4000.00")]
    pub montant: Decimal,
    pub method: Option<String>,
}

/// Registro pronto para inserção (número gerado pelo repositório).
#[derive(Debug, Clone)]
pub struct NewFacture {
    pub client_id: Uuid,
    pub session_id: Uuid,
    pub montant_total: Decimal,
    pub date_facture: NaiveDate,
    pub date_echeance: Option<NaiveDate>,
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct FactureFilters {
    pub page: Option<u32>,
    pub rows_per_page: Option<u32>,
    /// Número da fatura
    pub search: Option<String>,
    pub client_id: Option<Uuid>,
    pub status: Option<FactureStatus>,
}
