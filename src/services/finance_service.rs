// src/services/finance_service.rs

use std::{path::PathBuf, sync::Arc};

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        response::{Page, Pagination},
    },
    db::{ClientRepository, FinanceRepository, SessionRepository, SettingsRepository},
    models::finance::{
        CreateFacturePayload, Facture, FactureFilters, NewFacture, Payment, PaymentReceipt,
        RecordPaymentPayload,
    },
    services::facture_pdf,
};

/// Teto das colunas NUMERIC(14,2).
const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

// Positivo, no máximo centavos e abaixo do teto da coluna
fn check_amount(field: &str, amount: Decimal) -> Result<(), AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::field(field, "must_be_positive"));
    }
    if amount.normalize().scale() > 2 {
        return Err(AppError::field(field, "too_many_decimals"));
    }
    if amount >= MAX_AMOUNT {
        return Err(AppError::field(field, "too_large"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct FinanceService {
    repo: Arc<dyn FinanceRepository>,
    client_repo: Arc<dyn ClientRepository>,
    session_repo: Arc<dyn SessionRepository>,
    settings_repo: Arc<dyn SettingsRepository>,
    fonts_dir: PathBuf,
}

impl FinanceService {
    pub fn new(
        repo: Arc<dyn FinanceRepository>,
        client_repo: Arc<dyn ClientRepository>,
        session_repo: Arc<dyn SessionRepository>,
        settings_repo: Arc<dyn SettingsRepository>,
        fonts_dir: PathBuf,
    ) -> Self {
        Self {
            repo,
            client_repo,
            session_repo,
            settings_repo,
            fonts_dir,
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Cria a fatura de uma sessão do cliente. O número sai da sequência do banco.
    pub async fn create(&self, payload: &CreateFacturePayload) -> Result<Facture, AppError> {
        let date_facture = payload.date_facture.unwrap_or_else(Self::today);

        check_amount("montantTotal", payload.montant_total)?;
        if payload.date_echeance.is_some_and(|due| due < date_facture) {
            return Err(AppError::field("dateEcheance", "before_invoice_date"));
        }

        self.client_repo
            .find_by_id(payload.client_id)
            .await?
            .ok_or(AppError::NotFound("client"))?;
        let session = self
            .session_repo
            .find_by_id(payload.session_id)
            .await?
            .ok_or(AppError::NotFound("session"))?;
        if session.client_id != payload.client_id {
            return Err(AppError::field("sessionId", "session_client_mismatch"));
        }

        let facture = self
            .repo
            .create(NewFacture {
                client_id: payload.client_id,
                session_id: payload.session_id,
                montant_total: payload.montant_total,
                date_facture,
                date_echeance: payload.date_echeance,
            })
            .await?;

        tracing::info!(numero = %facture.numero_facture, client_id = %facture.client_id, "Fatura criada");
        Ok(facture.refresh(Self::today()))
    }

    pub async fn list(&self, filters: &FactureFilters) -> Result<Page<Facture>, AppError> {
        let today = Self::today();
        let pagination = Pagination::new(filters.page, filters.rows_per_page);
        let mut page = self.repo.list(filters, pagination, today).await?;
        page.items = page.items.into_iter().map(|f| f.refresh(today)).collect();
        Ok(page)
    }

    pub async fn get(&self, id: Uuid) -> Result<Facture, AppError> {
        self.repo
            .find_by_id(id)
            .await?
            .map(|f| f.refresh(Self::today()))
            .ok_or(AppError::NotFound("facture"))
    }

    pub async fn list_payments(&self, facture_id: Uuid) -> Result<Vec<Payment>, AppError> {
        self.get(facture_id).await?;
        self.repo.list_payments(facture_id).await
    }

    /// Registra um pagamento sem nunca passar do saldo (checado na própria escrita).
    pub async fn record_payment(
        &self,
        facture_id: Uuid,
        payload: &RecordPaymentPayload,
    ) -> Result<PaymentReceipt, AppError> {
        check_amount("montant", payload.montant)?;

        let receipt = self
            .repo
            .record_payment(facture_id, payload.montant, payload.method.as_deref())
            .await?;

        match receipt {
            Some(mut receipt) => {
                receipt.facture = receipt.facture.refresh(Self::today());
                tracing::info!(%facture_id, montant = %payload.montant, "Pagamento registrado");
                Ok(receipt)
            }
            None => match self.repo.find_by_id(facture_id).await? {
                Some(_) => {
                    tracing::warn!(%facture_id, montant = %payload.montant, "Pagamento acima do saldo");
                    Err(AppError::PaymentExceedsBalance)
                }
                None => Err(AppError::NotFound("facture")),
            },
        }
    }

    /// PDF da fatura, com o cabeçalho/rodapé das configurações.
    pub async fn render_pdf(&self, id: Uuid) -> Result<(String, Vec<u8>), AppError> {
        let facture = self.get(id).await?;
        let (client, settings, payments) = tokio::try_join!(
            self.client_repo.find_by_id(facture.client_id),
            self.settings_repo.get(),
            self.repo.list_payments(id),
        )?;
        let client = client.ok_or(AppError::NotFound("client"))?;

        let file_name = format!("{}.pdf", facture.numero_facture);
        let fonts_dir = self.fonts_dir.clone();

        // genpdf lê as fontes do disco e renderiza de forma síncrona
        let bytes = tokio::task::spawn_blocking(move || {
            facture_pdf::render(&fonts_dir, &facture, &client, &settings, &payments)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de geração do PDF: {}", e))??;

        Ok((file_name, bytes))
    }
}
