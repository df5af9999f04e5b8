// src/services/facture_pdf.rs

use std::path::Path;

use genpdf::{elements, style, Alignment, Element};

use crate::{
    common::error::AppError,
    models::{
        client::Client,
        finance::{Facture, Payment},
        settings::AppSettings,
    },
};

const FONT_FAMILY: &str = "Roboto";

fn pdf_error(e: genpdf::error::Error) -> AppError {
    AppError::PdfError(e.to_string())
}

/// Monta o PDF da fatura em memória. Bloqueante: chamar via `spawn_blocking`.
pub fn render(
    fonts_dir: &Path,
    facture: &Facture,
    client: &Client,
    settings: &AppSettings,
    payments: &[Payment],
) -> Result<Vec<u8>, AppError> {
    let font_family = genpdf::fonts::from_files(fonts_dir, FONT_FAMILY, None).map_err(|_| {
        AppError::PdfError(format!("Fonte {FONT_FAMILY} não encontrada em {}", fonts_dir.display()))
    })?;

    let mut doc = genpdf::Document::new(font_family);
    doc.set_title(format!("Facture {}", facture.numero_facture));
    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(10);
    doc.set_page_decorator(decorator);

    // --- CABEÇALHO (configurações) ---
    let company = settings.company_name.clone().unwrap_or_else(|| "Back-office".to_string());
    doc.push(elements::Paragraph::new(company).styled(style::Style::new().bold().with_font_size(18)));
    for line in [&settings.address, &settings.phone, &settings.email].into_iter().flatten() {
        doc.push(elements::Paragraph::new(line.as_str()).styled(style::Style::new().with_font_size(10)));
    }

    doc.push(elements::Break::new(1.5));

    doc.push(
        elements::Paragraph::new(format!("FACTURE {}", facture.numero_facture))
            .styled(style::Style::new().bold().with_font_size(14)),
    );
    doc.push(elements::Paragraph::new(format!(
        "Date : {}",
        facture.date_facture.format("%d/%m/%Y")
    )));
    if let Some(due) = facture.date_echeance {
        doc.push(elements::Paragraph::new(format!("Échéance : {}", due.format("%d/%m/%Y"))));
    }
    doc.push(elements::Paragraph::new(format!("Client : {} ({})", client.nom, client.numero)));
    doc.push(elements::Paragraph::new(format!("Service : {}", client.service)));

    doc.push(elements::Break::new(2));

    // --- PAGAMENTOS ---
    if !payments.is_empty() {
        let mut table = elements::TableLayout::new(vec![2, 2, 2]);
        table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));

        let bold = style::Style::new().bold();
        table
            .row()
            .element(elements::Paragraph::new("Date").styled(bold))
            .element(elements::Paragraph::new("Mode").styled(bold))
            .element(elements::Paragraph::new("Montant").styled(bold))
            .push()
            .map_err(pdf_error)?;

        for payment in payments {
            table
                .row()
                .element(elements::Paragraph::new(payment.paid_at.format("%d/%m/%Y").to_string()))
                .element(elements::Paragraph::new(payment.method.clone().unwrap_or_default()))
                .element(elements::Paragraph::new(format!("{:.2}", payment.montant)))
                .push()
                .map_err(pdf_error)?;
        }

        doc.push(table);
        doc.push(elements::Break::new(2));
    }

    // --- TOTAIS ---
    for (label, value, bold) in [
        ("Total", facture.montant_total, false),
        ("Payé", facture.montant_paye, false),
        ("Reste à payer", facture.montant_restant, true),
    ] {
        let mut paragraph = elements::Paragraph::new(format!("{label} : {value:.2}"));
        paragraph.set_alignment(Alignment::Right);
        let text_style = if bold {
            style::Style::new().bold().with_font_size(12)
        } else {
            style::Style::new()
        };
        doc.push(paragraph.styled(text_style));
    }

    // --- RODAPÉ ---
    if let Some(footer) = &settings.invoice_footer {
        doc.push(elements::Break::new(2));
        doc.push(elements::Paragraph::new(footer.as_str()).styled(style::Style::new().italic().with_font_size(8)));
    }

    let mut buffer = Vec::new();
    doc.render(&mut buffer).map_err(pdf_error)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn missing_fonts_are_a_pdf_error() {
        let facture_client = testing::client("Youssef El Amrani", None);
        let facture = Facture {
            id: uuid::Uuid::new_v4(),
            client_id: facture_client.id,
            session_id: uuid::Uuid::new_v4(),
            numero_facture: "FAC-2026-00001".into(),
            montant_total: rust_decimal::Decimal::from(100),
            montant_paye: rust_decimal::Decimal::ZERO,
            montant_restant: rust_decimal::Decimal::from(100),
            status: Default::default(),
            date_facture: chrono::Utc::now().date_naive(),
            date_echeance: None,
            created_at: chrono::Utc::now(),
        };

        let fonts = tempfile::TempDir::new().unwrap();
        let err = render(fonts.path(), &facture, &facture_client, &AppSettings::default(), &[]).unwrap_err();
        assert!(matches!(err, AppError::PdfError(_)));
        assert_eq!(err.kind(), "InternalError");
    }
}
