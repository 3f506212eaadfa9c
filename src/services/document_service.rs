// src/services/document_service.rs

use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use genpdf::{elements, style, Element};
use image::Luma;
use qrcode::QrCode;

use crate::{
    common::{
        error::AppError,
        formatting::{format_brl, format_date, format_phone_display},
    },
    models::{
        order::Order,
        print::{LabeledValue, PrintDocument, ServiceGroup, SignatureBlock, StudioInfo},
    },
};

const EMPTY: &str = "—";

#[derive(Clone)]
pub struct DocumentService {
    studio: StudioInfo,
    fonts_dir: PathBuf,
    font_name: String,
}

impl DocumentService {
    pub fn new(studio: StudioInfo, fonts_dir: impl Into<PathBuf>) -> Self {
        Self {
            studio,
            fonts_dir: fonts_dir.into(),
            font_name: "Roboto".to_string(),
        }
    }

    pub fn studio(&self) -> &StudioInfo {
        &self.studio
    }

    pub fn compose(&self, order: &Order) -> PrintDocument {
        render_print_document(order, &self.studio, Local::now().naive_local())
    }

    /// Renderiza o documento em PDF (bytes em memória).
    pub fn render_pdf(&self, document: &PrintDocument) -> Result<Vec<u8>, AppError> {
        // Carrega a fonte da pasta configurada
        let font_family = genpdf::fonts::from_files(&self.fonts_dir, &self.font_name, None)
            .map_err(|_| AppError::FontNotFound(self.fonts_dir.display().to_string()))?;

        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(document.title.clone());
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(10);
        doc.set_page_decorator(decorator);

        let pdf_err = |e: genpdf::error::Error| AppError::InternalServerError(anyhow::Error::msg(e.to_string()));
        let bold = style::Style::new().bold();

        // --- CABEÇALHO ---
        if !document.studio.name.is_empty() {
            doc.push(elements::Paragraph::new(document.studio.name.clone())
                .styled(style::Style::new().bold().with_font_size(16)));
        }
        doc.push(elements::Paragraph::new(document.title.clone())
            .styled(style::Style::new().bold().with_font_size(18)));

        let studio_lines = [
            document.studio.address.clone(),
            document.studio.contact_line(),
            document.studio.phone.clone(),
            document.studio.cnpj.as_ref().map(|c| format!("CNPJ: {}", c)),
        ];
        for line in studio_lines.into_iter().flatten() {
            doc.push(elements::Paragraph::new(line).styled(style::Style::new().with_font_size(9)));
        }
        doc.push(elements::Paragraph::new(document.generated_at.clone()).styled(bold));
        doc.push(elements::Paragraph::new(format!("Status: {}", document.status_label)).styled(bold));
        doc.push(elements::Break::new(1.5));

        // --- IDENTIFICAÇÃO E FINANCEIRO ---
        for (title, rows) in [("IDENTIFICAÇÃO", &document.identification), ("FINANCEIRO", &document.financial)] {
            doc.push(elements::Paragraph::new(title).styled(style::Style::new().bold().with_font_size(12)));
            let mut table = elements::TableLayout::new(vec![1, 3]);
            table.set_cell_decorator(elements::FrameCellDecorator::new(false, false, false));
            for kv in rows.iter() {
                table
                    .row()
                    .element(elements::Paragraph::new(format!("{}:", kv.label)).styled(bold))
                    .element(elements::Paragraph::new(kv.value.clone()))
                    .push()
                    .map_err(pdf_err)?;
            }
            doc.push(table);
            doc.push(elements::Break::new(1));
        }

        // --- SERVIÇOS ---
        doc.push(elements::Paragraph::new("SERVIÇOS").styled(style::Style::new().bold().with_font_size(12)));
        if document.services.is_empty() {
            doc.push(elements::Paragraph::new(EMPTY));
        }
        for group in &document.services {
            doc.push(elements::Paragraph::new(group.title.to_uppercase()).styled(bold));
            let mut list = elements::UnorderedList::new();
            for item in &group.items {
                list.push(elements::Paragraph::new(item.clone()));
            }
            doc.push(list);
        }
        doc.push(elements::Break::new(1));

        // --- DESCRIÇÃO ---
        doc.push(elements::Paragraph::new("DESCRIÇÃO DETALHADA")
            .styled(style::Style::new().bold().with_font_size(12)));
        for line in document.description.lines() {
            doc.push(elements::Paragraph::new(line.to_string()));
        }
        doc.push(elements::Break::new(1.5));

        // --- PAGAMENTO VIA PIX (QR CODE) ---
        if let Some(key) = &document.studio.pix_key {
            doc.push(elements::Paragraph::new("PAGAMENTO VIA PIX")
                .styled(style::Style::new().bold().with_font_size(12)));
            doc.push(elements::Paragraph::new(format!("Chave: {}", key)));

            // QR Code simples com o texto da chave
            let code = QrCode::new(key.as_bytes())
                .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?;
            let image_buffer = code.render::<Luma<u8>>().build();
            let dynamic_image = image::DynamicImage::ImageLuma8(image_buffer);
            let pdf_image = elements::Image::from_dynamic_image(dynamic_image)
                .map_err(pdf_err)?
                .with_scale(genpdf::Scale::new(0.5, 0.5));
            doc.push(pdf_image);
            doc.push(elements::Break::new(1));
        }

        // --- ASSINATURAS ---
        doc.push(elements::Break::new(2));
        let mut signatures = elements::TableLayout::new(vec![1, 1]);
        signatures.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));
        let mut row = signatures.row();
        for block in &document.signatures {
            let mut cell = elements::LinearLayout::vertical();
            cell.push(elements::Paragraph::new(block.label.to_uppercase()).styled(style::Style::new().with_font_size(8)));
            cell.push(elements::Break::new(2));
            cell.push(elements::Paragraph::new("_______________________________"));
            let mut name = elements::Paragraph::new(block.name.clone());
            name.set_alignment(genpdf::Alignment::Center);
            cell.push(name.styled(bold));
            row = row.element(cell.padded(2));
        }
        row.push().map_err(pdf_err)?;
        doc.push(signatures);

        // --- RODAPÉ ---
        doc.push(elements::Break::new(1));
        for line in &document.footer {
            let mut paragraph = elements::Paragraph::new(line.clone());
            paragraph.set_alignment(genpdf::Alignment::Right);
            doc.push(paragraph.styled(style::Style::new().italic().with_font_size(8)));
        }

        // Renderiza para Buffer (Memória)
        let mut buffer = Vec::new();
        doc.render(&mut buffer).map_err(pdf_err)?;
        Ok(buffer)
    }
}

// =========================================================================
//  MAPEAMENTO PURO: OS -> DOCUMENTO IMPRIMÍVEL
// =========================================================================

/// Agrupa "Categoria: item" em Pré-produção / Produção / Pós-produção / Outros.
/// Grupos vazios não aparecem.
pub fn group_services(services: &[String]) -> Vec<ServiceGroup> {
    let mut pre = Vec::new();
    let mut prod = Vec::new();
    let mut pos = Vec::new();
    let mut others = Vec::new();

    for service in services {
        let (prefix_raw, rest) = service.split_once(':').unwrap_or((service.as_str(), ""));
        let prefix = prefix_raw.trim().to_lowercase();
        let item = match rest.trim() {
            "" => prefix_raw.trim().to_string(),
            item => item.to_string(),
        };

        if prefix.starts_with("pré-produção") {
            pre.push(item);
        } else if prefix.starts_with("produção") {
            prod.push(item);
        } else if prefix.starts_with("pós-produção") {
            pos.push(item);
        } else {
            others.push(service.clone());
        }
    }

    [("Pré-produção", pre), ("Produção", prod), ("Pós-produção", pos), ("Outros", others)]
        .into_iter()
        .filter(|(_, items)| !items.is_empty())
        .map(|(title, items)| ServiceGroup {
            title: title.to_string(),
            items,
        })
        .collect()
}

fn or_empty(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => EMPTY.to_string(),
    }
}

fn kv(label: &str, value: String) -> LabeledValue {
    LabeledValue {
        label: label.to_string(),
        value,
    }
}

pub fn render_print_document(order: &Order, studio: &StudioInfo, generated_at: NaiveDateTime) -> PrintDocument {
    let client = &order.client;

    let execution = [
        order.execution_date.map(format_date),
        order.execution_time.clone().filter(|t| !t.trim().is_empty()),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");

    let identification = vec![
        kv("Cliente", client.name.clone()),
        kv("E-mail", client.email.clone()),
        kv("Telefone", format_phone_display(&client.phone)),
        kv("Data OS", order.date.map(format_date).unwrap_or_default()),
        kv("Execução", execution),
        kv("Tempo Est.", or_empty(order.estimated_time.as_deref())),
        kv("Responsável", or_empty(Some(&order.technical_responsible))),
    ];

    let payments = if order.payment_methods.is_empty() {
        EMPTY.to_string()
    } else {
        order.payment_methods.join(", ")
    };
    let financial = vec![
        kv("Valor", format_brl(order.total_value)),
        kv("Pagamentos", payments),
        kv("Data Pagto", order.payment_date.map(format_date).unwrap_or_else(|| EMPTY.to_string())),
    ];

    let description = if order.description.trim().is_empty() {
        "Sem descrição fornecida.".to_string()
    } else {
        order.description.clone()
    };

    let printed_on = format_date(generated_at.date());

    PrintDocument {
        title: format!("Ordem de Serviço #{}", order.number),
        studio: studio.clone(),
        generated_at: format!("Gerada em {} às {}", printed_on, generated_at.format("%H:%M")),
        status: order.status,
        status_label: order.status.label().to_string(),
        identification,
        financial,
        services: group_services(&order.services),
        description,
        signatures: vec![
            SignatureBlock {
                label: "Cliente".to_string(),
                name: client.name.clone(),
            },
            SignatureBlock {
                label: "Responsável Técnico".to_string(),
                name: or_empty(Some(&order.technical_responsible)),
            },
        ],
        footer: vec![format!("Impresso em {}", printed_on), "Sistema OSManager".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::order::{ClientSnapshot, OrderEvent, OrderStatus};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn sample_order() -> Order {
        Order {
            id: "o1".into(),
            number: "007/2025".into(),
            order_number: 7,
            year: 2025,
            date: NaiveDate::from_ymd_opt(2025, 3, 10),
            client: ClientSnapshot {
                id: "c1".into(),
                name: "Ana Paula".into(),
                email: "ana@email.com".into(),
                phone: "11999990000".into(),
                address: "Rua A, 10".into(),
                cpf: None,
            },
            services: vec![
                "Pré-produção: Roteiro".into(),
                "Produção: Gravação de voz".into(),
                "Pós-produção: Mixagem: stems".into(),
                "Aluguel de sala".into(),
            ],
            description: String::new(),
            execution_date: NaiveDate::from_ymd_opt(2025, 3, 12),
            execution_time: Some("14:00".into()),
            estimated_time: None,
            technical_responsible: "Tassio".into(),
            total_value: Decimal::new(150000, 2),
            payment_methods: vec!["PIX".into(), "Cartão".into()],
            payment_date: None,
            status: OrderStatus::Completed,
            last_event: OrderEvent::Completed,
            created_at: None,
            completed_at: None,
            reopened_at: None,
        }
    }

    fn generated_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 11)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn services_are_grouped_by_prefix() {
        let groups = group_services(&sample_order().services);
        let titles: Vec<&str> = groups.iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, vec!["Pré-produção", "Produção", "Pós-produção", "Outros"]);
        assert_eq!(groups[0].items, vec!["Roteiro"]);
        assert_eq!(groups[2].items, vec!["Mixagem: stems"]);
        assert_eq!(groups[3].items, vec!["Aluguel de sala"]);
    }

    #[test]
    fn empty_groups_are_left_out() {
        let groups = group_services(&["Produção: Ensaio".to_string()]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].title, "Produção");
    }

    #[test]
    fn print_document_carries_every_block() {
        let doc = render_print_document(&sample_order(), &StudioInfo::default(), generated_at());

        assert_eq!(doc.title, "Ordem de Serviço #007/2025");
        assert_eq!(doc.generated_at, "Gerada em 11/03/2025 às 09:30");
        assert_eq!(doc.status_label, "Concluída");
        assert_eq!(doc.field("Telefone"), Some("(11) 99999-0000"));
        assert_eq!(doc.field("Data OS"), Some("10/03/2025"));
        assert_eq!(doc.field("Execução"), Some("12/03/2025 14:00"));
        assert_eq!(doc.field("Tempo Est."), Some("—"));
        assert_eq!(doc.field("Valor"), Some("R$ 1.500,00"));
        assert_eq!(doc.field("Pagamentos"), Some("PIX, Cartão"));
        assert_eq!(doc.field("Data Pagto"), Some("—"));
        assert_eq!(doc.description, "Sem descrição fornecida.");
        assert_eq!(doc.signatures[0].name, "Ana Paula");
        assert_eq!(doc.signatures[1].label, "Responsável Técnico");
        assert_eq!(doc.signatures[1].name, "Tassio");
    }

    #[test]
    fn missing_fonts_are_reported() {
        let service = DocumentService::new(StudioInfo::default(), "./pasta-inexistente");
        let doc = service.compose(&sample_order());
        let err = service.render_pdf(&doc).unwrap_err();
        assert!(matches!(err, AppError::FontNotFound(_)));
    }
}
