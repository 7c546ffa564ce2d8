use crate::{
    entities::document_counter::{self, DocumentType, Entity as DocumentCounter},
    errors::ServiceError,
};
use chrono::NaiveDate;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use uuid::Uuid;

/// Sequential document numbers drawn from a per-tenant, per-type, per-day
/// counter row. The counter is read and bumped inside the caller's
/// transaction, so two concurrent creations cannot mint the same number.
pub struct DocumentNumbering;

impl DocumentNumbering {
    /// Returns the next formatted number for `doc_type`, e.g.
    /// `INV-20250101-0001` or `PO-20250101-00001`.
    pub async fn next<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        doc_type: DocumentType,
        date: NaiveDate,
    ) -> Result<String, ServiceError> {
        let period = date.format("%Y%m%d").to_string();

        let existing = DocumentCounter::find_by_id((
            tenant_id,
            doc_type.to_string(),
            period.clone(),
        ))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;

        let sequence = match existing {
            Some(counter) => {
                let next = counter.last_value + 1;
                let mut update: document_counter::ActiveModel = counter.into();
                update.last_value = Set(next);
                update.update(conn).await.map_err(ServiceError::db_error)?;
                next
            }
            None => {
                document_counter::ActiveModel {
                    tenant_id: Set(tenant_id),
                    doc_type: Set(doc_type.to_string()),
                    period: Set(period.clone()),
                    last_value: Set(1),
                }
                .insert(conn)
                .await
                .map_err(ServiceError::db_error)?;
                1
            }
        };

        Ok(format!(
            "{}-{}-{:0width$}",
            prefix(doc_type),
            period,
            sequence,
            width = pad_width(doc_type)
        ))
    }
}

fn prefix(doc_type: DocumentType) -> &'static str {
    match doc_type {
        DocumentType::Invoice => "INV",
        DocumentType::PurchaseOrder => "PO",
        DocumentType::StockOpname => "SO",
    }
}

fn pad_width(doc_type: DocumentType) -> usize {
    match doc_type {
        DocumentType::Invoice => 4,
        DocumentType::PurchaseOrder | DocumentType::StockOpname => 5,
    }
}
