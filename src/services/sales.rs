use crate::{
    db::DbPool,
    entities::{
        document_counter::DocumentType,
        product::{self, Entity as Product},
        sale::{self, Entity as Sale, PaymentMethod},
        sale_item,
        stock_movement::{MovementType, ReferenceType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        ledger::{LedgerApply, StockChange, StockLedger},
        numbering::DocumentNumbering,
    },
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionError, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SaleItemInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct CreateSaleInput {
    pub branch_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub items: Vec<SaleItemInput>,
    pub payment_method: PaymentMethod,
    pub discount_percent: Decimal,
    pub tax_percent: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub branch_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Matches against the invoice number.
    pub search: Option<String>,
    pub page: u64,
    pub per_page: u64,
}

/// A sale together with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: sale::Model,
    pub items: Vec<sale_item::Model>,
}

/// Point-of-sale transactions. Creation is the only path that decrements
/// stock for physical products, one ledger application per physical line.
pub struct SalesService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl SalesService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a sale as a single all-or-nothing transaction.
    ///
    /// Stock for every physical line is validated up front, so a shortfall
    /// on the last line leaves no sale row, no items, and no movements
    /// behind. Service lines never touch stock. Prices and product names
    /// are copied onto the items so later catalog edits do not rewrite
    /// historical receipts.
    pub async fn create_sale(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        input: CreateSaleInput,
    ) -> Result<SaleDetail, ServiceError> {
        validate_sale_input(&input)?;

        let detail = self
            .db_pool
            .transaction::<_, SaleDetail, ServiceError>(move |txn| {
                Box::pin(async move {
                    // Resolve products and check stock before writing anything.
                    let mut lines = Vec::with_capacity(input.items.len());
                    for item in &input.items {
                        let product = Product::find_by_id(item.product_id)
                            .filter(product::Column::TenantId.eq(tenant_id))
                            .one(txn)
                            .await
                            .map_err(ServiceError::db_error)?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "Product {} not found",
                                    item.product_id
                                ))
                            })?;

                        if !product.is_service() && product.stock < item.quantity {
                            return Err(ServiceError::InsufficientStock(format!(
                                "Insufficient stock for '{}'. Available: {}, requested: {}",
                                product.name, product.stock, item.quantity
                            )));
                        }

                        lines.push((product, item.clone()));
                    }

                    let subtotal: Decimal = lines
                        .iter()
                        .map(|(_, item)| item.quantity * item.unit_price)
                        .sum();
                    // Discount applies to the subtotal; tax applies to the
                    // post-discount base.
                    let discount_amount =
                        (subtotal * input.discount_percent / dec!(100)).round_dp(2);
                    let tax_amount =
                        ((subtotal - discount_amount) * input.tax_percent / dec!(100)).round_dp(2);
                    let total_amount = subtotal - discount_amount + tax_amount;

                    let now = Utc::now();
                    let invoice_number = DocumentNumbering::next(
                        txn,
                        tenant_id,
                        DocumentType::Invoice,
                        now.date_naive(),
                    )
                    .await?;

                    let sale = sale::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        tenant_id: Set(tenant_id),
                        branch_id: Set(input.branch_id),
                        invoice_number: Set(invoice_number),
                        customer_id: Set(input.customer_id),
                        vehicle_id: Set(input.vehicle_id),
                        sale_date: Set(now),
                        subtotal: Set(subtotal),
                        discount_amount: Set(discount_amount),
                        tax_amount: Set(tax_amount),
                        total_amount: Set(total_amount),
                        payment_status: Set("paid".to_string()),
                        payment_method: Set(input.payment_method.to_string()),
                        notes: Set(input.notes),
                        created_by: Set(user_id),
                        created_at: Set(now),
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    let mut items = Vec::with_capacity(lines.len());
                    for (product, line) in lines {
                        let item = sale_item::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            sale_id: Set(sale.id),
                            product_id: Set(product.id),
                            product_type: Set(product.product_type.clone()),
                            description: Set(product.name.clone()),
                            quantity: Set(line.quantity),
                            unit_price: Set(line.unit_price),
                            discount_amount: Set(Decimal::ZERO),
                            subtotal: Set(line.quantity * line.unit_price),
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                        items.push(item);

                        if !product.is_service() {
                            StockLedger::apply(
                                txn,
                                LedgerApply {
                                    tenant_id,
                                    branch_id: input.branch_id,
                                    product_id: product.id,
                                    change: StockChange::Delta(-line.quantity),
                                    movement_type: MovementType::Out,
                                    reference_type: ReferenceType::Sale,
                                    reference_id: Some(sale.id),
                                    reference_number: sale.invoice_number.clone(),
                                    unit_cost: None,
                                    notes: Some(format!("Sale: {}", sale.invoice_number)),
                                    created_by: user_id,
                                },
                            )
                            .await?;
                        }
                    }

                    Ok(SaleDetail { sale, items })
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        info!(
            "Sale created: {} total={}",
            detail.sale.invoice_number, detail.sale.total_amount
        );
        self.event_sender
            .send_or_log(Event::SaleCreated {
                sale_id: detail.sale.id,
                invoice_number: detail.sale.invoice_number.clone(),
                total_amount: detail.sale.total_amount,
            })
            .await;

        Ok(detail)
    }

    pub async fn get(&self, tenant_id: Uuid, sale_id: Uuid) -> Result<SaleDetail, ServiceError> {
        let db = self.db_pool.as_ref();
        let sale = find_sale(db, tenant_id, sale_id).await?;
        let items = sale_item::Entity::find()
            .filter(sale_item::Column::SaleId.eq(sale.id))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(SaleDetail { sale, items })
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        filter: SaleFilter,
    ) -> Result<(Vec<sale::Model>, u64), ServiceError> {
        let mut query = Sale::find()
            .filter(sale::Column::TenantId.eq(tenant_id))
            .order_by_desc(sale::Column::SaleDate);

        if let Some(branch_id) = filter.branch_id {
            query = query.filter(sale::Column::BranchId.eq(branch_id));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(sale::Column::CustomerId.eq(customer_id));
        }
        if let Some(start) = filter.start_date {
            let from = DateTime::<Utc>::from_naive_utc_and_offset(
                start.and_hms_opt(0, 0, 0).unwrap_or_default(),
                Utc,
            );
            query = query.filter(sale::Column::SaleDate.gte(from));
        }
        if let Some(end) = filter.end_date {
            let to = DateTime::<Utc>::from_naive_utc_and_offset(
                end.and_hms_opt(23, 59, 59).unwrap_or_default(),
                Utc,
            );
            query = query.filter(sale::Column::SaleDate.lte(to));
        }
        if let Some(search) = &filter.search {
            query = query.filter(sale::Column::InvoiceNumber.contains(search.as_str()));
        }

        let per_page = filter.per_page.max(1);
        let paginator = query.paginate(self.db_pool.as_ref(), per_page);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(filter.page.max(1) - 1)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((items, total))
    }
}

async fn find_sale<C: ConnectionTrait>(
    conn: &C,
    tenant_id: Uuid,
    sale_id: Uuid,
) -> Result<sale::Model, ServiceError> {
    Sale::find_by_id(sale_id)
        .filter(sale::Column::TenantId.eq(tenant_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", sale_id)))
}

fn validate_sale_input(input: &CreateSaleInput) -> Result<(), ServiceError> {
    if input.items.is_empty() {
        return Err(ServiceError::ValidationError(
            "At least one item is required".into(),
        ));
    }
    for item in &input.items {
        if item.quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidQuantity(
                "Item quantity must be greater than zero".into(),
            ));
        }
        if item.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Item price cannot be negative".into(),
            ));
        }
    }
    for (name, pct) in [
        ("discount_percent", input.discount_percent),
        ("tax_percent", input.tax_percent),
    ] {
        if pct < Decimal::ZERO || pct > dec!(100) {
            return Err(ServiceError::ValidationError(format!(
                "{} must be between 0 and 100",
                name
            )));
        }
    }
    Ok(())
}

fn unwrap_txn_err(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}
