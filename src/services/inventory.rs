use crate::{
    db::DbPool,
    entities::{
        product::{self, Entity as Product, ProductType},
        stock_movement::{self, Entity as StockMovement, MovementType, ReferenceType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::ledger::{LedgerApply, LedgerReceipt, StockChange, StockLedger},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionError, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Manual stock receipt.
#[derive(Debug, Clone)]
pub struct StockInInput {
    pub branch_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

/// Manual stock issue.
#[derive(Debug, Clone)]
pub struct StockOutInput {
    pub branch_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

/// Correction to an absolute counted value.
#[derive(Debug, Clone)]
pub struct AdjustmentInput {
    pub branch_id: Uuid,
    pub product_id: Uuid,
    pub new_quantity: Decimal,
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub branch_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Matches against the reference number.
    pub search: Option<String>,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SummaryFilter {
    /// Only products at or below their minimum stock level.
    pub low_stock: bool,
    /// Matches against product name or SKU.
    pub search: Option<String>,
    pub page: u64,
    pub per_page: u64,
}

/// Per-product stock overview with lifetime in/out totals.
#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct StockSummaryRow {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub unit: String,
    pub stock: Decimal,
    pub min_stock: Decimal,
    pub total_in: Decimal,
    pub total_out: Decimal,
}

/// Result of a stock adjustment. `movement` is `None` when the requested
/// value already matched current stock and nothing needed to change.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AdjustmentOutcome {
    pub product: product::Model,
    pub movement: Option<stock_movement::Model>,
}

/// Manual inventory operations: stock in, stock out, and absolute
/// adjustments, plus read-side movement history and stock summary.
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    pub async fn stock_in(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        input: StockInInput,
    ) -> Result<LedgerReceipt, ServiceError> {
        if input.quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidQuantity(
                "Quantity must be greater than zero".into(),
            ));
        }

        let reference_number = input
            .reference_number
            .unwrap_or_else(|| format!("IN-{}", Utc::now().format("%Y%m%d%H%M%S")));

        let receipt = self
            .apply_in_transaction(LedgerApply {
                tenant_id,
                branch_id: input.branch_id,
                product_id: input.product_id,
                change: StockChange::Delta(input.quantity),
                movement_type: MovementType::In,
                reference_type: ReferenceType::Manual,
                reference_id: None,
                reference_number,
                unit_cost: input.unit_cost,
                notes: input.notes,
                created_by: user_id,
            })
            .await?;

        info!(
            "Stock in: product={} quantity={} after={}",
            receipt.product.id, receipt.movement.quantity, receipt.movement.quantity_after
        );
        self.emit_movement_events(&receipt.product, &receipt.movement)
            .await;

        Ok(receipt)
    }

    pub async fn stock_out(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        input: StockOutInput,
    ) -> Result<LedgerReceipt, ServiceError> {
        if input.quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidQuantity(
                "Quantity must be greater than zero".into(),
            ));
        }

        let reference_number = input
            .reference_number
            .unwrap_or_else(|| format!("OUT-{}", Utc::now().format("%Y%m%d%H%M%S")));

        let receipt = self
            .apply_in_transaction(LedgerApply {
                tenant_id,
                branch_id: input.branch_id,
                product_id: input.product_id,
                change: StockChange::Delta(-input.quantity),
                movement_type: MovementType::Out,
                reference_type: ReferenceType::Manual,
                reference_id: None,
                reference_number,
                unit_cost: None,
                notes: input.notes,
                created_by: user_id,
            })
            .await?;

        info!(
            "Stock out: product={} quantity={} after={}",
            receipt.product.id, receipt.movement.quantity, receipt.movement.quantity_after
        );
        self.emit_movement_events(&receipt.product, &receipt.movement)
            .await;

        Ok(receipt)
    }

    /// Sets stock to an exact counted value. The recorded movement carries
    /// the signed difference from the previous value; a count that already
    /// matches current stock succeeds without writing a movement.
    pub async fn adjust(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        input: AdjustmentInput,
    ) -> Result<AdjustmentOutcome, ServiceError> {
        if input.new_quantity < Decimal::ZERO {
            return Err(ServiceError::InvalidQuantity(
                "New quantity cannot be negative".into(),
            ));
        }

        let notes = match &input.notes {
            Some(extra) => format!("Reason: {}\n{}", input.reason, extra),
            None => format!("Reason: {}", input.reason),
        };

        let outcome = self
            .db_pool
            .transaction::<_, AdjustmentOutcome, ServiceError>(move |txn| {
                Box::pin(async move {
                    let product = Product::find_by_id(input.product_id)
                        .filter(product::Column::TenantId.eq(tenant_id))
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Product {} not found",
                                input.product_id
                            ))
                        })?;

                    // Service products fall through so the ledger rejects
                    // them uniformly.
                    if !product.is_service() && product.stock == input.new_quantity {
                        return Ok(AdjustmentOutcome {
                            product,
                            movement: None,
                        });
                    }

                    let receipt = StockLedger::apply(
                        txn,
                        LedgerApply {
                            tenant_id,
                            branch_id: input.branch_id,
                            product_id: input.product_id,
                            change: StockChange::SetAbsolute(input.new_quantity),
                            movement_type: MovementType::Adjustment,
                            reference_type: ReferenceType::Manual,
                            reference_id: None,
                            reference_number: format!(
                                "ADJ-{}",
                                Utc::now().format("%Y%m%d%H%M%S")
                            ),
                            unit_cost: None,
                            notes: Some(notes),
                            created_by: user_id,
                        },
                    )
                    .await?;

                    Ok(AdjustmentOutcome {
                        product: receipt.product,
                        movement: Some(receipt.movement),
                    })
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        match &outcome.movement {
            Some(movement) => {
                info!(
                    "Stock adjusted: product={} from={} to={}",
                    outcome.product.id, movement.quantity_before, movement.quantity_after
                );
                self.emit_movement_events(&outcome.product, movement).await;
            }
            None => {
                info!(
                    "Stock adjustment no-op: product={} already at {}",
                    outcome.product.id, outcome.product.stock
                );
            }
        }

        Ok(outcome)
    }

    pub async fn list_movements(
        &self,
        tenant_id: Uuid,
        filter: MovementFilter,
    ) -> Result<(Vec<stock_movement::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = StockMovement::find()
            .filter(stock_movement::Column::TenantId.eq(tenant_id))
            .order_by_desc(stock_movement::Column::CreatedAt);

        if let Some(branch_id) = filter.branch_id {
            query = query.filter(stock_movement::Column::BranchId.eq(branch_id));
        }
        if let Some(product_id) = filter.product_id {
            query = query.filter(stock_movement::Column::ProductId.eq(product_id));
        }
        if let Some(movement_type) = filter.movement_type {
            query =
                query.filter(stock_movement::Column::MovementType.eq(movement_type.to_string()));
        }
        if let Some(start) = filter.start_date {
            let from = DateTime::<Utc>::from_naive_utc_and_offset(
                start.and_hms_opt(0, 0, 0).unwrap_or_default(),
                Utc,
            );
            query = query.filter(stock_movement::Column::CreatedAt.gte(from));
        }
        if let Some(end) = filter.end_date {
            let to = DateTime::<Utc>::from_naive_utc_and_offset(
                end.and_hms_opt(23, 59, 59).unwrap_or_default(),
                Utc,
            );
            query = query.filter(stock_movement::Column::CreatedAt.lte(to));
        }
        if let Some(search) = &filter.search {
            query = query.filter(stock_movement::Column::ReferenceNumber.contains(search.as_str()));
        }

        let per_page = filter.per_page.max(1);
        let paginator = query.paginate(db, per_page);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let page = filter.page.max(1);
        let items = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((items, total))
    }

    pub async fn stock_summary(
        &self,
        tenant_id: Uuid,
        filter: SummaryFilter,
    ) -> Result<(Vec<StockSummaryRow>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = Product::find()
            .filter(product::Column::TenantId.eq(tenant_id))
            .filter(product::Column::ProductType.eq(ProductType::Physical.to_string()))
            .order_by_asc(product::Column::Name);

        if filter.low_stock {
            query = query.filter(
                Expr::col(product::Column::Stock).lte(Expr::col(product::Column::MinStock)),
            );
        }
        if let Some(search) = &filter.search {
            query = query.filter(
                Condition::any()
                    .add(product::Column::Name.contains(search.as_str()))
                    .add(product::Column::Sku.contains(search.as_str())),
            );
        }

        let per_page = filter.per_page.max(1);
        let paginator = query.paginate(db, per_page);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let page = filter.page.max(1);
        let products = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let inflow = self
            .movement_totals(tenant_id, &ids, &[MovementType::In, MovementType::Return])
            .await?;
        let outflow = self
            .movement_totals(tenant_id, &ids, &[MovementType::Out, MovementType::Sale])
            .await?;

        let rows = products
            .into_iter()
            .map(|p| {
                let total_in = inflow.get(&p.id).copied().unwrap_or(Decimal::ZERO);
                // Outbound movements are stored as negative deltas.
                let total_out = -outflow.get(&p.id).copied().unwrap_or(Decimal::ZERO);
                StockSummaryRow {
                    id: p.id,
                    sku: p.sku,
                    name: p.name,
                    unit: p.unit,
                    stock: p.stock,
                    min_stock: p.min_stock,
                    total_in,
                    total_out,
                }
            })
            .collect();

        Ok((rows, total))
    }

    async fn movement_totals(
        &self,
        tenant_id: Uuid,
        product_ids: &[Uuid],
        movement_types: &[MovementType],
    ) -> Result<HashMap<Uuid, Decimal>, ServiceError> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let types: Vec<String> = movement_types.iter().map(|t| t.to_string()).collect();
        let totals: Vec<(Uuid, Option<Decimal>)> = StockMovement::find()
            .select_only()
            .column(stock_movement::Column::ProductId)
            .column_as(stock_movement::Column::Quantity.sum(), "total")
            .filter(stock_movement::Column::TenantId.eq(tenant_id))
            .filter(stock_movement::Column::ProductId.is_in(product_ids.iter().copied()))
            .filter(stock_movement::Column::MovementType.is_in(types))
            .group_by(stock_movement::Column::ProductId)
            .into_tuple()
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        Ok(totals
            .into_iter()
            .map(|(id, total)| (id, total.unwrap_or(Decimal::ZERO)))
            .collect())
    }

    async fn apply_in_transaction(&self, req: LedgerApply) -> Result<LedgerReceipt, ServiceError> {
        self.db_pool
            .transaction::<_, LedgerReceipt, ServiceError>(move |txn| {
                Box::pin(async move { StockLedger::apply(txn, req).await })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })
    }

    async fn emit_movement_events(
        &self,
        product: &product::Model,
        movement: &stock_movement::Model,
    ) {
        self.event_sender
            .send_or_log(Event::StockMovementRecorded {
                movement_id: movement.id,
                product_id: product.id,
                quantity: movement.quantity,
                quantity_after: movement.quantity_after,
            })
            .await;

        if product.stock <= product.min_stock {
            self.event_sender
                .send_or_log(Event::LowStock {
                    product_id: product.id,
                    stock: product.stock,
                    min_stock: product.min_stock,
                })
                .await;
        }
    }
}
