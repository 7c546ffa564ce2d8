use crate::{
    db::DbPool,
    entities::{
        document_counter::DocumentType,
        purchase_order::{self, Entity as PurchaseOrder, PurchaseOrderStatus},
        purchase_order_item::{self, Entity as PurchaseOrderItem},
        stock_movement::{MovementType, ReferenceType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        ledger::{LedgerApply, StockChange, StockLedger},
        numbering::DocumentNumbering,
    },
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionError, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PurchaseOrderItemInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Decimal,
}

#[derive(Debug, Clone)]
pub struct CreatePurchaseOrderInput {
    pub branch_id: Uuid,
    pub supplier_id: Uuid,
    pub order_date: NaiveDate,
    pub expected_date: Option<NaiveDate>,
    pub discount: Decimal,
    pub tax: Decimal,
    pub notes: Option<String>,
    pub items: Vec<PurchaseOrderItemInput>,
}

/// Replaces the order's header fields and its full item list. Only drafts
/// may be edited.
#[derive(Debug, Clone)]
pub struct UpdatePurchaseOrderInput {
    pub supplier_id: Uuid,
    pub order_date: NaiveDate,
    pub expected_date: Option<NaiveDate>,
    pub discount: Decimal,
    pub tax: Decimal,
    pub notes: Option<String>,
    pub items: Vec<PurchaseOrderItemInput>,
}

#[derive(Debug, Clone)]
pub struct ReceiveItemInput {
    pub item_id: Uuid,
    pub received_quantity: Decimal,
}

#[derive(Debug, Clone)]
pub struct ReceiveInput {
    pub items: Vec<ReceiveItemInput>,
}

#[derive(Debug, Clone, Default)]
pub struct PurchaseOrderFilter {
    pub status: Option<PurchaseOrderStatus>,
    pub supplier_id: Option<Uuid>,
    /// Matches against the PO number.
    pub search: Option<String>,
    pub page: u64,
    pub per_page: u64,
}

/// A purchase order together with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderDetail {
    #[serde(flatten)]
    pub order: purchase_order::Model,
    pub items: Vec<purchase_order_item::Model>,
}

/// Purchase-order lifecycle: draft editing, submission, approval, receiving
/// into stock, cancellation.
pub struct ProcurementService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ProcurementService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        input: CreatePurchaseOrderInput,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        validate_order_input(input.order_date, input.expected_date, &input.items)?;

        let detail = self
            .db_pool
            .transaction::<_, PurchaseOrderDetail, ServiceError>(move |txn| {
                Box::pin(async move {
                    let po_number = DocumentNumbering::next(
                        txn,
                        tenant_id,
                        DocumentType::PurchaseOrder,
                        Utc::now().date_naive(),
                    )
                    .await?;

                    let now = Utc::now();
                    let order = purchase_order::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        tenant_id: Set(tenant_id),
                        branch_id: Set(input.branch_id),
                        supplier_id: Set(input.supplier_id),
                        po_number: Set(po_number),
                        order_date: Set(input.order_date),
                        expected_date: Set(input.expected_date),
                        received_date: Set(None),
                        status: Set(PurchaseOrderStatus::Draft.to_string()),
                        subtotal: Set(Decimal::ZERO),
                        discount: Set(input.discount),
                        tax: Set(input.tax),
                        total: Set(Decimal::ZERO),
                        notes: Set(input.notes),
                        created_by: Set(user_id),
                        approved_by: Set(None),
                        approved_at: Set(None),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    let items = insert_items(txn, order.id, &input.items).await?;
                    let order = recalculate_totals(txn, order, &items).await?;

                    Ok(PurchaseOrderDetail { order, items })
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        info!(
            "Purchase order created: {} ({})",
            detail.order.po_number, detail.order.id
        );
        self.event_sender
            .send_or_log(Event::PurchaseOrderCreated(detail.order.id))
            .await;

        Ok(detail)
    }

    pub async fn update(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        input: UpdatePurchaseOrderInput,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        validate_order_input(input.order_date, input.expected_date, &input.items)?;

        let detail = self
            .db_pool
            .transaction::<_, PurchaseOrderDetail, ServiceError>(move |txn| {
                Box::pin(async move {
                    let order = find_order(txn, tenant_id, order_id).await?;

                    if order.status()? != PurchaseOrderStatus::Draft {
                        return Err(ServiceError::InvalidStateTransition(
                            "Only draft purchase orders can be edited".into(),
                        ));
                    }

                    // Replace the full item list.
                    PurchaseOrderItem::delete_many()
                        .filter(purchase_order_item::Column::PurchaseOrderId.eq(order.id))
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    let items = insert_items(txn, order.id, &input.items).await?;

                    let mut update: purchase_order::ActiveModel = order.into();
                    update.supplier_id = Set(input.supplier_id);
                    update.order_date = Set(input.order_date);
                    update.expected_date = Set(input.expected_date);
                    update.discount = Set(input.discount);
                    update.tax = Set(input.tax);
                    update.notes = Set(input.notes);
                    update.updated_at = Set(Utc::now());
                    let order = update.update(txn).await.map_err(ServiceError::db_error)?;

                    let order = recalculate_totals(txn, order, &items).await?;

                    Ok(PurchaseOrderDetail { order, items })
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        Ok(detail)
    }

    pub async fn submit(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<purchase_order::Model, ServiceError> {
        let order = self
            .transition(tenant_id, order_id, PurchaseOrderStatus::Pending)
            .await?;

        self.event_sender
            .send_or_log(Event::PurchaseOrderSubmitted(order.id))
            .await;

        Ok(order)
    }

    /// Marks a pending order approved. Approval is recorded on the order
    /// (`approved_by`/`approved_at`) and does not change its status.
    pub async fn approve(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<purchase_order::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let order = find_order(db, tenant_id, order_id).await?;

        if order.status()? != PurchaseOrderStatus::Pending {
            return Err(ServiceError::InvalidStateTransition(
                "Only pending purchase orders can be approved".into(),
            ));
        }

        let mut update: purchase_order::ActiveModel = order.into();
        update.approved_by = Set(Some(user_id));
        update.approved_at = Set(Some(Utc::now()));
        update.updated_at = Set(Utc::now());
        let order = update.update(db).await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send_or_log(Event::PurchaseOrderApproved(order.id))
            .await;

        Ok(order)
    }

    /// Books a delivery against an outstanding order. Quantities are clamped
    /// to each line's remaining amount, so re-sending a receipt for an
    /// already-filled line adds nothing. Each received line adds stock
    /// through the ledger.
    pub async fn receive(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        order_id: Uuid,
        input: ReceiveInput,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        if input.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one item is required".into(),
            ));
        }
        for item in &input.items {
            if item.received_quantity <= Decimal::ZERO {
                return Err(ServiceError::InvalidQuantity(
                    "Received quantity must be greater than zero".into(),
                ));
            }
        }

        let detail = self
            .db_pool
            .transaction::<_, PurchaseOrderDetail, ServiceError>(move |txn| {
                Box::pin(async move {
                    let order = find_order(txn, tenant_id, order_id).await?;

                    if !order.status()?.can_receive() {
                        return Err(ServiceError::InvalidStateTransition(format!(
                            "Cannot receive items for a {} purchase order",
                            order.status
                        )));
                    }

                    for receipt_line in &input.items {
                        let line = PurchaseOrderItem::find_by_id(receipt_line.item_id)
                            .one(txn)
                            .await
                            .map_err(ServiceError::db_error)?;

                        // Lines from other orders are ignored, not rejected.
                        let line = match line {
                            Some(l) if l.purchase_order_id == order.id => l,
                            _ => continue,
                        };

                        let received = receipt_line.received_quantity.min(line.remaining());
                        if received <= Decimal::ZERO {
                            continue;
                        }

                        let new_received = line.received_quantity + received;
                        let product_id = line.product_id;
                        let unit_price = line.unit_price;
                        let mut line_update: purchase_order_item::ActiveModel = line.into();
                        line_update.received_quantity = Set(new_received);
                        line_update
                            .update(txn)
                            .await
                            .map_err(ServiceError::db_error)?;

                        StockLedger::apply(
                            txn,
                            LedgerApply {
                                tenant_id,
                                branch_id: order.branch_id,
                                product_id,
                                change: StockChange::Delta(received),
                                movement_type: MovementType::In,
                                reference_type: ReferenceType::Purchase,
                                reference_id: Some(order.id),
                                reference_number: order.po_number.clone(),
                                unit_cost: Some(unit_price),
                                notes: Some(format!("Received from PO: {}", order.po_number)),
                                created_by: user_id,
                            },
                        )
                        .await?;
                    }

                    let items = PurchaseOrderItem::find()
                        .filter(purchase_order_item::Column::PurchaseOrderId.eq(order.id))
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    let all_received = items.iter().all(|i| i.is_fully_received());
                    let any_received = items.iter().any(|i| i.received_quantity > Decimal::ZERO);

                    let mut update: purchase_order::ActiveModel = order.into();
                    if all_received {
                        update.status = Set(PurchaseOrderStatus::Received.to_string());
                        update.received_date = Set(Some(Utc::now().date_naive()));
                    } else if any_received {
                        update.status = Set(PurchaseOrderStatus::Partial.to_string());
                    }
                    update.updated_at = Set(Utc::now());
                    let order = update.update(txn).await.map_err(ServiceError::db_error)?;

                    Ok(PurchaseOrderDetail { order, items })
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        let fully_received = detail.order.status()? == PurchaseOrderStatus::Received;
        info!(
            "Purchase order received: {} fully_received={}",
            detail.order.po_number, fully_received
        );
        self.event_sender
            .send_or_log(Event::PurchaseOrderReceived {
                purchase_order_id: detail.order.id,
                fully_received,
            })
            .await;

        Ok(detail)
    }

    pub async fn cancel(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<purchase_order::Model, ServiceError> {
        let order = self
            .transition(tenant_id, order_id, PurchaseOrderStatus::Cancelled)
            .await?;

        self.event_sender
            .send_or_log(Event::PurchaseOrderCancelled(order.id))
            .await;

        Ok(order)
    }

    /// Deletes a draft order and its items.
    pub async fn delete(&self, tenant_id: Uuid, order_id: Uuid) -> Result<(), ServiceError> {
        self.db_pool
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    let order = find_order(txn, tenant_id, order_id).await?;

                    if order.status()? != PurchaseOrderStatus::Draft {
                        return Err(ServiceError::InvalidStateTransition(
                            "Only draft purchase orders can be deleted".into(),
                        ));
                    }

                    PurchaseOrderItem::delete_many()
                        .filter(purchase_order_item::Column::PurchaseOrderId.eq(order.id))
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    order.delete(txn).await.map_err(ServiceError::db_error)?;

                    Ok(())
                })
            })
            .await
            .map_err(unwrap_txn_err)
    }

    pub async fn get(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        let db = self.db_pool.as_ref();
        let order = find_order(db, tenant_id, order_id).await?;
        let items = PurchaseOrderItem::find()
            .filter(purchase_order_item::Column::PurchaseOrderId.eq(order.id))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(PurchaseOrderDetail { order, items })
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        filter: PurchaseOrderFilter,
    ) -> Result<(Vec<purchase_order::Model>, u64), ServiceError> {
        let mut query = PurchaseOrder::find()
            .filter(purchase_order::Column::TenantId.eq(tenant_id))
            .order_by_desc(purchase_order::Column::CreatedAt);

        if let Some(status) = filter.status {
            query = query.filter(purchase_order::Column::Status.eq(status.to_string()));
        }
        if let Some(supplier_id) = filter.supplier_id {
            query = query.filter(purchase_order::Column::SupplierId.eq(supplier_id));
        }
        if let Some(search) = &filter.search {
            query = query.filter(purchase_order::Column::PoNumber.contains(search.as_str()));
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

    async fn transition(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        target: PurchaseOrderStatus,
    ) -> Result<purchase_order::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let order = find_order(db, tenant_id, order_id).await?;
        let current = order.status()?;

        if !current.can_transition_to(target) {
            return Err(ServiceError::InvalidStateTransition(format!(
                "Purchase order cannot move from {} to {}",
                current, target
            )));
        }

        let mut update: purchase_order::ActiveModel = order.into();
        update.status = Set(target.to_string());
        update.updated_at = Set(Utc::now());
        update.update(db).await.map_err(ServiceError::db_error)
    }
}

async fn find_order<C: sea_orm::ConnectionTrait>(
    conn: &C,
    tenant_id: Uuid,
    order_id: Uuid,
) -> Result<purchase_order::Model, ServiceError> {
    PurchaseOrder::find_by_id(order_id)
        .filter(purchase_order::Column::TenantId.eq(tenant_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Purchase order {} not found", order_id)))
}

fn validate_order_input(
    order_date: NaiveDate,
    expected_date: Option<NaiveDate>,
    items: &[PurchaseOrderItemInput],
) -> Result<(), ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::ValidationError(
            "At least one item is required".into(),
        ));
    }
    if let Some(expected) = expected_date {
        if expected < order_date {
            return Err(ServiceError::ValidationError(
                "Expected date cannot be before the order date".into(),
            ));
        }
    }
    for item in items {
        if item.quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidQuantity(
                "Item quantity must be greater than zero".into(),
            ));
        }
        if item.unit_price < Decimal::ZERO || item.discount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Item price and discount cannot be negative".into(),
            ));
        }
    }
    Ok(())
}

async fn insert_items(
    txn: &DatabaseTransaction,
    order_id: Uuid,
    inputs: &[PurchaseOrderItemInput],
) -> Result<Vec<purchase_order_item::Model>, ServiceError> {
    let mut items = Vec::with_capacity(inputs.len());
    for input in inputs {
        let subtotal = input.quantity * input.unit_price - input.discount;
        let item = purchase_order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            purchase_order_id: Set(order_id),
            product_id: Set(input.product_id),
            quantity: Set(input.quantity),
            received_quantity: Set(Decimal::ZERO),
            unit_price: Set(input.unit_price),
            discount: Set(input.discount),
            subtotal: Set(subtotal),
        }
        .insert(txn)
        .await
        .map_err(ServiceError::db_error)?;
        items.push(item);
    }
    Ok(items)
}

/// Header totals are derived from the item list:
/// `total = sum(item subtotals) - discount + tax`.
async fn recalculate_totals(
    txn: &DatabaseTransaction,
    order: purchase_order::Model,
    items: &[purchase_order_item::Model],
) -> Result<purchase_order::Model, ServiceError> {
    let subtotal: Decimal = items.iter().map(|i| i.subtotal).sum();
    let total = subtotal - order.discount + order.tax;

    let mut update: purchase_order::ActiveModel = order.into();
    update.subtotal = Set(subtotal);
    update.total = Set(total);
    update.update(txn).await.map_err(ServiceError::db_error)
}

fn unwrap_txn_err(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}
