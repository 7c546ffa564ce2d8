use crate::{
    db::DbPool,
    entities::{
        document_counter::DocumentType,
        product::{self, Entity as Product, ProductType},
        stock_movement::{MovementType, ReferenceType},
        stock_opname::{self, Entity as StockOpname, OpnameStatus},
        stock_opname_item::{self, Entity as StockOpnameItem},
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
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionError, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CreateOpnameInput {
    pub branch_id: Uuid,
    pub opname_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpnameCountInput {
    pub item_id: Uuid,
    pub physical_quantity: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OpnameFilter {
    pub status: Option<OpnameStatus>,
    /// Matches against the opname number.
    pub search: Option<String>,
    pub page: u64,
    pub per_page: u64,
}

/// An opname session together with its count sheet.
#[derive(Debug, Clone, Serialize)]
pub struct OpnameDetail {
    #[serde(flatten)]
    pub opname: stock_opname::Model,
    pub items: Vec<stock_opname_item::Model>,
}

/// Stock-opname lifecycle: snapshot creation, counting, completion (which
/// writes corrections through the ledger), cancellation.
pub struct StockOpnameService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl StockOpnameService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Opens a new count session and snapshots the current stock of every
    /// active physical product as its count sheet.
    pub async fn create(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        input: CreateOpnameInput,
    ) -> Result<OpnameDetail, ServiceError> {
        let detail = self
            .db_pool
            .transaction::<_, OpnameDetail, ServiceError>(move |txn| {
                Box::pin(async move {
                    let opname_number = DocumentNumbering::next(
                        txn,
                        tenant_id,
                        DocumentType::StockOpname,
                        Utc::now().date_naive(),
                    )
                    .await?;

                    let now = Utc::now();
                    let opname = stock_opname::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        tenant_id: Set(tenant_id),
                        branch_id: Set(input.branch_id),
                        opname_number: Set(opname_number),
                        opname_date: Set(input.opname_date),
                        status: Set(OpnameStatus::Draft.to_string()),
                        notes: Set(input.notes),
                        created_by: Set(user_id),
                        completed_by: Set(None),
                        completed_at: Set(None),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    let products = Product::find()
                        .filter(product::Column::TenantId.eq(tenant_id))
                        .filter(product::Column::IsActive.eq(true))
                        .filter(
                            product::Column::ProductType.eq(ProductType::Physical.to_string()),
                        )
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    let mut items = Vec::with_capacity(products.len());
                    for p in products {
                        let item = stock_opname_item::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            stock_opname_id: Set(opname.id),
                            product_id: Set(p.id),
                            system_quantity: Set(p.stock),
                            physical_quantity: Set(None),
                            difference: Set(None),
                            notes: Set(None),
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                        items.push(item);
                    }

                    Ok(OpnameDetail { opname, items })
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        info!(
            "Stock opname created: {} with {} items",
            detail.opname.opname_number,
            detail.items.len()
        );
        self.event_sender
            .send_or_log(Event::StockOpnameCreated(detail.opname.id))
            .await;

        Ok(detail)
    }

    pub async fn start(
        &self,
        tenant_id: Uuid,
        opname_id: Uuid,
    ) -> Result<stock_opname::Model, ServiceError> {
        self.transition(tenant_id, opname_id, OpnameStatus::InProgress)
            .await
    }

    /// Records physical counts for items on the sheet. Allowed while the
    /// session is draft or in progress.
    pub async fn update_items(
        &self,
        tenant_id: Uuid,
        opname_id: Uuid,
        counts: Vec<OpnameCountInput>,
    ) -> Result<OpnameDetail, ServiceError> {
        for count in &counts {
            if count.physical_quantity < Decimal::ZERO {
                return Err(ServiceError::InvalidQuantity(
                    "Physical quantity cannot be negative".into(),
                ));
            }
        }

        let detail = self
            .db_pool
            .transaction::<_, OpnameDetail, ServiceError>(move |txn| {
                Box::pin(async move {
                    let opname = find_opname(txn, tenant_id, opname_id).await?;

                    if !opname.status()?.allows_counting() {
                        return Err(ServiceError::InvalidStateTransition(
                            "Cannot update counts on a completed or cancelled opname".into(),
                        ));
                    }

                    for count in &counts {
                        let item = StockOpnameItem::find_by_id(count.item_id)
                            .one(txn)
                            .await
                            .map_err(ServiceError::db_error)?;

                        // Items from other sessions are ignored, not rejected.
                        let item = match item {
                            Some(i) if i.stock_opname_id == opname.id => i,
                            _ => continue,
                        };

                        let difference = count.physical_quantity - item.system_quantity;
                        let mut update: stock_opname_item::ActiveModel = item.into();
                        update.physical_quantity = Set(Some(count.physical_quantity));
                        update.difference = Set(Some(difference));
                        update.notes = Set(count.notes.clone());
                        update.update(txn).await.map_err(ServiceError::db_error)?;
                    }

                    let items = find_items(txn, opname.id).await?;
                    Ok(OpnameDetail { opname, items })
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        Ok(detail)
    }

    /// Closes an in-progress session: every item must be counted, and each
    /// non-zero difference is written to stock through the ledger.
    pub async fn complete(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        opname_id: Uuid,
    ) -> Result<OpnameDetail, ServiceError> {
        let (detail, adjusted) = self
            .db_pool
            .transaction::<_, (OpnameDetail, usize), ServiceError>(move |txn| {
                Box::pin(async move {
                    let opname = find_opname(txn, tenant_id, opname_id).await?;

                    if opname.status()? != OpnameStatus::InProgress {
                        return Err(ServiceError::InvalidStateTransition(
                            "Only in-progress opnames can be completed".into(),
                        ));
                    }

                    let items = find_items(txn, opname.id).await?;

                    let uncounted = items
                        .iter()
                        .filter(|i| i.physical_quantity.is_none())
                        .count();
                    if uncounted > 0 {
                        return Err(ServiceError::IncompleteCount(format!(
                            "There are {} items not yet counted",
                            uncounted
                        )));
                    }

                    let mut adjusted = 0usize;
                    for item in &items {
                        let physical = match item.physical_quantity {
                            Some(q) => q,
                            None => continue,
                        };
                        if item.difference.unwrap_or(Decimal::ZERO).is_zero() {
                            continue;
                        }

                        let result = StockLedger::apply(
                            txn,
                            LedgerApply {
                                tenant_id,
                                branch_id: opname.branch_id,
                                product_id: item.product_id,
                                change: StockChange::SetAbsolute(physical),
                                movement_type: MovementType::Adjustment,
                                reference_type: ReferenceType::Opname,
                                reference_id: Some(opname.id),
                                reference_number: opname.opname_number.clone(),
                                unit_cost: None,
                                notes: Some(format!("Stock opname: {}", opname.opname_number)),
                                created_by: user_id,
                            },
                        )
                        .await;

                        match result {
                            Ok(_) => adjusted += 1,
                            // Live stock drifted onto the counted value since
                            // the sheet was filled in; nothing to correct.
                            Err(ServiceError::InvalidQuantity(_)) => {}
                            Err(e) => return Err(e),
                        }
                    }

                    let mut update: stock_opname::ActiveModel = opname.into();
                    update.status = Set(OpnameStatus::Completed.to_string());
                    update.completed_by = Set(Some(user_id));
                    update.completed_at = Set(Some(Utc::now()));
                    update.updated_at = Set(Utc::now());
                    let opname = update.update(txn).await.map_err(ServiceError::db_error)?;

                    Ok((OpnameDetail { opname, items }, adjusted))
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        info!(
            "Stock opname completed: {} adjusted_products={}",
            detail.opname.opname_number, adjusted
        );
        self.event_sender
            .send_or_log(Event::StockOpnameCompleted {
                opname_id: detail.opname.id,
                adjusted_products: adjusted,
            })
            .await;

        Ok(detail)
    }

    pub async fn cancel(
        &self,
        tenant_id: Uuid,
        opname_id: Uuid,
    ) -> Result<stock_opname::Model, ServiceError> {
        let opname = self
            .transition(tenant_id, opname_id, OpnameStatus::Cancelled)
            .await?;

        self.event_sender
            .send_or_log(Event::StockOpnameCancelled(opname.id))
            .await;

        Ok(opname)
    }

    /// Deletes a draft session and its count sheet.
    pub async fn delete(&self, tenant_id: Uuid, opname_id: Uuid) -> Result<(), ServiceError> {
        self.db_pool
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    let opname = find_opname(txn, tenant_id, opname_id).await?;

                    if opname.status()? != OpnameStatus::Draft {
                        return Err(ServiceError::InvalidStateTransition(
                            "Only draft opnames can be deleted".into(),
                        ));
                    }

                    StockOpnameItem::delete_many()
                        .filter(stock_opname_item::Column::StockOpnameId.eq(opname.id))
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    opname.delete(txn).await.map_err(ServiceError::db_error)?;

                    Ok(())
                })
            })
            .await
            .map_err(unwrap_txn_err)
    }

    pub async fn get(&self, tenant_id: Uuid, opname_id: Uuid) -> Result<OpnameDetail, ServiceError> {
        let db = self.db_pool.as_ref();
        let opname = find_opname(db, tenant_id, opname_id).await?;
        let items = find_items(db, opname.id).await?;
        Ok(OpnameDetail { opname, items })
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        filter: OpnameFilter,
    ) -> Result<(Vec<stock_opname::Model>, u64), ServiceError> {
        let mut query = StockOpname::find()
            .filter(stock_opname::Column::TenantId.eq(tenant_id))
            .order_by_desc(stock_opname::Column::CreatedAt);

        if let Some(status) = filter.status {
            query = query.filter(stock_opname::Column::Status.eq(status.to_string()));
        }
        if let Some(search) = &filter.search {
            query = query.filter(stock_opname::Column::OpnameNumber.contains(search.as_str()));
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
        opname_id: Uuid,
        target: OpnameStatus,
    ) -> Result<stock_opname::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let opname = find_opname(db, tenant_id, opname_id).await?;
        let current = opname.status()?;

        if !current.can_transition_to(target) {
            return Err(ServiceError::InvalidStateTransition(format!(
                "Stock opname cannot move from {} to {}",
                current, target
            )));
        }

        let mut update: stock_opname::ActiveModel = opname.into();
        update.status = Set(target.to_string());
        update.updated_at = Set(Utc::now());
        update.update(db).await.map_err(ServiceError::db_error)
    }
}

async fn find_opname<C: sea_orm::ConnectionTrait>(
    conn: &C,
    tenant_id: Uuid,
    opname_id: Uuid,
) -> Result<stock_opname::Model, ServiceError> {
    StockOpname::find_by_id(opname_id)
        .filter(stock_opname::Column::TenantId.eq(tenant_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Stock opname {} not found", opname_id)))
}

async fn find_items<C: sea_orm::ConnectionTrait>(
    conn: &C,
    opname_id: Uuid,
) -> Result<Vec<stock_opname_item::Model>, ServiceError> {
    StockOpnameItem::find()
        .filter(stock_opname_item::Column::StockOpnameId.eq(opname_id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}

fn unwrap_txn_err(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}
