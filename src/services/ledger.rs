use crate::{
    entities::{
        product::{self, Entity as Product},
        stock_movement::{self, MovementType, ReferenceType},
    },
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

/// How the ledger should move a product's on-hand quantity.
#[derive(Debug, Clone, Copy)]
pub enum StockChange {
    /// Signed relative change. Negative deltas must not take stock below zero.
    Delta(Decimal),
    /// Overwrite stock with an absolute value (adjustments, opname counts).
    /// May lower stock to any non-negative value.
    SetAbsolute(Decimal),
}

/// One requested ledger application against a single product.
#[derive(Debug, Clone)]
pub struct LedgerApply {
    pub tenant_id: Uuid,
    pub branch_id: Uuid,
    pub product_id: Uuid,
    pub change: StockChange,
    pub movement_type: MovementType,
    pub reference_type: ReferenceType,
    pub reference_id: Option<Uuid>,
    pub reference_number: String,
    pub unit_cost: Option<Decimal>,
    pub notes: Option<String>,
    pub created_by: Uuid,
}

/// Result of a successful ledger application: the movement row that was
/// written and the product as it looks after the change.
#[derive(Debug, Clone)]
pub struct LedgerReceipt {
    pub movement: stock_movement::Model,
    pub product: product::Model,
}

/// The single primitive through which product stock is ever mutated.
///
/// Every caller (manual inventory ops, purchase receiving, opname
/// completion, sales) goes through [`StockLedger::apply`], so the pairing
/// invariant holds globally: one stock change, one movement row, and
/// `quantity_after == quantity_before + quantity` on that row.
pub struct StockLedger;

impl StockLedger {
    /// Applies one stock change inside the caller's transaction.
    ///
    /// The product row is re-read through `conn`, so when `conn` is a
    /// transaction the before/after snapshot is consistent with the write.
    pub async fn apply<C: ConnectionTrait>(
        conn: &C,
        req: LedgerApply,
    ) -> Result<LedgerReceipt, ServiceError> {
        let product = Product::find_by_id(req.product_id)
            .filter(product::Column::TenantId.eq(req.tenant_id))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", req.product_id))
            })?;

        if product.is_service() {
            return Err(ServiceError::ValidationError(format!(
                "Product '{}' is a service and carries no stock",
                product.name
            )));
        }

        let before = product.stock;
        let delta = match req.change {
            StockChange::Delta(d) => d,
            StockChange::SetAbsolute(target) => {
                if target < Decimal::ZERO {
                    return Err(ServiceError::InvalidQuantity(format!(
                        "Stock cannot be set to a negative value: {}",
                        target
                    )));
                }
                target - before
            }
        };

        // A zero delta would record a movement that changes nothing.
        if delta.is_zero() {
            return Err(ServiceError::InvalidQuantity(
                "Stock movement quantity must be non-zero".into(),
            ));
        }

        let after = before + delta;
        if matches!(req.change, StockChange::Delta(_)) && after < Decimal::ZERO {
            return Err(ServiceError::InsufficientStock(format!(
                "Insufficient stock for '{}'. Available: {}, requested: {}",
                product.name, before, -delta
            )));
        }

        let now = Utc::now();

        let mut product_update: product::ActiveModel = product.into();
        product_update.stock = Set(after);
        product_update.updated_at = Set(now);
        let product = product_update
            .update(conn)
            .await
            .map_err(ServiceError::db_error)?;

        let movement = stock_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(req.tenant_id),
            branch_id: Set(req.branch_id),
            product_id: Set(req.product_id),
            movement_type: Set(req.movement_type.to_string()),
            reference_type: Set(req.reference_type.to_string()),
            reference_id: Set(req.reference_id),
            reference_number: Set(req.reference_number),
            quantity: Set(delta),
            quantity_before: Set(before),
            quantity_after: Set(after),
            unit_cost: Set(req.unit_cost),
            notes: Set(req.notes),
            created_by: Set(req.created_by),
            created_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;

        Ok(LedgerReceipt { movement, product })
    }
}
