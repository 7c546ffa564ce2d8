use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Closed purchase-order status machine:
/// `draft -> pending -> (partial <-> partial) -> received`, with `cancelled`
/// reachable from everything except `received`/`cancelled`. Approval is a
/// marker (`approved_by`/`approved_at`), not a status value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Pending,
    Partial,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn can_transition_to(self, target: PurchaseOrderStatus) -> bool {
        use PurchaseOrderStatus::*;
        match (self, target) {
            (Draft, Pending) => true,
            (Pending, Partial) | (Pending, Received) => true,
            (Partial, Partial) | (Partial, Received) => true,
            (Draft, Cancelled) | (Pending, Cancelled) | (Partial, Cancelled) => true,
            _ => false,
        }
    }

    /// Receiving is only meaningful while deliveries are still outstanding.
    pub fn can_receive(self) -> bool {
        matches!(self, Self::Pending | Self::Partial)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub branch_id: Uuid,
    pub supplier_id: Uuid,
    pub po_number: String,
    pub order_date: NaiveDate,
    pub expected_date: Option<NaiveDate>,
    pub received_date: Option<NaiveDate>,
    pub status: String,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn status(&self) -> Result<PurchaseOrderStatus, strum::ParseError> {
        self.status.parse()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchase_order_item::Entity")]
    Items,
}

impl Related<super::purchase_order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::PurchaseOrderStatus::*;
    use rstest::rstest;

    #[rstest]
    #[case(Draft, Pending, true)]
    #[case(Draft, Received, false)]
    #[case(Pending, Partial, true)]
    #[case(Pending, Received, true)]
    #[case(Partial, Partial, true)]
    #[case(Partial, Received, true)]
    #[case(Received, Cancelled, false)]
    #[case(Cancelled, Pending, false)]
    #[case(Partial, Cancelled, true)]
    fn transition_table(
        #[case] from: super::PurchaseOrderStatus,
        #[case] to: super::PurchaseOrderStatus,
        #[case] legal: bool,
    ) {
        assert_eq!(from.can_transition_to(to), legal);
    }

    #[test]
    fn only_outstanding_orders_receive() {
        assert!(Pending.can_receive());
        assert!(Partial.can_receive());
        assert!(!Draft.can_receive());
        assert!(!Received.can_receive());
        assert!(!Cancelled.can_receive());
    }
}
