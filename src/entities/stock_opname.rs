use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Closed opname status machine: `draft -> in_progress -> completed`,
/// `cancelled` reachable from draft/in_progress only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OpnameStatus {
    Draft,
    InProgress,
    Completed,
    Cancelled,
}

impl OpnameStatus {
    pub fn can_transition_to(self, target: OpnameStatus) -> bool {
        use OpnameStatus::*;
        matches!(
            (self, target),
            (Draft, InProgress) | (InProgress, Completed) | (Draft, Cancelled) | (InProgress, Cancelled)
        )
    }

    /// Counts may still be edited while the session is open.
    pub fn allows_counting(self) -> bool {
        matches!(self, Self::Draft | Self::InProgress)
    }
}

/// A full physical inventory count session reconciling system-recorded
/// stock against manually counted stock.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_opnames")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub branch_id: Uuid,
    pub opname_number: String,
    pub opname_date: NaiveDate,
    pub status: String,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub completed_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn status(&self) -> Result<OpnameStatus, strum::ParseError> {
        self.status.parse()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_opname_item::Entity")]
    Items,
}

impl Related<super::stock_opname_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::OpnameStatus::*;
    use rstest::rstest;

    #[rstest]
    #[case(Draft, InProgress, true)]
    #[case(InProgress, Completed, true)]
    #[case(Draft, Completed, false)]
    #[case(Draft, Cancelled, true)]
    #[case(InProgress, Cancelled, true)]
    #[case(Completed, Cancelled, false)]
    #[case(Cancelled, InProgress, false)]
    fn transition_table(
        #[case] from: super::OpnameStatus,
        #[case] to: super::OpnameStatus,
        #[case] legal: bool,
    ) {
        assert_eq!(from.can_transition_to(to), legal);
    }
}
