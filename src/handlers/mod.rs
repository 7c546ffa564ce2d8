pub mod common;
pub mod inventory;
pub mod purchase_orders;
pub mod sales;
pub mod stock_opname;

use crate::{
    db::DbPool,
    events::EventSender,
    services::{InventoryService, ProcurementService, SalesService, StockOpnameService},
};
use std::sync::Arc;

/// Container for all domain services, shared through [`crate::AppState`].
#[derive(Clone)]
pub struct AppServices {
    pub inventory: Arc<InventoryService>,
    pub procurement: Arc<ProcurementService>,
    pub stock_opname: Arc<StockOpnameService>,
    pub sales: Arc<SalesService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            inventory: Arc::new(InventoryService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            procurement: Arc::new(ProcurementService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            stock_opname: Arc::new(StockOpnameService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            sales: Arc::new(SalesService::new(db_pool, event_sender)),
        }
    }
}
