pub mod inventory;
pub mod ledger;
pub mod numbering;
pub mod procurement;
pub mod sales;
pub mod stock_opname;

pub use inventory::InventoryService;
pub use procurement::ProcurementService;
pub use sales::SalesService;
pub use stock_opname::StockOpnameService;
