pub mod document_counter;
pub mod product;
pub mod purchase_order;
pub mod purchase_order_item;
pub mod sale;
pub mod sale_item;
pub mod stock_movement;
pub mod stock_opname;
pub mod stock_opname_item;
