use crate::handlers;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::inventory::list_movements,
        handlers::inventory::stock_in,
        handlers::inventory::stock_out,
        handlers::inventory::adjustment,
        handlers::inventory::stock_summary,
        handlers::purchase_orders::list_purchase_orders,
        handlers::purchase_orders::create_purchase_order,
        handlers::purchase_orders::get_purchase_order,
        handlers::purchase_orders::update_purchase_order,
        handlers::purchase_orders::submit_purchase_order,
        handlers::purchase_orders::approve_purchase_order,
        handlers::purchase_orders::receive_purchase_order,
        handlers::purchase_orders::cancel_purchase_order,
        handlers::purchase_orders::delete_purchase_order,
        handlers::stock_opname::list_opnames,
        handlers::stock_opname::create_opname,
        handlers::stock_opname::get_opname,
        handlers::stock_opname::start_opname,
        handlers::stock_opname::update_opname_items,
        handlers::stock_opname::complete_opname,
        handlers::stock_opname::cancel_opname,
        handlers::stock_opname::delete_opname,
        handlers::sales::list_sales,
        handlers::sales::create_sale,
        handlers::sales::get_sale,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        handlers::inventory::StockInRequest,
        handlers::inventory::StockOutRequest,
        handlers::inventory::AdjustmentRequest,
        handlers::purchase_orders::CreatePurchaseOrderRequest,
        handlers::purchase_orders::UpdatePurchaseOrderRequest,
        handlers::purchase_orders::PurchaseOrderItemRequest,
        handlers::purchase_orders::ReceivePurchaseOrderRequest,
        handlers::purchase_orders::ReceiveItemRequest,
        handlers::stock_opname::CreateOpnameRequest,
        handlers::stock_opname::OpnameCountRequest,
        handlers::stock_opname::UpdateOpnameItemsRequest,
        handlers::sales::CreateSaleRequest,
        handlers::sales::SaleItemRequest,
    )),
    tags(
        (name = "inventory", description = "Manual stock operations and movement history"),
        (name = "purchase-orders", description = "Purchase order lifecycle and receiving"),
        (name = "stock-opnames", description = "Physical inventory count sessions"),
        (name = "sales", description = "Point-of-sale transactions")
    ),
    info(
        title = "BengkelPOS API",
        description = "Multi-tenant workshop POS backend with ledgered stock bookkeeping"
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
