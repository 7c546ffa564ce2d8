mod common;

use bengkelpos_api::{
    entities::stock_movement::MovementType,
    errors::ServiceError,
    services::inventory::{
        AdjustmentInput, InventoryService, MovementFilter, StockInInput, StockOutInput,
        SummaryFilter,
    },
};
use common::{dec, movements_for, reload_product, seed_product, seed_service_product, setup};
use rust_decimal::Decimal;
use uuid::Uuid;

fn stock_in_input(product_id: Uuid, branch_id: Uuid, quantity: Decimal) -> StockInInput {
    StockInInput {
        branch_id,
        product_id,
        quantity,
        unit_cost: None,
        reference_number: None,
        notes: None,
    }
}

fn stock_out_input(product_id: Uuid, branch_id: Uuid, quantity: Decimal) -> StockOutInput {
    StockOutInput {
        branch_id,
        product_id,
        quantity,
        reference_number: None,
        notes: None,
    }
}

#[tokio::test]
async fn stock_in_pairs_movement_with_stock_update() {
    let ctx = setup().await;
    let service = InventoryService::new(ctx.db.clone(), ctx.events.clone());
    let product = seed_product(&ctx, "OLI-001", "Engine Oil 1L", dec(50)).await;

    let receipt = service
        .stock_in(
            ctx.tenant_id,
            ctx.user_id,
            stock_in_input(product.id, ctx.branch_id, dec(20)),
        )
        .await
        .expect("stock in");

    assert_eq!(receipt.product.stock, dec(70));
    assert_eq!(receipt.movement.quantity, dec(20));
    assert_eq!(receipt.movement.quantity_before, dec(50));
    assert_eq!(receipt.movement.quantity_after, dec(70));
    assert_eq!(receipt.movement.movement_type, "in");
    assert_eq!(receipt.movement.reference_type, "manual");
    assert!(receipt.movement.reference_number.starts_with("IN-"));

    let reloaded = reload_product(&ctx, product.id).await;
    assert_eq!(reloaded.stock, dec(70));
}

#[tokio::test]
async fn stock_out_records_negative_delta() {
    let ctx = setup().await;
    let service = InventoryService::new(ctx.db.clone(), ctx.events.clone());
    let product = seed_product(&ctx, "FLT-001", "Oil Filter", dec(50)).await;

    let receipt = service
        .stock_out(
            ctx.tenant_id,
            ctx.user_id,
            stock_out_input(product.id, ctx.branch_id, dec(5)),
        )
        .await
        .expect("stock out");

    assert_eq!(receipt.movement.quantity, dec(-5));
    assert_eq!(receipt.movement.quantity_before, dec(50));
    assert_eq!(receipt.movement.quantity_after, dec(45));
    assert_eq!(receipt.movement.movement_type, "out");
    assert!(receipt.movement.reference_number.starts_with("OUT-"));
    assert_eq!(reload_product(&ctx, product.id).await.stock, dec(45));
}

#[tokio::test]
async fn stock_out_rejects_insufficient_stock() {
    let ctx = setup().await;
    let service = InventoryService::new(ctx.db.clone(), ctx.events.clone());
    let product = seed_product(&ctx, "BLT-001", "Fan Belt", dec(10)).await;

    let err = service
        .stock_out(
            ctx.tenant_id,
            ctx.user_id,
            stock_out_input(product.id, ctx.branch_id, dec(15)),
        )
        .await
        .expect_err("should reject");

    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // Nothing persisted: stock unchanged, no ledger entry.
    assert_eq!(reload_product(&ctx, product.id).await.stock, dec(10));
    assert!(movements_for(&ctx, product.id).await.is_empty());
}

#[tokio::test]
async fn adjustment_records_signed_difference() {
    let ctx = setup().await;
    let service = InventoryService::new(ctx.db.clone(), ctx.events.clone());
    let product = seed_product(&ctx, "SPK-001", "Spark Plug", dec(50)).await;

    let outcome = service
        .adjust(
            ctx.tenant_id,
            ctx.user_id,
            AdjustmentInput {
                branch_id: ctx.branch_id,
                product_id: product.id,
                new_quantity: dec(42),
                reason: "Damaged units written off".to_string(),
                notes: None,
            },
        )
        .await
        .expect("adjust");

    let movement = outcome.movement.expect("movement recorded");
    assert_eq!(movement.quantity, dec(-8));
    assert_eq!(movement.quantity_after, dec(42));
    assert_eq!(movement.movement_type, "adjustment");
    assert!(movement.reference_number.starts_with("ADJ-"));
    let notes = movement.notes.expect("notes recorded");
    assert!(notes.contains("Reason: Damaged units written off"));
    assert_eq!(outcome.product.stock, dec(42));
    assert_eq!(reload_product(&ctx, product.id).await.stock, dec(42));
}

#[tokio::test]
async fn adjustment_to_current_value_is_a_noop() {
    let ctx = setup().await;
    let service = InventoryService::new(ctx.db.clone(), ctx.events.clone());
    let product = seed_product(&ctx, "SPK-002", "Spark Plug Iridium", dec(50)).await;

    let outcome = service
        .adjust(
            ctx.tenant_id,
            ctx.user_id,
            AdjustmentInput {
                branch_id: ctx.branch_id,
                product_id: product.id,
                new_quantity: dec(50),
                reason: "Recount".to_string(),
                notes: None,
            },
        )
        .await
        .expect("matching count succeeds");

    // Nothing changed and nothing was written to the ledger.
    assert!(outcome.movement.is_none());
    assert_eq!(outcome.product.stock, dec(50));
    assert_eq!(reload_product(&ctx, product.id).await.stock, dec(50));
    assert!(movements_for(&ctx, product.id).await.is_empty());

    // Service products are still not adjustable, even to their current zero.
    let labor = seed_service_product(&ctx, "SVC-003", "Diagnostic Labor").await;
    let err = service
        .adjust(
            ctx.tenant_id,
            ctx.user_id,
            AdjustmentInput {
                branch_id: ctx.branch_id,
                product_id: labor.id,
                new_quantity: Decimal::ZERO,
                reason: "Recount".to_string(),
                notes: None,
            },
        )
        .await
        .expect_err("service products carry no stock");
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn non_positive_quantities_are_rejected() {
    let ctx = setup().await;
    let service = InventoryService::new(ctx.db.clone(), ctx.events.clone());
    let product = seed_product(&ctx, "BRK-001", "Brake Pad", dec(10)).await;

    let err = service
        .stock_in(
            ctx.tenant_id,
            ctx.user_id,
            stock_in_input(product.id, ctx.branch_id, Decimal::ZERO),
        )
        .await
        .expect_err("zero quantity");
    assert!(matches!(err, ServiceError::InvalidQuantity(_)));

    let err = service
        .stock_out(
            ctx.tenant_id,
            ctx.user_id,
            stock_out_input(product.id, ctx.branch_id, dec(-3)),
        )
        .await
        .expect_err("negative quantity");
    assert!(matches!(err, ServiceError::InvalidQuantity(_)));
}

#[tokio::test]
async fn service_products_carry_no_stock() {
    let ctx = setup().await;
    let service = InventoryService::new(ctx.db.clone(), ctx.events.clone());
    let labor = seed_service_product(&ctx, "SVC-001", "Oil Change Labor").await;

    let err = service
        .stock_in(
            ctx.tenant_id,
            ctx.user_id,
            stock_in_input(labor.id, ctx.branch_id, dec(1)),
        )
        .await
        .expect_err("service products are not stockable");

    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn products_are_tenant_scoped() {
    let ctx = setup().await;
    let service = InventoryService::new(ctx.db.clone(), ctx.events.clone());
    let product = seed_product(&ctx, "OLI-002", "Gear Oil", dec(10)).await;

    let other_tenant = Uuid::new_v4();
    let err = service
        .stock_in(
            other_tenant,
            ctx.user_id,
            stock_in_input(product.id, ctx.branch_id, dec(5)),
        )
        .await
        .expect_err("foreign tenant must not see the product");

    assert!(matches!(err, ServiceError::NotFound(_)));
    assert_eq!(reload_product(&ctx, product.id).await.stock, dec(10));
}

#[tokio::test]
async fn movement_history_filters_by_type_and_product() {
    let ctx = setup().await;
    let service = InventoryService::new(ctx.db.clone(), ctx.events.clone());
    let oil = seed_product(&ctx, "OLI-003", "Coolant", dec(50)).await;
    let filter_part = seed_product(&ctx, "FLT-002", "Air Filter", dec(30)).await;

    service
        .stock_in(
            ctx.tenant_id,
            ctx.user_id,
            stock_in_input(oil.id, ctx.branch_id, dec(10)),
        )
        .await
        .expect("stock in oil");
    service
        .stock_out(
            ctx.tenant_id,
            ctx.user_id,
            stock_out_input(oil.id, ctx.branch_id, dec(4)),
        )
        .await
        .expect("stock out oil");
    service
        .stock_in(
            ctx.tenant_id,
            ctx.user_id,
            stock_in_input(filter_part.id, ctx.branch_id, dec(6)),
        )
        .await
        .expect("stock in filter");

    let (all, total) = service
        .list_movements(
            ctx.tenant_id,
            MovementFilter {
                page: 1,
                per_page: 20,
                ..Default::default()
            },
        )
        .await
        .expect("list all");
    assert_eq!(total, 3);
    assert_eq!(all.len(), 3);

    let (outs, total_outs) = service
        .list_movements(
            ctx.tenant_id,
            MovementFilter {
                movement_type: Some(MovementType::Out),
                page: 1,
                per_page: 20,
                ..Default::default()
            },
        )
        .await
        .expect("list outs");
    assert_eq!(total_outs, 1);
    assert_eq!(outs[0].product_id, oil.id);

    let (for_filter_part, _) = service
        .list_movements(
            ctx.tenant_id,
            MovementFilter {
                product_id: Some(filter_part.id),
                page: 1,
                per_page: 20,
                ..Default::default()
            },
        )
        .await
        .expect("list by product");
    assert_eq!(for_filter_part.len(), 1);
    assert_eq!(for_filter_part[0].quantity, dec(6));
}

#[tokio::test]
async fn stock_summary_reports_lifetime_totals() {
    let ctx = setup().await;
    let service = InventoryService::new(ctx.db.clone(), ctx.events.clone());
    let product = seed_product(&ctx, "OLI-004", "ATF Fluid", dec(50)).await;
    seed_service_product(&ctx, "SVC-002", "Tune-Up Labor").await;

    service
        .stock_in(
            ctx.tenant_id,
            ctx.user_id,
            stock_in_input(product.id, ctx.branch_id, dec(20)),
        )
        .await
        .expect("stock in");
    service
        .stock_out(
            ctx.tenant_id,
            ctx.user_id,
            stock_out_input(product.id, ctx.branch_id, dec(10)),
        )
        .await
        .expect("stock out");

    let (rows, total) = service
        .stock_summary(
            ctx.tenant_id,
            SummaryFilter {
                page: 1,
                per_page: 20,
                ..Default::default()
            },
        )
        .await
        .expect("summary");

    // Service products never appear in the stock summary.
    assert_eq!(total, 1);
    let row = &rows[0];
    assert_eq!(row.id, product.id);
    assert_eq!(row.stock, dec(60));
    assert_eq!(row.total_in, dec(20));
    assert_eq!(row.total_out, dec(10));
}

#[tokio::test]
async fn stock_summary_low_stock_filter() {
    let ctx = setup().await;
    let service = InventoryService::new(ctx.db.clone(), ctx.events.clone());
    // min_stock is seeded at 5.
    let low = seed_product(&ctx, "BLT-002", "Timing Belt", dec(3)).await;
    seed_product(&ctx, "BLT-003", "V-Belt", dec(40)).await;

    let (rows, total) = service
        .stock_summary(
            ctx.tenant_id,
            SummaryFilter {
                low_stock: true,
                page: 1,
                per_page: 20,
                ..Default::default()
            },
        )
        .await
        .expect("summary");

    assert_eq!(total, 1);
    assert_eq!(rows[0].id, low.id);
}
