mod common;

use bengkelpos_api::{
    entities::sale::PaymentMethod,
    services::inventory::{InventoryService, StockInInput},
    services::sales::{CreateSaleInput, SaleItemInput, SalesService},
    services::stock_opname::{CreateOpnameInput, OpnameCountInput, StockOpnameService},
};
use chrono::Utc;
use common::{dec, movements_for, reload_product, seed_product, setup};
use rust_decimal::Decimal;

/// Runs one product through all three movement producers in sequence and
/// checks that the recorded history replays to the live stock value:
/// 50 on hand, +20 manual receipt, -5 sold, then a count session closing
/// at 60.
#[tokio::test]
async fn movement_history_replays_to_current_stock() {
    let ctx = setup().await;
    let inventory = InventoryService::new(ctx.db.clone(), ctx.events.clone());
    let sales = SalesService::new(ctx.db.clone(), ctx.events.clone());
    let opname = StockOpnameService::new(ctx.db.clone(), ctx.events.clone());
    let oil = seed_product(&ctx, "OLI-001", "Engine Oil 1L", dec(50)).await;

    inventory
        .stock_in(
            ctx.tenant_id,
            ctx.user_id,
            StockInInput {
                branch_id: ctx.branch_id,
                product_id: oil.id,
                quantity: dec(20),
                unit_cost: None,
                reference_number: None,
                notes: None,
            },
        )
        .await
        .expect("stock in");
    assert_eq!(reload_product(&ctx, oil.id).await.stock, dec(70));

    sales
        .create_sale(
            ctx.tenant_id,
            ctx.user_id,
            CreateSaleInput {
                branch_id: ctx.branch_id,
                customer_id: None,
                vehicle_id: None,
                items: vec![SaleItemInput {
                    product_id: oil.id,
                    quantity: dec(5),
                    unit_price: dec(50_000),
                }],
                payment_method: PaymentMethod::Cash,
                discount_percent: Decimal::ZERO,
                tax_percent: Decimal::ZERO,
                notes: None,
            },
        )
        .await
        .expect("sale");
    assert_eq!(reload_product(&ctx, oil.id).await.stock, dec(65));

    let sheet = opname
        .create(
            ctx.tenant_id,
            ctx.user_id,
            CreateOpnameInput {
                branch_id: ctx.branch_id,
                opname_date: Utc::now().date_naive(),
                notes: None,
            },
        )
        .await
        .expect("create opname");
    opname
        .start(ctx.tenant_id, sheet.opname.id)
        .await
        .expect("start");
    opname
        .update_items(
            ctx.tenant_id,
            sheet.opname.id,
            vec![OpnameCountInput {
                item_id: sheet.items[0].id,
                physical_quantity: dec(60),
                notes: None,
            }],
        )
        .await
        .expect("count");
    opname
        .complete(ctx.tenant_id, ctx.user_id, sheet.opname.id)
        .await
        .expect("complete");

    let product = reload_product(&ctx, oil.id).await;
    assert_eq!(product.stock, dec(60));

    let movements = movements_for(&ctx, oil.id).await;
    assert_eq!(movements.len(), 3);

    let expected = [
        ("in", "manual", dec(20)),
        ("out", "sale", dec(-5)),
        ("adjustment", "opname", dec(-5)),
    ];
    for (movement, (movement_type, reference_type, quantity)) in movements.iter().zip(expected) {
        assert_eq!(movement.movement_type, movement_type);
        assert_eq!(movement.reference_type, reference_type);
        assert_eq!(movement.quantity, quantity);
    }

    // Each row is internally consistent and chains onto the previous one.
    let mut running = dec(50);
    for movement in &movements {
        assert_eq!(movement.quantity_before, running);
        assert_eq!(
            movement.quantity_after,
            movement.quantity_before + movement.quantity
        );
        running = movement.quantity_after;
    }
    assert_eq!(running, product.stock);

    // Folding the deltas over the initial quantity reconstructs stock.
    let replayed = movements
        .iter()
        .fold(dec(50), |stock, movement| stock + movement.quantity);
    assert_eq!(replayed, product.stock);
}
