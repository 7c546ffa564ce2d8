mod common;

use bengkelpos_api::{
    entities::purchase_order::PurchaseOrderStatus,
    errors::ServiceError,
    services::procurement::{
        CreatePurchaseOrderInput, ProcurementService, PurchaseOrderFilter, PurchaseOrderItemInput,
        ReceiveInput, ReceiveItemInput, UpdatePurchaseOrderInput,
    },
};
use chrono::Utc;
use common::{dec, movements_for, reload_product, seed_product, setup, today_period, TestCtx};
use rust_decimal::Decimal;
use uuid::Uuid;

fn item(product_id: Uuid, quantity: i64, unit_price: i64) -> PurchaseOrderItemInput {
    PurchaseOrderItemInput {
        product_id,
        quantity: dec(quantity),
        unit_price: dec(unit_price),
        discount: Decimal::ZERO,
    }
}

fn order_input(ctx: &TestCtx, items: Vec<PurchaseOrderItemInput>) -> CreatePurchaseOrderInput {
    CreatePurchaseOrderInput {
        branch_id: ctx.branch_id,
        supplier_id: Uuid::new_v4(),
        order_date: Utc::now().date_naive(),
        expected_date: None,
        discount: Decimal::ZERO,
        tax: Decimal::ZERO,
        notes: None,
        items,
    }
}

fn receive(pairs: &[(Uuid, i64)]) -> ReceiveInput {
    ReceiveInput {
        items: pairs
            .iter()
            .map(|(item_id, qty)| ReceiveItemInput {
                item_id: *item_id,
                received_quantity: dec(*qty),
            })
            .collect(),
    }
}

#[tokio::test]
async fn create_computes_totals_and_numbers_sequentially() {
    let ctx = setup().await;
    let service = ProcurementService::new(ctx.db.clone(), ctx.events.clone());
    let oil = seed_product(&ctx, "OLI-001", "Engine Oil 1L", dec(0)).await;
    let filter = seed_product(&ctx, "FLT-001", "Oil Filter", dec(0)).await;

    let first = service
        .create(
            ctx.tenant_id,
            ctx.user_id,
            order_input(&ctx, vec![item(oil.id, 10, 1_000), item(filter.id, 4, 2_500)]),
        )
        .await
        .expect("create order");

    assert_eq!(first.order.status, "draft");
    assert_eq!(first.order.subtotal, dec(20_000));
    assert_eq!(first.order.total, dec(20_000));
    assert_eq!(first.items.len(), 2);
    assert_eq!(
        first.order.po_number,
        format!("PO-{}-00001", today_period())
    );

    let second = service
        .create(
            ctx.tenant_id,
            ctx.user_id,
            order_input(&ctx, vec![item(oil.id, 1, 1_000)]),
        )
        .await
        .expect("create second order");
    assert_eq!(
        second.order.po_number,
        format!("PO-{}-00002", today_period())
    );
}

#[tokio::test]
async fn header_discount_and_tax_feed_the_total() {
    let ctx = setup().await;
    let service = ProcurementService::new(ctx.db.clone(), ctx.events.clone());
    let oil = seed_product(&ctx, "OLI-002", "Gear Oil", dec(0)).await;

    let mut input = order_input(&ctx, vec![item(oil.id, 10, 1_000)]);
    input.discount = dec(500);
    input.tax = dec(1_100);

    let detail = service
        .create(ctx.tenant_id, ctx.user_id, input)
        .await
        .expect("create order");

    assert_eq!(detail.order.subtotal, dec(10_000));
    assert_eq!(detail.order.total, dec(10_600));
}

#[tokio::test]
async fn only_drafts_can_be_edited_or_deleted() {
    let ctx = setup().await;
    let service = ProcurementService::new(ctx.db.clone(), ctx.events.clone());
    let oil = seed_product(&ctx, "OLI-003", "Coolant", dec(0)).await;

    let detail = service
        .create(
            ctx.tenant_id,
            ctx.user_id,
            order_input(&ctx, vec![item(oil.id, 5, 1_000)]),
        )
        .await
        .expect("create order");

    service
        .submit(ctx.tenant_id, detail.order.id)
        .await
        .expect("submit");

    let update = UpdatePurchaseOrderInput {
        supplier_id: detail.order.supplier_id,
        order_date: detail.order.order_date,
        expected_date: None,
        discount: Decimal::ZERO,
        tax: Decimal::ZERO,
        notes: None,
        items: vec![item(oil.id, 8, 1_000)],
    };
    let err = service
        .update(ctx.tenant_id, detail.order.id, update)
        .await
        .expect_err("pending orders are immutable");
    assert!(matches!(err, ServiceError::InvalidStateTransition(_)));

    let err = service
        .delete(ctx.tenant_id, detail.order.id)
        .await
        .expect_err("pending orders cannot be deleted");
    assert!(matches!(err, ServiceError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn delete_removes_draft_and_items() {
    let ctx = setup().await;
    let service = ProcurementService::new(ctx.db.clone(), ctx.events.clone());
    let oil = seed_product(&ctx, "OLI-004", "ATF Fluid", dec(0)).await;

    let detail = service
        .create(
            ctx.tenant_id,
            ctx.user_id,
            order_input(&ctx, vec![item(oil.id, 5, 1_000)]),
        )
        .await
        .expect("create order");

    service
        .delete(ctx.tenant_id, detail.order.id)
        .await
        .expect("delete draft");

    let err = service
        .get(ctx.tenant_id, detail.order.id)
        .await
        .expect_err("order is gone");
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn receiving_requires_an_outstanding_order() {
    let ctx = setup().await;
    let service = ProcurementService::new(ctx.db.clone(), ctx.events.clone());
    let oil = seed_product(&ctx, "OLI-005", "Brake Fluid", dec(0)).await;

    let detail = service
        .create(
            ctx.tenant_id,
            ctx.user_id,
            order_input(&ctx, vec![item(oil.id, 5, 1_000)]),
        )
        .await
        .expect("create order");

    let err = service
        .receive(
            ctx.tenant_id,
            ctx.user_id,
            detail.order.id,
            receive(&[(detail.items[0].id, 5)]),
        )
        .await
        .expect_err("drafts cannot receive");
    assert!(matches!(err, ServiceError::InvalidStateTransition(_)));
    assert_eq!(reload_product(&ctx, oil.id).await.stock, dec(0));
}

#[tokio::test]
async fn partial_then_full_receipt_moves_status_and_stock() {
    let ctx = setup().await;
    let service = ProcurementService::new(ctx.db.clone(), ctx.events.clone());
    let oil = seed_product(&ctx, "OLI-006", "Engine Oil 4L", dec(0)).await;

    let detail = service
        .create(
            ctx.tenant_id,
            ctx.user_id,
            order_input(&ctx, vec![item(oil.id, 10, 1_000)]),
        )
        .await
        .expect("create order");
    service
        .submit(ctx.tenant_id, detail.order.id)
        .await
        .expect("submit");

    let after_first = service
        .receive(
            ctx.tenant_id,
            ctx.user_id,
            detail.order.id,
            receive(&[(detail.items[0].id, 4)]),
        )
        .await
        .expect("first receipt");
    assert_eq!(after_first.order.status, "partial");
    assert_eq!(after_first.order.received_date, None);
    assert_eq!(reload_product(&ctx, oil.id).await.stock, dec(4));

    let after_second = service
        .receive(
            ctx.tenant_id,
            ctx.user_id,
            detail.order.id,
            receive(&[(detail.items[0].id, 6)]),
        )
        .await
        .expect("second receipt");
    assert_eq!(after_second.order.status, "received");
    assert!(after_second.order.received_date.is_some());
    assert_eq!(reload_product(&ctx, oil.id).await.stock, dec(10));

    // Each receipt wrote one ledger entry tied to the PO.
    let movements = movements_for(&ctx, oil.id).await;
    assert_eq!(movements.len(), 2);
    for movement in &movements {
        assert_eq!(movement.movement_type, "in");
        assert_eq!(movement.reference_type, "purchase");
        assert_eq!(movement.reference_id, Some(detail.order.id));
        assert_eq!(movement.reference_number, detail.order.po_number);
        assert_eq!(movement.unit_cost, Some(dec(1_000)));
    }
    assert_eq!(movements[0].quantity, dec(4));
    assert_eq!(movements[1].quantity, dec(6));
}

#[tokio::test]
async fn over_delivery_is_clamped_to_remaining() {
    let ctx = setup().await;
    let service = ProcurementService::new(ctx.db.clone(), ctx.events.clone());
    let oil = seed_product(&ctx, "OLI-007", "Power Steering Fluid", dec(0)).await;

    let detail = service
        .create(
            ctx.tenant_id,
            ctx.user_id,
            order_input(&ctx, vec![item(oil.id, 10, 1_000)]),
        )
        .await
        .expect("create order");
    service
        .submit(ctx.tenant_id, detail.order.id)
        .await
        .expect("submit");

    let after = service
        .receive(
            ctx.tenant_id,
            ctx.user_id,
            detail.order.id,
            receive(&[(detail.items[0].id, 25)]),
        )
        .await
        .expect("receive over-delivery");

    assert_eq!(after.order.status, "received");
    assert_eq!(after.items[0].received_quantity, dec(10));
    assert_eq!(reload_product(&ctx, oil.id).await.stock, dec(10));
}

#[tokio::test]
async fn refilled_lines_add_nothing_on_repeat_receipts() {
    let ctx = setup().await;
    let service = ProcurementService::new(ctx.db.clone(), ctx.events.clone());
    let oil = seed_product(&ctx, "OLI-008", "Diesel Oil", dec(0)).await;
    let filter = seed_product(&ctx, "FLT-002", "Fuel Filter", dec(0)).await;

    let detail = service
        .create(
            ctx.tenant_id,
            ctx.user_id,
            order_input(&ctx, vec![item(oil.id, 10, 1_000), item(filter.id, 5, 2_000)]),
        )
        .await
        .expect("create order");
    service
        .submit(ctx.tenant_id, detail.order.id)
        .await
        .expect("submit");

    let oil_line = detail
        .items
        .iter()
        .find(|i| i.product_id == oil.id)
        .expect("oil line");
    let filter_line = detail
        .items
        .iter()
        .find(|i| i.product_id == filter.id)
        .expect("filter line");

    let after_first = service
        .receive(
            ctx.tenant_id,
            ctx.user_id,
            detail.order.id,
            receive(&[(oil_line.id, 10)]),
        )
        .await
        .expect("receive oil line in full");
    assert_eq!(after_first.order.status, "partial");

    // Re-sending the filled oil line clamps to zero and is skipped; only
    // the filter line lands.
    let after_second = service
        .receive(
            ctx.tenant_id,
            ctx.user_id,
            detail.order.id,
            receive(&[(oil_line.id, 4), (filter_line.id, 5)]),
        )
        .await
        .expect("receive remainder");

    assert_eq!(after_second.order.status, "received");
    assert_eq!(reload_product(&ctx, oil.id).await.stock, dec(10));
    assert_eq!(reload_product(&ctx, filter.id).await.stock, dec(5));
    assert_eq!(movements_for(&ctx, oil.id).await.len(), 1);
}

#[tokio::test]
async fn foreign_line_items_are_ignored() {
    let ctx = setup().await;
    let service = ProcurementService::new(ctx.db.clone(), ctx.events.clone());
    let oil = seed_product(&ctx, "OLI-009", "2T Oil", dec(0)).await;

    let detail = service
        .create(
            ctx.tenant_id,
            ctx.user_id,
            order_input(&ctx, vec![item(oil.id, 10, 1_000)]),
        )
        .await
        .expect("create order");
    service
        .submit(ctx.tenant_id, detail.order.id)
        .await
        .expect("submit");

    let after = service
        .receive(
            ctx.tenant_id,
            ctx.user_id,
            detail.order.id,
            receive(&[(Uuid::new_v4(), 10)]),
        )
        .await
        .expect("receipt with only foreign lines");

    assert_eq!(after.order.status, "pending");
    assert_eq!(reload_product(&ctx, oil.id).await.stock, dec(0));
    assert!(movements_for(&ctx, oil.id).await.is_empty());
}

#[tokio::test]
async fn approval_marks_the_order_without_changing_status() {
    let ctx = setup().await;
    let service = ProcurementService::new(ctx.db.clone(), ctx.events.clone());
    let oil = seed_product(&ctx, "OLI-010", "Chain Lube", dec(0)).await;

    let detail = service
        .create(
            ctx.tenant_id,
            ctx.user_id,
            order_input(&ctx, vec![item(oil.id, 5, 1_000)]),
        )
        .await
        .expect("create order");

    let err = service
        .approve(ctx.tenant_id, ctx.user_id, detail.order.id)
        .await
        .expect_err("drafts cannot be approved");
    assert!(matches!(err, ServiceError::InvalidStateTransition(_)));

    service
        .submit(ctx.tenant_id, detail.order.id)
        .await
        .expect("submit");
    let approver = Uuid::new_v4();
    let approved = service
        .approve(ctx.tenant_id, approver, detail.order.id)
        .await
        .expect("approve");

    assert_eq!(approved.status, "pending");
    assert_eq!(approved.approved_by, Some(approver));
    assert!(approved.approved_at.is_some());
}

#[tokio::test]
async fn cancel_follows_the_transition_table() {
    let ctx = setup().await;
    let service = ProcurementService::new(ctx.db.clone(), ctx.events.clone());
    let oil = seed_product(&ctx, "OLI-011", "Grease", dec(0)).await;

    let detail = service
        .create(
            ctx.tenant_id,
            ctx.user_id,
            order_input(&ctx, vec![item(oil.id, 5, 1_000)]),
        )
        .await
        .expect("create order");
    service
        .submit(ctx.tenant_id, detail.order.id)
        .await
        .expect("submit");
    service
        .receive(
            ctx.tenant_id,
            ctx.user_id,
            detail.order.id,
            receive(&[(detail.items[0].id, 5)]),
        )
        .await
        .expect("receive in full");

    let err = service
        .cancel(ctx.tenant_id, detail.order.id)
        .await
        .expect_err("received orders cannot be cancelled");
    assert!(matches!(err, ServiceError::InvalidStateTransition(_)));

    let other = service
        .create(
            ctx.tenant_id,
            ctx.user_id,
            order_input(&ctx, vec![item(oil.id, 5, 1_000)]),
        )
        .await
        .expect("create second order");
    let cancelled = service
        .cancel(ctx.tenant_id, other.order.id)
        .await
        .expect("cancel draft");
    assert_eq!(cancelled.status, "cancelled");
}

#[tokio::test]
async fn input_validation_rejects_bad_orders() {
    let ctx = setup().await;
    let service = ProcurementService::new(ctx.db.clone(), ctx.events.clone());
    let oil = seed_product(&ctx, "OLI-012", "Radiator Flush", dec(0)).await;

    let err = service
        .create(ctx.tenant_id, ctx.user_id, order_input(&ctx, vec![]))
        .await
        .expect_err("empty item list");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    let mut backdated = order_input(&ctx, vec![item(oil.id, 5, 1_000)]);
    backdated.expected_date = Some(backdated.order_date.pred_opt().expect("previous day"));
    let err = service
        .create(ctx.tenant_id, ctx.user_id, backdated)
        .await
        .expect_err("expected date before order date");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    let err = service
        .create(
            ctx.tenant_id,
            ctx.user_id,
            order_input(&ctx, vec![item(oil.id, 0, 1_000)]),
        )
        .await
        .expect_err("zero quantity line");
    assert!(matches!(err, ServiceError::InvalidQuantity(_)));
}

#[tokio::test]
async fn list_filters_by_status() {
    let ctx = setup().await;
    let service = ProcurementService::new(ctx.db.clone(), ctx.events.clone());
    let oil = seed_product(&ctx, "OLI-013", "Carb Cleaner", dec(0)).await;

    let draft = service
        .create(
            ctx.tenant_id,
            ctx.user_id,
            order_input(&ctx, vec![item(oil.id, 5, 1_000)]),
        )
        .await
        .expect("create draft");
    let submitted = service
        .create(
            ctx.tenant_id,
            ctx.user_id,
            order_input(&ctx, vec![item(oil.id, 2, 1_000)]),
        )
        .await
        .expect("create second");
    service
        .submit(ctx.tenant_id, submitted.order.id)
        .await
        .expect("submit");

    let (drafts, total) = service
        .list(
            ctx.tenant_id,
            PurchaseOrderFilter {
                status: Some(PurchaseOrderStatus::Draft),
                page: 1,
                per_page: 20,
                ..Default::default()
            },
        )
        .await
        .expect("list drafts");

    assert_eq!(total, 1);
    assert_eq!(drafts[0].id, draft.order.id);
}
