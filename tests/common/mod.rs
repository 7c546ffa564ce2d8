#![allow(dead_code)]

use std::sync::Arc;

use bengkelpos_api::{
    db::DbPool,
    entities::product::{self, Entity as Product, ProductType},
    entities::stock_movement::{self, Entity as StockMovement},
    events::{Event, EventSender},
    migrator::Migrator,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use sea_orm_migration::MigratorTrait;
use tokio::sync::mpsc;
use uuid::Uuid;

/// One isolated database plus the ambient identifiers every service call
/// needs. Each test gets its own in-memory database, so tests never see
/// each other's rows.
pub struct TestCtx {
    pub db: Arc<DbPool>,
    pub events: Arc<EventSender>,
    pub tenant_id: Uuid,
    pub branch_id: Uuid,
    pub user_id: Uuid,
    // Keep the receiver alive so post-commit event sends succeed.
    _rx: mpsc::Receiver<Event>,
}

pub async fn setup() -> TestCtx {
    // A uniquely named shared-cache memory database survives pool
    // reconnects while staying private to this test.
    let url = format!(
        "sqlite:file:{}?mode=memory&cache=shared",
        Uuid::new_v4().simple()
    );
    let mut opt = ConnectOptions::new(url);
    opt.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(opt).await.expect("connect to sqlite");
    Migrator::up(&db, None).await.expect("run migrations");

    let (tx, rx) = mpsc::channel(100);
    TestCtx {
        db: Arc::new(db),
        events: Arc::new(EventSender::new(tx)),
        tenant_id: Uuid::new_v4(),
        branch_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        _rx: rx,
    }
}

pub fn dec(value: i64) -> Decimal {
    Decimal::from(value)
}

pub async fn seed_product(ctx: &TestCtx, sku: &str, name: &str, stock: Decimal) -> product::Model {
    seed_product_with(ctx, sku, name, stock, ProductType::Physical, true).await
}

pub async fn seed_service_product(ctx: &TestCtx, sku: &str, name: &str) -> product::Model {
    seed_product_with(ctx, sku, name, Decimal::ZERO, ProductType::Service, true).await
}

pub async fn seed_product_with(
    ctx: &TestCtx,
    sku: &str,
    name: &str,
    stock: Decimal,
    product_type: ProductType,
    is_active: bool,
) -> product::Model {
    let now = Utc::now();
    product::ActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(ctx.tenant_id),
        branch_id: Set(Some(ctx.branch_id)),
        category_id: Set(None),
        supplier_id: Set(None),
        sku: Set(sku.to_string()),
        barcode: Set(None),
        name: Set(name.to_string()),
        description: Set(None),
        product_type: Set(product_type.to_string()),
        unit: Set("pcs".to_string()),
        min_stock: Set(dec(5)),
        stock: Set(stock),
        purchase_price: Set(dec(10_000)),
        selling_price: Set(dec(15_000)),
        is_active: Set(is_active),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(ctx.db.as_ref())
    .await
    .expect("seed product")
}

pub async fn reload_product(ctx: &TestCtx, product_id: Uuid) -> product::Model {
    Product::find_by_id(product_id)
        .one(ctx.db.as_ref())
        .await
        .expect("query product")
        .expect("product exists")
}

/// All ledger entries for a product, oldest first.
pub async fn movements_for(ctx: &TestCtx, product_id: Uuid) -> Vec<stock_movement::Model> {
    StockMovement::find()
        .filter(stock_movement::Column::ProductId.eq(product_id))
        .order_by_asc(stock_movement::Column::CreatedAt)
        .all(ctx.db.as_ref())
        .await
        .expect("query movements")
}

pub async fn movement_count(ctx: &TestCtx) -> u64 {
    use sea_orm::PaginatorTrait;

    StockMovement::find()
        .filter(stock_movement::Column::TenantId.eq(ctx.tenant_id))
        .count(ctx.db.as_ref())
        .await
        .expect("count movements")
}

/// Today's date formatted the way document numbers embed it.
pub fn today_period() -> String {
    Utc::now().date_naive().format("%Y%m%d").to_string()
}
