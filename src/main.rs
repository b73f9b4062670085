use futures_util::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use storefront_core::config::AppConfig;
use storefront_core::domain::catalog::{
    CatalogCommandHandler, Category, CreateProduct, ImageInput, ProductCommand, VariantInput,
};
use storefront_core::domain::ids::{CategoryId, PurchaserId, VariantId};
use storefront_core::domain::order::{
    OrderLineRequest, OrderPlacementService, OrderService, OrderStatus, PlaceOrderRequest,
    ShippingAddress,
};
use storefront_core::event_sourcing::outbox::{LoggingPublisher, OutboxDispatcher};
use storefront_core::metrics::Metrics;
use storefront_core::store::InMemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    // log_filter already carries RUST_LOG when it is set
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting storefront core demo");

    // === 1. Wire the in-memory store and services ===
    let metrics = Arc::new(Metrics::new()?);
    let store = InMemoryStore::new();

    let category_id = CategoryId::new();
    store
        .insert_category(Category {
            id: category_id,
            name: "Shirts".into(),
            is_active: true,
        })
        .await;

    let catalog = CatalogCommandHandler::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
    );
    let placement = OrderPlacementService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        config.placement.clone(),
        metrics.clone(),
    );
    let orders = OrderService::new(Arc::new(store.clone()), Arc::new(store.clone()));

    // === 2. Variation types ===
    let color = catalog.create_variation_type("Color", "Color").await?;
    let red = catalog.add_option(color, "red", "Red", 0).await?;
    let blue = catalog.add_option(color, "blue", "Blue", 1).await?;
    let size = catalog.create_variation_type("Size", "Size").await?;
    let small = catalog.add_option(size, "s", "Small", 0).await?;

    let ten = Decimal::new(1000, 2);

    // === 3. Scenario A: two colour variants at the base price ===
    let shirt_id = catalog
        .create_product(
            CreateProduct {
                name: "Linen Shirt".into(),
                description: Some("Breathable summer shirt".into()),
                base_price: ten,
                category_id,
                variation_type_ids: vec![color],
                variants: vec![
                    VariantInput::new("A-RED", "Red").with_option(color, red).with_stock(3),
                    VariantInput::new("A-BLUE", "Blue").with_option(color, blue).with_stock(4),
                ],
                images: vec![ImageInput::new("https://cdn.example/linen-shirt.jpg").main()],
            },
            Uuid::new_v4(),
        )
        .await?;

    let shirt = catalog.get_product(shirt_id).await?;
    for variant in shirt.variants() {
        tracing::info!(
            sku = %variant.sku(),
            price = %variant.effective_price(shirt.base_price()),
            stock = variant.stock_quantity(),
            "Scenario A: variant created"
        );
    }

    // === 4. Scenario B: duplicate SKU inside one product ===
    let duplicate = catalog
        .create_product(
            CreateProduct {
                name: "Twin Shirt".into(),
                description: None,
                base_price: ten,
                category_id,
                variation_type_ids: vec![color],
                variants: vec![
                    VariantInput::new("T-RED", "Red").with_option(color, red),
                    VariantInput::new("t-red", "Blue").with_option(color, blue),
                ],
                images: vec![],
            },
            Uuid::new_v4(),
        )
        .await;
    report("Scenario B", duplicate.map(|_| ()));

    // === 5. Scenario C: variant missing the Size option ===
    let incomplete = catalog
        .create_product(
            CreateProduct {
                name: "Sized Shirt".into(),
                description: None,
                base_price: ten,
                category_id,
                variation_type_ids: vec![color, size],
                variants: vec![
                    VariantInput::new("S-RED", "Red").with_option(color, red),
                    VariantInput::new("S-RED-S", "Red Small")
                        .with_option(color, red)
                        .with_option(size, small),
                ],
                images: vec![],
            },
            Uuid::new_v4(),
        )
        .await;
    report("Scenario C", incomplete.map(|_| ()));

    let red_variant = shirt
        .variant_by_sku("A-RED")
        .map(|v| v.id())
        .ok_or_else(|| anyhow::anyhow!("A-RED missing from created product"))?;
    let purchaser = PurchaserId::new();
    let cancel = CancellationToken::new();

    // === 6. Scenario D: order more than is in stock ===
    let oversized = placement
        .place_order(&order_request(purchaser, red_variant, 5), &cancel)
        .await;
    report("Scenario D", oversized.map(|_| ()));

    // === 7. Scenario E: restock, order, then change the price ===
    catalog
        .handle(
            shirt_id,
            ProductCommand::UpdateVariantStock {
                variant_id: red_variant,
                quantity: 5,
            },
            Uuid::new_v4(),
        )
        .await?;
    let order_id = placement
        .place_order(&order_request(purchaser, red_variant, 2), &cancel)
        .await?;
    catalog
        .handle(
            shirt_id,
            ProductCommand::UpdateBasePrice {
                price: Decimal::new(1500, 2),
            },
            Uuid::new_v4(),
        )
        .await?;

    let order = orders.get(order_id).await?;
    let remaining = catalog
        .get_product(shirt_id)
        .await?
        .variant(red_variant)
        .map(|v| v.stock_quantity());
    tracing::info!(
        order_id = %order_id,
        unit_price = ?order.items().first().map(|i| i.unit_price),
        total = %order.total_amount(),
        remaining_stock = ?remaining,
        "Scenario E: order keeps its price snapshot"
    );

    // === 8. Two buyers race for the last unit ===
    let mug_id = catalog
        .create_product(
            CreateProduct {
                name: "Last Mug".into(),
                description: None,
                base_price: Decimal::new(650, 2),
                category_id,
                variation_type_ids: vec![],
                variants: vec![VariantInput::new("MUG-1", "Default").with_stock(1)],
                images: vec![],
            },
            Uuid::new_v4(),
        )
        .await?;
    let mug_variant = catalog
        .get_product(mug_id)
        .await?
        .variant_by_sku("MUG-1")
        .map(|v| v.id())
        .ok_or_else(|| anyhow::anyhow!("MUG-1 missing from created product"))?;

    let racers = [
        order_request(PurchaserId::new(), mug_variant, 1),
        order_request(PurchaserId::new(), mug_variant, 1),
    ];
    let results = join_all(racers.iter().map(|r| placement.place_order(r, &cancel))).await;
    for (idx, result) in results.into_iter().enumerate() {
        report(&format!("Race buyer {}", idx + 1), result.map(|_| ()));
    }

    // === 9. Order status ===
    orders
        .change_status(order_id, OrderStatus::Processing, Uuid::new_v4())
        .await?;
    let regression = orders
        .change_status(order_id, OrderStatus::Pending, Uuid::new_v4())
        .await;
    report("Status regression", regression.map(|_| ()));

    // === 10. Publish the outbox ===
    let dispatcher = OutboxDispatcher::new(
        Arc::new(store.clone()),
        Arc::new(LoggingPublisher),
        &config.outbox,
        metrics.clone(),
    );
    let dispatched = dispatcher.dispatch_pending().await?;
    tracing::info!(
        published = dispatched.published,
        failed = dispatched.failed,
        deferred = dispatched.deferred,
        "Outbox dispatched"
    );

    println!("{}", metrics.render()?);
    tracing::info!("Demo complete");
    Ok(())
}

fn order_request(purchaser_id: PurchaserId, variant_id: VariantId, quantity: i64) -> PlaceOrderRequest {
    PlaceOrderRequest {
        purchaser_id,
        shipping_address: ShippingAddress {
            recipient_name: "Ada Lovelace".into(),
            phone: "+44 20 0000 0000".into(),
            city: "London".into(),
            district: "Marylebone".into(),
            neighborhood: "St John's Wood".into(),
            address_line: "12 Analytical Row".into(),
            label: "Home".into(),
        },
        lines: vec![OrderLineRequest {
            variant_id,
            quantity,
        }],
    }
}

fn report(step: &str, outcome: Result<(), storefront_core::errors::AppError>) {
    match outcome {
        Ok(()) => tracing::info!(step = step, "Succeeded"),
        Err(e) => tracing::info!(step = step, kind = ?e.kind(), error = %e, "Rejected"),
    }
}
