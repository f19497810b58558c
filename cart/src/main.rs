//! Command-line walkthrough of the cart.
//!
//! Opens the cart against the configured backend, adds two catalog records,
//! adjusts quantities through a line row, drafts an order and clears the
//! cart as a successful checkout would.
//!
//! ```text
//! RUST_LOG=pharmacart=debug PHARMACART_PERSISTENCE=file cargo run -p pharmacart
//! ```

use anyhow::Context;
use pharmacart::{
    CartConfig, CartStore, CartSummary, CatalogCandidate, LineItemRow, OrderDraft, OrderEntry,
};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_summary(title: &str, summary: &CartSummary) {
    println!("\n{title} ({} lines, {} units)", summary.line_count(), summary.unit_count);
    for line in &summary.lines {
        println!(
            "  {:>3} × {:<28} {:>10}",
            line.quantity,
            line.label,
            pharmacart::consumers::format_amount(line.line_total)
        );
    }
    println!("  Total: {}", summary.formatted_total());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pharmacart=info,pharmacart_runtime=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Pharmacart ===");

    let config = CartConfig::from_env().context("invalid cart configuration")?;
    let cart = CartStore::open(&config).await.context("failed to open cart")?;
    cart.wait_until_ready(Duration::from_secs(5))
        .await
        .context("cart did not finish hydrating")?;

    print_summary("Restored cart", &CartSummary::load(&cart).await);

    let paracetamol = CatalogCandidate {
        id: Some("med-1001".to_string()),
        sku_label: Some("PCM500".to_string()),
        generic_name: Some("Paracetamol".to_string()),
        category: Some("Tablet".to_string()),
        dosage: Some("500mg".to_string()),
        price: Some(Decimal::new(1250, 2)),
        ..CatalogCandidate::default()
    };
    let ors = CatalogCandidate {
        id: Some("med-2002".to_string()),
        sku_label: Some("ORS-21".to_string()),
        category: Some("Sachet".to_string()),
        dosage: Some("21g".to_string()),
        price: Some(Decimal::new(2100, 2)),
        ..CatalogCandidate::default()
    };

    let mut entry = OrderEntry::new(cart.clone(), paracetamol);
    entry.increase();
    let added = entry.submit().await?;
    println!("\nAdded {} × {}", added.quantity, added.display_name);

    let added = OrderEntry::new(cart.clone(), ors).submit().await?;
    println!("Added {} × {}", added.quantity, added.display_name);

    let row = LineItemRow::new(cart.clone(), added.id.clone());
    row.increment().await?;
    print_summary("After increment", &CartSummary::load(&cart).await);

    row.decrement().await?;
    row.decrement().await?;
    print_summary("After decrementing to zero", &CartSummary::load(&cart).await);

    let draft = OrderDraft::from_store(&cart, "221B Baker Street, London").await?;
    println!("\nOrder draft:\n{}", serde_json::to_string_pretty(&draft)?);

    cart.clear().await?;
    println!("\nCart cleared after checkout");

    cart.shutdown().await.context("outstanding cart writes did not finish")?;
    Ok(())
}
