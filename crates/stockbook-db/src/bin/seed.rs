//! # Seed Data Generator
//!
//! Populates a fresh database with the default catalog and sample products.
//!
//! ## Usage
//! ```bash
//! # Default catalog + 60 products
//! cargo run -p stockbook-db --bin seed
//!
//! # Custom amount
//! cargo run -p stockbook-db --bin seed -- --count 500
//!
//! # Specify database path
//! cargo run -p stockbook-db --bin seed -- --db ./data/stockbook.db
//! ```
//!
//! Everything inserted here is marked `Synced`: seed data is the shared
//! starting point, not a local change to push.

use chrono::{Duration, Local};
use std::env;
use stockbook_core::validation::validate_new_product;
use stockbook_core::{CatalogKind, NewProduct, SyncCollection};
use stockbook_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_COUNT: usize = 60;

const CATEGORIES: &[(&str, &str)] = &[
    ("cat-bebidas", "Bebidas"),
    ("cat-snacks", "Snacks"),
    ("cat-panaderia", "Panadería"),
    ("cat-lacteos", "Lácteos"),
    ("cat-confiteria", "Confitería"),
    ("cat-enlatados", "Enlatados"),
];

const BRANDS: &[(&str, &str)] = &[
    ("brand-cocacola", "Coca-Cola"),
    ("brand-pepsi", "Pepsi"),
    ("brand-bimbo", "Bimbo"),
    ("brand-nestle", "Nestlé"),
    ("brand-lala", "Lala"),
    ("brand-gamesa", "Gamesa"),
];

const PRODUCT_TYPES: &[(&str, &str)] = &[
    ("type-carbonatadas", "Bebidas Carbonatadas"),
    ("type-galletas", "Galletas"),
    ("type-pan", "Pan"),
    ("type-leche", "Leche"),
    ("type-chocolates", "Chocolates"),
    ("type-atun", "Atún"),
];

/// (name, description, category, brand, type, shelf life in days)
const BASE_PRODUCTS: &[(&str, &str, usize, usize, usize, Option<i64>)] = &[
    ("Refresco Cola", "Refresco carbonatado", 0, 0, 0, Some(180)),
    ("Refresco Limón", "Refresco carbonatado", 0, 1, 0, Some(180)),
    ("Galletas Marías", "Paquete de galletas", 1, 5, 1, Some(120)),
    ("Pan Blanco", "Pan de caja blanco", 2, 2, 2, Some(7)),
    ("Leche Entera", "Leche entera pasteurizada", 3, 4, 3, Some(14)),
    ("Chocolate en Tableta", "Chocolate de mesa", 4, 3, 4, Some(365)),
    ("Atún en Agua", "Lata de atún", 5, 3, 5, Some(720)),
    ("Servilletas", "Paquete de servilletas", 1, 5, 1, None),
];

const SIZES: &[(&str, i64)] = &[("Chico", 0), ("Mediano", 500), ("Grande", 1200)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count = DEFAULT_COUNT;
    let mut db_path = String::from("./stockbook_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(DEFAULT_COUNT);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Stockbook Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: {DEFAULT_COUNT})");
                println!("  -d, --db <PATH>    Database file path (default: ./stockbook_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, count, "Seeding database");
    let db = Database::new(DbConfig::new(&db_path)).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    for (kind, entries) in [
        (CatalogKind::Category, CATEGORIES),
        (CatalogKind::Brand, BRANDS),
        (CatalogKind::ProductType, PRODUCT_TYPES),
    ] {
        let repo = db.catalog(kind);
        for (id, name) in entries {
            repo.add(Some(id.to_string()), name).await?;
        }
        info!(kind = ?kind, count = entries.len(), "Catalog seeded");
    }

    let start = std::time::Instant::now();
    let mut ids = Vec::with_capacity(count);
    for seed in 0..count {
        let product = generate_product(seed);
        if let Err(e) = validate_new_product(&product) {
            warn!(seed, error = %e, "Skipping invalid sample product");
            continue;
        }
        match db.products().add(product).await {
            Ok(product) => ids.push(product.id),
            Err(e) => warn!(seed, error = %e, "Failed to insert product"),
        }
    }

    let marked = db.sync_tracker().mark_synced(SyncCollection::Products, &ids).await?;
    info!(
        generated = ids.len(),
        marked,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Products seeded"
    );

    let low = db.queries().below_minimum_stock().await?;
    let expiring = db.queries().expiring_within_days(30).await?;
    info!(below_minimum = low.len(), expiring_30_days = expiring.len(), "Seed complete");

    Ok(())
}

/// Builds one sample product. `seed` picks the base product, size and the
/// pseudo-random stock and prices.
fn generate_product(seed: usize) -> NewProduct {
    let (name, description, category, brand, product_type, shelf_life) =
        BASE_PRODUCTS[seed % BASE_PRODUCTS.len()];
    let (size, price_addon) = SIZES[(seed / BASE_PRODUCTS.len()) % SIZES.len()];
    let batch = seed / (BASE_PRODUCTS.len() * SIZES.len());

    let purchase_price_cents = 800 + ((seed * 37) % 2000) as i64 + price_addon;
    let min_stock_level = 5 + (seed % 11) as i64;
    let today = Local::now().date_naive();

    NewProduct {
        id: Some(format!("seed-{seed:05}")),
        name: if batch == 0 {
            format!("{name} {size}")
        } else {
            format!("{name} {size} #{batch}")
        },
        description: description.to_string(),
        barcode: Some(format!("750{seed:010}")),
        category: CATEGORIES[category].0.to_string(),
        brand: BRANDS[brand].0.to_string(),
        product_type: Some(PRODUCT_TYPES[product_type].0.to_string()),
        current_stock: ((seed * 13) % 60) as i64,
        min_stock_level,
        purchase_price_cents,
        selling_price_cents: purchase_price_cents * 13 / 10,
        expiration_date: shelf_life.map(|days| today + Duration::days((seed as i64 * 7) % days + 1)),
        ..Default::default()
    }
}
