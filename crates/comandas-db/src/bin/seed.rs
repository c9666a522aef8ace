//! # Seed Data Generator
//!
//! Populates the database with a demo café menu for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./comandas_dev.db
//! cargo run -p comandas-db --bin seed
//!
//! # Specify database path
//! cargo run -p comandas-db --bin seed -- --db ./data/comandas.db
//! ```
//!
//! ## Generated Data
//! - A handful of products in every category
//! - Two combos priced below their items
//! - One pinpad per supported provider client, the first as default

use std::env;

use comandas_core::catalog::ComboItemInput;
use comandas_core::pinpad::PinpadDraft;
use comandas_core::types::{PinpadProvider, ProductCategory};
use comandas_db::{Database, DbConfig, NewCombo, NewProduct};

/// (category, name, price in centavos)
const MENU: &[(ProductCategory, &str, i64)] = &[
    (ProductCategory::Bebidas, "Café Expresso", 600),
    (ProductCategory::Bebidas, "Cappuccino", 950),
    (ProductCategory::Bebidas, "Suco de Laranja", 850),
    (ProductCategory::Bebidas, "Água sem Gás", 400),
    (ProductCategory::Salgados, "Pão de Queijo", 550),
    (ProductCategory::Salgados, "Coxinha", 700),
    (ProductCategory::Salgados, "Empada de Frango", 750),
    (ProductCategory::Doces, "Brigadeiro", 350),
    (ProductCategory::Doces, "Bolo de Cenoura", 900),
    (ProductCategory::Lanches, "Misto Quente", 1_200),
    (ProductCategory::Lanches, "Sanduíche Natural", 1_500),
    (ProductCategory::Outros, "Pão na Chapa", 650),
];

/// (combo name, [(product name, quantity, line price)])
const COMBOS: &[(&str, &[(&str, i64, i64)])] = &[
    (
        "Café da Manhã",
        &[("Café Expresso", 1, 500), ("Pão na Chapa", 1, 550)],
    ),
    (
        "Lanche da Tarde",
        &[("Cappuccino", 1, 850), ("Pão de Queijo", 2, 900), ("Brigadeiro", 1, 300)],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./comandas_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Comandas Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./comandas_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Comandas Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Creating products...");

    let mut ids = std::collections::HashMap::new();
    for (category, name, price_cents) in MENU {
        let product = db
            .products()
            .create(
                NewProduct {
                    name: name.to_string(),
                    description: None,
                    category: *category,
                    price_cents: *price_cents,
                    show_in_menu: true,
                },
                None,
            )
            .await?;
        ids.insert(*name, product.id);
    }
    println!("  ✓ {} products", ids.len());

    println!("Creating combos...");
    for (name, lines) in COMBOS {
        let mut items = Vec::with_capacity(lines.len());
        for (product, quantity, price) in lines.iter() {
            let Some(product_id) = ids.get(product) else {
                eprintln!("  Unknown product {} in combo {}", product, name);
                continue;
            };
            items.push(ComboItemInput {
                product_id: product_id.clone(),
                quantity: *quantity,
                combo_price_cents: *price,
            });
        }

        let combo = db
            .combos()
            .create(
                NewCombo {
                    name: name.to_string(),
                    description: None,
                    show_in_menu: true,
                    items,
                },
                None,
            )
            .await?;
        println!(
            "  ✓ {} ({} off)",
            combo.combo.name,
            combo.pricing.discount
        );
    }

    println!("Creating pinpads...");
    for (index, provider) in [PinpadProvider::MercadoPago, PinpadProvider::Rede].into_iter().enumerate() {
        let draft: PinpadDraft = serde_json::from_value(serde_json::json!({
            "name": format!("Balcão {}", index + 1),
            "provider": provider.as_str(),
            "status": "teste",
            "is_default": index == 0,
        }))?;
        let pinpad = db.pinpads().create(&draft, None).await?;
        println!("  ✓ {} ({})", pinpad.name, provider.label());
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
