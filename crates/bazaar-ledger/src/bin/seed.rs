//! # Seed Data Generator
//!
//! Populates a settings database with the standard currency set and a
//! demo vendor for development.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p bazaar-ledger --bin seed
//!
//! # Specify database path
//! cargo run -p bazaar-ledger --bin seed -- --db ./data/bazaar.db
//! ```

use std::env;
use std::sync::Arc;

use bazaar_core::{DenominationSet, Stock, VendorItem, VendorRecord};
use bazaar_ledger::{
    MemoryInventory, LedgerStore, SqliteSettings, StoreConfig, WorldSettings,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Demo stock: name, price in display units, bounded quantity or None
/// for unlimited.
const DEMO_ITEMS: &[(&str, f64, Option<i64>)] = &[
    ("Lantern", 12.0, Some(4)),
    ("Hemp Rope (50 ft)", 1.0, Some(10)),
    ("Rations (1 day)", 0.5, Some(20)),
    ("Waterskin", 0.2, Some(6)),
    ("Arrow", 0.05, None),
    ("Bedroll", 1.0, Some(5)),
    ("Torch", 0.01, None),
    ("Grappling Hook", 2.0, Some(2)),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./bazaar_dev.db");

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
                println!("Bazaar Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./bazaar_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(path = %db_path, "Seeding settings database");

    let settings_store = SqliteSettings::connect(StoreConfig::new(&db_path)).await?;
    let settings = WorldSettings::new(Arc::new(settings_store));

    if !settings.vendors().await?.is_empty() {
        info!("Database already seeded, nothing to do");
        return Ok(());
    }

    settings
        .set_denominations(&DenominationSet::standard())
        .await?;
    settings.set_managed_wallets(true).await?;
    settings.set_require_approval(false).await?;
    settings.set_automatic_sell_percentage(50).await?;

    let store = LedgerStore::new(settings, Arc::new(MemoryInventory::new()));

    let mut vendor = VendorRecord::new("General Goods");
    for (name, price, quantity) in DEMO_ITEMS {
        let stock = match quantity {
            Some(n) => Stock::Count(*n),
            None => Stock::Unlimited,
        };
        vendor.items.push(VendorItem::new(*name, *price, stock));
    }
    let item_count = vendor.items.len();
    let vendor_id = vendor.id.clone();
    store.set_vendor(vendor).await?;

    store.set_balance("demo-peer", 930).await?;

    info!(
        vendor_id = %vendor_id,
        items = item_count,
        "Seed complete"
    );
    Ok(())
}
