//! # Seed Data Generator
//!
//! Populates the database with salon stock, promotions and loyalty
//! balances for development.
//!
//! ## Usage
//! ```bash
//! # Seed the configured database with the default branches
//! cargo run -p salon-db --bin seed
//!
//! # Use a config file (database path, billing policy)
//! cargo run -p salon-db --bin seed -- --config ./salon.toml
//!
//! # Specify database path and number of batches per product
//! cargo run -p salon-db --bin seed -- --db ./data/salon.db --batches 4
//! ```
//!
//! ## Generated Data
//! - Retail product batches per branch, staggered expiration dates
//!   (one batch per product already expired, for the expiry reports)
//! - A handful of promotion codes (percentage, fixed, branch- and
//!   client-restricted, usage-limited)
//! - Opening loyalty balances for a few clients
//!
//! Logging goes through `tracing`; set `RUST_LOG` to change the filter.

use std::env;

use chrono::{Duration, Utc};
use salon_core::{Money, NewBatch, Promotion, PromotionKind, PromotionScope, Rate};
use salon_db::{Database, SalonConfig};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const BRANCHES: &[&str] = &["makati", "bgc", "alabang"];

/// (product id, display name, unit cost in pesos)
const PRODUCTS: &[(&str, &str, i64)] = &[
    ("keratin-serum", "Keratin Serum 100ml", 450),
    ("argan-oil", "Argan Oil 50ml", 380),
    ("sulfate-free-shampoo", "Sulfate-Free Shampoo 250ml", 290),
    ("color-lock-conditioner", "Color-Lock Conditioner 250ml", 310),
    ("repair-hair-mask", "Deep Repair Hair Mask 200g", 520),
    ("heat-protect-spray", "Heat Protect Spray 150ml", 340),
    ("scalp-tonic", "Scalp Tonic 100ml", 410),
    ("nail-cuticle-oil", "Cuticle Oil 15ml", 120),
];

/// (client id, branch id, opening points)
const LOYALTY_BALANCES: &[(&str, &str, i64)] = &[
    ("client-maria", "makati", 250),
    ("client-maria", "bgc", 40),
    ("client-jose", "makati", 1_200),
    ("client-ana", "alabang", 75),
];

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,salon=debug,sqlx=warn")),
        )
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut batches_per_product: i64 = 3;
    let mut db_path: Option<String> = None;
    let mut config_path = String::from("./salon.toml");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--batches" | "-b" => {
                if i + 1 < args.len() {
                    batches_per_product = args[i + 1].parse().unwrap_or(3);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Salon POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -b, --batches <N>    Sellable batches per product and branch (default: 3)");
                println!("  -d, --db <PATH>      Database file path (overrides the config file)");
                println!("  -c, --config <PATH>  Config file (default: ./salon.toml)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = SalonConfig::load(&config_path)?;
    if let Some(path) = db_path {
        config.database.path = path.into();
    }

    println!("🌱 Salon POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", config.database.path.display());
    println!("Batches:  {} per product and branch", batches_per_product);
    println!();

    let db = Database::from_config(&config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing stock
    let (first_product, first_name, _) = PRODUCTS[0];
    if db.stock().get(BRANCHES[0], first_product).await?.is_some() {
        println!("⚠ Database already has stock for {}", first_product);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let now = Utc::now();
    let today = now.date_naive();
    let start = std::time::Instant::now();

    // Batches
    println!();
    println!("Receiving batches...");
    let mut received = 0;
    for (branch_idx, branch) in BRANCHES.iter().enumerate() {
        for (product_idx, (product_id, _, unit_cost)) in PRODUCTS.iter().enumerate() {
            let seed = (branch_idx * 31 + product_idx * 7) as i64;

            // Already expired but still holding units
            let expired = NewBatch {
                branch_id: branch.to_string(),
                product_id: product_id.to_string(),
                batch_number: format!("{}-X{:03}", product_id.to_uppercase(), seed),
                quantity: 1 + seed % 3,
                expiration_date: Some(today - Duration::days(10 + seed % 20)),
                unit_cost: Money::from_major(*unit_cost),
            };
            db.stock().receive(&expired, now - Duration::days(200)).await?;
            received += 1;

            for n in 0..batches_per_product {
                let delivery = NewBatch {
                    branch_id: branch.to_string(),
                    product_id: product_id.to_string(),
                    batch_number: format!("{}-{:03}-{}", product_id.to_uppercase(), seed, n + 1),
                    quantity: 4 + (seed + n * 5) % 20,
                    // Oldest delivery expires first; the nail oil never expires
                    expiration_date: (*product_id != "nail-cuticle-oil")
                        .then(|| today + Duration::days(20 + n * 60 + seed % 15)),
                    unit_cost: Money::from_major(*unit_cost + n * 5),
                };
                db.stock()
                    .receive(&delivery, now - Duration::days(90 - n * 20))
                    .await?;
                received += 1;
            }
        }
    }
    println!("  Received {} batches", received);

    // Promotions
    println!();
    println!("Creating promotions...");
    let promotions = [
        promotion("WELCOME10", PromotionKind::Percentage(Rate::from_bps(1000)), PromotionScope::All)
            .max_discount(Money::from_major(300)),
        promotion("SERVICE20", PromotionKind::Percentage(Rate::from_bps(2000)), PromotionScope::ServicesOnly)
            .branches(&["makati", "bgc"]),
        promotion("RETAIL100", PromotionKind::Fixed(Money::from_major(100)), PromotionScope::ProductsOnly)
            .limits(Some(50), Some(1)),
        promotion("VIPJOSE", PromotionKind::Percentage(Rate::from_bps(1500)), PromotionScope::All)
            .clients(&["client-jose"]),
    ];
    for builder in promotions {
        let stored = db
            .promotions()
            .insert(&builder.build(today - Duration::days(7), today + Duration::days(90)))
            .await?;
        println!("  {}", stored.code);
    }

    // Loyalty
    println!();
    println!("Opening loyalty balances...");
    for (client, branch, points) in LOYALTY_BALANCES {
        db.loyalty()
            .credit(client, branch, *points, Some("opening balance"))
            .await?;
    }
    println!("  Credited {} accounts", LOYALTY_BALANCES.len());

    let elapsed = start.elapsed();
    println!();
    println!("✓ Seeded in {:?}", elapsed);

    // Verify
    println!();
    println!("Verifying stock of {}...", first_name);
    for branch in BRANCHES {
        let stock = db.stock().real_time_stock(branch, first_product).await?;
        let expired = db.batches().expired_with_stock(branch, today).await?;
        println!(
            "  {}: {} sellable, {} expired batches in branch",
            branch,
            stock,
            expired.len()
        );
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Small builder so the promotion table above stays readable.
struct PromotionSeed {
    code: &'static str,
    kind: PromotionKind,
    scope: PromotionScope,
    max_discount: Option<Money>,
    branches: Option<Vec<String>>,
    clients: Option<Vec<String>>,
    limit_global: Option<i64>,
    limit_per_client: Option<i64>,
}

fn promotion(code: &'static str, kind: PromotionKind, scope: PromotionScope) -> PromotionSeed {
    PromotionSeed {
        code,
        kind,
        scope,
        max_discount: None,
        branches: None,
        clients: None,
        limit_global: None,
        limit_per_client: None,
    }
}

impl PromotionSeed {
    fn max_discount(mut self, cap: Money) -> Self {
        self.max_discount = Some(cap);
        self
    }

    fn branches(mut self, ids: &[&str]) -> Self {
        self.branches = Some(ids.iter().map(|s| s.to_string()).collect());
        self
    }

    fn clients(mut self, ids: &[&str]) -> Self {
        self.clients = Some(ids.iter().map(|s| s.to_string()).collect());
        self
    }

    fn limits(mut self, global: Option<i64>, per_client: Option<i64>) -> Self {
        self.limit_global = global;
        self.limit_per_client = per_client;
        self
    }

    fn build(self, starts_on: chrono::NaiveDate, ends_on: chrono::NaiveDate) -> Promotion {
        Promotion {
            id: Uuid::new_v4().to_string(),
            code: self.code.to_string(),
            kind: self.kind,
            scope: self.scope,
            max_discount: self.max_discount,
            eligible_branches: self.branches,
            eligible_clients: self.clients,
            starts_on,
            ends_on,
            usage_limit_global: self.limit_global,
            usage_limit_per_client: self.limit_per_client,
            usage_count: 0,
            is_active: true,
        }
    }
}
