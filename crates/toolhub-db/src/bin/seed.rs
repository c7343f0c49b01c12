//! # Seed Data Generator
//!
//! Populates the database with a small demo catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./toolhub_dev.db
//! cargo run -p toolhub-db --bin seed
//!
//! # Specify database path
//! cargo run -p toolhub-db --bin seed -- --db ./data/toolhub.db
//! ```
//!
//! ## Generated Catalog
//! - One tool per entry in [`TOOLS`], each with its shadow package
//! - A "Creator Bundle" package holding the first three tools
//! - A seven-day trial package holding every tool
//! - A `WELCOME20` coupon (20% off, new users only)

use chrono::{Duration, Utc};
use std::env;
use toolhub_core::{
    BillingInterval, Coupon, CouponRules, CouponStatus, DiscountType, Package, PackageStatus, Tool,
    ToolStatus, UserType, Visibility,
};
use toolhub_db::repository::{catalog, coupon};
use toolhub_db::{Database, DbConfig};
use uuid::Uuid;

/// (name, category, monthly price in cents)
const TOOLS: &[(&str, &str, i64)] = &[
    ("Copywriter", "Writing", 900),
    ("Image Studio", "Design", 1500),
    ("Keyword Finder", "SEO", 700),
    ("Grammar Check", "Writing", 400),
    ("Video Cutter", "Video", 1900),
    ("Logo Maker", "Design", 1200),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./toolhub_dev.db");

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
                println!("ToolHub Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./toolhub_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 ToolHub Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.catalog().list_tools().await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} tools", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let mut tx = db.begin().await?;
    let mut tool_ids = Vec::new();

    for (name, category, price_cents) in TOOLS {
        let (tool, shadow) = generate_tool(name, category, *price_cents);
        catalog::insert_tool(&mut tx, &tool).await?;
        catalog::insert_package(&mut tx, &shadow).await?;
        println!("  + {} ({}) with shadow package", tool.name, tool.price());
        tool_ids.push(tool.id);
    }

    let bundle = generate_package("Creator Bundle", 2400, false, tool_ids[..3].to_vec());
    catalog::insert_package(&mut tx, &bundle).await?;
    println!("  + {} ({} tools)", bundle.name, bundle.tool_ids.len());

    let trial = generate_package("Free Trial", 0, true, tool_ids.clone());
    catalog::insert_package(&mut tx, &trial).await?;
    println!("  + {} ({} tools)", trial.name, trial.tool_ids.len());

    let welcome = generate_coupon("WELCOME20");
    coupon::insert_coupon(&mut tx, &welcome).await?;
    println!("  + Coupon {}", welcome.code);

    tx.commit().await?;

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// A tool plus the single-member package that makes it purchasable.
fn generate_tool(name: &str, category: &str, price_cents: i64) -> (Tool, Package) {
    let now = Utc::now();
    let tool_id = Uuid::new_v4().to_string();
    let package_id = Uuid::new_v4().to_string();

    let tool = Tool {
        id: tool_id.clone(),
        name: name.to_string(),
        description: format!("{} for everyday work", name),
        category: category.to_string(),
        url: Some(format!(
            "https://tools.example.com/{}",
            name.to_lowercase().replace(' ', "-")
        )),
        price_cents,
        interval: BillingInterval::Monthly,
        visibility: Visibility::Public,
        status: ToolStatus::Active,
        package_id: Some(package_id.clone()),
        created_at: now,
        updated_at: now,
    };

    let shadow = Package {
        id: package_id,
        name: name.to_string(),
        price_cents,
        interval: BillingInterval::Monthly,
        is_trial: false,
        trial_duration_days: None,
        visibility: Visibility::Public,
        status: PackageStatus::Active,
        features: vec![],
        tool_ids: vec![tool_id],
        created_at: now,
        updated_at: now,
    };

    (tool, shadow)
}

fn generate_package(name: &str, price_cents: i64, is_trial: bool, tool_ids: Vec<String>) -> Package {
    let now = Utc::now();
    Package {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        price_cents,
        interval: BillingInterval::Monthly,
        is_trial,
        trial_duration_days: is_trial.then_some(7),
        visibility: Visibility::Public,
        status: PackageStatus::Active,
        features: vec!["Priority support".to_string()],
        tool_ids,
        created_at: now,
        updated_at: now,
    }
}

fn generate_coupon(code: &str) -> Coupon {
    let now = Utc::now();
    Coupon {
        id: Uuid::new_v4().to_string(),
        code: code.to_string(),
        discount_type: DiscountType::Percentage,
        discount_value: 2000,
        expires_at: now + Duration::days(90),
        usage_limit: Some(500),
        used_count: 0,
        status: CouponStatus::Active,
        rules: CouponRules {
            user_type: UserType::New,
            ..Default::default()
        },
        created_at: now,
        updated_at: now,
    }
}
