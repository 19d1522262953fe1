//! Registers a tenant from the command line.
//!
//! Usage:
//!   DATABASE_URL=... ./create-tenant --slug acme --name "Acme Kozijnen" \
//!       --admin-email info@acme.nl --admin-name "Jan" --admin-password '...'

use anyhow::{Context, Result};
use clap::Parser;
use std::env;

use homepro_api::{db, models::tenant::CreateTenantRequest, services::tenants::TenantService};

#[derive(Debug, Parser)]
#[command(about = "Provision a new tenant and its first admin account")]
struct Args {
    #[arg(long)]
    slug: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    contact_email: Option<String>,
    /// Receives new-booking and cancellation notices
    #[arg(long)]
    notification_email: Option<String>,
    #[arg(long)]
    website_url: Option<String>,
    #[arg(long)]
    admin_email: String,
    #[arg(long)]
    admin_name: String,
    #[arg(long, env = "ADMIN_PASSWORD")]
    admin_password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let database_url = env::var("DATABASE_URL").context("DATABASE_URL required")?;
    let pool = db::create_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let req = CreateTenantRequest {
        slug: args.slug,
        name: args.name,
        contact_email: args.contact_email,
        notification_email: args.notification_email,
        website_url: args.website_url,
        admin_email: args.admin_email,
        admin_name: args.admin_name,
        admin_password: args.admin_password,
    };

    let tenant = TenantService::create(&pool, &req)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    println!("✓ Tenant created: {} ({})", tenant.name, tenant.slug);
    println!("  Schema: {}", db::tenant::schema_name(&tenant.slug));
    Ok(())
}
