//! Test support: the in-memory [`MemStore`] and seeded fixtures.
//!
//! Scenario tests that span service, ledger and store live under `tests/`.

mod mem_store;

pub use mem_store::MemStore;

use std::sync::Arc;

use anyhow::Result;
use rxd_config::AppConfig;
use rxd_schemas::{Product, Role};
use rxd_service::catalog::{self, NewProduct};
use rxd_service::users::{self, NewUser};
use rxd_service::Actor;

/// A seeded account with its bearer token.
#[derive(Debug, Clone)]
pub struct Account {
    pub actor: Actor,
    pub token: String,
}

/// Store plus one active user per role.
pub struct Fixture {
    pub store: Arc<MemStore>,
    pub cfg: AppConfig,
    pub admin: Account,
    pub distributor: Account,
    pub employee: Account,
}

impl Fixture {
    pub async fn new() -> Result<Self> {
        Self::with_config(AppConfig::default()).await
    }

    pub async fn with_config(cfg: AppConfig) -> Result<Self> {
        let store = Arc::new(MemStore::new());
        let admin = seed_user(&store, Role::Admin, "admin").await?;
        let distributor = seed_user(&store, Role::Distributor, "medline").await?;
        let employee = seed_user(&store, Role::Employee, "field").await?;
        Ok(Self {
            store,
            cfg,
            admin,
            distributor,
            employee,
        })
    }

    /// An active product with the given opening stock (posted through the
    /// ledger as an `initial` entry).
    pub async fn product(&self, sku: &str, stock: i64, price_minor: i64) -> Result<Product> {
        seed_product(&self.store, &self.cfg, &self.admin.actor, sku, stock, price_minor).await
    }

    /// Another distributor account, for scoping tests.
    pub async fn another_distributor(&self, handle: &str) -> Result<Account> {
        seed_user(&self.store, Role::Distributor, handle).await
    }

    pub async fn another_employee(&self, handle: &str) -> Result<Account> {
        seed_user(&self.store, Role::Employee, handle).await
    }
}

pub async fn seed_user(store: &MemStore, role: Role, handle: &str) -> Result<Account> {
    let distributor = role == Role::Distributor;
    let issued = users::bootstrap_user(
        store,
        NewUser {
            name: format!("{handle} {}", role.as_str()),
            email: format!("{handle}@{}.rxd.test", role.as_str()),
            role,
            phone: None,
            company_name: distributor.then(|| format!("{handle} Pharma Pvt Ltd")),
            license_number: distributor.then(|| format!("DL-{handle}-2024")),
            address: None,
        },
    )
    .await?;
    Ok(Account {
        actor: Actor::from_user(&issued.user),
        token: issued.token,
    })
}

pub async fn seed_product(
    store: &MemStore,
    cfg: &AppConfig,
    admin: &Actor,
    sku: &str,
    stock: i64,
    price_minor: i64,
) -> Result<Product> {
    let p = catalog::create_product(
        store,
        cfg,
        admin,
        NewProduct {
            sku: sku.to_string(),
            name: format!("{sku} tablets"),
            generic_name: None,
            manufacturer: Some("Acme Labs".into()),
            category: "General".into(),
            unit: "strip".into(),
            price_minor,
            initial_stock: stock,
            reorder_level: None,
            expiry_date: None,
        },
    )
    .await?;
    Ok(p)
}
