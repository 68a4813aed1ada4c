//! `rxd user` handlers. These bypass role checks: whoever can reach the
//! database is already trusted, and the first admin has to come from
//! somewhere.

use anyhow::Result;
use rxd_schemas::Role;
use rxd_service::users::{self, NewUser};
use uuid::Uuid;

use super::store_from_env;

pub async fn create(
    name: String,
    email: String,
    role: Role,
    phone: Option<String>,
    company: Option<String>,
    license: Option<String>,
) -> Result<()> {
    let store = store_from_env().await?;
    let issued = users::bootstrap_user(
        store.as_ref(),
        NewUser {
            name,
            email,
            role,
            phone,
            company_name: company,
            license_number: license,
            address: None,
        },
    )
    .await?;

    println!("user_id={}", issued.user.id);
    println!("role={}", issued.user.role.as_str());
    println!("token={}", issued.token);
    Ok(())
}

pub async fn rotate_token(user_id: Uuid) -> Result<()> {
    let store = store_from_env().await?;
    let token = users::reissue_token(store.as_ref(), user_id).await?;
    println!("user_id={user_id}");
    println!("token={token}");
    Ok(())
}
