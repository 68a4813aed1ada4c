//! Accounts: admins manage everybody; users may read themselves and rotate
//! their own token.

use rxd_schemas::{Role, User};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::{generate_token, hash_token};
use crate::{clean_opt, now, require_text, Actor, ServiceError, Store};

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Fields left `None` are unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub license_number: Option<String>,
    pub address: Option<String>,
}

/// A user together with the bearer token issued for them. The token is not
/// recoverable afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedUser {
    pub user: User,
    pub token: String,
}

fn normalize_email(raw: &str) -> Result<String, ServiceError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(ServiceError::Validation(format!("'{}' is not a valid email", raw.trim())));
    }
    Ok(email)
}

fn check_role_fields(user: &User) -> Result<(), ServiceError> {
    if user.role == Role::Distributor
        && (user.company_name.is_none() || user.license_number.is_none())
    {
        return Err(ServiceError::Validation(
            "distributors require company_name and license_number".into(),
        ));
    }
    Ok(())
}

/// Create an account without an acting admin. Used to bootstrap the first
/// admin from the CLI.
pub async fn bootstrap_user(store: &dyn Store, new: NewUser) -> Result<IssuedUser, ServiceError> {
    let at = now();
    let user = User {
        id: Uuid::new_v4(),
        name: require_text("name", &new.name)?,
        email: normalize_email(&new.email)?,
        phone: clean_opt(new.phone),
        role: new.role,
        company_name: clean_opt(new.company_name),
        license_number: clean_opt(new.license_number),
        address: clean_opt(new.address),
        active: true,
        created_at: at,
        updated_at: at,
    };
    check_role_fields(&user)?;

    let token = generate_token();
    store.insert_user(&user, &hash_token(&token)).await?;
    info!(user_id = %user.id, role = user.role.as_str(), "user created");
    Ok(IssuedUser { user, token })
}

pub async fn create_user(
    store: &dyn Store,
    actor: &Actor,
    new: NewUser,
) -> Result<IssuedUser, ServiceError> {
    actor.require_admin()?;
    bootstrap_user(store, new).await
}

pub async fn list_users(
    store: &dyn Store,
    actor: &Actor,
    role: Option<Role>,
) -> Result<Vec<User>, ServiceError> {
    actor.require_admin()?;
    Ok(store.list_users(role).await?)
}

/// Admins may read anyone; other users only themselves.
pub async fn get_user(store: &dyn Store, actor: &Actor, id: Uuid) -> Result<User, ServiceError> {
    if !actor.is_admin() && actor.user_id != id {
        return Err(ServiceError::forbidden("may only view your own account"));
    }
    store
        .fetch_user(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("user", id))
}

pub async fn update_user(
    store: &dyn Store,
    actor: &Actor,
    id: Uuid,
    patch: UserPatch,
) -> Result<User, ServiceError> {
    actor.require_admin()?;
    let mut user = store
        .fetch_user(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("user", id))?;

    if let Some(name) = patch.name {
        user.name = require_text("name", &name)?;
    }
    if let Some(email) = patch.email {
        user.email = normalize_email(&email)?;
    }
    if patch.phone.is_some() {
        user.phone = clean_opt(patch.phone);
    }
    if patch.company_name.is_some() {
        user.company_name = clean_opt(patch.company_name);
    }
    if patch.license_number.is_some() {
        user.license_number = clean_opt(patch.license_number);
    }
    if patch.address.is_some() {
        user.address = clean_opt(patch.address);
    }
    check_role_fields(&user)?;
    user.updated_at = now();

    store.update_user(&user).await?;
    info!(user_id = %user.id, "user updated");
    Ok(user)
}

pub async fn set_user_active(
    store: &dyn Store,
    actor: &Actor,
    id: Uuid,
    active: bool,
) -> Result<User, ServiceError> {
    actor.require_admin()?;
    if !active && actor.user_id == id {
        return Err(ServiceError::Validation(
            "cannot deactivate your own account".into(),
        ));
    }
    let mut user = store
        .fetch_user(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("user", id))?;
    if user.active == active {
        return Ok(user);
    }
    user.active = active;
    user.updated_at = now();
    store.update_user(&user).await?;
    info!(user_id = %id, active, "user activation changed");
    Ok(user)
}

/// Replace a user's token without an acting user (CLI recovery path).
pub async fn reissue_token(store: &dyn Store, id: Uuid) -> Result<String, ServiceError> {
    if store.fetch_user(id).await?.is_none() {
        return Err(ServiceError::not_found("user", id));
    }
    let token = generate_token();
    store.set_token_hash(id, &hash_token(&token)).await?;
    info!(user_id = %id, "token rotated");
    Ok(token)
}

/// Admins may rotate anyone's token; other users only their own. The old
/// token stops working immediately.
pub async fn rotate_token(
    store: &dyn Store,
    actor: &Actor,
    id: Uuid,
) -> Result<String, ServiceError> {
    if !actor.is_admin() && actor.user_id != id {
        return Err(ServiceError::forbidden("may only rotate your own token"));
    }
    reissue_token(store, id).await
}

/// Active distributors, for order placement and task assignment.
pub async fn list_distributors(
    store: &dyn Store,
    actor: &Actor,
) -> Result<Vec<User>, ServiceError> {
    actor.require_role(&[Role::Admin, Role::Employee])?;
    let mut out = store.list_users(Some(Role::Distributor)).await?;
    out.retain(|u| u.active);
    Ok(out)
}
