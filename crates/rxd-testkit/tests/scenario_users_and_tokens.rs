//! Scenario: accounts and bearer tokens.
//!
//! GREEN when:
//! - An issued token authenticates as its user; garbage does not.
//! - Rotation invalidates the previous token immediately.
//! - Deactivated users are Forbidden; admins cannot deactivate themselves.
//! - Emails are unique case-insensitively; distributors need licence data.

use rxd_schemas::Role;
use rxd_service::auth::authenticate;
use rxd_service::users::{self, NewUser, UserPatch};
use rxd_service::ServiceError;
use rxd_testkit::Fixture;

fn new_user(email: &str, role: Role) -> NewUser {
    NewUser {
        name: "Priya Nair".into(),
        email: email.into(),
        role,
        phone: Some("+91 98450 00000".into()),
        company_name: None,
        license_number: None,
        address: None,
    }
}

#[tokio::test]
async fn tokens_authenticate_and_rotate() {
    let fx = Fixture::new().await.unwrap();
    let store = fx.store.as_ref();

    let actor = authenticate(store, &fx.employee.token).await.unwrap();
    assert_eq!(actor, fx.employee.actor);

    for bad in ["", "Bearer x", "rxd_deadbeef", "rxd_00000000000000000000000000000000"] {
        let err = authenticate(store, bad).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized), "{bad}: {err:?}");
    }

    let fresh = users::rotate_token(store, &fx.employee.actor, fx.employee.actor.user_id)
        .await
        .unwrap();
    assert_ne!(fresh, fx.employee.token);
    assert!(matches!(
        authenticate(store, &fx.employee.token).await,
        Err(ServiceError::Unauthorized)
    ));
    assert_eq!(
        authenticate(store, &fresh).await.unwrap().user_id,
        fx.employee.actor.user_id
    );

    // Only admins rotate other people's tokens.
    let err = users::rotate_token(store, &fx.employee.actor, fx.distributor.actor.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    users::rotate_token(store, &fx.admin.actor, fx.distributor.actor.user_id)
        .await
        .unwrap();
}

#[tokio::test]
async fn deactivation_blocks_login() {
    let fx = Fixture::new().await.unwrap();
    let store = fx.store.as_ref();

    let err = users::set_user_active(store, &fx.admin.actor, fx.admin.actor.user_id, false)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let user = users::set_user_active(store, &fx.admin.actor, fx.employee.actor.user_id, false)
        .await
        .unwrap();
    assert!(!user.active);
    let err = authenticate(store, &fx.employee.token).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)), "{err:?}");

    users::set_user_active(store, &fx.admin.actor, fx.employee.actor.user_id, true)
        .await
        .unwrap();
    assert!(authenticate(store, &fx.employee.token).await.is_ok());
}

#[tokio::test]
async fn user_creation_and_update_rules() {
    let fx = Fixture::new().await.unwrap();
    let store = fx.store.as_ref();

    let issued = users::create_user(
        store,
        &fx.admin.actor,
        new_user(" Priya@Field.Example ", Role::Employee),
    )
    .await
    .unwrap();
    assert_eq!(issued.user.email, "priya@field.example");
    assert!(issued.token.starts_with("rxd_"));

    let err = users::create_user(
        store,
        &fx.admin.actor,
        new_user("PRIYA@field.example", Role::Admin),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)), "{err:?}");

    let err = users::create_user(
        store,
        &fx.admin.actor,
        new_user("shop@dist.example", Role::Distributor),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "{err:?}");

    let err = users::create_user(store, &fx.employee.actor, new_user("x@y.example", Role::Employee))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let updated = users::update_user(
        store,
        &fx.admin.actor,
        issued.user.id,
        UserPatch {
            name: Some("Priya N.".into()),
            address: Some("12 MG Road, Bengaluru".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.name, "Priya N.");
    assert_eq!(updated.phone.as_deref(), Some("+91 98450 00000"));

    // Email clash on update.
    let admin_email = users::get_user(store, &fx.admin.actor, fx.admin.actor.user_id)
        .await
        .unwrap()
        .email;
    let err = users::update_user(
        store,
        &fx.admin.actor,
        issued.user.id,
        UserPatch {
            email: Some(admin_email),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)), "{err:?}");

    // Self read is allowed, reading others is not.
    assert!(users::get_user(store, &fx.employee.actor, fx.employee.actor.user_id).await.is_ok());
    let err = users::get_user(store, &fx.employee.actor, fx.admin.actor.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let employees = users::list_users(store, &fx.admin.actor, Some(Role::Employee))
        .await
        .unwrap();
    assert_eq!(employees.len(), 2);
}
