//! Axum router for rxd-daemon.
//!
//! `build_router` returns a bare `Router` (no middleware layers) so that
//! tests can drive it in-process via `tower::ServiceExt::oneshot` without
//! binding a socket. Tracing and CORS are added in `main.rs`.
//!
//! Every handler except health authenticates through [`Authed`] and hands
//! the actor to the service layer, which owns all role checks.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use rxd_service::catalog::{self, NewProduct, ProductPatch, ProductQuery};
use rxd_service::dashboard;
use rxd_service::orders::{self, NewOrder, OrderQuery, StatusRequest};
use rxd_service::stock::{self, StockRequest};
use rxd_service::tasks::{self, NewTask, TaskPatch, TaskQuery};
use rxd_service::users::{self, NewUser, UserPatch};
use uuid::Uuid;

use crate::api_types::{
    ActiveRequest, HealthResponse, StockTxQuery, TaskStatusRequest, TokenResponse, UserListQuery,
};
use crate::error::ApiResult;
use crate::extract::{Authed, JsonBody, PathParam, QueryParams};
use crate::state::AppState;

type Shared = State<Arc<AppState>>;

/// Build the full Axum router with all routes wired to `state`.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/me", get(me))
        .route("/v1/dashboard", get(dashboard_view))
        .route("/v1/users", get(users_list).post(users_create))
        .route("/v1/users/:id", get(users_get).patch(users_update))
        .route("/v1/users/:id/active", post(users_set_active))
        .route("/v1/users/:id/token", post(users_rotate_token))
        .route("/v1/distributors", get(distributors_list))
        .route("/v1/products", get(products_list).post(products_create))
        .route("/v1/products/low-stock", get(products_low_stock))
        .route(
            "/v1/products/:id",
            get(products_get)
                .patch(products_update)
                .delete(products_deactivate),
        )
        .route("/v1/products/:id/stock", post(products_adjust_stock))
        .route("/v1/products/:id/ledger", get(products_ledger))
        .route("/v1/products/:id/ledger/verify", get(products_ledger_verify))
        .route("/v1/stock/transactions", get(stock_transactions))
        .route("/v1/orders", get(orders_list).post(orders_place))
        .route("/v1/orders/:id", get(orders_get))
        .route("/v1/orders/:id/status", post(orders_change_status))
        .route("/v1/tasks", get(tasks_list).post(tasks_create))
        .route(
            "/v1/tasks/:id",
            get(tasks_get).patch(tasks_update).delete(tasks_delete),
        )
        .route("/v1/tasks/:id/status", post(tasks_change_status))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): Shared) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// Self and dashboard
// ---------------------------------------------------------------------------

pub(crate) async fn me(State(st): Shared, Authed(actor): Authed) -> ApiResult<impl IntoResponse> {
    let user = users::get_user(st.store.as_ref(), &actor, actor.user_id).await?;
    Ok(Json(user))
}

pub(crate) async fn dashboard_view(
    State(st): Shared,
    Authed(actor): Authed,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(dashboard::dashboard(st.store.as_ref(), &actor).await?))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub(crate) async fn users_list(
    State(st): Shared,
    Authed(actor): Authed,
    QueryParams(q): QueryParams<UserListQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(users::list_users(st.store.as_ref(), &actor, q.role).await?))
}

pub(crate) async fn users_create(
    State(st): Shared,
    Authed(actor): Authed,
    JsonBody(new): JsonBody<NewUser>,
) -> ApiResult<impl IntoResponse> {
    let issued = users::create_user(st.store.as_ref(), &actor, new).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

pub(crate) async fn users_get(
    State(st): Shared,
    Authed(actor): Authed,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(users::get_user(st.store.as_ref(), &actor, id).await?))
}

pub(crate) async fn users_update(
    State(st): Shared,
    Authed(actor): Authed,
    PathParam(id): PathParam<Uuid>,
    JsonBody(patch): JsonBody<UserPatch>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(users::update_user(st.store.as_ref(), &actor, id, patch).await?))
}

pub(crate) async fn users_set_active(
    State(st): Shared,
    Authed(actor): Authed,
    PathParam(id): PathParam<Uuid>,
    JsonBody(req): JsonBody<ActiveRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = users::set_user_active(st.store.as_ref(), &actor, id, req.active).await?;
    Ok(Json(user))
}

pub(crate) async fn users_rotate_token(
    State(st): Shared,
    Authed(actor): Authed,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let token = users::rotate_token(st.store.as_ref(), &actor, id).await?;
    Ok(Json(TokenResponse { user_id: id, token }))
}

pub(crate) async fn distributors_list(
    State(st): Shared,
    Authed(actor): Authed,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(users::list_distributors(st.store.as_ref(), &actor).await?))
}

// ---------------------------------------------------------------------------
// Products and stock
// ---------------------------------------------------------------------------

pub(crate) async fn products_list(
    State(st): Shared,
    Authed(actor): Authed,
    QueryParams(q): QueryParams<ProductQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(catalog::list_products(st.store.as_ref(), &actor, q).await?))
}

pub(crate) async fn products_create(
    State(st): Shared,
    Authed(actor): Authed,
    JsonBody(new): JsonBody<NewProduct>,
) -> ApiResult<impl IntoResponse> {
    let product = catalog::create_product(st.store.as_ref(), &st.config, &actor, new).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub(crate) async fn products_low_stock(
    State(st): Shared,
    Authed(actor): Authed,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(catalog::low_stock(st.store.as_ref(), &actor).await?))
}

pub(crate) async fn products_get(
    State(st): Shared,
    Authed(actor): Authed,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(catalog::get_product(st.store.as_ref(), &actor, id).await?))
}

pub(crate) async fn products_update(
    State(st): Shared,
    Authed(actor): Authed,
    PathParam(id): PathParam<Uuid>,
    JsonBody(patch): JsonBody<ProductPatch>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(catalog::update_product(st.store.as_ref(), &actor, id, patch).await?))
}

/// Products are never removed; DELETE deactivates.
pub(crate) async fn products_deactivate(
    State(st): Shared,
    Authed(actor): Authed,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(catalog::deactivate_product(st.store.as_ref(), &actor, id).await?))
}

pub(crate) async fn products_adjust_stock(
    State(st): Shared,
    Authed(actor): Authed,
    PathParam(id): PathParam<Uuid>,
    JsonBody(req): JsonBody<StockRequest>,
) -> ApiResult<impl IntoResponse> {
    let tx = stock::adjust_stock(st.store.as_ref(), &actor, id, req).await?;
    Ok((StatusCode::CREATED, Json(tx)))
}

pub(crate) async fn products_ledger(
    State(st): Shared,
    Authed(actor): Authed,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(stock::product_ledger(st.store.as_ref(), &actor, id).await?))
}

pub(crate) async fn products_ledger_verify(
    State(st): Shared,
    Authed(actor): Authed,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(stock::verify_product_ledger(st.store.as_ref(), &actor, id).await?))
}

pub(crate) async fn stock_transactions(
    State(st): Shared,
    Authed(actor): Authed,
    QueryParams(q): QueryParams<StockTxQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(stock::list_transactions(st.store.as_ref(), &actor, q.into()).await?))
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

pub(crate) async fn orders_list(
    State(st): Shared,
    Authed(actor): Authed,
    QueryParams(q): QueryParams<OrderQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(orders::list_orders(st.store.as_ref(), &actor, q).await?))
}

pub(crate) async fn orders_place(
    State(st): Shared,
    Authed(actor): Authed,
    JsonBody(new): JsonBody<NewOrder>,
) -> ApiResult<impl IntoResponse> {
    let order = orders::place_order(st.store.as_ref(), &st.config, &actor, new).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub(crate) async fn orders_get(
    State(st): Shared,
    Authed(actor): Authed,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(orders::get_order(st.store.as_ref(), &actor, id).await?))
}

pub(crate) async fn orders_change_status(
    State(st): Shared,
    Authed(actor): Authed,
    PathParam(id): PathParam<Uuid>,
    JsonBody(req): JsonBody<StatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let order =
        orders::change_order_status(st.store.as_ref(), &st.config, &actor, id, req).await?;
    Ok(Json(order))
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

pub(crate) async fn tasks_list(
    State(st): Shared,
    Authed(actor): Authed,
    QueryParams(q): QueryParams<TaskQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(tasks::list_tasks(st.store.as_ref(), &actor, q).await?))
}

pub(crate) async fn tasks_create(
    State(st): Shared,
    Authed(actor): Authed,
    JsonBody(new): JsonBody<NewTask>,
) -> ApiResult<impl IntoResponse> {
    let task = tasks::create_task(st.store.as_ref(), &actor, new).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub(crate) async fn tasks_get(
    State(st): Shared,
    Authed(actor): Authed,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(tasks::get_task(st.store.as_ref(), &actor, id).await?))
}

pub(crate) async fn tasks_update(
    State(st): Shared,
    Authed(actor): Authed,
    PathParam(id): PathParam<Uuid>,
    JsonBody(patch): JsonBody<TaskPatch>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(tasks::update_task(st.store.as_ref(), &actor, id, patch).await?))
}

pub(crate) async fn tasks_delete(
    State(st): Shared,
    Authed(actor): Authed,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<impl IntoResponse> {
    tasks::delete_task(st.store.as_ref(), &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn tasks_change_status(
    State(st): Shared,
    Authed(actor): Authed,
    PathParam(id): PathParam<Uuid>,
    JsonBody(req): JsonBody<TaskStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(tasks::change_task_status(st.store.as_ref(), &actor, id, req.status).await?))
}
