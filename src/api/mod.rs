//! HTTP surface.
//!
//! Identity comes from the upstream auth proxy as `x-user-id` / `x-user-role`
//! headers. All routes are mounted under `/api`; `/health` sits at the root.

use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{AutoReplyMode, Config};
use crate::domain::aggregates::{FixedReplyPicker, Lifecycle, RandomReplyPicker, ReplyPicker};
use crate::services::{EventPublisher, OrderService, PromoService, ReviewService, SupportService};
use crate::store::Store;

pub mod error;
pub mod extract;
mod orders;
mod promo;
mod reviews;
mod support;

pub use extract::{MaybeCaller, Path, Query, ValidJson, USER_ID_HEADER, USER_ROLE_HEADER};

#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    pub promos: PromoService,
    pub reviews: ReviewService,
    pub support: SupportService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, events: EventPublisher, config: &Config) -> Self {
        let picker: Arc<dyn ReplyPicker> = match config.auto_reply {
            AutoReplyMode::Random => Arc::new(RandomReplyPicker),
            AutoReplyMode::First => Arc::new(FixedReplyPicker(0)),
        };
        Self::with_reply_picker(store, events, config, picker)
    }

    pub fn with_reply_picker(
        store: Arc<dyn Store>,
        events: EventPublisher,
        config: &Config,
        picker: Arc<dyn ReplyPicker>,
    ) -> Self {
        Self {
            orders: OrderService::new(store.clone(), events.clone(), Lifecycle::new(config.promo_usage)),
            promos: PromoService::new(store.clone()),
            reviews: ReviewService::new(store.clone(), events.clone(), picker),
            support: SupportService::new(store, events, config.support_poll_interval),
        }
    }
}

/// API routes without the `/api` prefix.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route("/orders/:id", get(orders::get_order).patch(orders::update_order))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        .route("/promo", post(promo::validate_promo))
        .route("/admin/promo", get(promo::list_promos).post(promo::create_promo))
        .route("/admin/promo/:id", delete(promo::delete_promo))
        .route("/reviews", get(reviews::list_reviews).post(reviews::create_review))
        .route("/reviews/:id", patch(reviews::reply_to_review))
        .route("/support", get(support::my_chat).post(support::send_message))
        .route("/support/admin", get(support::all_chats).post(support::admin_reply))
        .route("/support/:chat_id", get(support::get_chat))
        .with_state(state)
}

/// The whole service: health check, `/api` routes, tracing and CORS.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "techshop"})) }))
        .nest("/api", router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
