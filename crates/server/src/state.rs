//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{AuthService, CatalogService, OrderService, ReviewService};
use crate::store::Store;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the store and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    store: Arc<dyn Store>,
    auth: AuthService,
    catalog: CatalogService,
    orders: OrderService,
    reviews: ReviewService,
}

impl AppState {
    /// Create a new application state over the given store backend.
    #[must_use]
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Self {
        let auth = AuthService::new(Arc::clone(&store), config.session_ttl_days);
        let catalog = CatalogService::new(Arc::clone(&store));
        let orders = OrderService::new(Arc::clone(&store));
        let reviews = ReviewService::new(Arc::clone(&store));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                auth,
                catalog,
                orders,
                reviews,
            }),
        }
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    #[must_use]
    pub fn reviews(&self) -> &ReviewService {
        &self.inner.reviews
    }
}
