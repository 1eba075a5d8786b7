//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use lumen_core::ports::{
    ChatCompletionService, DatabaseService, PaymentGateway, SummaryGenerationService,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub chat_adapter: Arc<dyn ChatCompletionService>,
    pub summary_adapter: Arc<dyn SummaryGenerationService>,
    pub payment_gateway: Arc<dyn PaymentGateway>,
}
