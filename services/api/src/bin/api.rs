//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        chat_llm::OpenAiChatAdapter, db::DbAdapter, mercadopago::MercadoPagoAdapter,
        summary_llm::OpenAiSummaryAdapter,
    },
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, signup_handler},
        bundles::{create_bundle_handler, list_bundles_handler},
        chat::{
            active_session_handler, chat_history_handler, end_session_handler,
            list_sessions_handler, send_message_handler, session_messages_handler,
            start_session_handler,
        },
        health_handler,
        middleware::require_auth,
        payment::{create_checkout_handler, webhook_handler},
        state::AppState,
        summary::{create_summary_handler, get_summary_handler, session_metrics_handler},
        users::{get_user_handler, list_users_handler, session_balance_handler},
        ApiDoc,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            config.log_level.to_string(),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let chat_adapter = Arc::new(OpenAiChatAdapter::new(
        openai_client.clone(),
        config.chat_model.clone(),
        config.sentiment_model.clone(),
    ));
    let summary_adapter = Arc::new(OpenAiSummaryAdapter::new(
        openai_client.clone(),
        config.summary_model.clone(),
    ));
    let payment_gateway = Arc::new(MercadoPagoAdapter::new(
        config.mercadopago_access_token.clone(),
        config.frontend_url.clone(),
        config.payment_notification_url.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        chat_adapter,
        summary_adapter,
        payment_gateway,
    });

    let frontend_origin = config.frontend_url.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("FRONTEND_URL is not a valid origin: {e}"))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required). The payment webhook must stay public:
    // the gateway calls it, not a logged-in user.
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/api/auth/signup", post(signup_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/payment/webhook", post(webhook_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/users", get(list_users_handler))
        .route("/api/users/sessions", get(session_balance_handler))
        .route("/api/users/{user_id}", get(get_user_handler))
        .route("/api/chat/message", post(send_message_handler))
        .route("/api/chat/history", get(chat_history_handler))
        .route("/api/chat/sessions", get(list_sessions_handler))
        .route("/api/chat/session/start", post(start_session_handler))
        .route("/api/chat/session/active", get(active_session_handler))
        .route("/api/chat/session/{session_id}/end", post(end_session_handler))
        .route(
            "/api/chat/session/{session_id}/messages",
            get(session_messages_handler),
        )
        .route(
            "/api/summary/sessions/{session_id}/summary",
            get(get_summary_handler).post(create_summary_handler),
        )
        .route(
            "/api/summary/sessions/{session_id}/metrics",
            get(session_metrics_handler),
        )
        .route(
            "/api/bundles",
            get(list_bundles_handler).post(create_bundle_handler),
        )
        .route("/api/payment/create", post(create_checkout_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
