// --- File: crates/services/rapid_backend/src/main.rs ---
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use rapid_config::load_config;
use rapid_notify::routes as notify_routes;

mod app_state;
mod service_factory;

use app_state::AppState;
use service_factory::RapidChannelFactory;

#[tokio::main]
async fn main() {
    rapid_common::logging::init();

    let config = Arc::new(load_config().expect("Failed to load config"));
    info!(
        host = %config.server.host,
        port = config.server.port,
        "Configuration loaded"
    );

    let channels = Arc::new(RapidChannelFactory::new(config.clone()));
    let state = AppState::new(config.clone(), channels)
        .await
        .expect("Failed to build application state");

    let api_router = Router::new()
        .route("/", get(|| async { "Welcome to the RapidWorks API!" }))
        .merge(notify_routes::routes(state.notify_state.clone()));

    #[allow(unused_mut)]
    let mut app = Router::new()
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http());

    // Conditionally add Swagger UI and JSON endpoint if openapi feature enabled
    #[cfg(feature = "openapi")]
    {
        use rapid_notify::doc::NotifyApiDoc;
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        #[derive(OpenApi)]
        #[openapi(
            info(
                title = "RapidWorks API",
                version = "0.1.0",
                description = "RapidWorks notification service API docs"
            ),
            servers((url = "/api", description = "Main API prefix")),
        )]
        struct ApiDoc;

        let mut openapi_doc = ApiDoc::openapi();
        openapi_doc.merge(NotifyApiDoc::openapi());

        info!("Adding Swagger UI at /api/docs");
        let swagger_ui =
            SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", openapi_doc.clone());
        app = app.merge(swagger_ui);
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind server address");
    info!("Starting server at http://{addr}");
    info!("API endpoints available at http://{addr}/api");

    axum::serve(listener, app.into_make_service())
        .await
        .expect("Server error");
}
