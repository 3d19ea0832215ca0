use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{
    AppointmentContext, AppointmentStore, InMemoryAppointmentStore, NotificationDispatcher,
    SupabaseAppointmentStore, WebhookNotifier,
};
use schedule_cell::{InMemoryScheduleStore, ScheduleContext, ScheduleStore, SupabaseScheduleStore};
use shared_config::AppConfig;
use shared_utils::clock::SystemClock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduling API server");

    let config = Arc::new(AppConfig::from_env());

    let (schedules, appointments): (Arc<dyn ScheduleStore>, Arc<dyn AppointmentStore>) =
        if config.is_configured() {
            info!("Using Supabase stores at {}", config.supabase_url);
            (
                Arc::new(SupabaseScheduleStore::new(&config)),
                Arc::new(SupabaseAppointmentStore::new(&config)),
            )
        } else {
            info!("Using in-memory stores");
            (InMemoryScheduleStore::shared(), InMemoryAppointmentStore::shared())
        };

    let notifier = match &config.notification_webhook_url {
        Some(url) => {
            info!("Appointment notifications go to {}", url);
            NotificationDispatcher::new(Arc::new(WebhookNotifier::new(url.clone())))
        }
        None => NotificationDispatcher::logging(),
    };

    let clock = Arc::new(SystemClock::from_config(&config));
    info!("Clinic clock offset: {} minutes from UTC", config.clinic_utc_offset_minutes);

    let schedule_ctx = Arc::new(ScheduleContext::new(config.clone(), schedules.clone()));
    let appointment_ctx = Arc::new(AppointmentContext::new(
        config.clone(),
        appointments,
        schedules,
        notifier,
        clock,
    ));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(schedule_ctx, appointment_ctx)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
