//! Reservation demo.
//!
//! Reserves one item against the configured storefront API, follows the
//! countdown for a few seconds, then releases the hold.
//!
//! ```text
//! STOREFRONT_API_URL=http://localhost:5000 cargo run --bin reservation-demo -- <product-id> [quantity]
//! ```

use std::time::Duration;
use stock_reservation::{
    ReservationAction, ReservationConfig, ReservationController, ReservationItem, ReserveRequest,
    metrics::register_metrics,
};
use storefront_runtime::metrics::PrometheusMetrics;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to follow the countdown before releasing
const WATCH_FOR: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stock_reservation=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // 2. Install the metrics recorder
    let mut metrics = PrometheusMetrics::new();
    metrics.install()?;
    register_metrics();

    // 3. Parse arguments and build the controller
    let mut args = std::env::args().skip(1);
    let product_id = args.next().unwrap_or_else(|| "demo-product".to_string());
    let quantity = args.next().map(|q| q.parse::<u32>()).transpose()?.unwrap_or(1);

    let config = ReservationConfig::from_env();
    tracing::info!(api_url = %config.api_url, %product_id, quantity, "Starting reservation demo");
    let controller = ReservationController::from_config(&config)?;

    // 4. Reserve
    let request = ReserveRequest::new(vec![ReservationItem::new(product_id, quantity)], None);
    let hold = match controller.try_reserve(request).await {
        Ok(hold) => hold,
        Err(error) => {
            tracing::error!(%error, "Reservation failed");
            return Err(error.into());
        },
    };
    println!(
        "Reserved {} until {} ({} remaining)",
        hold.reservation_id,
        hold.expires_at,
        controller.remaining_time_display().await
    );

    // 5. Follow the countdown
    let mut actions = controller.subscribe();
    let deadline = tokio::time::Instant::now() + WATCH_FOR;
    while let Ok(Ok(action)) = tokio::time::timeout_at(deadline, actions.recv()).await {
        if matches!(action, ReservationAction::CountdownTick { .. }) {
            println!("  {}", controller.remaining_time_display().await);
        }
    }

    // 6. Release
    let released = controller.release().await;
    println!(
        "Released: {released} (status {})",
        controller.status().await
    );

    if let Some(text) = metrics.render() {
        println!("\n{text}");
    }

    Ok(())
}
