//! Run with
//!
//! ```not_rust
//! cargo run -p demo-memory
//! ```
//!
//! Then sign in at http://localhost:3000/login as `ferris@example.com` with
//! the password `hunter42`.

use crate::web::App;

mod web;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "axum_idp=debug,demo_memory=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    App::new().await.serve().await
}
