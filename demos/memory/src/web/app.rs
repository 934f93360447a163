use axum_idp::{
    login_required,
    memory::MemoryProvider,
    tower_sessions::{Expiry, MemoryStore, SessionManagerLayer},
    AuthConfig, AuthManagerLayerBuilder,
};
use time::Duration;

use crate::web::{auth, protected};

pub struct App {
    provider: MemoryProvider,
    config: AuthConfig,
}

impl App {
    pub async fn new() -> Self {
        let provider = MemoryProvider::new();
        provider.add_user("ferris@example.com", "hunter42").await;

        let config = AuthConfig::default().with_site_url("http://localhost:3000");

        Self { provider, config }
    }

    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error>> {
        // Session layer.
        //
        // Each browser's signed-in user and tokens are kept in its own
        // `tower-sessions` session.
        let session_store = MemoryStore::default();
        let session_layer = SessionManagerLayer::new(session_store)
            .with_secure(false)
            .with_expiry(Expiry::OnInactivity(Duration::days(1)));

        let auth_layer = AuthManagerLayerBuilder::new(self.provider, session_layer)
            .with_config(self.config)
            .build();

        let app = protected::router()
            .route_layer(login_required!(MemoryProvider))
            .merge(auth::router())
            .layer(auth_layer);

        let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
        axum::serve(listener, app.into_make_service()).await?;

        Ok(())
    }
}
