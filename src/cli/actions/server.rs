use crate::api;
use crate::api::handlers::{AuthState, SecurityConfig};
use crate::cli::actions::Action;
use anyhow::Result;
use std::sync::Arc;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            frontend_url,
            enc_key,
        } => {
            let config = SecurityConfig::new(frontend_url, enc_key);
            let state = Arc::new(AuthState::new(config));

            api::serve(port, state).await?;
        }
    }

    Ok(())
}
