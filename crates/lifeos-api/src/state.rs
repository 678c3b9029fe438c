//! Application state.

use std::sync::Arc;

use tracing::info;

use lifeos_db::SupabaseClient;
use lifeos_ml_client::{OpenAiClient, TwelveLabsClient};
use lifeos_storage::S3Client;
use lifeos_vector::VectorStore;

use crate::auth::AuthService;
use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub db: Arc<SupabaseClient>,
    pub vector: Arc<VectorStore>,
    pub storage: Arc<S3Client>,
    pub twelvelabs: Arc<TwelveLabsClient>,
    /// Absent when no chat key is configured; chatbot falls back to the
    /// canned degraded responses.
    pub openai: Option<Arc<OpenAiClient>>,
    pub auth: AuthService,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Arc::new(SupabaseClient::from_env()?);
        let vector = Arc::new(VectorStore::from_env()?);
        let storage = Arc::new(S3Client::from_env().await?);
        let twelvelabs = Arc::new(TwelveLabsClient::from_env()?);

        let openai = match OpenAiClient::from_env() {
            Ok(client) => Some(Arc::new(client)),
            Err(_) => {
                info!("OPENAI_API_KEY not set, chatbot degrades to canned responses");
                None
            }
        };

        let auth = AuthService::new(Arc::clone(&db), config.jwt_secret.clone());

        Ok(Self {
            config,
            db,
            vector,
            storage,
            twelvelabs,
            openai,
            auth,
        })
    }
}
