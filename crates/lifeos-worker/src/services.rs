//! Process-wide service container.
//!
//! Constructed once at startup and passed explicitly; no lazy
//! initialization inside workers. The relational and vector clients are
//! shared, the AI clients are cheap handles over pooled HTTP connections.

use tokio::sync::OnceCell;
use tracing::info;

use lifeos_db::SupabaseClient;
use lifeos_ml_client::{MlError, OpenAiClient, TwelveLabsClient};
use lifeos_queue::SegmentQueue;
use lifeos_storage::S3Client;
use lifeos_vector::VectorStore;

use crate::error::WorkerResult;

pub struct Services {
    pub queue: SegmentQueue,
    pub storage: S3Client,
    pub db: SupabaseClient,
    pub vector: VectorStore,
    pub twelvelabs: TwelveLabsClient,
    /// Absent when no chat key is configured; the classifier then uses its
    /// keyword fallback.
    pub openai: Option<OpenAiClient>,
    index_id: OnceCell<String>,
}

impl Services {
    /// Construct every client from the environment. Missing required
    /// configuration surfaces here and is fatal for the process.
    pub async fn from_env() -> WorkerResult<Self> {
        let queue = SegmentQueue::from_env()?;
        let storage = S3Client::from_env().await?;
        let db = SupabaseClient::from_env()?;
        let vector = VectorStore::from_env()?;
        let twelvelabs = TwelveLabsClient::from_env()?;

        let openai = match OpenAiClient::from_env() {
            Ok(client) => Some(client),
            Err(_) => {
                info!("OPENAI_API_KEY not set, classifier will use keyword fallback");
                None
            }
        };

        Ok(Self {
            queue,
            storage,
            db,
            vector,
            twelvelabs,
            openai,
            index_id: OnceCell::new(),
        })
    }

    /// The TwelveLabs index id, resolved once and cached for all workers.
    pub async fn index_id(&self) -> Result<&str, MlError> {
        self.index_id
            .get_or_try_init(|| self.twelvelabs.ensure_index())
            .await
            .map(|s| s.as_str())
    }
}
