// Types d'erreurs du service, un enum par préoccupation.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

// Erreurs de la couche de stockage (SQLite).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    // L'enregistrement parent (post, chat) n'existe pas.
    #[error("{0} not found")]
    NotFound(&'static str),
}

// Erreurs remontées par le `Broker` lors d'une publication.
#[derive(Debug, Error)]
pub enum PublishError {
    // Champ requis absent ou vide : aucune écriture, aucune diffusion.
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

// Échec d'une lecture du capteur. Toujours récupéré localement par le sampler.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("sensor read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("unparsable sensor value {0:?}")]
    Parse(String),
    #[error("sensor returned a non-finite value")]
    NotFinite,
    #[error("sensor read timed out")]
    Timeout,
}

// Un abonné n'est plus joignable pendant une diffusion.
#[derive(Debug, Error)]
#[error("connection {0} is gone")]
pub struct DeliveryError(pub String);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

// Erreur HTTP renvoyée au client sous la forme `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            StorageError::Database(e) => {
                // Le détail reste dans les logs, le client reçoit un message générique.
                error!("Erreur de stockage: {}", e);
                ApiError::internal()
            }
        }
    }
}

impl From<PublishError> for ApiError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Validation(message) => ApiError::bad_request(message),
            PublishError::Storage(e) => e.into(),
        }
    }
}
