use actix_multipart::MultipartError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::{error, warn};

use crate::models::ErrorBody;

/// Erreurs renvoyées par l'API. Les erreurs internes ne donnent jamais de
/// détail au client ; la cause complète va dans les logs.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("File is Not an Image")]
    InvalidContentType,

    #[error("No File Uploaded")]
    MissingFile,

    #[error("Invalid Upload")]
    MalformedUpload(#[from] MultipartError),

    #[error("File Too Large")]
    UploadTooLarge,

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidContentType | ApiError::MissingFile | ApiError::MalformedUpload(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::UploadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Internal(e) => error!("Échec du traitement: {:#}", e),
            ApiError::MalformedUpload(e) => warn!("Multipart invalide: {}", e),
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}
