use actix_multipart::{Field, Multipart};
use actix_web::{get, post, web, HttpResponse, Responder};
use anyhow::Context;
use bytes::{Bytes, BytesMut};
use futures_util::TryStreamExt;
use log::{info, warn};

use crate::context::AppContext;
use crate::error::ApiError;
use crate::models::{MessageBody, WasteInfo};
use crate::{preprocess, storage};

/// Nom du champ multipart attendu pour le fichier.
pub const UPLOAD_FIELD: &str = "uploaded_file";

const ACCEPTED_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

pub const HEALTH_MESSAGE: &str = "Hello world from ML endpoint!";

/// Image reçue, valable le temps d'une requête.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedImage {
    pub fn is_accepted_image(&self) -> bool {
        is_accepted_type(self.content_type.as_deref())
    }
}

pub fn is_accepted_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ACCEPTED_TYPES.contains(&ct))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index).service(predict_image);
}

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain; charset=utf-8").body(HEALTH_MESSAGE)
}

#[post("/predict_image")]
pub async fn predict_image(
    ctx: web::Data<AppContext>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let upload = read_upload(payload, ctx.max_upload_bytes).await?;
    info!("Fichier reçu: {}", upload.filename);

    if !upload.is_accepted_image() {
        warn!(
            "Type refusé pour {}: {}",
            upload.filename,
            upload.content_type.as_deref().unwrap_or("absent")
        );
        return Err(ApiError::InvalidContentType);
    }
    let content_type = upload.content_type.as_deref().unwrap_or_default();

    let key = storage::upload_key(&chrono::Local::now(), &upload.filename);
    let blob = ctx
        .store
        .put(&key, upload.bytes.clone(), content_type)
        .await
        .with_context(|| format!("dépôt {} de {}", ctx.store.backend(), key))?;
    info!("Fichier déposé: {}", blob.public_url);

    // Décodage et inférence sur le pool bloquant
    let classifier = ctx.classifier.clone();
    let bytes = upload.bytes;
    let scores = web::block(move || -> anyhow::Result<Vec<f32>> {
        let batch = preprocess::prepare(&bytes)?;
        info!("Lot d'entrée: {:?}", batch.shape());
        classifier.classify(&batch)
    })
    .await
    .map_err(anyhow::Error::from)??;
    info!("Résultat de la prédiction: {:?}", scores);

    match ctx.references.lookup(&scores)? {
        Some(record) => {
            info!("Classe prédite: {}", record.name);
            Ok(HttpResponse::Ok().json(WasteInfo::from(record)))
        }
        None => {
            info!("Aucune classe identifiée");
            Ok(HttpResponse::Ok().json(MessageBody::unidentified()))
        }
    }
}

/// Lit le fichier envoyé : le champ `uploaded_file`, ou à défaut la première
/// partie qui porte un nom de fichier.
async fn read_upload(mut payload: Multipart, limit: usize) -> Result<UploadedImage, ApiError> {
    let mut fallback = None;

    while let Some(field) = payload.try_next().await? {
        let named = field.name() == Some(UPLOAD_FIELD);
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned);
        let content_type = field.content_type().map(|m| m.essence_str().to_owned());

        if named {
            // Type refusé : inutile de lire le corps.
            if !is_accepted_type(content_type.as_deref()) {
                return Err(ApiError::InvalidContentType);
            }
            return Ok(UploadedImage {
                filename: filename.unwrap_or_default(),
                content_type,
                bytes: drain(field, limit).await?,
            });
        }

        if fallback.is_none() {
            if let Some(filename) = filename {
                fallback = Some(UploadedImage {
                    filename,
                    content_type,
                    bytes: drain(field, limit).await?,
                });
            }
        }
    }

    fallback.ok_or(ApiError::MissingFile)
}

async fn drain(mut field: Field, limit: usize) -> Result<Bytes, ApiError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.try_next().await? {
        if buf.len() + chunk.len() > limit {
            return Err(ApiError::UploadTooLarge);
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
