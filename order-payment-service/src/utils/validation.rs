use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use validator::Validate;

/// JSON body extractor that also runs `validator` rules.
///
/// Malformed bodies and rule violations are both rejected with 400.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Json parse error: {}", e)))?;

        value.validate()?;

        Ok(ValidatedJson(value))
    }
}
