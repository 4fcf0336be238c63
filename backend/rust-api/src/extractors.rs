use axum::{
    extract::{FromRequest, Request},
    response::{IntoResponse, Response},
};

use crate::error::ServiceError;

/// JSON body extractor whose rejections use the API's error shape.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(ServiceError::InvalidArgument(format!(
                "failed to parse JSON request body: {}",
                rejection.body_text()
            ))
            .into_response()),
        }
    }
}
