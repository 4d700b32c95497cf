use hyper::header::CONTENT_TYPE;
use hyper::{Body, Request, Response, StatusCode};

use super::request_util::ControllerFuture;
use crate::errors::ControllerError;

/// Request dispatcher. One instance serves every connection.
pub trait Controller: Send + Sync {
    fn call(&self, request: Request<Body>) -> ControllerFuture;
}

#[derive(Serialize)]
struct ErrorMessage {
    error: &'static str,
    details: String,
}

/// Client-facing copy per error class; technical detail goes to `details`.
fn client_message(code: StatusCode) -> &'static str {
    match code {
        StatusCode::NOT_FOUND => "introuvable",
        StatusCode::BAD_REQUEST => "requête invalide",
        StatusCode::UNAUTHORIZED => "authentification requise",
        StatusCode::FORBIDDEN => "accès refusé",
        StatusCode::UNPROCESSABLE_ENTITY => "données illisibles",
        StatusCode::SERVICE_UNAVAILABLE => "service indisponible",
        _ => "une erreur est survenue",
    }
}

pub async fn serve(controller: &dyn Controller, request: Request<Body>) -> Response<Body> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match controller.call(request).await {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("Failed to build response"),
        Err(e) => {
            let code = e.code();
            if code.is_server_error() {
                error!("{} {} failed: {}", method, path, e);
            } else {
                debug!("{} {} rejected: {}", method, path, e);
            }
            let payload = ErrorMessage {
                error: client_message(code),
                details: format!("{}", e),
            };
            let body = serde_json::to_string(&payload)
                .unwrap_or_else(|_| r#"{"error":"une erreur est survenue","details":""}"#.to_string());
            Response::builder()
                .status(code)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .expect("Failed to build response")
        }
    }
}
