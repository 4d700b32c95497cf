use hyper::StatusCode;

/// Service-level error taxonomy. Controller code downcasts the root cause of
/// a `failure::Error` to this enum to pick the HTTP status.
#[derive(Clone, Debug, Fail, PartialEq)]
pub enum Error {
    #[fail(display = "Not found")]
    NotFound,
    #[fail(display = "Validation error: {}", _0)]
    Validate(String),
    #[fail(display = "Parse error")]
    Parse,
    #[fail(display = "Authentication required")]
    Unauthorized,
    #[fail(display = "Access denied")]
    Forbidden,
    #[fail(display = "Feature is not configured: {}", _0)]
    NotConfigured(&'static str),
    #[fail(display = "Payment provider error")]
    Gateway,
}

#[derive(Debug, Fail)]
pub enum RepoError {
    #[fail(display = "Not found")]
    NotFound,
    #[fail(display = "Connection: {}", reason)]
    Connection { reason: String },
}

impl From<tokio_postgres::Error> for RepoError {
    fn from(v: tokio_postgres::Error) -> Self {
        RepoError::Connection {
            reason: format!("{}", v),
        }
    }
}

#[derive(Debug, Fail)]
pub enum ControllerError {
    #[fail(display = "Not found")]
    NotFound,
    #[fail(display = "Bad request: {}", _0)]
    BadRequest(failure::Error),
    #[fail(display = "Unauthorized: {}", _0)]
    Unauthorized(failure::Error),
    #[fail(display = "Forbidden: {}", _0)]
    Forbidden(failure::Error),
    #[fail(display = "Unprocessable entity: {}", _0)]
    UnprocessableEntity(failure::Error),
    #[fail(display = "Service unavailable: {}", _0)]
    ServiceUnavailable(failure::Error),
    #[fail(display = "Bad gateway: {}", _0)]
    BadGateway(failure::Error),
    #[fail(display = "Internal server error: {}", _0)]
    InternalServerError(failure::Error),
}

impl ControllerError {
    pub fn code(&self) -> StatusCode {
        use self::ControllerError::*;

        match self {
            NotFound => StatusCode::NOT_FOUND,
            BadRequest(_) => StatusCode::BAD_REQUEST,
            Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Forbidden(_) => StatusCode::FORBIDDEN,
            UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            BadGateway(_) => StatusCode::BAD_GATEWAY,
            InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepoError> for ControllerError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ControllerError::NotFound,
            other => ControllerError::InternalServerError(other.into()),
        }
    }
}

impl From<failure::Error> for ControllerError {
    fn from(e: failure::Error) -> Self {
        use self::Error::*;

        match e.find_root_cause().downcast_ref::<Error>() {
            Some(NotFound) => ControllerError::NotFound,
            Some(Validate(_)) => ControllerError::BadRequest(e),
            Some(Parse) => ControllerError::UnprocessableEntity(e),
            Some(Unauthorized) => ControllerError::Unauthorized(e),
            Some(Forbidden) => ControllerError::Forbidden(e),
            Some(NotConfigured(_)) => ControllerError::ServiceUnavailable(e),
            Some(Gateway) => ControllerError::BadGateway(e),
            None => match e.find_root_cause().downcast_ref::<RepoError>() {
                Some(RepoError::NotFound) => ControllerError::NotFound,
                _ => ControllerError::InternalServerError(e),
            },
        }
    }
}
