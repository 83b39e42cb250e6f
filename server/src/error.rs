use std::{error::Error, fmt};

use axum::{
    Json,
    http::StatusCode,
    extract::rejection::BytesRejection,
    response::{IntoResponse, Response},
};
use comms::{ErrorKind, ErrorResponse, WireErr};
use machine_learning::MlErr;
use tokio::task::JoinError;

use crate::classes::LookupErr;

/// Everything that can go wrong while answering an inference request.
#[derive(Debug)]
pub enum ServiceErr {
    /// The body couldn't be read, usually because it is over the size limit.
    Body(BytesRejection),
    /// The body isn't a valid request or its shape descriptor is unusable.
    Wire(WireErr),
    /// The activation doesn't fit the server segment's input.
    Shape(MlErr),
    /// The forward pass or the argmax failed.
    Model(MlErr),
    Lookup(LookupErr),
    /// The blocking task running the forward pass panicked or was cancelled.
    Task(JoinError),
}

impl ServiceErr {
    /// The category this error is reported as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceErr::Body(_) => ErrorKind::MalformedRequest,
            ServiceErr::Wire(e) => e.kind(),
            ServiceErr::Shape(_) => ErrorKind::ShapeMismatch,
            ServiceErr::Model(MlErr::DeviceMismatch { .. } | MlErr::ThreadPool(_)) => {
                ErrorKind::DeviceError
            }
            ServiceErr::Model(_) | ServiceErr::Task(_) => ErrorKind::ModelError,
            ServiceErr::Lookup(_) => ErrorKind::LookupError,
        }
    }

    pub fn status(&self) -> StatusCode {
        if let ServiceErr::Body(e) = self {
            return e.status();
        }

        match self.kind() {
            ErrorKind::MalformedRequest => StatusCode::BAD_REQUEST,
            ErrorKind::ShapeMismatch => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::DeviceError | ErrorKind::LookupError | ErrorKind::ModelError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for ServiceErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceErr::Body(e) => write!(f, "couldn't read the request body: {e}"),
            ServiceErr::Wire(e) => write!(f, "{e}"),
            ServiceErr::Shape(e) => write!(f, "the activation doesn't fit the model: {e}"),
            ServiceErr::Model(e) => write!(f, "{e}"),
            ServiceErr::Lookup(e) => write!(f, "{e}"),
            ServiceErr::Task(e) => write!(f, "the forward pass didn't finish: {e}"),
        }
    }
}

impl Error for ServiceErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServiceErr::Body(e) => Some(e),
            ServiceErr::Wire(e) => Some(e),
            ServiceErr::Shape(e) | ServiceErr::Model(e) => Some(e),
            ServiceErr::Lookup(e) => Some(e),
            ServiceErr::Task(e) => Some(e),
        }
    }
}

impl From<BytesRejection> for ServiceErr {
    fn from(value: BytesRejection) -> Self {
        Self::Body(value)
    }
}

impl From<WireErr> for ServiceErr {
    fn from(value: WireErr) -> Self {
        Self::Wire(value)
    }
}

impl From<MlErr> for ServiceErr {
    fn from(value: MlErr) -> Self {
        Self::Model(value)
    }
}

impl From<LookupErr> for ServiceErr {
    fn from(value: LookupErr) -> Self {
        Self::Lookup(value)
    }
}

impl From<JoinError> for ServiceErr {
    fn from(value: JoinError) -> Self {
        Self::Task(value)
    }
}

impl IntoResponse for ServiceErr {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("inference failed: {self}");
        } else {
            log::warn!("rejected request: {self}");
        }

        let body = ErrorResponse {
            error: self.kind(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
