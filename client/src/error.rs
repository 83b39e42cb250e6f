use std::{error::Error, fmt};

use comms::ErrorResponse;
use machine_learning::MlErr;
use tokio::task::JoinError;

/// The client module's result type.
pub type Result<T> = std::result::Result<T, ClientErr>;

/// Failures running the client side of the split or talking to the server.
#[derive(Debug)]
pub enum ClientErr {
    /// The pixel buffer doesn't hold `height * width` RGB pixels.
    Image {
        got: usize,
        expected: usize,
    },
    Model(MlErr),
    Task(JoinError),
    Http(reqwest::Error),
    /// The server answered with one of its structured errors.
    Server {
        status: u16,
        body: ErrorResponse,
    },
    /// The server failed without one of its structured errors, e.g. a proxy in between.
    Status {
        status: u16,
        text: String,
    },
}

impl fmt::Display for ClientErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientErr::Image { got, expected } => write!(
                f,
                "the image holds {got} bytes but {expected} were expected"
            ),
            ClientErr::Model(e) => write!(f, "client segment failed: {e}"),
            ClientErr::Task(e) => write!(f, "the forward pass didn't finish: {e}"),
            ClientErr::Http(e) => write!(f, "http error: {e}"),
            ClientErr::Server { status, body } => write!(
                f,
                "the server answered {status} ({:?}): {}",
                body.error, body.message
            ),
            ClientErr::Status { status, text } => {
                write!(f, "the server answered {status}: {text}")
            }
        }
    }
}

impl Error for ClientErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClientErr::Model(e) => Some(e),
            ClientErr::Task(e) => Some(e),
            ClientErr::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for ClientErr {
    fn from(value: MlErr) -> Self {
        Self::Model(value)
    }
}

impl From<JoinError> for ClientErr {
    fn from(value: JoinError) -> Self {
        Self::Task(value)
    }
}

impl From<reqwest::Error> for ClientErr {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}
