//! Request queueing and session lifecycle for formplayer form playback.

pub mod blocking;
pub mod config;
pub mod envelope;
pub mod error;
pub mod errors;
pub mod handler;
pub mod session;
pub mod task_queue;
pub mod transport;

pub use blocking::{Activity, BLOCK_ALL, BLOCK_NONE, BLOCK_SUBMIT, BlockingStatus};
pub use config::SessionConfig;
pub use envelope::{Action, QuestionError, Request, Response, Status};
pub use error::{SessionError, TransportError};
pub use errors::{CALLBACK_ERROR, ErrorReport, FailureReport, GENERIC_ERROR, TIMEOUT_ERROR};
pub use handler::{NoopHandler, SessionHandler};
pub use session::{FormSession, ResponseCallback};
pub use task_queue::{TaskFuture, TaskQueue};
pub use transport::{HttpTransport, Transport, endpoint};
