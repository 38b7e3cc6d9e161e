use clipdash_core::CoreError;
use thiserror::Error;

pub mod persist;
pub mod session;
pub mod store_client;
pub mod ui_state;

pub use persist::Persister;
pub use session::{DragSession, SessionConfig};
pub use store_client::{ItemStore, WsStoreClient};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid store url: {0}")]
    InvalidUrl(String),
    #[error("store connection failed: {0}")]
    Connect(String),
    #[error("store connection closed")]
    ConnectionClosed,
    #[error("store rejected request: {0}")]
    Store(String),
    #[error("unexpected store reply: {0}")]
    UnexpectedReply(String),
    #[error("landing board creation failed: {0}")]
    LandingBoard(String),
    #[error("no drag in progress")]
    NoActiveDrag,
    #[error(transparent)]
    Core(#[from] CoreError),
}
