//! UseCase 層: プロトコルの状態遷移と配送ルール

pub mod dispatcher;
pub mod error;

pub use dispatcher::{ConnectionState, Flow, PeerContext, ServerDispatcher};
pub use error::ProtocolViolation;
