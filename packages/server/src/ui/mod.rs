//! UI 層: TCP 接続の受付と接続ごとのワーカー

mod server;
mod signal;
mod worker;

pub use server::{ChatServer, ShutdownHandle};
pub use signal::shutdown_signal;
pub use worker::run_session_worker;
