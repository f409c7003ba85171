//! Infrastructure 層: ドメインの送信口を TCP セッションで実装する

pub mod session_sink;
