//! Integration tests for the chat protocol over loopback TCP.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use lanchat_client::{ChatClient, ClientError, ClientExit, Presentation};
use lanchat_server::{ChatServer, Roster, ShutdownHandle};
use lanchat_shared::{
    ConnectionInfo, Envelope, EnvelopeCodec, EnvelopeKind, EventLog, MAX_FRAME_LENGTH,
    TracingLog, Username,
    envelope::{self, LOGOUT_PAYLOAD, parse_roster_payload},
};
use tokio::{net::TcpStream, task::JoinHandle};
use tokio_util::codec::Framed;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Helper struct to manage an in-process server
struct TestServer {
    port: u16,
    roster: Arc<Roster>,
    handle: ShutdownHandle,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Start a server on an ephemeral loopback port
    async fn start() -> Self {
        let server = ChatServer::bind(&ConnectionInfo::server("127.0.0.1", 0))
            .await
            .expect("Failed to bind server");
        let port = server.local_addr().unwrap().port();
        let roster = server.roster();
        let handle = server.shutdown_handle();
        let task = tokio::spawn(server.run());

        TestServer {
            port,
            roster,
            handle,
            task,
        }
    }

    async fn connect(&self) -> TestPeer {
        let stream = TcpStream::connect(("127.0.0.1", self.port))
            .await
            .expect("Failed to connect");
        TestPeer {
            framed: Framed::new(stream, EnvelopeCodec::new()),
        }
    }

    /// Connect and log in, consuming the LOGIN / WHOISIN acknowledgement
    async fn login(&self, name: &str) -> TestPeer {
        let mut peer = self.connect().await;
        peer.send(Envelope::login(&user(name))).await;
        peer.expect(EnvelopeKind::Login).await;
        peer.expect(EnvelopeKind::Whoisin).await;
        peer
    }

    /// Wait until the roster holds exactly `names`
    async fn wait_for_roster(&self, names: &[&str]) {
        let expected: Vec<Username> = names.iter().map(|name| user(name)).collect();
        tokio::time::timeout(TIMEOUT, async {
            while self.roster.list_users().await != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("roster never became {:?}", names));
    }
}

/// Raw protocol peer speaking framed envelopes
struct TestPeer {
    framed: Framed<TcpStream, EnvelopeCodec>,
}

impl TestPeer {
    async fn send(&mut self, envelope: Envelope) {
        self.framed.send(&envelope).await.expect("Failed to send");
    }

    async fn recv(&mut self) -> Option<Envelope> {
        tokio::time::timeout(TIMEOUT, self.framed.next())
            .await
            .expect("Timeout waiting for an envelope")
            .map(|result| result.expect("Failed to decode"))
    }

    async fn expect(&mut self, kind: EnvelopeKind) -> Envelope {
        let envelope = self.recv().await.expect("Connection closed");
        assert_eq!(envelope.kind(), kind, "unexpected envelope {}", envelope);
        envelope
    }

    /// Wait for the server to close the connection
    async fn expect_closed(&mut self) {
        let next = tokio::time::timeout(TIMEOUT, self.framed.next())
            .await
            .expect("Timeout waiting for the connection to close");
        assert!(!matches!(next, Some(Ok(_))), "connection still open");
    }
}

fn user(name: &str) -> Username {
    Username::new(name).unwrap()
}

#[tokio::test]
async fn test_login_reports_roster_with_new_user() {
    // テスト項目: LOGIN 後の WHOISIN に自分の名前が含まれる
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect().await;

    // when (操作):
    alice.send(Envelope::login(&user("alice"))).await;

    // then (期待する結果):
    let login = alice.expect(EnvelopeKind::Login).await;
    assert_eq!(login.user(), "alice");
    let roster = alice.expect(EnvelopeKind::Whoisin).await;
    assert_eq!(parse_roster_payload(roster.payload()), vec![user("alice")]);
    server.wait_for_roster(&["alice"]).await;
}

#[tokio::test]
async fn test_message_reaches_every_user() {
    // テスト項目: bob の MESSAGE が alice と bob の両方に届く
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.login("alice").await;
    let mut bob = server.login("bob").await;
    alice.expect(EnvelopeKind::Login).await;
    alice.expect(EnvelopeKind::Whoisin).await;

    // when (操作):
    bob.send(Envelope::message(&user("bob"), "hello")).await;

    // then (期待する結果):
    for peer in [&mut alice, &mut bob] {
        let message = peer.expect(EnvelopeKind::Message).await;
        assert_eq!(message.user(), "bob");
        assert_eq!(message.payload(), "hello");
    }
}

#[tokio::test]
async fn test_logout_notifies_remaining_users() {
    // テスト項目: alice の LOGOUT で bob に LOGOUT(alice) → WHOISIN(bob) の順で届き、alice は切断される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.login("alice").await;
    let mut bob = server.login("bob").await;
    alice.expect(EnvelopeKind::Login).await;
    alice.expect(EnvelopeKind::Whoisin).await;

    // when (操作):
    alice.send(Envelope::logout(&user("alice"))).await;

    // then (期待する結果):
    let logout = bob.expect(EnvelopeKind::Logout).await;
    assert_eq!(logout.user(), "alice");
    assert_eq!(logout.payload(), LOGOUT_PAYLOAD);
    let roster = bob.expect(EnvelopeKind::Whoisin).await;
    assert_eq!(roster.payload(), "bob");
    alice.expect_closed().await;
    server.wait_for_roster(&["bob"]).await;
}

#[tokio::test]
async fn test_connection_loss_updates_roster_without_logout() {
    // テスト項目: LOGOUT なしの切断では bob に WHOISIN だけが届く
    // given (前提条件):
    let server = TestServer::start().await;
    let alice = server.login("alice").await;
    let mut bob = server.login("bob").await;

    // when (操作):
    drop(alice);

    // then (期待する結果):
    let update = bob.expect(EnvelopeKind::Whoisin).await;
    assert_eq!(update.payload(), "bob");
    server.wait_for_roster(&["bob"]).await;

    // no LOGOUT was queued ahead of later traffic
    bob.send(Envelope::message(&user("bob"), "still here")).await;
    bob.expect(EnvelopeKind::Message).await;
}

#[tokio::test]
async fn test_duplicate_login_is_rejected() {
    // テスト項目: 使用中のユーザー名での LOGIN は本人にだけ LOGOUT が返され、切断される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.login("alice").await;
    let mut intruder = server.connect().await;

    // when (操作):
    intruder.send(Envelope::login(&user("alice"))).await;

    // then (期待する結果):
    let refusal = intruder.expect(EnvelopeKind::Logout).await;
    assert!(refusal.payload().contains("already logged in"));
    intruder.expect_closed().await;
    server.wait_for_roster(&["alice"]).await;

    alice.send(Envelope::whoisin_request(&user("alice"))).await;
    let roster = alice.expect(EnvelopeKind::Whoisin).await;
    assert_eq!(roster.payload(), "alice");
}

#[tokio::test]
async fn test_sequential_logins_keep_order() {
    // テスト項目: 順番にログインしたユーザーが登録順に WHOISIN に並ぶ
    // given (前提条件):
    let server = TestServer::start().await;
    let names = ["carol", "alice", "dave", "bob"];
    let mut peers = Vec::new();

    // when (操作):
    for name in names {
        peers.push(server.login(name).await);
    }

    // then (期待する結果):
    server.wait_for_roster(&names).await;
    let last = peers.last_mut().unwrap();
    last.send(Envelope::whoisin_request(&user("bob"))).await;
    let roster = last.expect(EnvelopeKind::Whoisin).await;
    assert_eq!(roster.payload(), "carol,alice,dave,bob");
}

#[tokio::test]
async fn test_message_too_long_to_relay_keeps_everyone_connected() {
    // テスト項目: 受信時は 1 フレームに収まるが、ユーザー名の書き直しで最大長を超える MESSAGE は配送されず、誰も切断されない
    // given (前提条件):
    let server = TestServer::start().await;
    let long_name = "b".repeat(32);
    let mut alice = server.login("alice").await;
    let mut bob = server.login(&long_name).await;
    alice.expect(EnvelopeKind::Login).await;
    alice.expect(EnvelopeKind::Whoisin).await;
    let base = envelope::encode(&Envelope::new(EnvelopeKind::Message, "", ""))
        .unwrap()
        .len();

    // when (操作):
    bob.send(Envelope::new(
        EnvelopeKind::Message,
        "",
        "x".repeat(MAX_FRAME_LENGTH - base),
    ))
    .await;
    bob.send(Envelope::message(&user(&long_name), "small")).await;

    // then (期待する結果): 次に届くのは後続の短い MESSAGE
    for peer in [&mut alice, &mut bob] {
        let message = peer.expect(EnvelopeKind::Message).await;
        assert_eq!(message.user(), long_name);
        assert_eq!(message.payload(), "small");
    }
    server.wait_for_roster(&["alice", long_name.as_str()]).await;
}

#[tokio::test]
async fn test_stop_closes_sessions_and_ends_run() {
    // テスト項目: stop() で全セッションが閉じられ、run() が終了する
    // given (前提条件):
    let server = TestServer::start().await;
    // accepted before alice, whose login is acknowledged below
    let mut anonymous = server.connect().await;
    let mut alice = server.login("alice").await;

    // when (操作):
    server.handle.stop();

    // then (期待する結果):
    tokio::time::timeout(TIMEOUT, server.task)
        .await
        .expect("server did not stop")
        .unwrap();
    alice.expect_closed().await;
    anonymous.expect_closed().await;
    assert!(server.roster.is_empty().await);
}

/// EventLog that keeps every line it is given
#[derive(Default)]
struct RecordingLog {
    lines: Mutex<Vec<String>>,
}

impl RecordingLog {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl EventLog for RecordingLog {
    fn log_message(&self, text: &str) {
        self.lines.lock().unwrap().push(text.to_string());
    }

    fn log_error_message(&self, text: &str) {
        self.lines.lock().unwrap().push(format!("error: {}", text));
    }
}

#[tokio::test]
async fn test_server_reports_start_and_stop_to_event_log() {
    // テスト項目: 待ち受け開始と停止が EventLog に記録される
    // given (前提条件):
    let log = Arc::new(RecordingLog::default());
    let server = ChatServer::bind_with_log(&ConnectionInfo::server("127.0.0.1", 0), log.clone())
        .await
        .expect("Failed to bind server");
    let addr = server.local_addr().unwrap();
    let handle = server.shutdown_handle();
    let task = tokio::spawn(server.run());

    // when (操作):
    let waiting = format!("Server waiting for clients on {}", addr);
    tokio::time::timeout(TIMEOUT, async {
        while !log.lines().contains(&waiting) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("never logged '{}': {:?}", waiting, log.lines()));
    handle.stop();
    tokio::time::timeout(TIMEOUT, task)
        .await
        .expect("server did not stop")
        .unwrap();

    // then (期待する結果):
    let lines = log.lines();
    assert_eq!(lines.first(), Some(&waiting));
    assert_eq!(lines.last().map(String::as_str), Some("Server will shut down."));
}

/// Presentation that records what the client showed
#[derive(Default)]
struct RecordingPresentation {
    events: Mutex<Vec<String>>,
}

impl RecordingPresentation {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Presentation for RecordingPresentation {
    fn show_roster(&self, users: &[Username]) {
        let names: Vec<&str> = users.iter().map(Username::as_str).collect();
        self.events
            .lock()
            .unwrap()
            .push(format!("roster {}", names.join(",")));
    }

    fn show_chat(&self, user: &str, text: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("chat {}: {}", user, text));
    }

    fn show_joined(&self, user: &str) {
        self.events.lock().unwrap().push(format!("joined {}", user));
    }

    fn show_left(&self, user: &str) {
        self.events.lock().unwrap().push(format!("left {}", user));
    }
}

async fn wait_for_event(presentation: &RecordingPresentation, event: &str) {
    tokio::time::timeout(TIMEOUT, async {
        while !presentation.events().iter().any(|e| e == event) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("never saw '{}' in {:?}", event, presentation.events()));
}

#[tokio::test]
async fn test_chat_client_end_to_end() {
    // テスト項目: ChatClient でログイン・送受信・ログアウトが一通り動作する
    // given (前提条件):
    let server = TestServer::start().await;
    let mut bob = server.login("bob").await;
    let presentation = Arc::new(RecordingPresentation::default());
    let info = ConnectionInfo::client(user("alice"), "127.0.0.1", server.port);

    // when (操作):
    let client = ChatClient::connect(&info, presentation.clone(), Arc::new(TracingLog))
        .await
        .expect("Failed to connect");

    // then (期待する結果):
    wait_for_event(&presentation, "roster bob,alice").await;
    bob.expect(EnvelopeKind::Login).await;
    bob.expect(EnvelopeKind::Whoisin).await;

    bob.send(Envelope::message(&user("bob"), "hi alice")).await;
    wait_for_event(&presentation, "chat bob: hi alice").await;
    bob.expect(EnvelopeKind::Message).await;

    client.handle().send_text("hi bob").unwrap();
    let message = bob.expect(EnvelopeKind::Message).await;
    assert_eq!(message.user(), "alice");
    assert_eq!(message.payload(), "hi bob");

    client.handle().logout().unwrap();
    let exit = tokio::time::timeout(TIMEOUT, client.wait())
        .await
        .expect("client did not exit");
    assert!(matches!(exit, ClientExit::LoggedOut), "{:?}", exit);
    bob.expect(EnvelopeKind::Logout).await;
    server.wait_for_roster(&["bob"]).await;
}

#[tokio::test]
async fn test_chat_client_duplicate_name_is_rejected() {
    // テスト項目: 使用中の名前で接続した ChatClient は Rejected で終了する
    // given (前提条件):
    let server = TestServer::start().await;
    let _alice = server.login("alice").await;
    let presentation = Arc::new(RecordingPresentation::default());
    let info = ConnectionInfo::client(user("alice"), "127.0.0.1", server.port);

    // when (操作):
    let client = ChatClient::connect(&info, presentation.clone(), Arc::new(TracingLog))
        .await
        .expect("Failed to connect");
    let exit = tokio::time::timeout(TIMEOUT, client.wait())
        .await
        .expect("client did not exit");

    // then (期待する結果):
    match exit {
        ClientExit::Rejected(reason) => assert!(reason.contains("already logged in")),
        other => panic!("expected Rejected, got {:?}", other),
    }
    assert!(presentation.events().is_empty());
    server.wait_for_roster(&["alice"]).await;
}

#[tokio::test]
async fn test_chat_client_refuses_oversized_text() {
    // テスト項目: 1 フレームに収まらない送信は投入時に拒否され、セッションはそのまま使える
    // given (前提条件):
    let server = TestServer::start().await;
    let mut bob = server.login("bob").await;
    let presentation = Arc::new(RecordingPresentation::default());
    let info = ConnectionInfo::client(user("alice"), "127.0.0.1", server.port);
    let client = ChatClient::connect(&info, presentation.clone(), Arc::new(TracingLog))
        .await
        .expect("Failed to connect");
    wait_for_event(&presentation, "roster bob,alice").await;
    bob.expect(EnvelopeKind::Login).await;
    bob.expect(EnvelopeKind::Whoisin).await;

    // when (操作):
    let result = client.handle().send_text("y".repeat(70_000));

    // then (期待する結果):
    assert!(
        matches!(result, Err(ClientError::MessageTooLong { max: MAX_FRAME_LENGTH })),
        "{:?}",
        result
    );
    client.handle().send_text("still here").unwrap();
    let message = bob.expect(EnvelopeKind::Message).await;
    assert_eq!(message.user(), "alice");
    assert_eq!(message.payload(), "still here");
    server.wait_for_roster(&["bob", "alice"]).await;
}

#[tokio::test]
async fn test_chat_client_close_without_logout_reports_closed() {
    // テスト項目: LOGOUT を送らずに close() した ChatClient は LoggedOut ではなく Closed で終了する
    // given (前提条件):
    let server = TestServer::start().await;
    let mut bob = server.login("bob").await;
    let presentation = Arc::new(RecordingPresentation::default());
    let info = ConnectionInfo::client(user("alice"), "127.0.0.1", server.port);
    let client = ChatClient::connect(&info, presentation.clone(), Arc::new(TracingLog))
        .await
        .expect("Failed to connect");
    wait_for_event(&presentation, "roster bob,alice").await;
    bob.expect(EnvelopeKind::Login).await;
    bob.expect(EnvelopeKind::Whoisin).await;

    // when (操作):
    client.close().await;
    let exit = tokio::time::timeout(TIMEOUT, client.wait())
        .await
        .expect("client did not exit");

    // then (期待する結果): bob には LOGOUT ではなく WHOISIN だけが届く
    assert!(matches!(exit, ClientExit::Closed), "{:?}", exit);
    let update = bob.expect(EnvelopeKind::Whoisin).await;
    assert_eq!(update.payload(), "bob");
    server.wait_for_roster(&["bob"]).await;
}
