//! In-process GigFlow server for adapter integration tests.
//!
//! Serves the `/api/auth/*` session endpoints with a cookie-backed session
//! and a minimal Socket.IO endpoint over both WebSocket and long-polling.
//! After a `join`, the server answers with one `notification:hired` event when
//! a hire payload is configured.

use std::collections::{HashMap, VecDeque};
use std::net::TcpListener;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use actix_web::cookie::Cookie;
use actix_web::dev::ServerHandle;
use actix_web::http::header;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use actix_ws::{Message, MessageStream, Session};
use serde_json::{Value, json};
use tokio::sync::Notify;

pub const SESSION_COOKIE: &str = "token";
pub const SESSION_TOKEN: &str = "session-ada";
pub const ADA_ID: &str = "65f1aa";
pub const ADA_EMAIL: &str = "ada@example.com";
pub const ADA_PASSWORD: &str = "hunter2";

const PING_INTERVAL: Duration = Duration::from_millis(300);
const RECORD_SEPARATOR: char = '\u{1e}';

/// Behaviour switches for one server instance.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Refuse WebSocket upgrades so clients must fall back to polling.
    pub refuse_websocket: bool,
    /// Payload of the hire event sent after each `join`.
    pub hire_on_join: Option<Value>,
}

#[derive(Default)]
struct ServerState {
    options: ServerOptions,
    logout_fails: bool,
    next_sid: u32,
    polling: HashMap<String, VecDeque<String>>,
    handshakes: Vec<String>,
    realtime_cookies: Vec<Option<String>>,
    joins: Vec<String>,
    disconnects: usize,
}

/// Shared view of the fake server's recorded traffic.
#[derive(Clone)]
pub struct FakeGigflow {
    state: Arc<Mutex<ServerState>>,
    polled: Arc<Notify>,
}

impl FakeGigflow {
    fn new(options: ServerOptions) -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                options,
                ..ServerState::default()
            })),
            polled: Arc::new(Notify::new()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().expect("fake server state")
    }

    /// Make the logout endpoint answer 500 with an empty body.
    pub fn fail_logouts(&self) {
        self.state().logout_fails = true;
    }

    /// Transport names of completed Engine.IO handshakes.
    pub fn handshakes(&self) -> Vec<String> {
        self.state().handshakes.clone()
    }

    /// `Cookie` headers sent with each realtime handshake.
    pub fn realtime_cookies(&self) -> Vec<Option<String>> {
        self.state().realtime_cookies.clone()
    }

    /// User ids received in `join` events.
    pub fn joins(&self) -> Vec<String> {
        self.state().joins.clone()
    }

    /// Number of Socket.IO disconnect packets received.
    pub fn disconnects(&self) -> usize {
        self.state().disconnects
    }

    fn record_handshake(&self, transport: &str, req: &HttpRequest) {
        let cookie = req
            .headers()
            .get(header::COOKIE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let mut state = self.state();
        state.handshakes.push(transport.to_owned());
        state.realtime_cookies.push(cookie);
    }

    /// Answer one Socket.IO packet, returning the Socket.IO packets to send
    /// back.
    fn answer(&self, packet: &str) -> Vec<String> {
        if packet == "0" || packet.starts_with("0{") {
            return vec![r#"0{"sid":"socket-1"}"#.to_owned()];
        }
        if packet == "1" {
            self.state().disconnects += 1;
            return Vec::new();
        }
        let Some(event) = packet.strip_prefix('2') else {
            return Vec::new();
        };
        let Ok(Value::Array(parts)) = serde_json::from_str::<Value>(event) else {
            return Vec::new();
        };
        if parts.first().and_then(Value::as_str) != Some("join") {
            return Vec::new();
        }
        let user = parts
            .get(1)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let mut state = self.state();
        state.joins.push(user);
        state
            .options
            .hire_on_join
            .clone()
            .map(|payload| vec![format!("2{}", json!(["notification:hired", payload]))])
            .unwrap_or_default()
    }

    fn open_packet(sid: &str) -> String {
        let handshake = json!({
            "sid": sid,
            "upgrades": [],
            "pingInterval": PING_INTERVAL.as_millis(),
            "pingTimeout": 2000,
            "maxPayload": 1_000_000,
        });
        format!("0{handshake}")
    }

    fn open_polling_session(&self) -> String {
        let mut state = self.state();
        state.next_sid += 1;
        let sid = format!("poll-{}", state.next_sid);
        state.polling.insert(sid.clone(), VecDeque::new());
        sid
    }

    fn drain(&self, sid: &str) -> Option<Vec<String>> {
        let mut state = self.state();
        let queue = state.polling.get_mut(sid)?;
        Some(queue.drain(..).collect())
    }

    fn enqueue(&self, sid: &str, packets: Vec<String>) -> bool {
        let mut state = self.state();
        let Some(queue) = state.polling.get_mut(sid) else {
            return false;
        };
        queue.extend(packets);
        drop(state);
        self.polled.notify_waiters();
        true
    }

    fn close_polling_session(&self, sid: &str) {
        self.state().polling.remove(sid);
    }
}

fn ada(name: &str) -> Value {
    json!({ "_id": ADA_ID, "name": name, "email": ADA_EMAIL })
}

fn authenticated(req: &HttpRequest) -> bool {
    req.cookie(SESSION_COOKIE)
        .is_some_and(|cookie| cookie.value() == SESSION_TOKEN)
}

fn session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, SESSION_TOKEN)
        .path("/")
        .http_only(true)
        .finish()
}

async fn current_identity(req: HttpRequest) -> HttpResponse {
    if authenticated(&req) {
        HttpResponse::Ok().json(ada("Ada"))
    } else {
        HttpResponse::Unauthorized().json(json!({ "message": "Not authenticated" }))
    }
}

async fn login(body: web::Json<Value>) -> HttpResponse {
    let email = body.get("email").and_then(Value::as_str);
    let password = body.get("password").and_then(Value::as_str);
    if email == Some(ADA_EMAIL) && password == Some(ADA_PASSWORD) {
        HttpResponse::Ok().cookie(session_cookie()).json(ada("Ada"))
    } else {
        HttpResponse::BadRequest().json(json!({ "message": "Invalid credentials" }))
    }
}

async fn register(body: web::Json<Value>) -> HttpResponse {
    let name = body.get("name").and_then(Value::as_str).unwrap_or_default();
    if body.get("email").and_then(Value::as_str) == Some("taken@example.com") {
        return HttpResponse::BadRequest().json(json!({ "message": "User already exists" }));
    }
    HttpResponse::Created().cookie(session_cookie()).json(ada(name))
}

async fn logout(server: web::Data<FakeGigflow>) -> HttpResponse {
    if server.state().logout_fails {
        return HttpResponse::InternalServerError().finish();
    }
    let mut removal = session_cookie();
    removal.make_removal();
    HttpResponse::Ok()
        .cookie(removal)
        .json(json!({ "message": "Logged out" }))
}

async fn socket_get(
    req: HttpRequest,
    body: web::Payload,
    query: web::Query<HashMap<String, String>>,
    server: web::Data<FakeGigflow>,
) -> actix_web::Result<HttpResponse> {
    let transport = query.get("transport").map(String::as_str);
    match (transport, query.get("sid")) {
        (Some("websocket"), _) => {
            if server.state().options.refuse_websocket {
                return Ok(HttpResponse::BadRequest().json(json!({ "code": 3 })));
            }
            server.record_handshake("websocket", &req);
            let (response, session, stream) = actix_ws::handle(&req, body)?;
            actix_web::rt::spawn(websocket_session(
                FakeGigflow::clone(&server),
                session,
                stream,
            ));
            Ok(response)
        }
        (Some("polling"), None) => {
            server.record_handshake("polling", &req);
            let sid = server.open_polling_session();
            Ok(HttpResponse::Ok()
                .content_type("text/plain; charset=UTF-8")
                .body(FakeGigflow::open_packet(&sid)))
        }
        (Some("polling"), Some(sid)) => Ok(long_poll(&server, sid).await),
        _ => Ok(HttpResponse::BadRequest().json(json!({ "code": 0 }))),
    }
}

async fn long_poll(server: &FakeGigflow, sid: &str) -> HttpResponse {
    let mut waited = false;
    loop {
        let Some(packets) = server.drain(sid) else {
            return HttpResponse::BadRequest().json(json!({ "code": 1 }));
        };
        if !packets.is_empty() {
            return payload(packets);
        }
        if waited {
            return payload(vec!["2".to_owned()]);
        }
        tokio::time::timeout(PING_INTERVAL, server.polled.notified())
            .await
            .unwrap_or_default();
        waited = true;
    }
}

fn payload(packets: Vec<String>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=UTF-8")
        .body(packets.join(&RECORD_SEPARATOR.to_string()))
}

async fn socket_post(
    query: web::Query<HashMap<String, String>>,
    body: String,
    server: web::Data<FakeGigflow>,
) -> HttpResponse {
    let Some(sid) = query.get("sid") else {
        return HttpResponse::BadRequest().json(json!({ "code": 1 }));
    };
    let mut replies = Vec::new();
    let mut closing = false;
    for packet in body.split(RECORD_SEPARATOR) {
        if packet == "1" {
            closing = true;
            continue;
        }
        if let Some(message) = packet.strip_prefix('4') {
            replies.extend(server.answer(message).into_iter().map(|reply| format!("4{reply}")));
        }
    }
    if !server.enqueue(sid, replies) {
        return HttpResponse::BadRequest().json(json!({ "code": 1 }));
    }
    if closing {
        server.close_polling_session(sid);
    }
    HttpResponse::Ok().content_type("text/html").body("ok")
}

async fn websocket_session(server: FakeGigflow, mut session: Session, mut stream: MessageStream) {
    if session
        .text(FakeGigflow::open_packet("ws-1"))
        .await
        .is_err()
    {
        return;
    }
    let mut pings = tokio::time::interval(PING_INTERVAL);
    pings.tick().await;
    loop {
        tokio::select! {
            _ = pings.tick() => {
                if session.text("2").await.is_err() {
                    return;
                }
            }
            message = stream.recv() => {
                let Some(Ok(message)) = message else {
                    return;
                };
                match message {
                    Message::Text(text) => {
                        let text = text.to_string();
                        if text == "1" {
                            session.close(None).await.unwrap_or_default();
                            return;
                        }
                        let Some(packet) = text.strip_prefix('4') else {
                            continue;
                        };
                        for reply in server.answer(packet) {
                            if session.text(format!("4{reply}")).await.is_err() {
                                return;
                            }
                        }
                    }
                    Message::Ping(bytes) => {
                        if session.pong(&bytes).await.is_err() {
                            return;
                        }
                    }
                    Message::Close(reason) => {
                        session.close(reason).await.unwrap_or_default();
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Start a server on an ephemeral port. Must be called from within an actix
/// (or Tokio `LocalSet`) context.
pub fn spawn_fake_gigflow(options: ServerOptions) -> (String, ServerHandle, FakeGigflow) {
    let fake = FakeGigflow::new(options);
    let data = web::Data::new(fake.clone());
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake server");
    let addr = listener.local_addr().expect("fake server addr");
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .service(
                web::scope("/api/auth")
                    .route("/me", web::get().to(current_identity))
                    .route("/login", web::post().to(login))
                    .route("/register", web::post().to(register))
                    .route("/logout", web::post().to(logout)),
            )
            .service(
                web::resource("/socket.io/")
                    .route(web::get().to(socket_get))
                    .route(web::post().to(socket_post)),
            )
    })
    .disable_signals()
    .workers(1)
    .listen(listener)
    .expect("listen fake server")
    .run();
    let handle = server.handle();
    actix_web::rt::spawn(server);
    (format!("http://{addr}"), handle, fake)
}
