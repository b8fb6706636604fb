//! Observer server harness for integration tests.
//!
//! Starts the application on an ephemeral port and provides a WebSocket
//! client that sends one claim request and collects every event until the
//! server closes the socket.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use claimrace_bot::{AppConfig, Application};
use claimrace_bot::config::{SandboxAccount, SandboxResource};
use rust_decimal_macros::dec;

pub const MAIN: &str =
    "abandon ability able about above absent absorb abstract absurd abuse access accident";
pub const SPONSOR: &str =
    "zoo ability able about above absent absorb abstract absurd abuse access accident";
pub const DESTINATION: &str = "GDESTINATIONWALLET";

/// Upper bound on a whole session in these tests.
const SESSION_TIMEOUT: Duration = Duration::from_secs(20);

/// A running observer server.
pub struct TestObserver {
    addr: SocketAddr,
    shutdown: CancellationToken,
}

impl TestObserver {
    /// Start the application on `127.0.0.1:0`.
    pub async fn start(config: AppConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Application::new(config).unwrap();
        let shutdown = app.shutdown_token();

        tokio::spawn(async move {
            let _ = app.serve(listener).await;
        });

        Self { addr, shutdown }
    }

    /// WebSocket URL of the race stream.
    pub fn url(&self) -> String {
        format!("ws://{}/ws/withdraw", self.addr)
    }

    /// Send `request` as the first frame and collect events until close.
    pub async fn run_session(&self, request: serde_json::Value) -> Vec<serde_json::Value> {
        let (mut ws, _) = connect_async(self.url()).await.unwrap();
        ws.send(Message::Text(request.to_string())).await.unwrap();

        let collect = async {
            let mut events = Vec::new();
            while let Some(msg) = ws.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        events.push(serde_json::from_str::<serde_json::Value>(&text).unwrap());
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
            events
        };

        tokio::time::timeout(SESSION_TIMEOUT, collect)
            .await
            .expect("session did not finish in time")
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Config with a funded claimant and sponsor and one resource for the
/// claimant, unlocking `unlock_in_secs` after startup.
pub fn race_config(unlock_in_secs: i64) -> AppConfig {
    let mut config = AppConfig::default();
    config.race.workers = 3;
    config.race.max_attempts = 5;
    config.race.relay_timeout_secs = 1;
    config.sandbox.accounts = vec![
        SandboxAccount {
            phrase: MAIN.to_string(),
            balance: dec!(1.48),
        },
        SandboxAccount {
            phrase: SPONSOR.to_string(),
            balance: dec!(100),
        },
    ];
    config.sandbox.resources = vec![SandboxResource {
        id: "00ab".to_string(),
        amount: dec!(250),
        asset: "native".to_string(),
        claimant_phrase: MAIN.to_string(),
        unlock_in_secs,
    }];
    config
}

/// Claim request for the seeded resource.
pub fn claim_request(sponsor: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "seed_phrase": MAIN,
        "sponsor_phrase": sponsor,
        "withdrawal_address": DESTINATION,
        "locked_balance_id": "00ab",
        "amount": "250",
    })
}

/// Events whose `action` equals `kind`.
pub fn of_kind<'a>(events: &'a [serde_json::Value], kind: &str) -> Vec<&'a serde_json::Value> {
    events.iter().filter(|e| e["action"] == kind).collect()
}
