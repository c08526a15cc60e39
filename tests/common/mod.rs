//! Common utilities for integration tests: spawning the real `oauth_proxy`
//! binary against a temp config file and waiting for it to come up.

use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

static NEXT_PORT: AtomicU16 = AtomicU16::new(20_000);

pub fn get_free_port() -> u16 {
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Guard that kills and waits on a child process when dropped.
pub struct KillOnDrop(pub Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn get_proxy_bin() -> &'static str {
    env!("CARGO_BIN_EXE_oauth_proxy")
}

/// Writes `config_toml` to a temp file and spawns `oauth_proxy --config <it>
/// --bind 127.0.0.1 --port <port>`.
pub fn spawn_proxy_with_config(port: u16, config_toml: &str) -> Child {
    let tmp = std::env::temp_dir().join(format!("oauth_proxy_integration_test_{port}.toml"));
    std::fs::write(&tmp, config_toml).expect("failed to write config");

    Command::new(get_proxy_bin())
        .args([
            "--config",
            tmp.to_str().unwrap(),
            "--bind",
            "127.0.0.1",
            "--port",
            &port.to_string(),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to start oauth_proxy")
}

/// Blocks until a TCP listener is accepting on `127.0.0.1:port` or times out.
pub async fn wait_for_listening(port: u16, timeout_secs: u64) {
    let start = Instant::now();
    while std::net::TcpStream::connect(("127.0.0.1", port)).is_err() {
        if start.elapsed() > Duration::from_secs(timeout_secs) {
            panic!("server did not start within timeout");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
