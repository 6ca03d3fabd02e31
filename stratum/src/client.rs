use rand::rngs::OsRng;
use rand::RngCore;
use std::net::TcpStream;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    New,
    Subscribed,
    Authorized,
}

/// Per-connection state. Reader threads mutate their own client's fields
/// directly; the broadcast thread locks each client independently so it
/// never blocks on another client's socket write.
pub struct ClientInner {
    pub stream: TcpStream,
    pub session_id: String,
    pub state: ClientState,
    pub wallet_address: String,
    pub worker_name: String,
    pub last_activity_unix: u64,
    pub shares_accepted: u64,
    pub shares_rejected: u64,
}

impl ClientInner {
    pub fn new(stream: TcpStream, session_id: String) -> Self {
        Self {
            stream,
            session_id,
            state: ClientState::New,
            wallet_address: String::new(),
            worker_name: String::new(),
            last_activity_unix: unix_seconds(),
            shares_accepted: 0,
            shares_rejected: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity_unix = unix_seconds();
    }

    pub fn is_idle(&self, idle_timeout_seconds: u64) -> bool {
        unix_seconds().saturating_sub(self.last_activity_unix) > idle_timeout_seconds
    }

    pub fn is_subscribed_and_authorized(&self) -> bool {
        self.state == ClientState::Authorized
    }
}

pub fn unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// Generates an unguessable 128-bit session id (hex-encoded) via the OS CSPRNG.
/// Also serves as the source for `extranonce1`, so it must not be predictable
/// from the connection count or wall-clock time.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_128_bit_hex_and_unpredictable() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
