use crate::client::{generate_session_id, unix_seconds, ClientInner, ClientState};
use crate::error::StratumError;
use crate::protocol::{error_codes, error_response, job_payload, notification, split_wallet_worker, success_response, RpcRequest};
use block_template::BlockTemplateProvider;
use chain_types::{EpochKey, HashTarget};
use hash_engine::{HashEngine, HashEngineError, Mode};
use mining::JobBroker;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StratumConfig {
    pub bind: String,
    pub port: u16,
    pub max_clients: usize,
    pub recv_buffer_limit: usize,
    pub idle_timeout_seconds: u64,
    pub broadcast_poll: Duration,
}

impl Default for StratumConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3335,
            max_clients: 1024,
            recv_buffer_limit: 64 * 1024,
            idle_timeout_seconds: 600,
            broadcast_poll: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StratumStats {
    pub clients: usize,
    pub shares_accepted: u64,
    pub shares_rejected: u64,
    pub blocks_found: u64,
}

struct Shared {
    config: StratumConfig,
    clients: Mutex<HashMap<u64, Arc<Mutex<ClientInner>>>>,
    next_client_id: AtomicU64,
    broker: Arc<JobBroker>,
    provider: Arc<dyn BlockTemplateProvider>,
    hash_engine: Arc<HashEngine>,
    running: AtomicBool,
    shares_accepted: AtomicU64,
    shares_rejected: AtomicU64,
    blocks_found: AtomicU64,
}

/// Component S: accepts TCP mining connections, speaks a line-delimited
/// JSON-RPC mining dialect over them, and validates submitted shares.
pub struct StratumServer {
    shared: Arc<Shared>,
    accept_thread: Mutex<Option<JoinHandle<()>>>,
    broadcast_thread: Mutex<Option<JoinHandle<()>>>,
}

impl StratumServer {
    pub fn new(
        config: StratumConfig,
        broker: Arc<JobBroker>,
        provider: Arc<dyn BlockTemplateProvider>,
        hash_engine: Arc<HashEngine>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                clients: Mutex::new(HashMap::new()),
                next_client_id: AtomicU64::new(1),
                broker,
                provider,
                hash_engine,
                running: AtomicBool::new(false),
                shares_accepted: AtomicU64::new(0),
                shares_rejected: AtomicU64::new(0),
                blocks_found: AtomicU64::new(0),
            }),
            accept_thread: Mutex::new(None),
            broadcast_thread: Mutex::new(None),
        }
    }

    pub fn start(&self) -> Result<(), StratumError> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(StratumError::AlreadyRunning);
        }

        let addr = format!("{}:{}", self.shared.config.bind, self.shared.config.port);
        let listener = TcpListener::bind(&addr).map_err(|source| StratumError::Bind { addr: addr.clone(), source })?;
        listener.set_nonblocking(true).ok();
        log::info!("stratum server listening on {}", addr);

        let shared = self.shared.clone();
        let accept_handle = std::thread::spawn(move || {
            while shared.running.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, peer)) => {
                        log::info!("accepted connection from {}", peer);
                        spawn_client_reader(shared.clone(), stream);
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(Duration::from_millis(50));
                    }
                    Err(e) => {
                        log::error!("accept error: {}", e);
                        std::thread::sleep(Duration::from_millis(50));
                    }
                }
            }
        });
        *self.accept_thread.lock().unwrap() = Some(accept_handle);

        let shared = self.shared.clone();
        let broadcast_handle = std::thread::spawn(move || {
            let mut last_broadcast_job_id: Option<String> = None;
            while shared.running.load(Ordering::SeqCst) {
                std::thread::sleep(shared.config.broadcast_poll);
                if let Some(job) = shared.broker.current_job() {
                    if last_broadcast_job_id.as_deref() != Some(job.job_id.as_str()) {
                        broadcast_job(&shared, &job);
                        last_broadcast_job_id = Some(job.job_id.clone());
                    }
                }
                reap_idle_clients(&shared);
            }
        });
        *self.broadcast_thread.lock().unwrap() = Some(broadcast_handle);

        Ok(())
    }

    pub fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.accept_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.broadcast_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        let clients: Vec<_> = self.shared.clients.lock().unwrap().drain().collect();
        for (_, client) in clients {
            let guard = client.lock().unwrap();
            let _ = guard.stream.shutdown(std::net::Shutdown::Both);
        }
    }

    pub fn stats(&self) -> StratumStats {
        StratumStats {
            clients: self.shared.clients.lock().unwrap().len(),
            shares_accepted: self.shared.shares_accepted.load(Ordering::SeqCst),
            shares_rejected: self.shared.shares_rejected.load(Ordering::SeqCst),
            blocks_found: self.shared.blocks_found.load(Ordering::SeqCst),
        }
    }
}

fn broadcast_job(shared: &Arc<Shared>, job: &mining::Job) {
    let targets: Vec<Arc<Mutex<ClientInner>>> = shared.clients.lock().unwrap().values().cloned().collect();
    let message = notification("job", job_payload(job));
    let mut line = serde_json::to_string(&message).unwrap_or_default();
    line.push('\n');

    for client in targets {
        let mut guard = client.lock().unwrap();
        if !guard.is_subscribed_and_authorized() {
            continue;
        }
        let _ = guard.stream.write_all(line.as_bytes());
    }
}

fn reap_idle_clients(shared: &Arc<Shared>) {
    let idle_ids: Vec<u64> = {
        let clients = shared.clients.lock().unwrap();
        clients
            .iter()
            .filter(|(_, c)| c.lock().unwrap().is_idle(shared.config.idle_timeout_seconds))
            .map(|(id, _)| *id)
            .collect()
    };
    if idle_ids.is_empty() {
        return;
    }
    let mut clients = shared.clients.lock().unwrap();
    for id in idle_ids {
        if let Some(client) = clients.remove(&id) {
            log::info!("reaping idle client {}", id);
            let _ = client.lock().unwrap().stream.shutdown(std::net::Shutdown::Both);
        }
    }
}

fn spawn_client_reader(shared: Arc<Shared>, stream: TcpStream) {
    let client_id = shared.next_client_id.fetch_add(1, Ordering::SeqCst);
    let session_id = generate_session_id();

    let write_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            log::error!("failed to clone client stream: {}", e);
            return;
        }
    };
    let client = Arc::new(Mutex::new(ClientInner::new(write_stream, session_id)));
    shared.clients.lock().unwrap().insert(client_id, client.clone());

    std::thread::spawn(move || {
        let _ = stream.set_read_timeout(Some(Duration::from_millis(500)));
        let mut reader = BufReader::new(stream);
        let mut recv_buffer = String::new();

        while shared.running.load(Ordering::SeqCst) {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    recv_buffer.push_str(&line);
                    if recv_buffer.len() > shared.config.recv_buffer_limit {
                        log::warn!("client {} exceeded recv buffer limit, disconnecting", client_id);
                        break;
                    }
                    while let Some(pos) = recv_buffer.find('\n') {
                        let frame = recv_buffer[..pos].to_string();
                        recv_buffer.drain(..=pos);
                        if frame.trim().is_empty() {
                            continue;
                        }
                        handle_frame(&shared, &client, &frame);
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                    continue;
                }
                Err(_) => break,
            }
        }

        shared.clients.lock().unwrap().remove(&client_id);
        log::info!("client {} disconnected", client_id);
    });
}

fn handle_frame(shared: &Arc<Shared>, client: &Arc<Mutex<ClientInner>>, frame: &str) {
    let request: RpcRequest = match serde_json::from_str(frame) {
        Ok(r) => r,
        Err(e) => {
            log::warn!("malformed request: {}", e);
            return;
        }
    };

    client.lock().unwrap().touch();
    let response = dispatch(shared, client, &request);
    let mut line = serde_json::to_string(&response).unwrap_or_default();
    line.push('\n');
    let _ = client.lock().unwrap().stream.write_all(line.as_bytes());
}

fn dispatch(shared: &Arc<Shared>, client: &Arc<Mutex<ClientInner>>, request: &RpcRequest) -> Value {
    match request.method.as_str() {
        "mining.subscribe" => handle_subscribe(client),
        "mining.authorize" => handle_authorize(&request.id, client, &request.params),
        "mining.submit" => handle_standard_submit(shared, &request.id, client, &request.params),
        "login" => handle_login(shared, &request.id, client, &request.params),
        "getjob" => handle_getjob(shared, &request.id),
        "submit" => handle_monero_submit(shared, &request.id, client, &request.params),
        other => {
            log::warn!("unknown method: {}", other);
            error_response(&request.id, error_codes::UNKNOWN_METHOD, "unknown method")
        }
    }
}

fn handle_subscribe(client: &Arc<Mutex<ClientInner>>) -> Value {
    let mut guard = client.lock().unwrap();
    guard.state = ClientState::Subscribed;
    let extranonce1 = guard.session_id[..8].to_string();
    success_response(
        &Value::from(1),
        serde_json::json!([[["mining.notify", guard.session_id.clone()]], extranonce1, 4]),
    )
}

fn handle_authorize(id: &Value, client: &Arc<Mutex<ClientInner>>, params: &Value) -> Value {
    let login = params.get(0).and_then(Value::as_str).unwrap_or_default();
    let (wallet, worker) = split_wallet_worker(login);
    let mut guard = client.lock().unwrap();
    guard.wallet_address = wallet;
    guard.worker_name = worker;
    guard.state = ClientState::Authorized;
    success_response(id, Value::Bool(true))
}

fn handle_login(shared: &Arc<Shared>, id: &Value, client: &Arc<Mutex<ClientInner>>, params: &Value) -> Value {
    let login = params.get("login").and_then(Value::as_str).unwrap_or_default();
    let (wallet, worker) = split_wallet_worker(login);
    let session_id = {
        let mut guard = client.lock().unwrap();
        guard.wallet_address = wallet;
        guard.worker_name = worker;
        guard.state = ClientState::Authorized;
        guard.session_id.clone()
    };

    let job = shared.broker.current_job();
    let job_value = job.as_ref().map(|j| job_payload(j)).unwrap_or(Value::Null);
    success_response(
        id,
        serde_json::json!({"id": session_id, "job": job_value, "status": "OK"}),
    )
}

fn handle_getjob(shared: &Arc<Shared>, id: &Value) -> Value {
    match shared.broker.current_job() {
        Some(job) => success_response(id, job_payload(&job)),
        None => error_response(id, error_codes::UNKNOWN_JOB, "no job available yet"),
    }
}

fn handle_standard_submit(shared: &Arc<Shared>, id: &Value, client: &Arc<Mutex<ClientInner>>, params: &Value) -> Value {
    let job_id = params.get(1).and_then(Value::as_str).unwrap_or_default();
    let nonce_hex = params.get(2).and_then(Value::as_str).unwrap_or_default();
    submit_share(shared, id, client, job_id, nonce_hex)
}

fn handle_monero_submit(shared: &Arc<Shared>, id: &Value, client: &Arc<Mutex<ClientInner>>, params: &Value) -> Value {
    let job_id = params.get("job_id").and_then(Value::as_str).unwrap_or_default();
    let nonce_hex = params.get("nonce").and_then(Value::as_str).unwrap_or_default();
    submit_share(shared, id, client, job_id, nonce_hex)
}

fn submit_share(shared: &Arc<Shared>, id: &Value, client: &Arc<Mutex<ClientInner>>, job_id: &str, nonce_hex: &str) -> Value {
    match validate_and_submit_share(shared, job_id, nonce_hex) {
        Ok(true) => {
            client.lock().unwrap().shares_accepted += 1;
            shared.shares_accepted.fetch_add(1, Ordering::SeqCst);
            success_response(id, Value::Bool(true))
        }
        Ok(false) => {
            client.lock().unwrap().shares_rejected += 1;
            shared.shares_rejected.fetch_add(1, Ordering::SeqCst);
            error_response(id, error_codes::LOW_DIFFICULTY, "share rejected by provider")
        }
        Err((code, message)) => {
            client.lock().unwrap().shares_rejected += 1;
            shared.shares_rejected.fetch_add(1, Ordering::SeqCst);
            error_response(id, code, &message)
        }
    }
}

/// Implements the 8-step submit validation: job lookup, nonce parsing,
/// header reconstruction, lazy engine init, hashing, target decode,
/// target comparison, provider submission.
fn validate_and_submit_share(shared: &Arc<Shared>, job_id: &str, nonce_hex: &str) -> Result<bool, (i32, String)> {
    let job = shared
        .broker
        .lookup(job_id)
        .ok_or_else(|| (error_codes::UNKNOWN_JOB, "stale/unknown job".to_string()))?;

    let nonce_bytes = hex::decode(nonce_hex).map_err(|_| (error_codes::MALFORMED_SUBMIT, "malformed nonce".to_string()))?;
    if nonce_bytes.len() != 4 {
        return Err((error_codes::MALFORMED_SUBMIT, "nonce must be 4 bytes".to_string()));
    }
    let nonce = u32::from_le_bytes([nonce_bytes[0], nonce_bytes[1], nonce_bytes[2], nonce_bytes[3]]);

    let header = job.template.to_header().with_nonce(nonce);

    let epoch_key = EpochKey::from(*job.template.prev_hash.as_bytes());
    if let Err(HashEngineError::NotInitialized) = shared.hash_engine.rekey_if_needed(&epoch_key) {
        shared
            .hash_engine
            .init(&epoch_key, Mode::Light, false)
            .map_err(|e| (error_codes::MALFORMED_SUBMIT, e.to_string()))?;
    }

    let mut digest = [0u8; 32];
    shared
        .hash_engine
        .hash(&header.to_bytes(), &mut digest)
        .map_err(|e| (error_codes::MALFORMED_SUBMIT, e.to_string()))?;

    let consensus_target = HashTarget::from_compact(job.bits).map_err(|_| (error_codes::MALFORMED_SUBMIT, "invalid bits".to_string()))?;
    if !consensus_target.meets(&digest) {
        return Ok(false);
    }

    let coinbase = job.template.pay_address.as_bytes();
    match shared.provider.submit_solution(header.version, header.time, header.nonce, coinbase) {
        Ok(true) => {
            shared.blocks_found.fetch_add(1, Ordering::SeqCst);
            shared.broker.notify_new_block();
            Ok(true)
        }
        Ok(false) => {
            log::info!("provider rejected solution for job {}", job_id);
            Ok(false)
        }
        Err(e) => {
            log::error!("provider submit error for job {}: {}", job_id, e);
            Ok(false)
        }
    }
}

#[allow(dead_code)]
fn now() -> u64 {
    unix_seconds()
}

#[cfg(test)]
mod tests {
    use super::*;
    use block_template::{BlockTemplate, ProviderError};
    use chain_types::EpochKey as TestEpochKey;
    use crypto_hashes::Hash;
    use hash_engine::{EngineConfig, HashEngine as TestHashEngine, Mode as TestMode};
    use mining::{Algo, JobBroker, JobBrokerConfig};
    use std::net::TcpListener as TestListener;
    use std::sync::atomic::AtomicBool as TestAtomicBool;

    struct AcceptingProvider;

    impl BlockTemplateProvider for AcceptingProvider {
        fn create_template(&self, pay_address: &str) -> Result<BlockTemplate, ProviderError> {
            Ok(BlockTemplate {
                version: 1,
                prev_hash: Hash::from([0x42; 32]),
                merkle_root: Hash::from([0x24; 32]),
                time: 1_700_000_000,
                bits: 0x207fffff,
                height: 7,
                coinbase_value: 0,
                pay_address: pay_address.to_string(),
                state_root: Hash::from([0u8; 32]),
                utxo_root: Hash::from([0u8; 32]),
                prevout_stake: vec![],
                block_sig_delegation: vec![],
            })
        }

        fn submit_solution(&self, _version: i32, _time: u32, _nonce: u32, _coinbase: &[u8]) -> Result<bool, ProviderError> {
            Ok(true)
        }
    }

    fn shared_with_one_job() -> Arc<Shared> {
        let provider: Arc<dyn BlockTemplateProvider> = Arc::new(AcceptingProvider);
        let broker = Arc::new(JobBroker::new(
            provider.clone(),
            JobBrokerConfig { job_timeout_seconds: 3600, algo: Algo::Hash, ..Default::default() },
        ));
        broker.start();
        let job = broker.current_job().unwrap();

        let engine = Arc::new(TestHashEngine::new(EngineConfig { cache_size_bytes: 4096, dataset_size_bytes: 4096 }));
        let epoch_key = TestEpochKey::from(*job.template.prev_hash.as_bytes());
        engine.init(&epoch_key, TestMode::Light, false).unwrap();

        Arc::new(Shared {
            config: StratumConfig::default(),
            clients: Mutex::new(HashMap::new()),
            next_client_id: AtomicU64::new(1),
            broker,
            provider,
            hash_engine: engine,
            running: TestAtomicBool::new(true),
            shares_accepted: AtomicU64::new(0),
            shares_rejected: AtomicU64::new(0),
            blocks_found: AtomicU64::new(0),
        })
    }

    fn loopback_stream() -> TcpStream {
        let listener = TestListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        drop(client);
        server_side
    }

    #[test]
    fn validate_and_submit_share_rejects_unknown_job() {
        let shared = shared_with_one_job();
        let result = validate_and_submit_share(&shared, "not-a-real-job", "00000000");
        assert_eq!(result, Err((error_codes::UNKNOWN_JOB, "stale/unknown job".to_string())));
    }

    #[test]
    fn validate_and_submit_share_rejects_malformed_nonce() {
        let shared = shared_with_one_job();
        let job_id = shared.broker.current_job().unwrap().job_id.clone();
        let result = validate_and_submit_share(&shared, &job_id, "zz");
        assert_eq!(result.unwrap_err().0, error_codes::MALFORMED_SUBMIT);
    }

    #[test]
    fn validate_and_submit_share_accepts_against_a_maximal_target() {
        let shared = shared_with_one_job();
        let job_id = shared.broker.current_job().unwrap().job_id.clone();
        let accepted = validate_and_submit_share(&shared, &job_id, "00000000").unwrap();
        assert!(accepted);
        assert_eq!(shared.blocks_found.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handle_subscribe_moves_client_into_subscribed_state() {
        let client = Arc::new(Mutex::new(ClientInner::new(loopback_stream(), "sess".to_string())));
        let _ = handle_subscribe(&client);
        assert_eq!(client.lock().unwrap().state, ClientState::Subscribed);
    }

    #[test]
    fn handle_login_authorizes_and_splits_worker_name() {
        let shared = shared_with_one_job();
        let client = Arc::new(Mutex::new(ClientInner::new(loopback_stream(), "sess".to_string())));
        let params = serde_json::json!({"login": "wallet-x.rig-1"});
        let response = handle_login(&shared, &Value::from(1), &client, &params);
        assert_eq!(response["result"]["status"], "OK");
        let guard = client.lock().unwrap();
        assert_eq!(guard.wallet_address, "wallet-x");
        assert_eq!(guard.worker_name, "rig-1");
        assert_eq!(guard.state, ClientState::Authorized);
    }

    #[test]
    fn handle_getjob_reports_unknown_job_before_any_job_exists() {
        let provider: Arc<dyn BlockTemplateProvider> = Arc::new(AcceptingProvider);
        let broker = Arc::new(JobBroker::new(provider.clone(), JobBrokerConfig { algo: Algo::Hash, ..Default::default() }));
        let engine = Arc::new(TestHashEngine::new(EngineConfig { cache_size_bytes: 4096, dataset_size_bytes: 4096 }));
        let shared = Arc::new(Shared {
            config: StratumConfig::default(),
            clients: Mutex::new(HashMap::new()),
            next_client_id: AtomicU64::new(1),
            broker,
            provider,
            hash_engine: engine,
            running: TestAtomicBool::new(true),
            shares_accepted: AtomicU64::new(0),
            shares_rejected: AtomicU64::new(0),
            blocks_found: AtomicU64::new(0),
        });
        let response = handle_getjob(&shared, &Value::from(1));
        assert_eq!(response["error"][0], error_codes::UNKNOWN_JOB);
    }

    #[test]
    fn submit_via_dispatch_increments_server_stats() {
        let server = StratumServer::new(
            StratumConfig::default(),
            {
                let provider: Arc<dyn BlockTemplateProvider> = Arc::new(AcceptingProvider);
                Arc::new(JobBroker::new(provider, JobBrokerConfig { job_timeout_seconds: 3600, algo: Algo::Hash, ..Default::default() }))
            },
            Arc::new(AcceptingProvider),
            Arc::new(TestHashEngine::new(EngineConfig { cache_size_bytes: 4096, dataset_size_bytes: 4096 })),
        );
        server.shared.broker.start();
        let job = server.shared.broker.current_job().unwrap();
        let epoch_key = TestEpochKey::from(*job.template.prev_hash.as_bytes());
        server.shared.hash_engine.init(&epoch_key, TestMode::Light, false).unwrap();

        let client = Arc::new(Mutex::new(ClientInner::new(loopback_stream(), "sess".to_string())));
        let request = RpcRequest {
            id: Value::from(9),
            method: "submit".to_string(),
            params: serde_json::json!({"job_id": job.job_id, "nonce": "00000000"}),
        };
        let response = dispatch(&server.shared, &client, &request);
        assert_eq!(response["result"], Value::Bool(true));
        assert_eq!(server.stats().shares_accepted, 1);
    }
}
