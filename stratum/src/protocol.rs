use serde::Deserialize;
use serde_json::Value;

/// Error codes echoed as the JSON-RPC error tuple `[code, message, null]`.
pub mod error_codes {
    pub const UNKNOWN_METHOD: i32 = -1;
    pub const MALFORMED_SUBMIT: i32 = 20;
    pub const UNKNOWN_JOB: i32 = 21;
    pub const LOW_DIFFICULTY: i32 = 23;
}

/// A request frame. Accepts both dialects: `params` may be a positional
/// array (Standard) or a single object (Monero-style).
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

pub fn success_response(id: &Value, result: Value) -> Value {
    serde_json::json!({"id": id, "jsonrpc": "2.0", "result": result, "error": Value::Null})
}

pub fn error_response(id: &Value, code: i32, message: &str) -> Value {
    serde_json::json!({"id": id, "jsonrpc": "2.0", "result": Value::Null, "error": [code, message, Value::Null]})
}

pub fn notification(method: &str, params: Value) -> Value {
    serde_json::json!({"jsonrpc": "2.0", "method": method, "params": params})
}

/// Builds the Monero-style job payload shared by `login`'s inline job,
/// `getjob`'s response, and broadcast notifications.
pub fn job_payload(job: &mining::Job) -> Value {
    serde_json::json!({
        "blob": job.blob_hex(),
        "job_id": job.job_id,
        "target": job.share_target_hex(),
        "algo": job.algo.tag(),
        "height": job.height,
        "seed_hash": job.seed_hash,
    })
}

/// Splits `wallet[.worker]` into its two parts; `worker` defaults to empty.
pub fn split_wallet_worker(login: &str) -> (String, String) {
    match login.split_once('.') {
        Some((wallet, worker)) => (wallet.to_string(), worker.to_string()),
        None => (login.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_wallet_and_worker() {
        assert_eq!(split_wallet_worker("wallet1.rig-a"), ("wallet1".to_string(), "rig-a".to_string()));
        assert_eq!(split_wallet_worker("wallet1"), ("wallet1".to_string(), String::new()));
    }

    #[test]
    fn error_response_shapes_the_tuple() {
        let resp = error_response(&Value::from(1), error_codes::UNKNOWN_JOB, "stale/unknown job");
        assert_eq!(resp["error"][0], 21);
        assert_eq!(resp["result"], Value::Null);
    }
}
