use block_template::{BlockTemplate, BlockTemplateProvider, ProviderError};
use crypto_hashes::Hash;
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

/// Talks `createtemplate`/`submitsolution` to the external node over a
/// line-delimited JSON-RPC connection, in the same request/response/error
/// shape the stratum server speaks to its own clients. One TCP connection
/// per call, matching the daemon's otherwise-blocking, thread-per-unit
/// concurrency model.
pub struct RpcTemplateClient {
    addr: String,
}

impl RpcTemplateClient {
    pub fn new(addr: String) -> Self {
        Self { addr }
    }

    fn call(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let mut stream = TcpStream::connect(&self.addr).map_err(|e| ProviderError::Network(e.to_string()))?;

        let mut request = serde_json::to_string(&serde_json::json!({"id": 1, "method": method, "params": params}))
            .map_err(|e| ProviderError::Internal(e.to_string()))?;
        request.push('\n');
        stream.write_all(request.as_bytes()).map_err(|e| ProviderError::Network(e.to_string()))?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).map_err(|e| ProviderError::Network(e.to_string()))?;

        let response: Value = serde_json::from_str(&line).map_err(|e| ProviderError::Internal(e.to_string()))?;
        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            return Err(ProviderError::Rejected(error.to_string()));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }
}

impl BlockTemplateProvider for RpcTemplateClient {
    fn create_template(&self, pay_address: &str) -> Result<BlockTemplate, ProviderError> {
        let result = self.call("createtemplate", serde_json::json!({"pay_address": pay_address}))?;
        parse_template(&result)
    }

    fn submit_solution(&self, version: i32, time: u32, nonce: u32, coinbase: &[u8]) -> Result<bool, ProviderError> {
        let result = self.call(
            "submitsolution",
            serde_json::json!({
                "version": version,
                "time": time,
                "nonce": nonce,
                "coinbase": hex::encode(coinbase),
            }),
        )?;
        Ok(result.as_bool().unwrap_or(false))
    }
}

fn parse_template(value: &Value) -> Result<BlockTemplate, ProviderError> {
    Ok(BlockTemplate {
        version: field_i64(value, "version")? as i32,
        prev_hash: hash_field(value, "prev_hash")?,
        merkle_root: hash_field(value, "merkle_root")?,
        time: field_i64(value, "time")? as u32,
        bits: field_i64(value, "bits")? as u32,
        height: field_i64(value, "height")? as u64,
        coinbase_value: field_i64(value, "coinbase_value")? as u64,
        pay_address: field_str(value, "pay_address")?,
        state_root: hash_field(value, "state_root")?,
        utxo_root: hash_field(value, "utxo_root")?,
        prevout_stake: hex_field(value, "prevout_stake").unwrap_or_default(),
        block_sig_delegation: hex_field(value, "block_sig_delegation").unwrap_or_default(),
    })
}

fn field_i64(value: &Value, key: &str) -> Result<i64, ProviderError> {
    value
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| ProviderError::Internal(format!("missing or non-numeric field: {}", key)))
}

fn field_str(value: &Value, key: &str) -> Result<String, ProviderError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Internal(format!("missing or non-string field: {}", key)))
}

fn hex_field(value: &Value, key: &str) -> Option<Vec<u8>> {
    value.get(key).and_then(Value::as_str).and_then(|s| hex::decode(s).ok())
}

fn hash_field(value: &Value, key: &str) -> Result<Hash, ProviderError> {
    let hex_str = field_str(value, key)?;
    let bytes = hex::decode(&hex_str).map_err(|e| ProviderError::Internal(e.to_string()))?;
    Hash::try_from_slice(&bytes).map_err(|_| ProviderError::Internal(format!("{} must be 32 bytes", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_template_reads_all_fields() {
        let value = serde_json::json!({
            "version": 1,
            "prev_hash": hex::encode([1u8; 32]),
            "merkle_root": hex::encode([2u8; 32]),
            "time": 1_700_000_000,
            "bits": 0x1d00ffffu32,
            "height": 42,
            "coinbase_value": 5_000_000_000u64,
            "pay_address": "addr1example",
            "state_root": hex::encode([3u8; 32]),
            "utxo_root": hex::encode([4u8; 32]),
            "prevout_stake": hex::encode([5u8, 6, 7]),
            "block_sig_delegation": hex::encode([8u8, 9]),
        });
        let template = parse_template(&value).unwrap();
        assert_eq!(template.version, 1);
        assert_eq!(template.height, 42);
        assert_eq!(template.prevout_stake, vec![5, 6, 7]);
    }

    #[test]
    fn parse_template_rejects_missing_fields() {
        let value = serde_json::json!({"version": 1});
        assert!(parse_template(&value).is_err());
    }
}
