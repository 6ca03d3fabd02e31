//! The external-collaborator boundary: a `BlockTemplateProvider` hands the
//! mining subsystem work to do (`create_template`) and accepts what it
//! finds (`submit_solution`). Deliberately synchronous — the mining
//! subsystem is built on plain OS threads end to end, and an async
//! boundary here would just mean blocking on it anyway.

mod error;
mod model;

pub use error::ProviderError;
pub use model::BlockTemplate;

/// A source of block templates and a sink for solved headers. Implemented
/// by whatever glue talks to the node's own RPC surface; the mining
/// subsystem only ever sees this trait.
pub trait BlockTemplateProvider: Send + Sync {
    /// Requests a fresh template paying out to `pay_address`.
    fn create_template(&self, pay_address: &str) -> Result<BlockTemplate, ProviderError>;

    /// Submits a solved header's mutable fields back to the node. Returns
    /// `true` if the node accepted the block, `false` if it was valid but
    /// stale (e.g. a competing block already extended the same parent).
    fn submit_solution(
        &self,
        version: i32,
        time: u32,
        nonce: u32,
        coinbase: &[u8],
    ) -> Result<bool, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubProvider {
        calls: AtomicUsize,
        template: Mutex<BlockTemplate>,
    }

    impl BlockTemplateProvider for StubProvider {
        fn create_template(&self, pay_address: &str) -> Result<BlockTemplate, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut template = self.template.lock().unwrap().clone();
            template.pay_address = pay_address.to_string();
            Ok(template)
        }

        fn submit_solution(
            &self,
            _version: i32,
            _time: u32,
            nonce: u32,
            _coinbase: &[u8],
        ) -> Result<bool, ProviderError> {
            Ok(nonce != 0)
        }
    }

    fn stub() -> StubProvider {
        use crypto_hashes::Hash;
        StubProvider {
            calls: AtomicUsize::new(0),
            template: Mutex::new(BlockTemplate {
                version: 1,
                prev_hash: Hash::from([0u8; 32]),
                merkle_root: Hash::from([0u8; 32]),
                time: 0,
                bits: 0x207fffff,
                height: 1,
                coinbase_value: 0,
                pay_address: String::new(),
                state_root: Hash::from([0u8; 32]),
                utxo_root: Hash::from([0u8; 32]),
                prevout_stake: vec![],
                block_sig_delegation: vec![],
            }),
        }
    }

    #[test]
    fn create_template_stamps_the_pay_address() {
        let provider = stub();
        let template = provider.create_template("payee").unwrap();
        assert_eq!(template.pay_address, "payee");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn submit_solution_reports_stale_on_zero_nonce() {
        let provider = stub();
        assert!(!provider.submit_solution(1, 0, 0, &[]).unwrap());
        assert!(provider.submit_solution(1, 0, 7, &[]).unwrap());
    }
}
