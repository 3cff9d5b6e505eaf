//! Esplora REST client facade.

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use tokio::task::JoinHandle;
use tomahawk_router::FailoverRouter;
use tomahawk_types::{ResponseKind, TomahawkError};

use crate::{Address, Block, Outpoint, Outspend, ScriptHash, Transaction};

type Result<T> = std::result::Result<T, TomahawkError>;

/// Client for an Esplora REST API behind a [`FailoverRouter`].
#[derive(Debug, Clone)]
pub struct EsploraClient {
    router: FailoverRouter,
}

impl EsploraClient {
    /// Wrap a router.
    #[must_use]
    pub const fn new(router: FailoverRouter) -> Self {
        Self { router }
    }

    /// The underlying router.
    #[must_use]
    pub const fn router(&self) -> &FailoverRouter {
        &self.router
    }

    /// Start the background health prober. `None` for a single host.
    pub fn start_health_checks(&self) -> Option<JoinHandle<()>> {
        self.router.start_health_checks()
    }

    /// Txids of every transaction in the mempool.
    pub async fn raw_mempool(&self) -> Result<Vec<String>> {
        self.get_json("/mempool/txids").await
    }

    /// A transaction by id.
    pub async fn raw_transaction(&self, txid: &str) -> Result<Transaction> {
        self.get_json(&format!("/tx/{txid}")).await
    }

    /// Several transactions by id, in one request.
    pub async fn raw_transactions(&self, txids: &[String]) -> Result<Vec<Transaction>> {
        self.post_json("/internal/txs", txids).await
    }

    /// Several mempool transactions by id, in one request.
    pub async fn mempool_transactions(&self, txids: &[String]) -> Result<Vec<Transaction>> {
        self.post_json("/internal/mempool/txs", txids).await
    }

    /// One page of mempool transactions, starting after `last_seen`.
    pub async fn all_mempool_transactions(
        &self,
        last_seen: Option<&str>,
        max_txs: Option<u32>,
    ) -> Result<Vec<Transaction>> {
        let path = match last_seen {
            Some(txid) => format!("/internal/mempool/txs/{txid}"),
            None => "/internal/mempool/txs".to_string(),
        };
        let query: Vec<_> = max_txs.into_iter().map(|max| ("max_txs", max)).collect();
        let body = self.router.get_with_query(path.as_str(), &query, ResponseKind::Json).await?;
        decode(&path, &body)
    }

    /// Raw transaction hex.
    pub async fn transaction_hex(&self, txid: &str) -> Result<String> {
        self.get_text(&format!("/tx/{txid}/hex")).await
    }

    /// Height of the chain tip.
    pub async fn block_height_tip(&self) -> Result<u64> {
        self.get_json("/blocks/tip/height").await
    }

    /// Hash of the chain tip.
    pub async fn block_hash_tip(&self) -> Result<String> {
        self.get_text("/blocks/tip/hash").await
    }

    /// Txids of a block.
    pub async fn txids_for_block(&self, hash: &str) -> Result<Vec<String>> {
        self.get_json(&format!("/block/{hash}/txids")).await
    }

    /// Every transaction of a block.
    pub async fn txs_for_block(&self, hash: &str) -> Result<Vec<Transaction>> {
        self.get_json(&format!("/internal/block/{hash}/txs")).await
    }

    /// Hash of the block at `height`.
    pub async fn block_hash(&self, height: u64) -> Result<String> {
        self.get_text(&format!("/block-height/{height}")).await
    }

    /// Hex block header.
    pub async fn block_header(&self, hash: &str) -> Result<String> {
        self.get_text(&format!("/block/{hash}/header")).await
    }

    /// Block summary.
    pub async fn block(&self, hash: &str) -> Result<Block> {
        self.get_json(&format!("/block/{hash}")).await
    }

    /// Serialized block.
    pub async fn raw_block(&self, hash: &str) -> Result<Bytes> {
        self.router.get(format!("/block/{hash}/raw"), ResponseKind::Bytes).await
    }

    /// Spending status of one output.
    pub async fn outspend(&self, txid: &str, vout: u32) -> Result<Outspend> {
        self.get_json(&format!("/tx/{txid}/outspend/{vout}")).await
    }

    /// Spending status of every output of a transaction.
    pub async fn outspends(&self, txid: &str) -> Result<Vec<Outspend>> {
        self.get_json(&format!("/tx/{txid}/outspends")).await
    }

    /// Spending status of every output of several transactions.
    pub async fn batched_outspends_internal(&self, txids: &[String]) -> Result<Vec<Vec<Outspend>>> {
        self.post_json("/internal/txs/outspends/by-txid", txids).await
    }

    /// Spending status of specific outputs.
    pub async fn outspends_by_outpoint(&self, outpoints: &[Outpoint]) -> Result<Vec<Outspend>> {
        let keys: Vec<String> = outpoints.iter().map(ToString::to_string).collect();
        self.post_json("/internal/txs/outspends/by-outpoint", &keys).await
    }

    /// Not served by this backend.
    pub async fn address(&self, _address: &str) -> Result<Address> {
        Err(TomahawkError::NotImplemented("address"))
    }

    /// Not served by this backend.
    pub async fn address_transactions(
        &self,
        _address: &str,
        _last_seen: Option<&str>,
    ) -> Result<Vec<Transaction>> {
        Err(TomahawkError::NotImplemented("address transactions"))
    }

    /// Not served by this backend.
    pub async fn script_hash(&self, _script_hash: &str) -> Result<ScriptHash> {
        Err(TomahawkError::NotImplemented("scripthash"))
    }

    /// Not served by this backend.
    pub async fn script_hash_transactions(
        &self,
        _script_hash: &str,
        _last_seen: Option<&str>,
    ) -> Result<Vec<Transaction>> {
        Err(TomahawkError::NotImplemented("scripthash transactions"))
    }

    /// Not served by this backend.
    pub fn address_prefix(&self, _prefix: &str) -> Result<Vec<String>> {
        Err(TomahawkError::NotImplemented("address prefix"))
    }

    /// Not served by this backend.
    pub async fn send_raw_transaction(&self, _raw: &str) -> Result<String> {
        Err(TomahawkError::NotImplemented("broadcast"))
    }

    /// Not served by this backend; use [`EsploraClient::batched_outspends_internal`].
    pub async fn batched_outspends(&self, _txids: &[String]) -> Result<Vec<Vec<Outspend>>> {
        Err(TomahawkError::NotImplemented("batched outspends"))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.router.get(path, ResponseKind::Json).await?;
        decode(path, &body)
    }

    async fn get_text(&self, path: &str) -> Result<String> {
        let body = self.router.get(path, ResponseKind::Json).await?;
        String::from_utf8(body.to_vec())
            .map(|text| text.trim().to_string())
            .map_err(|e| TomahawkError::Decode(format!("{path}: {e}")))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)
            .map_err(|e| TomahawkError::Internal(format!("failed to encode {path} body: {e}")))?;
        let response = self.router.post(path, Bytes::from(payload)).await?;
        decode(path, &response)
    }
}

fn decode<T: DeserializeOwned>(path: &str, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| TomahawkError::Decode(format!("{path}: {e}")))
}
