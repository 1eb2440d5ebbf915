use std::sync::Arc;

use ethers::prelude::*;
use eyre::{Result, eyre};
use tracing::{info, instrument};

use crate::abi_registry::AbiRegistry;
use crate::decoder::call::{DecodedCall, InteractionKind, decode_call};

#[derive(Debug, Clone)]
pub struct DecodedTransaction {
    pub tx_hash: H256,
    pub from: Address,
    pub to: Address,
    pub call: DecodedCall,
}

/// Fetches a block with full transactions and decodes every call made to one
/// of the target contracts. The interaction kind widens which transactions
/// are considered, but decoding always runs against the callee's ABI, so
/// from-only matches (and contracts without a verified ABI) drop out.
#[instrument(skip(provider, registry, targets))]
pub async fn decode_block_transactions(
    provider: Arc<Provider<Http>>,
    registry: &AbiRegistry,
    targets: &[Address],
    block_number: u64,
    kind: InteractionKind,
) -> Result<Vec<DecodedTransaction>> {
    let block = provider
        .get_block_with_txs(block_number)
        .await?
        .ok_or_else(|| eyre!("Block {} not found", block_number))?;

    let mut decoded = Vec::new();
    for tx in &block.transactions {
        if !kind.matches(tx.from, tx.to, targets) {
            continue;
        }
        let Some(to) = tx.to.filter(|address| targets.contains(address)) else {
            continue;
        };
        let Some(abi) = registry.get_abi(to).await? else {
            continue;
        };
        if let Some(call) = decode_call(&abi, &tx.input) {
            decoded.push(DecodedTransaction {
                tx_hash: tx.hash,
                from: tx.from,
                to,
                call,
            });
        }
    }

    info!(
        block_number,
        matched = decoded.len(),
        transactions = block.transactions.len(),
        "Decoded block transactions"
    );
    Ok(decoded)
}
