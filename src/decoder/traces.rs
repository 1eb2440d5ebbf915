use std::sync::Arc;

use ethers::prelude::*;
use eyre::Result;
use tracing::{info, instrument};

use crate::abi_registry::AbiRegistry;
use crate::decoder::call::{DecodedCall, InteractionKind, decode_call};

#[derive(Debug, Clone)]
pub struct DecodedTrace {
    pub transaction_hash: Option<H256>,
    pub from: Address,
    pub to: Address,
    pub call: DecodedCall,
}

/// Fetches a block's internal traces (`trace_block`) and decodes call
/// actions against the target contracts. Only call actions carry a callee
/// and input; creates, suicides and rewards are skipped.
#[instrument(skip(provider, registry, targets))]
pub async fn decode_block_traces(
    provider: Arc<Provider<Http>>,
    registry: &AbiRegistry,
    targets: &[Address],
    block_number: u64,
    kind: InteractionKind,
) -> Result<Vec<DecodedTrace>> {
    let traces = provider
        .trace_block(BlockNumber::Number(block_number.into()))
        .await?;

    let mut decoded = Vec::new();
    for trace in &traces {
        let Action::Call(action) = &trace.action else {
            continue;
        };
        if !kind.matches(action.from, Some(action.to), targets) {
            continue;
        }
        if !targets.contains(&action.to) {
            continue;
        }
        let Some(abi) = registry.get_abi(action.to).await? else {
            continue;
        };
        if let Some(call) = decode_call(&abi, &action.input) {
            decoded.push(DecodedTrace {
                transaction_hash: trace.transaction_hash,
                from: action.from,
                to: action.to,
                call,
            });
        }
    }

    info!(
        block_number,
        matched = decoded.len(),
        traces = traces.len(),
        "Decoded block traces"
    );
    Ok(decoded)
}
