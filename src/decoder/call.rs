use std::fmt;
use std::str::FromStr;

use ethers::abi::{Abi, Token};
use ethers::types::Address;
use eyre::eyre;

/// Which side of a transaction must touch the target set for it to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    To,
    From,
    Both,
}

impl InteractionKind {
    pub fn matches(&self, from: Address, to: Option<Address>, targets: &[Address]) -> bool {
        let to_hit = to.map(|address| targets.contains(&address)).unwrap_or(false);
        let from_hit = targets.contains(&from);
        match self {
            InteractionKind::To => to_hit,
            InteractionKind::From => from_hit,
            InteractionKind::Both => to_hit || from_hit,
        }
    }
}

impl FromStr for InteractionKind {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "to" => Ok(InteractionKind::To),
            "from" => Ok(InteractionKind::From),
            "both" => Ok(InteractionKind::Both),
            other => Err(eyre!(
                "Invalid interaction kind '{}'. Allowed values are 'to', 'from', 'both'.",
                other
            )),
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionKind::To => write!(f, "to"),
            InteractionKind::From => write!(f, "from"),
            InteractionKind::Both => write!(f, "both"),
        }
    }
}

/// One decoded function invocation: the function name and its named argument
/// tokens in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCall {
    pub function: String,
    pub args: Vec<(String, Token)>,
}

/// Matches the input's 4-byte selector against the ABI's functions and
/// decodes the argument tokens. Short input, an unknown selector, or
/// undecodable arguments all yield None; callers filter those out.
pub fn decode_call(abi: &Abi, input: &[u8]) -> Option<DecodedCall> {
    if input.len() < 4 {
        return None;
    }
    let selector = &input[..4];
    let function = abi
        .functions()
        .find(|function| function.short_signature().as_slice() == selector)?;
    let tokens = function.decode_input(&input[4..]).ok()?;

    let args = function
        .inputs
        .iter()
        .zip(tokens)
        .map(|(param, token)| (param.name.clone(), token))
        .collect();

    Some(DecodedCall {
        function: function.name.clone(),
        args,
    })
}
