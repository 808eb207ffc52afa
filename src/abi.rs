//! Call encoding for the guestbook contract.
//!
//! Only the four functions the service touches are covered:
//! `postMessage(string)`, `getMessages()`, `withdraw()` and `owner()`.

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;
use serde::{Serialize, Serializer};

use crate::feed::{GuestbookMessage, MAX_MESSAGE_LENGTH};

/// Fee attached to every post: 0.001 ETH.
pub const POST_FEE_WEI: U256 = U256([1_000_000_000_000_000, 0, 0, 0]);

pub const POST_MESSAGE: &str = "postMessage(string)";
pub const GET_MESSAGES: &str = "getMessages()";
pub const WITHDRAW: &str = "withdraw()";
pub const OWNER: &str = "owner()";

#[derive(Debug, thiserror::Error)]
pub enum AbiError {
    #[error("Message cannot be empty.")]
    EmptyMessage,

    #[error("Message is {length} characters, the limit is {max}.")]
    MessageTooLong { length: usize, max: usize },

    #[error("undecodable return data: {0}")]
    Decode(#[from] abi::Error),

    #[error("return data is not {0}")]
    UnexpectedShape(&'static str),

    #[error("timestamp {0} does not fit in 64 bits")]
    TimestampOverflow(U256),
}

/// An unsigned call, ready to hand to a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractCall {
    pub to: Address,
    pub data: Bytes,
    /// Wei, rendered as a decimal string.
    #[serde(serialize_with = "serialize_decimal")]
    pub value: U256,
}

fn serialize_decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// `(address sender, string content, uint256 timestamp)`
fn message_type() -> ParamType {
    ParamType::Tuple(vec![ParamType::Address, ParamType::String, ParamType::Uint(256)])
}

/// Calldata for `postMessage(content)`.
pub fn encode_post_message(content: &str) -> Bytes {
    let mut data = id(POST_MESSAGE).to_vec();
    data.extend(abi::encode(&[Token::String(content.to_string())]));
    data.into()
}

/// Calldata for a function that takes no arguments.
pub fn encode_no_args(signature: &str) -> Bytes {
    id(signature).to_vec().into()
}

/// Builds the paid `postMessage` call after checking the content the same
/// way the submission form does.
pub fn post_message_call(contract: Address, content: &str) -> Result<ContractCall, AbiError> {
    if content.trim().is_empty() {
        return Err(AbiError::EmptyMessage);
    }
    let length = content.chars().count();
    if length > MAX_MESSAGE_LENGTH {
        return Err(AbiError::MessageTooLong {
            length,
            max: MAX_MESSAGE_LENGTH,
        });
    }

    Ok(ContractCall {
        to: contract,
        data: encode_post_message(content),
        value: POST_FEE_WEI,
    })
}

pub fn withdraw_call(contract: Address) -> ContractCall {
    ContractCall {
        to: contract,
        data: encode_no_args(WITHDRAW),
        value: U256::zero(),
    }
}

/// Decodes the `tuple(address,string,uint256)[]` returned by `getMessages()`.
pub fn decode_messages(data: &[u8]) -> Result<Vec<GuestbookMessage>, AbiError> {
    let tokens = abi::decode(&[ParamType::Array(Box::new(message_type()))], data)?;
    let entries = tokens
        .into_iter()
        .next()
        .and_then(Token::into_array)
        .ok_or(AbiError::UnexpectedShape("a message array"))?;

    entries.into_iter().map(decode_message).collect()
}

fn decode_message(token: Token) -> Result<GuestbookMessage, AbiError> {
    let fields: [Token; 3] = token
        .into_tuple()
        .and_then(|fields| fields.try_into().ok())
        .ok_or(AbiError::UnexpectedShape("a message tuple"))?;
    let [sender, content, timestamp] = fields;

    let sender = sender
        .into_address()
        .ok_or(AbiError::UnexpectedShape("an address"))?;
    let content = content
        .into_string()
        .ok_or(AbiError::UnexpectedShape("a string"))?;
    let timestamp = timestamp
        .into_uint()
        .ok_or(AbiError::UnexpectedShape("a uint256"))?;
    if timestamp > U256::from(u64::MAX) {
        return Err(AbiError::TimestampOverflow(timestamp));
    }

    Ok(GuestbookMessage {
        sender,
        content,
        timestamp: timestamp.as_u64(),
    })
}

/// Decodes a single `address` return value, as from `owner()`.
pub fn decode_address(data: &[u8]) -> Result<Address, AbiError> {
    abi::decode(&[ParamType::Address], data)?
        .into_iter()
        .next()
        .and_then(Token::into_address)
        .ok_or(AbiError::UnexpectedShape("an address"))
}
