use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::{Collection, CoreError, ItemId, MovedItem, NewItemFields, PinnedChange, Tab};

pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

pub type RequestId = u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "data")]
pub enum StoreOp {
    GetCollection,
    CreateItem(NewItemFields),
    ApplyMovedItems(Vec<MovedItem>),
    UpdateTabOrder(Vec<Tab>),
    UpdatePinnedClips(Vec<PinnedChange>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreRequest {
    pub request_id: RequestId,
    pub op: StoreOp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum StoreReply {
    Collection(Collection),
    Created { item_id: ItemId },
    Applied { count: usize },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreResponse {
    pub request_id: RequestId,
    pub reply: StoreReply,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    Request(StoreRequest),
    Response(StoreResponse),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Request = 0,
    Response = 1,
}

/// Layout: `u32` LE length of everything after it, `u8` message type, JSON body.
pub fn encode_frame(message: &WireMessage) -> Result<Vec<u8>, CoreError> {
    let (message_type, payload) = match message {
        WireMessage::Request(request) => (
            MessageType::Request as u8,
            serde_json::to_vec(request).map_err(|err| CoreError::Serialization(err.to_string()))?,
        ),
        WireMessage::Response(response) => (
            MessageType::Response as u8,
            serde_json::to_vec(response).map_err(|err| CoreError::Serialization(err.to_string()))?,
        ),
    };

    let frame_len = 1usize
        .checked_add(payload.len())
        .filter(|len| *len + 4 <= MAX_FRAME_BYTES)
        .ok_or(CoreError::InvalidFrameLength)?;
    let frame_len_u32 = u32::try_from(frame_len).map_err(|_| CoreError::InvalidFrameLength)?;

    let mut out = BytesMut::with_capacity(4 + frame_len);
    out.put_u32_le(frame_len_u32);
    out.put_u8(message_type);
    out.extend_from_slice(&payload);
    Ok(out.to_vec())
}

pub fn decode_frame(frame: &[u8]) -> Result<WireMessage, CoreError> {
    if frame.len() < 5 || frame.len() > MAX_FRAME_BYTES {
        return Err(CoreError::InvalidFrameLength);
    }

    let mut cursor = frame;
    let expected_len = cursor.get_u32_le() as usize;
    if expected_len + 4 != frame.len() {
        return Err(CoreError::InvalidFrameLength);
    }

    let message_type = cursor.get_u8();
    let payload = cursor;

    match message_type {
        x if x == MessageType::Request as u8 => {
            let request: StoreRequest = serde_json::from_slice(payload)
                .map_err(|err| CoreError::Serialization(err.to_string()))?;
            Ok(WireMessage::Request(request))
        }
        x if x == MessageType::Response as u8 => {
            let response: StoreResponse = serde_json::from_slice(payload)
                .map_err(|err| CoreError::Serialization(err.to_string()))?;
            Ok(WireMessage::Response(response))
        }
        other => Err(CoreError::UnsupportedMessageType(other)),
    }
}
