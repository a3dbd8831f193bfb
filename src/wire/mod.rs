//! Wire formats for chunks and delivery records

pub mod event;
pub mod hex;

pub use event::{
    decode_inbound, encode_chunk, encode_delivery, ChunkEvent, DeliveryEvent, EventError,
    InboundEvent,
};
pub use hex::HexError;
