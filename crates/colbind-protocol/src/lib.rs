pub mod codec;
pub mod frame;
pub mod messages;

pub use codec::{decode_envelope, encode_envelope};
pub use frame::{read_envelope, write_envelope};
pub use messages::BatchEnvelope;
