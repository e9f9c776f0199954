//! Boundary with the connection transport
//!
//! The transport itself lives outside this crate. This module defines the
//! packet codec it uses and the outbound send primitive the lobby writes to.

pub mod messages;
pub mod sender;

pub use messages::PacketCodec;
pub use sender::{ChannelPacketSender, PacketSender, RecordingPacketSender};
