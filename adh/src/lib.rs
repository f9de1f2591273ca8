//! Demultiplexer for ADH video-server streams.
//!
//! Two transports are supported: the binary stream ([`binary::BinaryFramer`])
//! and the multipart MIME stream ([`mime::MimeFramer`]). Framed packets are
//! decoded by [`dispatch::FrameDispatcher`], which rebuilds minimized JPEGs
//! into standard JFIF ([`jfif`]), splits MPEG-4 frames ([`mpeg4`]) and hands
//! each [`packet::Packet`] to a [`dispatch::PacketHandler`].

pub mod binary;
pub mod comment;
pub mod dispatch;
pub mod error;
pub mod frame_type;
pub mod framer;
pub mod image_struct;
pub mod jfif;
pub mod mime;
pub mod mpeg4;
pub mod packet;
pub mod reader;
pub mod version;

pub use dispatch::{FrameDispatcher, PacketHandler, process_stream};
pub use error::{Result, StreamError};
pub use frame_type::FrameKind;
pub use framer::StreamFramer;
pub use image_struct::ImageDataStruct;
pub use packet::Packet;
