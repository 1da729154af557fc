//! WebSocket binary framing.
//!
//! A WebSocket already delivers message boundaries, so one binary frame
//! carries exactly one attachment. The generations differ only in whether
//! the Engine.IO message-type byte leads the frame.

use crate::payload::BINARY_MESSAGE_MARKER;

/// Wraps and unwraps a single binary attachment for the WebSocket
/// transport.
pub trait FrameCodec: Send + Sync {
    /// Prepares `attachment` to be sent as one binary frame.
    fn write_frame(&self, attachment: Vec<u8>) -> Vec<u8>;

    /// Extracts the attachment from one received binary frame.
    fn read_frame(&self, frame: Vec<u8>) -> Vec<u8>;
}

/// Engine.IO v3: a leading `0x04` marker byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketFrameCodecV3;

impl FrameCodec for WebSocketFrameCodecV3 {
    fn write_frame(&self, attachment: Vec<u8>) -> Vec<u8> {
        let mut frame = Vec::with_capacity(attachment.len() + 1);
        frame.push(BINARY_MESSAGE_MARKER);
        frame.extend(attachment);
        frame
    }

    fn read_frame(&self, mut frame: Vec<u8>) -> Vec<u8> {
        if !frame.is_empty() {
            frame.remove(0);
        }
        frame
    }
}

/// Engine.IO v4: frames are the attachment itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketFrameCodecV4;

impl FrameCodec for WebSocketFrameCodecV4 {
    fn write_frame(&self, attachment: Vec<u8>) -> Vec<u8> {
        attachment
    }

    fn read_frame(&self, frame: Vec<u8>) -> Vec<u8> {
        frame
    }
}
