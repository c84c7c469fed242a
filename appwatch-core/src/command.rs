//! Remote key commands sent by the client.
//!
//! # Wire format
//! ```text
//! ┌───────────────┬──────────────────┐
//! │ modifiers  u8 │ key code  u32 BE │
//! └───────────────┴──────────────────┘
//! ```
//!
//! Each frame replays as one synthesized key chord on the server.

use bitflags::bitflags;
use bytes::{Buf, BufMut, BytesMut};

use crate::error::AppWatchError;

/// Size of one command frame on the wire.
pub const COMMAND_FRAME_SIZE: usize = 5;

/// Windows virtual-key codes of the modifier keys.
pub const VK_SHIFT: u32 = 0x10;
pub const VK_CONTROL: u32 = 0x11;
pub const VK_MENU: u32 = 0x12;

bitflags! {
    /// Modifier keys held while the key is pressed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0000_0001;
        const CTRL  = 0b0000_0010;
        const ALT   = 0b0000_0100;
    }
}

impl Modifiers {
    /// Set modifiers in press order, paired with their virtual-key code.
    fn keys(self) -> impl Iterator<Item = u32> {
        [
            (Modifiers::SHIFT, VK_SHIFT),
            (Modifiers::CTRL, VK_CONTROL),
            (Modifiers::ALT, VK_MENU),
        ]
        .into_iter()
        .filter(move |(flag, _)| self.contains(*flag))
        .map(|(_, vk)| vk)
    }
}

/// Press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    Press,
    Release,
}

/// One keyboard event handed to the injector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub key_code: u32,
    pub action: KeyAction,
}

impl KeyStroke {
    pub const fn press(key_code: u32) -> Self {
        Self {
            key_code,
            action: KeyAction::Press,
        }
    }

    pub const fn release(key_code: u32) -> Self {
        Self {
            key_code,
            action: KeyAction::Release,
        }
    }
}

// ── CommandFrame ─────────────────────────────────────────────────

/// A decoded command: modifiers plus a virtual-key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    pub modifiers: Modifiers,
    pub key_code: u32,
}

impl CommandFrame {
    pub fn new(modifiers: Modifiers, key_code: u32) -> Self {
        Self {
            modifiers,
            key_code,
        }
    }

    /// Parse one frame. Unknown modifier bits are ignored.
    pub fn from_bytes(bytes: [u8; COMMAND_FRAME_SIZE]) -> Self {
        Self {
            modifiers: Modifiers::from_bits_truncate(bytes[0]),
            key_code: u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]),
        }
    }

    pub fn to_bytes(&self) -> [u8; COMMAND_FRAME_SIZE] {
        let mut out = [0u8; COMMAND_FRAME_SIZE];
        out[0] = self.modifiers.bits();
        out[1..].copy_from_slice(&self.key_code.to_be_bytes());
        out
    }

    /// The keystrokes that replay this command.
    ///
    /// Modifiers are pressed Shift, Ctrl, Alt; then the key is pressed and
    /// released; then the modifiers are released in the same order.
    pub fn keystrokes(&self) -> Vec<KeyStroke> {
        let mut strokes = Vec::with_capacity(8);
        strokes.extend(self.modifiers.keys().map(KeyStroke::press));
        strokes.push(KeyStroke::press(self.key_code));
        strokes.push(KeyStroke::release(self.key_code));
        strokes.extend(self.modifiers.keys().map(KeyStroke::release));
        strokes
    }
}

// ── CommandCodec ─────────────────────────────────────────────────

/// Fixed-size framing for [`CommandFrame`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandCodec;

impl tokio_util::codec::Decoder for CommandCodec {
    type Item = CommandFrame;
    type Error = AppWatchError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < COMMAND_FRAME_SIZE {
            src.reserve(COMMAND_FRAME_SIZE - src.len());
            return Ok(None);
        }

        let mut frame = [0u8; COMMAND_FRAME_SIZE];
        src.copy_to_slice(&mut frame);
        Ok(Some(CommandFrame::from_bytes(frame)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(AppWatchError::ProtocolViolation(
                "stream ended inside a command frame",
            )),
        }
    }
}

impl tokio_util::codec::Encoder<CommandFrame> for CommandCodec {
    type Error = AppWatchError;

    fn encode(&mut self, item: CommandFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_slice(&item.to_bytes());
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
