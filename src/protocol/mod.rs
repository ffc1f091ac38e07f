//! Wire protocol for Crashpot
//!
//! This module implements the fixed-record binary protocol shared by the
//! server and the terminal client:
//! - 32-byte little-endian frames, one game event per frame
//! - nine ASCII tags covering the whole round lifecycle
//! - framed async send/recv loops over any byte stream
//!
//! Broadcast frames use player id 0 as the "all players" sentinel; real
//! player ids start at 1.

pub mod wire;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Stable per-connection identifier, 1-based. Carried on the wire as i32.
pub type PlayerId = i32;

/// `player_id` value meaning "every connected player". Also used by clients,
/// which do not know their own id when they send a request.
pub const BROADCAST_ID: PlayerId = 0;

/// Exact size of one frame on the wire.
pub const FRAME_LEN: usize = 32;

/// Width of the NUL-padded ASCII tag field.
const TAG_LEN: usize = 11;

/// Byte offsets of the frame layout.
const OFF_PLAYER_ID: usize = 0;
const OFF_VALUE: usize = 4;
const OFF_TAG: usize = 8;
const OFF_PAD: usize = 19;
const OFF_PLAYER_PROFIT: usize = 20;
const OFF_HOUSE_PROFIT: usize = 24;

/// Frame tag: what the frame means and which direction it travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// S→C broadcast: a betting window opened.
    Start,
    /// C→S: place a bet, `value` is the amount.
    Bet,
    /// S→C broadcast: betting closed, `value` is the explosion point.
    Closed,
    /// S→C broadcast: current multiplier in `value`.
    Multiplier,
    /// C→S: cash out now; the server stamps the multiplier at receipt.
    Cashout,
    /// S→C broadcast: the round exploded at `value`.
    Explode,
    /// S→C addressed: amount credited to this player (0 on a loss).
    Payout,
    /// S→C addressed: cumulative profit report.
    Profit,
    /// Either direction: terminate the connection.
    Bye,
}

impl FrameKind {
    pub const ALL: [FrameKind; 9] = [
        FrameKind::Start,
        FrameKind::Bet,
        FrameKind::Closed,
        FrameKind::Multiplier,
        FrameKind::Cashout,
        FrameKind::Explode,
        FrameKind::Payout,
        FrameKind::Profit,
        FrameKind::Bye,
    ];

    /// The ASCII tag written into the frame's `type` field.
    pub fn tag(&self) -> &'static str {
        match self {
            FrameKind::Start => "start",
            FrameKind::Bet => "bet",
            FrameKind::Closed => "closed",
            FrameKind::Multiplier => "multiplier",
            FrameKind::Cashout => "cashout",
            FrameKind::Explode => "explode",
            FrameKind::Payout => "payout",
            FrameKind::Profit => "profit",
            FrameKind::Bye => "bye",
        }
    }

    /// Parse the NUL-padded tag field. Unknown tags and garbage after the
    /// terminating NUL both fail.
    fn from_tag_field(field: &[u8]) -> Option<Self> {
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        if field[end..].iter().any(|&b| b != 0) {
            return None;
        }
        let tag = &field[..end];
        Self::ALL.iter().copied().find(|k| k.tag().as_bytes() == tag)
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// One 32-byte record on the wire.
///
/// `value` semantics depend on `kind`; the profit fields are only meaningful
/// server→client and carry zeros in broadcasts and client requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub player_id: PlayerId,
    pub value: f32,
    pub kind: FrameKind,
    pub player_profit: f32,
    pub house_profit: f32,
}

impl Frame {
    /// A server→client frame addressed to every connected player.
    pub fn broadcast(kind: FrameKind, value: f32) -> Self {
        Self {
            player_id: BROADCAST_ID,
            value,
            kind,
            player_profit: 0.0,
            house_profit: 0.0,
        }
    }

    /// A server→client frame addressed to one player, carrying its updated
    /// cumulative profit and the house's.
    pub fn addressed(
        player_id: PlayerId,
        kind: FrameKind,
        value: f32,
        player_profit: f32,
        house_profit: f32,
    ) -> Self {
        Self {
            player_id,
            value,
            kind,
            player_profit,
            house_profit,
        }
    }

    /// A client→server request. Clients identify themselves by connection,
    /// not by id, so the id field carries the sentinel.
    pub fn request(kind: FrameKind, value: f32) -> Self {
        Self::broadcast(kind, value)
    }

    /// Encode to the fixed 32-byte little-endian layout. Unused tag bytes,
    /// the pad byte and the reserved word are zero.
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut buf = [0u8; FRAME_LEN];
        LittleEndian::write_i32(&mut buf[OFF_PLAYER_ID..OFF_PLAYER_ID + 4], self.player_id);
        LittleEndian::write_f32(&mut buf[OFF_VALUE..OFF_VALUE + 4], self.value);
        let tag = self.kind.tag().as_bytes();
        buf[OFF_TAG..OFF_TAG + tag.len()].copy_from_slice(tag);
        LittleEndian::write_f32(
            &mut buf[OFF_PLAYER_PROFIT..OFF_PLAYER_PROFIT + 4],
            self.player_profit,
        );
        LittleEndian::write_f32(
            &mut buf[OFF_HOUSE_PROFIT..OFF_HOUSE_PROFIT + 4],
            self.house_profit,
        );
        buf
    }

    /// Decode a 32-byte record. The reserved word is ignored.
    pub fn decode(buf: &[u8; FRAME_LEN]) -> Result<Self> {
        if buf[OFF_PAD] != 0 {
            return Err(Error::Malformed(format!(
                "non-zero pad byte: {:#04x}",
                buf[OFF_PAD]
            )));
        }
        let kind = FrameKind::from_tag_field(&buf[OFF_TAG..OFF_TAG + TAG_LEN])
            .ok_or_else(|| {
                Error::Malformed(format!(
                    "unknown frame tag: {:?}",
                    String::from_utf8_lossy(&buf[OFF_TAG..OFF_TAG + TAG_LEN])
                ))
            })?;
        Ok(Self {
            player_id: LittleEndian::read_i32(&buf[OFF_PLAYER_ID..OFF_PLAYER_ID + 4]),
            value: LittleEndian::read_f32(&buf[OFF_VALUE..OFF_VALUE + 4]),
            kind,
            player_profit: LittleEndian::read_f32(&buf[OFF_PLAYER_PROFIT..OFF_PLAYER_PROFIT + 4]),
            house_profit: LittleEndian::read_f32(&buf[OFF_HOUSE_PROFIT..OFF_HOUSE_PROFIT + 4]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_layout_is_little_endian() {
        let frame = Frame::addressed(3, FrameKind::Payout, 150.0, 50.0, -50.0);
        let buf = frame.encode();
        assert_eq!(&buf[0..4], &3i32.to_le_bytes());
        assert_eq!(&buf[4..8], &150.0f32.to_le_bytes());
        assert_eq!(&buf[8..14], b"payout");
        assert!(buf[14..20].iter().all(|&b| b == 0));
        assert_eq!(&buf[20..24], &50.0f32.to_le_bytes());
        assert_eq!(&buf[24..28], &(-50.0f32).to_le_bytes());
        assert_eq!(&buf[28..32], &[0u8; 4]);
    }

    #[test]
    fn broadcast_uses_sentinel_id() {
        let frame = Frame::broadcast(FrameKind::Multiplier, 1.42);
        assert_eq!(frame.player_id, BROADCAST_ID);
        let buf = frame.encode();
        assert_eq!(&buf[0..4], &[0u8; 4]);
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let mut buf = Frame::broadcast(FrameKind::Start, 0.0).encode();
        buf[8..13].copy_from_slice(b"nope\0");
        assert!(matches!(
            Frame::decode(&buf),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn garbage_after_tag_nul_is_malformed() {
        let mut buf = Frame::broadcast(FrameKind::Bet, 1.0).encode();
        buf[8 + "bet".len() + 2] = b'x';
        assert!(matches!(Frame::decode(&buf), Err(Error::Malformed(_))));
    }

    #[test]
    fn nonzero_pad_is_malformed() {
        let mut buf = Frame::broadcast(FrameKind::Start, 0.0).encode();
        buf[19] = 1;
        assert!(matches!(Frame::decode(&buf), Err(Error::Malformed(_))));
    }

    #[test]
    fn reserved_word_is_ignored_on_decode() {
        let mut buf = Frame::broadcast(FrameKind::Explode, 1.73).encode();
        buf[28..32].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let frame = Frame::decode(&buf).expect("decodes");
        assert_eq!(frame.kind, FrameKind::Explode);
    }

    proptest! {
        #[test]
        fn frame_survives_the_wire(
            player_id in 0i32..=64,
            value in -1.0e6f32..1.0e6,
            player_profit in -1.0e6f32..1.0e6,
            house_profit in -1.0e6f32..1.0e6,
            kind_idx in 0usize..FrameKind::ALL.len(),
        ) {
            let frame = Frame {
                player_id,
                value,
                kind: FrameKind::ALL[kind_idx],
                player_profit,
                house_profit,
            };
            let decoded = Frame::decode(&frame.encode()).unwrap();
            prop_assert_eq!(decoded, frame);
        }
    }
}
