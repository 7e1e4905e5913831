//! HDMI data-island packet construction.
//!
//! HDMI carries auxiliary data (audio samples, clock regeneration, and
//! InfoFrames) in *data islands*: short bursts of TERC4-coded symbols placed
//! in blanking. This crate builds the packets and serialises them into the
//! exact 36-symbol form the serialiser's command expander consumes — one
//! 30-bit symbol triplet per 32-bit word, ten bits per TMDS lane.
//!
//! Nothing here touches hardware, so the whole crate runs under host tests.
//!
//! Layout of an island (in pixel clocks):
//!
//! ```text
//! guardband(2) | packet data(32) | guardband(2)
//! ```
//!
//! The eight-clock preamble that announces an island is a plain control
//! period and stays in the transmit engine's command stream; see
//! [`preamble_symbol`].

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod acr;
pub mod audio;
pub mod bch;
pub mod infoframe;
pub mod terc4;

use bch::{parity_24, parity_56};

/// Guard band length on each side of an island, in pixel clocks.
pub const W_GUARDBAND: usize = 2;
/// Preamble length, in pixel clocks.
pub const W_PREAMBLE: usize = 8;
/// Packet body length, in pixel clocks.
pub const W_DATA_PACKET: usize = 32;
/// Whole island, in pixel clocks (and in serialiser words; the expander
/// takes one symbol triplet per word).
pub const W_DATA_ISLAND: usize = W_GUARDBAND + W_DATA_PACKET + W_GUARDBAND;

/// An HDMI packet before ECC: a 3-byte header and four 7-byte subpackets.
/// `finish` computes the BCH parity bytes in place.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// 3 header bytes + 1 BCH parity byte.
    pub header: [u8; 4],
    /// 4 subpackets, each 7 data bytes + 1 BCH parity byte.
    pub subpackets: [[u8; 8]; 4],
}

impl Packet {
    pub const fn zeroed() -> Self {
        Packet {
            header: [0; 4],
            subpackets: [[0; 8]; 4],
        }
    }

    /// Fills in the BCH parity byte of the header and of every subpacket.
    pub fn finish(&mut self) {
        self.header[3] = parity_24(&self.header[..3]);
        for sp in self.subpackets.iter_mut() {
            sp[7] = parity_56(&sp[..7]);
        }
    }
}

/// A fully encoded island, ready for the transmit FIFO.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DataIsland {
    pub words: [u32; W_DATA_ISLAND],
}

/// Sync levels to encode into lane 0 while the island is on the wire. These
/// are the logical TMDS C0/C1 values, i.e. `true` = pulse not asserted for
/// the negative-polarity 480p timing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SyncLevels {
    pub hsync: bool,
    pub vsync: bool,
}

impl SyncLevels {
    /// Both pulses idle — the back-porch state where islands are spliced.
    pub const IDLE: SyncLevels = SyncLevels {
        hsync: true,
        vsync: true,
    };

    fn bits(self) -> u32 {
        (self.hsync as u32) | ((self.vsync as u32) << 1)
    }
}

fn lane_word(l0: u32, l1: u32, l2: u32) -> u32 {
    l0 | (l1 << 10) | (l2 << 20)
}

/// TERC4-coded guard-band word for lanes 1/2, fixed by the HDMI spec.
const ISLAND_GUARD: u32 = 0b0100110011;

/// Control symbol announcing a data island, for use in the eight-clock
/// preamble: CTL[3:0] = 0b0101 (lane 1 carries 0b01, lane 2 carries 0b01).
pub fn preamble_symbol(sync: SyncLevels) -> u32 {
    lane_word(
        terc4::ctrl_symbol(sync.hsync, sync.vsync),
        terc4::CTRL_01,
        terc4::CTRL_01,
    )
}

impl DataIsland {
    /// Serialises `packet` into island symbols. `packet.finish()` must have
    /// been called; this function transmits whatever parity bytes are there.
    pub fn encode(packet: &Packet, sync: SyncLevels) -> DataIsland {
        let mut words = [0u32; W_DATA_ISLAND];

        // Guard bands: lane 0 carries TERC4 of {1, 1, vsync, hsync}; lanes
        // 1/2 carry the fixed guard symbol.
        let guard0 = terc4::encode(0b1100 | sync.bits());
        let guard = lane_word(guard0, ISLAND_GUARD, ISLAND_GUARD);
        words[0] = guard;
        words[1] = guard;
        words[W_DATA_ISLAND - 2] = guard;
        words[W_DATA_ISLAND - 1] = guard;

        // Header bits go out LSB-first on lane 0, two subpacket bits per
        // clock on each of lanes 1 and 2.
        let header = u32::from_le_bytes(packet.header);

        for clock in 0..W_DATA_PACKET {
            let header_bit = (header >> clock) & 1;
            // Bit 3 is low only on the island's first clock, marking the
            // packet boundary for the sink.
            let not_first = (clock != 0) as u32;
            let d0 = sync.bits() | (header_bit << 2) | (not_first << 3);

            let mut d1 = 0u32;
            let mut d2 = 0u32;
            for (n, sp) in packet.subpackets.iter().enumerate() {
                let pair = subpacket_bit_pair(sp, clock);
                d1 |= (pair & 1) << n;
                d2 |= (pair >> 1) << n;
            }

            words[W_GUARDBAND + clock] = lane_word(
                terc4::encode(d0),
                terc4::encode(d1),
                terc4::encode(d2),
            );
        }

        DataIsland { words }
    }

    /// A Null packet island: what the transmit engine sends when the queue
    /// has nothing better.
    pub fn null(sync: SyncLevels) -> DataIsland {
        let mut p = Packet::zeroed();
        p.finish();
        DataIsland::encode(&p, sync)
    }
}

/// Extracts bits `2*clock` and `2*clock + 1` of a 64-bit subpacket,
/// LSB-first across the 7 data bytes then the parity byte.
fn subpacket_bit_pair(sp: &[u8; 8], clock: usize) -> u32 {
    let bit = |i: usize| ((sp[i / 8] >> (i % 8)) & 1) as u32;
    bit(2 * clock) | (bit(2 * clock + 1) << 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn island_is_36_words() {
        let island = DataIsland::null(SyncLevels::IDLE);
        assert_eq!(island.words.len(), 36);
        assert_eq!(W_DATA_ISLAND, 36);
    }

    #[test]
    fn guardbands_bracket_the_data() {
        let island = DataIsland::null(SyncLevels::IDLE);
        assert_eq!(island.words[0], island.words[1]);
        assert_eq!(island.words[34], island.words[35]);
        assert_eq!(island.words[0], island.words[35]);
        // Lanes 1/2 of a guard word are the fixed guard symbol.
        assert_eq!((island.words[0] >> 10) & 0x3FF, ISLAND_GUARD);
        assert_eq!((island.words[0] >> 20) & 0x3FF, ISLAND_GUARD);
    }

    #[test]
    fn every_symbol_is_ten_bits() {
        let island = DataIsland::null(SyncLevels::IDLE);
        for w in &island.words {
            assert_eq!(w >> 30, 0, "word {:#x} spills past 30 bits", w);
        }
    }

    #[test]
    fn data_symbols_are_terc4_codewords() {
        let island = DataIsland::null(SyncLevels::IDLE);
        for w in &island.words[W_GUARDBAND..W_GUARDBAND + W_DATA_PACKET] {
            for lane in 0..3 {
                let sym = (w >> (10 * lane)) & 0x3FF;
                assert!(
                    terc4::TABLE.contains(&(sym as u16)),
                    "lane {} symbol {:#x} not TERC4",
                    lane,
                    sym
                );
            }
        }
    }

    #[test]
    fn first_clock_is_marked() {
        let p = {
            let mut p = Packet::zeroed();
            p.finish();
            p
        };
        let island = DataIsland::encode(&p, SyncLevels::IDLE);
        let first = island.words[W_GUARDBAND] & 0x3FF;
        let second = island.words[W_GUARDBAND + 1] & 0x3FF;
        // Same header bit (zero), same syncs; only the first-clock flag
        // differs, so the lane-0 symbols must differ.
        assert_ne!(first, second);
    }

    #[test]
    fn header_bits_modulate_lane0() {
        let mut a = Packet::zeroed();
        a.finish();
        let mut b = Packet::zeroed();
        b.header[0] = 0x02;
        b.finish();
        let ia = DataIsland::encode(&a, SyncLevels::IDLE);
        let ib = DataIsland::encode(&b, SyncLevels::IDLE);
        // Header bit 1 differs, so data clock 1 must differ on lane 0 only.
        let wa = ia.words[W_GUARDBAND + 1];
        let wb = ib.words[W_GUARDBAND + 1];
        assert_ne!(wa & 0x3FF, wb & 0x3FF);
        assert_eq!(wa >> 10, wb >> 10);
    }

    #[test]
    fn subpacket_bits_land_on_their_lane_pair() {
        let mut p = Packet::zeroed();
        p.subpackets[2][0] = 0x01; // subpacket 2, bit 0 -> clock 0, lane 1 bit 2
        p.finish();
        let island = DataIsland::encode(&p, SyncLevels::IDLE);
        let null = DataIsland::null(SyncLevels::IDLE);
        let w = island.words[W_GUARDBAND];
        let n = null.words[W_GUARDBAND];
        assert_ne!((w >> 10) & 0x3FF, (n >> 10) & 0x3FF, "lane 1 should change");
    }
}
