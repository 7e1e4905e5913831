//! DMA channel claiming.
//!
//! The DMA block is one PAC singleton but its channels have independent
//! users on both cores, so ownership is per-channel: a [`DmaChannel`] is a
//! typed handle claimed exactly once from a process-wide bitmap. Claiming
//! is a move; there is no release, because every channel here is claimed at
//! init and held until power-off.

use core::sync::atomic::{AtomicU32, Ordering};

use rp235x_pac as pac;

static CLAIMED: AtomicU32 = AtomicU32::new(0);

/// Exclusive handle to one DMA channel's register cluster.
pub struct DmaChannel {
    index: usize,
}

impl DmaChannel {
    /// Claims channel `index`.
    ///
    /// # Panics
    ///
    /// If the channel is already claimed -- that's a resource-plan bug, and
    /// boot is the right time to hear about it.
    pub fn claim(index: usize) -> DmaChannel {
        assert!(index < 16);
        let bit = 1u32 << index;
        let prev = CLAIMED.fetch_or(bit, Ordering::SeqCst);
        assert!(prev & bit == 0, "DMA channel {} claimed twice", index);
        DmaChannel { index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// This channel's register cluster.
    ///
    /// The shared-reference access is sound because the claim bitmap makes
    /// `self` the only handle to this cluster, and the PAC's register ops
    /// are individually atomic.
    pub fn regs(&self) -> &pac::dma::CH {
        unsafe { (*pac::DMA::ptr()).ch(self.index) }
    }

    /// Raw IRQ mask bit for this channel.
    pub fn intr_bit(&self) -> u32 {
        1 << self.index
    }

    /// Current write address, for tail-chasing a free-running ring.
    pub fn write_addr(&self) -> u32 {
        self.regs().ch_write_addr().read().bits()
    }

    /// Busy flag.
    pub fn busy(&self) -> bool {
        self.regs().ch_ctrl_trig().read().busy().bit_is_set()
    }
}

// The handle is a capability; moving it between cores is the point.
unsafe impl Send for DmaChannel {}
