//! System clock bring-up.
//!
//! The whole timing scheme hangs off one number: clk_sys = 126 MHz. The
//! HSTX shifts two bits per cycle for a 252 Mbps lane rate, the command
//! expander pops a pixel every five cycles for a 25.2 MHz pixel clock, and
//! the scanline budget is quoted in these cycles. So the PLL is programmed
//! here, once, before anything else runs.

use rp235x_pac as pac;

/// PLL settings to reach a clk_sys from the crystal.
#[derive(Copy, Clone, Debug)]
pub struct ClockConfig {
    pub crystal_hz: u32,
    /// Reference divider into the PLL.
    pub refdiv: u8,
    /// VCO feedback divider.
    pub fbdiv: u16,
    /// Post dividers.
    pub postdiv1: u8,
    pub postdiv2: u8,
}

impl ClockConfig {
    pub const fn sys_hz(&self) -> u32 {
        self.crystal_hz / self.refdiv as u32 * self.fbdiv as u32
            / (self.postdiv1 as u32 * self.postdiv2 as u32)
    }
}

/// 12 MHz crystal -> VCO 1008 MHz -> / 4 / 2 -> 126 MHz.
pub const SYS_126MHZ: ClockConfig = ClockConfig {
    crystal_hz: 12_000_000,
    refdiv: 1,
    fbdiv: 84,
    postdiv1: 4,
    postdiv2: 2,
};

/// Starts the crystal, locks the system PLL and switches clk_sys (and the
/// peripheral/HSTX clocks) over to it.
pub fn configure_clocks(
    cfg: &ClockConfig,
    xosc: &pac::XOSC,
    pll: &pac::PLL_SYS,
    clocks: &pac::CLOCKS,
) {
    // Crystal oscillator: 1-15 MHz range, generous startup delay.
    xosc.ctrl().write(|w| unsafe { w.freq_range().bits(0xAA0) });
    xosc.startup().write(|w| unsafe { w.delay().bits(0xC4) });
    xosc.ctrl()
        .modify(|_, w| unsafe { w.enable().bits(0xFAB) });
    while xosc.status().read().stable().bit_is_clear() {}

    // Run the glitchless reference mux from the crystal before touching
    // the PLL.
    clocks.clk_ref_ctrl().modify(|_, w| w.src().xosc_clksrc());
    while clocks.clk_ref_selected().read().bits() & (1 << 2) == 0 {}

    // Program and start the system PLL.
    pll.pwr().modify(|_, w| w.pd().set_bit().vcopd().set_bit());
    pll.cs().write(|w| unsafe { w.refdiv().bits(cfg.refdiv) });
    pll.fbdiv_int()
        .write(|w| unsafe { w.fbdiv_int().bits(cfg.fbdiv) });
    pll.pwr().modify(|_, w| w.pd().clear_bit().vcopd().clear_bit());
    while pll.cs().read().lock().bit_is_clear() {}
    pll.prim().write(|w| unsafe {
        w.postdiv1()
            .bits(cfg.postdiv1)
            .postdiv2()
            .bits(cfg.postdiv2)
    });
    pll.pwr().modify(|_, w| w.postdivpd().clear_bit());

    // clk_sys: aux = PLL, then flip the glitchless mux to aux.
    clocks
        .clk_sys_ctrl()
        .modify(|_, w| w.auxsrc().clksrc_pll_sys());
    clocks
        .clk_sys_ctrl()
        .modify(|_, w| w.src().clksrc_clk_sys_aux());
    while clocks.clk_sys_selected().read().bits() & (1 << 1) == 0 {}

    // Peripheral and HSTX clocks follow clk_sys undivided.
    clocks.clk_peri_ctrl().write(|w| {
        w.enable().set_bit();
        w.auxsrc().clk_sys()
    });
    clocks.clk_hstx_ctrl().write(|w| {
        w.enable().set_bit();
        w.auxsrc().clk_sys()
    });
}
// Plan check: 12 MHz / 1 * 84 = 1008 MHz VCO (inside the 750-1600 window),
// / 4 / 2 = 126 MHz.
const _: () = assert!(SYS_126MHZ.sys_hz() == 126_000_000);
