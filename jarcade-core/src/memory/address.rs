//
// Arabian (Sun Electronics, 1983)
//

pub mod arabian {
    pub const ROM_START: u16 = 0x0000;
    pub const ROM_END: u16 = 0x7FFF;

    // Direct writes into the bitmap, 4 pixels per byte
    pub const VIDEO_RAM_START: u16 = 0x8000;
    pub const VIDEO_RAM_END: u16 = 0xBFFF;

    pub const IN0: u16 = 0xC000;
    pub const IN1: u16 = 0xC200;

    pub const RAM_START: u16 = 0xD000;
    pub const RAM_END: u16 = 0xD7FF;

    // Custom MCU window, shadows the top of RAM
    pub const MCU_WINDOW_START: u16 = 0xD7F0;
    pub const MCU_WINDOW_END: u16 = 0xD7FF;

    pub const BLITTER_START: u16 = 0xE000;
    pub const BLITTER_END: u16 = 0xE07F;

    // I/O port space
    pub const AY_CONTROL_PORT: u16 = 0xC800;
    pub const AY_DATA_PORT: u16 = 0xCA00;

    // AY-3-8910 register numbers of its two parallel ports
    pub const AY_PORT_A_REGISTER: u8 = 0x0E;
    pub const AY_PORT_B_REGISTER: u8 = 0x0F;
}

//
// Mario Bros. (Nintendo, 1983)
//

pub mod mario {
    pub const ROM_START: u16 = 0x0000;
    pub const ROM_END: u16 = 0x5FFF;

    pub const RAM_START: u16 = 0x6000;
    pub const RAM_END: u16 = 0x6FFF;

    pub const SPRITE_RAM_START: u16 = 0x6900;
    pub const SPRITE_RAM_END: u16 = 0x6A7F;

    pub const UNUSED_START: u16 = 0x7000;
    pub const UNUSED_END: u16 = 0x73FF;

    pub const VIDEO_RAM_START: u16 = 0x7400;
    pub const VIDEO_RAM_END: u16 = 0x77FF;

    // Read: IN0, write: Mario run sample
    pub const IN0: u16 = 0x7C00;
    // Read: IN1, write: Luigi run sample
    pub const IN1: u16 = 0x7C80;
    pub const DSW: u16 = 0x7F80;

    pub const SCROLL: u16 = 0x7D00;
    pub const TUNE_SELECT: u16 = 0x7E00;
    pub const GFX_BANK: u16 = 0x7E80;
    pub const FLIP_SCREEN: u16 = 0x7E82;
    pub const PALETTE_BANK: u16 = 0x7E83;
    pub const NMI_ENABLE: u16 = 0x7E84;

    pub const DEATH_SAMPLE: u16 = 0x7F00;
    pub const COIN_SAMPLE: u16 = 0x7F01;
    pub const CRAB_SAMPLE: u16 = 0x7F03;
    pub const TURTLE_SAMPLE: u16 = 0x7F04;
    pub const FLY_SAMPLE: u16 = 0x7F05;

    pub const HIGH_ROM_START: u16 = 0xF000;
    pub const HIGH_ROM_END: u16 = 0xFFFF;
}

//
// Mr. Do! (Universal, 1982)
//

pub mod mrdo {
    pub const ROM_START: u16 = 0x0000;
    pub const ROM_END: u16 = 0x7FFF;

    // Attribute bytes in the first 0x400, tile codes in the second
    pub const BG_VIDEO_RAM_START: u16 = 0x8000;
    pub const BG_VIDEO_RAM_END: u16 = 0x87FF;
    pub const FG_VIDEO_RAM_START: u16 = 0x8800;
    pub const FG_VIDEO_RAM_END: u16 = 0x8FFF;

    pub const SPRITE_RAM_START: u16 = 0x9000;
    pub const SPRITE_RAM_END: u16 = 0x90FF;

    pub const FLIP_SCREEN: u16 = 0x9800;
    pub const SN76496_0: u16 = 0x9801;
    pub const SN76496_1: u16 = 0x9802;

    pub const INPUTS_START: u16 = 0xA000;
    pub const INPUTS_END: u16 = 0xA003;

    pub const RAM_START: u16 = 0xE000;
    pub const RAM_END: u16 = 0xEFFF;

    pub const SCROLL_X_START: u16 = 0xF000;
    pub const SCROLL_X_END: u16 = 0xF7FF;
    pub const SCROLL_Y_START: u16 = 0xF800;
    pub const SCROLL_Y_END: u16 = 0xFFFF;
}
