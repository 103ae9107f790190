//! Embed colours used by the bot (Discord palette values).

pub const RED: u32 = 0xED4245;
pub const ORANGE: u32 = 0xE67E22;
pub const BLUE: u32 = 0x3498DB;
pub const BLURPLE: u32 = 0x5865F2;
pub const GREEN: u32 = 0x57F287;
