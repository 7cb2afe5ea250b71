//! DS18B20 ROM and function commands.

pub const SEARCH_ROM: u8 = 0xF0;
pub const READ_ROM: u8 = 0x33;
pub const MATCH_ROM: u8 = 0x55;
pub const SKIP_ROM: u8 = 0xCC;
pub const ALARM_SEARCH: u8 = 0xEC;

pub const CONVERT_T: u8 = 0x44;
pub const WRITE_SCRATCHPAD: u8 = 0x4E;
pub const READ_SCRATCHPAD: u8 = 0xBE;
pub const COPY_SCRATCHPAD: u8 = 0x48;
pub const RECALL_E2: u8 = 0xB8;
pub const READ_POWER_SUPPLY: u8 = 0xB4;
