//! Control-block address resolution
//!
//! The RTT transport needs the address of the firmware's control block. It is either
//! configured directly or looked up in the linker map file of the current build.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{Result, RttError};

/// Symbol searched for when none is configured.
pub const DEFAULT_CONTROL_BLOCK_SYMBOL: &str = "::rttControlBlock";

/// How to find the RTT control block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlBlockLocation {
    /// Fixed address.
    Address(u32),
    /// Look `symbol` up in a linker map file.
    MapFile {
        path: PathBuf,
        #[serde(default = "default_symbol")]
        symbol: String,
    },
}

fn default_symbol() -> String {
    DEFAULT_CONTROL_BLOCK_SYMBOL.to_string()
}

impl ControlBlockLocation {
    pub fn map_file(path: impl Into<PathBuf>) -> Self {
        ControlBlockLocation::MapFile { path: path.into(), symbol: default_symbol() }
    }

    /// Resolve to an address. Map files are re-read on every call so a rebuilt image is
    /// picked up by the next session.
    pub fn resolve(&self) -> Result<u32> {
        match self {
            ControlBlockLocation::Address(address) => Ok(*address),
            ControlBlockLocation::MapFile { path, symbol } => resolve_from_map_file(path, symbol),
        }
    }
}

/// Read `path` and return the address of the first line mentioning `symbol`.
pub fn resolve_from_map_file(path: &Path, symbol: &str) -> Result<u32> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| RttError::file_error(path.to_path_buf(), e))?;
    let address = find_symbol_address(&contents, symbol).ok_or_else(|| {
        RttError::SymbolNotFound { symbol: symbol.to_string(), path: path.to_path_buf() }
    })?;
    debug!(path = %path.display(), symbol, address = format_args!("{address:#010x}"), "Resolved control block");
    Ok(address)
}

/// Address of the first line containing `symbol` that starts with a hexadecimal number.
///
/// Map file lines look like `0x20000400  0x0000a8  ::rttControlBlock`; lines mentioning the
/// symbol without a leading address (cross references, for example) are skipped.
pub fn find_symbol_address(contents: &str, symbol: &str) -> Option<u32> {
    contents.lines().filter(|line| line.contains(symbol)).find_map(leading_hex)
}

fn leading_hex(line: &str) -> Option<u32> {
    let line = line.trim_start();
    let digits = line.strip_prefix("0x").or_else(|| line.strip_prefix("0X")).unwrap_or(line);
    let end = digits.find(|c: char| !c.is_ascii_hexdigit()).unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    u32::from_str_radix(&digits[..end], 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = "\
 .bss           0x20000000     0x1200
                0x20000400                _SEGGER_RTT
    referenced by main.o (::rttControlBlock)
20000a00 g     O .bss   000000a8 rtt::rttControlBlock
0x20000b00  0x10  other::rttControlBlock
";

    #[test]
    fn first_line_with_an_address_wins() {
        assert_eq!(find_symbol_address(MAP, DEFAULT_CONTROL_BLOCK_SYMBOL), Some(0x2000_0a00));
    }

    #[test]
    fn prefixed_addresses_parse() {
        assert_eq!(find_symbol_address(MAP, "other::rttControlBlock"), Some(0x2000_0b00));
    }

    #[test]
    fn missing_symbol() {
        assert_eq!(find_symbol_address(MAP, "::nothere"), None);
        assert_eq!(find_symbol_address("", DEFAULT_CONTROL_BLOCK_SYMBOL), None);
    }

    #[test]
    fn fixed_address_resolves_directly() {
        assert_eq!(ControlBlockLocation::Address(0x2000_0000).resolve().unwrap(), 0x2000_0000);
    }

    #[test]
    fn map_file_lookup() {
        let path = std::env::temp_dir().join(format!("rttlog-symbols-{}.map", std::process::id()));
        std::fs::write(&path, MAP).unwrap();

        let location = ControlBlockLocation::map_file(&path);
        assert_eq!(location.resolve().unwrap(), 0x2000_0a00);

        let missing = ControlBlockLocation::MapFile { path: path.clone(), symbol: "::absent".into() };
        assert!(matches!(missing.resolve(), Err(RttError::SymbolNotFound { .. })));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unreadable_map_file() {
        let location = ControlBlockLocation::map_file("/nonexistent/firmware.map");
        assert!(matches!(location.resolve(), Err(RttError::File { .. })));
    }
}
