//! Stored-settings consumer.
//!
//! Settings live in flash as a `USRDATA`-keyed blob maintained by the
//! settings collaborator: a fixed header followed by typed items, each
//! carrying its own id, version and size so readers can skip what they
//! don't understand. The core only consumes the handful of items that
//! configure the pipeline; everything else in the blob is opaque and
//! preserved by skipping it.
//!
//! Integers are little-endian, matching how the blob is written in place
//! on this machine.

use crate::config::Config;

/// Magic at the start of a settings blob.
pub const KEY: &[u8; 8] = b"USRDATA\0";

/// Header length: key + type + item count + name.
const HEADER_LEN: usize = 8 + 2 + 2 + 16;
/// Per-item header: id + version + payload size.
const ITEM_HEADER_LEN: usize = 2 + 2 + 4;

/// Version the pipeline items are written at; items from other versions are
/// skipped rather than misread.
pub const ITEM_VERSION: u16 = 1;

/// Item ids the core consumes.
pub const ITEM_DC_FILTER: u16 = 0;
pub const ITEM_LPF: u16 = 1;
pub const ITEM_SRC_MODE: u16 = 2;
pub const ITEM_SCANLINES: u16 = 3;
pub const ITEM_OUTPUT_TIMING: u16 = 4;

/// Parse failures. Per the error policy these never touch any state: the
/// caller keeps its defaults.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UserdataError {
    /// Blob shorter than its own header.
    TooShort,
    /// Magic mismatch: not a settings blob (e.g. erased flash).
    BadKey,
    /// An item's declared size runs past the end of the blob.
    Truncated,
}

/// The settings subset the core consumes. Fields the blob didn't carry stay
/// at their defaults.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    pub dc_filter_on: Option<bool>,
    pub lpf_on: Option<bool>,
    pub src_mode: Option<u8>,
    pub scanlines_on: Option<bool>,
    pub output_timing: Option<u8>,
}

impl Settings {
    /// Applies whatever the blob carried onto `config`, clamping stored
    /// codes to valid values.
    pub fn apply(&self, config: &mut Config) {
        if let Some(v) = self.dc_filter_on {
            config.dc_filter_on = v;
        }
        if let Some(v) = self.lpf_on {
            config.lpf_on = v;
        }
        if let Some(code) = self.src_mode {
            config.src_mode = Config::src_mode_from_code(code);
        }
        if let Some(v) = self.scanlines_on {
            config.effects.scanlines = v;
        }
        // output_timing selects among stored output modes; with a single
        // supported timing it is validated and otherwise ignored.
    }
}

fn read_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

fn read_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

/// Parses a settings blob, returning the consumed subset.
pub fn parse(blob: &[u8]) -> Result<Settings, UserdataError> {
    if blob.len() < HEADER_LEN {
        return Err(UserdataError::TooShort);
    }
    if &blob[..8] != KEY {
        return Err(UserdataError::BadKey);
    }
    let item_count = read_u16(&blob[10..]);

    let mut settings = Settings::default();
    let mut offset = HEADER_LEN;
    for _ in 0..item_count {
        if blob.len() - offset < ITEM_HEADER_LEN {
            return Err(UserdataError::Truncated);
        }
        let id = read_u16(&blob[offset..]);
        let version = read_u16(&blob[offset + 2..]);
        let size = read_u32(&blob[offset + 4..]) as usize;
        offset += ITEM_HEADER_LEN;

        if blob.len() - offset < size {
            return Err(UserdataError::Truncated);
        }
        let payload = &blob[offset..offset + size];
        offset += size;

        if version != ITEM_VERSION || payload.is_empty() {
            continue; // foreign version or shape: preserved, not consumed
        }
        match id {
            ITEM_DC_FILTER => settings.dc_filter_on = Some(payload[0] != 0),
            ITEM_LPF => settings.lpf_on = Some(payload[0] != 0),
            ITEM_SRC_MODE => settings.src_mode = Some(payload[0]),
            ITEM_SCANLINES => settings.scanlines_on = Some(payload[0] != 0),
            ITEM_OUTPUT_TIMING => settings.output_timing = Some(payload[0]),
            _ => {} // opaque item owned by someone else
        }
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsp::resample::Mode as SrcMode;

    fn push_item(blob: &mut Vec<u8>, id: u16, version: u16, payload: &[u8]) {
        blob.extend_from_slice(&id.to_le_bytes());
        blob.extend_from_slice(&version.to_le_bytes());
        blob.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        blob.extend_from_slice(payload);
    }

    fn blob_with(items: &[(u16, u16, &[u8])]) -> Vec<u8> {
        let mut blob = Vec::new();
        blob.extend_from_slice(KEY);
        blob.extend_from_slice(&0u16.to_le_bytes()); // type
        blob.extend_from_slice(&(items.len() as u16).to_le_bytes());
        blob.extend_from_slice(b"pipeline\0\0\0\0\0\0\0\0"); // name, 16 bytes
        for &(id, version, payload) in items {
            push_item(&mut blob, id, version, payload);
        }
        blob
    }

    #[test]
    fn parses_the_consumed_subset() {
        let blob = blob_with(&[
            (ITEM_DC_FILTER, ITEM_VERSION, &[1]),
            (ITEM_LPF, ITEM_VERSION, &[0]),
            (ITEM_SRC_MODE, ITEM_VERSION, &[2]),
            (ITEM_SCANLINES, ITEM_VERSION, &[1]),
        ]);
        let s = parse(&blob).unwrap();
        assert_eq!(s.dc_filter_on, Some(true));
        assert_eq!(s.lpf_on, Some(false));
        assert_eq!(s.src_mode, Some(2));
        assert_eq!(s.scanlines_on, Some(true));
        assert_eq!(s.output_timing, None);
    }

    #[test]
    fn unknown_items_are_skipped() {
        let blob = blob_with(&[
            (900, ITEM_VERSION, b"opaque payload the menu owns"),
            (ITEM_SCANLINES, ITEM_VERSION, &[1]),
            (901, ITEM_VERSION, &[0xAA; 64]),
        ]);
        let s = parse(&blob).unwrap();
        assert_eq!(s.scanlines_on, Some(true));
    }

    #[test]
    fn foreign_versions_are_preserved_not_consumed() {
        let blob = blob_with(&[(ITEM_DC_FILTER, ITEM_VERSION + 5, &[1])]);
        let s = parse(&blob).unwrap();
        assert_eq!(s.dc_filter_on, None);
    }

    #[test]
    fn bad_key_is_rejected() {
        let mut blob = blob_with(&[]);
        blob[0] = b'X';
        assert_eq!(parse(&blob), Err(UserdataError::BadKey));
        // Erased flash looks like 0xFF everywhere.
        let erased = vec![0xFFu8; 64];
        assert_eq!(parse(&erased), Err(UserdataError::BadKey));
    }

    #[test]
    fn truncated_blobs_are_rejected() {
        assert_eq!(parse(&[]), Err(UserdataError::TooShort));
        assert_eq!(parse(&KEY[..]), Err(UserdataError::TooShort));

        let mut blob = blob_with(&[(ITEM_DC_FILTER, ITEM_VERSION, &[1])]);
        blob.truncate(blob.len() - 1);
        assert_eq!(parse(&blob), Err(UserdataError::Truncated));

        // Item header claims more payload than exists. The item starts
        // right after the 28-byte header; its size field is at offset 32.
        let mut blob = blob_with(&[(ITEM_LPF, ITEM_VERSION, &[0])]);
        blob[32..36].copy_from_slice(&1000u32.to_le_bytes());
        assert_eq!(parse(&blob), Err(UserdataError::Truncated));
    }

    #[test]
    fn apply_clamps_bad_codes() {
        let s = Settings {
            src_mode: Some(0xEE),
            ..Settings::default()
        };
        let mut config = Config::default();
        s.apply(&mut config);
        assert_eq!(config.src_mode, SrcMode::Decimate);
    }

    #[test]
    fn apply_leaves_missing_fields_at_defaults() {
        let s = Settings::default();
        let mut config = Config::default();
        let before = config;
        s.apply(&mut config);
        assert_eq!(config, before);
    }
}
