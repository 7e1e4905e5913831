//! Firmware image validation.
//!
//! The update flow itself (card handling, flashing, reboot) lives outside
//! the core; what lives here is the gatekeeper that decides whether a blob
//! is a firmware image we are willing to flash. Integer fields are
//! big-endian on the wire, and the header CRC is computed over the header
//! bytes as they arrived -- before any field is byte-swapped.

/// Fixed size of the image header on the wire.
pub const HEADER_LEN: usize = 512;

/// Bounds on the declared `hdr_len` field.
pub const HDR_LEN_MIN: u32 = 26;
pub const HDR_LEN_MAX: u32 = 508;

/// Flash geometry: an image must fit in 16 erase sectors.
pub const FLASH_SECTOR_BYTES: u32 = 65_536;
pub const MAX_IMAGE_SECTORS: u32 = 16;

/// Which flash slot the image is keyed for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    /// `OSSC`: the primary image at the base of flash.
    Primary,
    /// `OSS2`: the secondary image.
    Secondary,
}

/// Parsed and validated image header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub slot: Slot,
    pub version_major: u8,
    pub version_minor: u8,
    pub version_suffix: [u8; 8],
    pub hdr_len: u32,
    pub data_len: u32,
    pub data_crc: u32,
}

/// Why an image was refused. All of these leave persistent state untouched.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FwError {
    /// Shorter than a header, or shorter than its declared data.
    Truncated,
    /// Key is neither `OSSC` nor `OSS2`.
    BadKey,
    /// `hdr_len` outside `[26, 508]`.
    BadHeaderLength,
    /// Header CRC mismatch.
    HeaderCrc,
    /// Payload CRC mismatch.
    DataCrc,
    /// Image does not fit the flash budget.
    TooLarge,
}

fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

fn read_be32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

/// Validates the 512-byte header at the start of `bytes`.
pub fn parse_header(bytes: &[u8]) -> Result<Header, FwError> {
    if bytes.len() < HEADER_LEN {
        return Err(FwError::Truncated);
    }

    let slot = match &bytes[..4] {
        b"OSSC" => Slot::Primary,
        b"OSS2" => Slot::Secondary,
        _ => return Err(FwError::BadKey),
    };

    let hdr_len = read_be32(&bytes[14..]);
    if hdr_len < HDR_LEN_MIN || hdr_len > HDR_LEN_MAX {
        return Err(FwError::BadHeaderLength);
    }

    // The stored CRC covers the first hdr_len bytes as transmitted.
    let hdr_crc = read_be32(&bytes[HEADER_LEN - 4..]);
    if crc32(&bytes[..hdr_len as usize]) != hdr_crc {
        return Err(FwError::HeaderCrc);
    }

    let data_len = read_be32(&bytes[18..]);
    if data_len >= MAX_IMAGE_SECTORS * FLASH_SECTOR_BYTES {
        return Err(FwError::TooLarge);
    }

    let mut version_suffix = [0u8; 8];
    version_suffix.copy_from_slice(&bytes[6..14]);

    Ok(Header {
        slot,
        version_major: bytes[4],
        version_minor: bytes[5],
        version_suffix,
        hdr_len,
        data_len,
        data_crc: read_be32(&bytes[22..]),
    })
}

/// Validates a complete image: header plus payload CRC.
pub fn validate_image(bytes: &[u8]) -> Result<Header, FwError> {
    let header = parse_header(bytes)?;
    let data_end = HEADER_LEN + header.data_len as usize;
    if bytes.len() < data_end {
        return Err(FwError::Truncated);
    }
    if crc32(&bytes[HEADER_LEN..data_end]) != header.data_crc {
        return Err(FwError::DataCrc);
    }
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_image(key: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut image = vec![0u8; HEADER_LEN];
        image[..4].copy_from_slice(key);
        image[4] = 1; // major
        image[5] = 20; // minor
        image[6..14].copy_from_slice(b"\0\0\0\0\0\0\0\0");
        let hdr_len: u32 = 26;
        image[14..18].copy_from_slice(&hdr_len.to_be_bytes());
        image[18..22].copy_from_slice(&(data.len() as u32).to_be_bytes());
        image[22..26].copy_from_slice(&crc32(data).to_be_bytes());
        let hdr_crc = crc32(&image[..hdr_len as usize]);
        image[HEADER_LEN - 4..].copy_from_slice(&hdr_crc.to_be_bytes());
        image.extend_from_slice(data);
        image
    }

    #[test]
    fn accepts_a_well_formed_image() {
        let image = build_image(b"OSSC", b"payload bytes of the new firmware");
        let h = validate_image(&image).unwrap();
        assert_eq!(h.slot, Slot::Primary);
        assert_eq!(h.version_major, 1);
        assert_eq!(h.version_minor, 20);
        assert_eq!(h.data_len, 33);
    }

    #[test]
    fn secondary_key_selects_the_other_slot() {
        let image = build_image(b"OSS2", b"data");
        assert_eq!(validate_image(&image).unwrap().slot, Slot::Secondary);
    }

    #[test]
    fn rejects_wrong_key() {
        let image = build_image(b"OSSX", b"data");
        assert_eq!(validate_image(&image), Err(FwError::BadKey));
    }

    #[test]
    fn rejects_header_length_out_of_bounds() {
        for &bad in &[0u32, 25, 509, 4096] {
            let mut image = build_image(b"OSSC", b"data");
            image[14..18].copy_from_slice(&bad.to_be_bytes());
            assert_eq!(validate_image(&image), Err(FwError::BadHeaderLength), "hdr_len {}", bad);
        }
        // The bounds themselves are acceptable (CRC no longer matches, which
        // proves the length check passed).
        let mut image = build_image(b"OSSC", b"data");
        image[14..18].copy_from_slice(&508u32.to_be_bytes());
        assert_eq!(validate_image(&image), Err(FwError::HeaderCrc));
    }

    #[test]
    fn rejects_corrupt_header_crc() {
        let mut image = build_image(b"OSSC", b"data");
        image[5] ^= 1; // flip a covered byte
        assert_eq!(validate_image(&image), Err(FwError::HeaderCrc));
    }

    #[test]
    fn rejects_corrupt_payload() {
        let mut image = build_image(b"OSSC", b"some data to protect");
        let last = image.len() - 1;
        image[last] ^= 0x80;
        assert_eq!(validate_image(&image), Err(FwError::DataCrc));
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut image = build_image(b"OSSC", b"some data");
        image.truncate(image.len() - 2);
        assert_eq!(validate_image(&image), Err(FwError::Truncated));
    }

    #[test]
    fn rejects_oversized_images() {
        // Claim a data_len at the flash budget; the header CRC is recomputed
        // so the size check is what trips.
        let mut image = vec![0u8; HEADER_LEN];
        image[..4].copy_from_slice(b"OSSC");
        image[14..18].copy_from_slice(&26u32.to_be_bytes());
        image[18..22].copy_from_slice(&(MAX_IMAGE_SECTORS * FLASH_SECTOR_BYTES).to_be_bytes());
        let hdr_crc = crc32(&image[..26]);
        image[HEADER_LEN - 4..].copy_from_slice(&hdr_crc.to_be_bytes());
        assert_eq!(parse_header(&image), Err(FwError::TooLarge));
    }

    #[test]
    fn header_crc_covers_pre_swap_bytes() {
        // Regression guard for the order of operations: the CRC is over the
        // raw big-endian header, so recomputing it over a byte-swapped copy
        // must not validate.
        let image = build_image(b"OSSC", b"data");
        let mut swapped = image.clone();
        swapped[14..18].reverse();
        assert_eq!(validate_image(&swapped), Err(FwError::BadHeaderLength));
    }
}
