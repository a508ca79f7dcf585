/*!
 * Text/binary classification and bounded content extraction
 */

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use crate::types::{ContentBody, FileContent, TextEncoding, WarningKind};

/// Number of leading bytes inspected for binary detection
pub const SAMPLE_SIZE: usize = 8192;

/// Control-byte ratio above which a sample counts as binary
const BINARY_RATIO: f32 = 0.1;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Leading signatures of common binary formats
const MAGIC_SIGNATURES: &[&[u8]] = &[
    b"\x89PNG\r\n\x1a\n",
    b"\xff\xd8\xff",
    b"GIF87a",
    b"GIF89a",
    b"%PDF-",
    b"PK\x03\x04",
    b"\x7fELF",
    b"\x1f\x8b",
    b"7z\xbc\xaf\x27\x1c",
    b"Rar!\x1a\x07",
    b"\xca\xfe\xba\xbe",
    b"\xcf\xfa\xed\xfe",
    b"MZ\x90\x00",
    b"\x00asm",
    b"SQLite format 3\x00",
];

/// Classify a file and extract its text if it is text.
///
/// Never fails: read errors come back as [`ContentBody::Unreadable`].
pub fn classify(
    abs_path: &Path,
    rel_path: &Path,
    size_bytes: u64,
    max_file_size: u64,
) -> FileContent {
    let (body, encoding) = if size_bytes > max_file_size {
        (ContentBody::TooLarge, None)
    } else {
        match read_bounded(abs_path, max_file_size) {
            Ok(Some(bytes)) => decode_content(&bytes, rel_path),
            // File grew past the cap after it was listed
            Ok(None) => (ContentBody::TooLarge, None),
            Err(e) => {
                warn!(path = %rel_path.display(), "failed to read file: {}", e);
                let body = ContentBody::Unreadable {
                    kind: WarningKind::from_io(&e),
                    cause: e.to_string(),
                };
                (body, None)
            }
        }
    };

    FileContent {
        path: rel_path.to_path_buf(),
        body,
        size: size_bytes,
        encoding,
    }
}

/// Read at most `max` bytes; `None` when the file holds more than that
fn read_bounded(path: &Path, max: u64) -> std::io::Result<Option<Vec<u8>>> {
    let file = File::open(path)?;
    let mut buffer = Vec::new();
    file.take(max.saturating_add(1)).read_to_end(&mut buffer)?;
    if buffer.len() as u64 > max {
        return Ok(None);
    }
    Ok(Some(buffer))
}

fn decode_content(bytes: &[u8], rel_path: &Path) -> (ContentBody, Option<TextEncoding>) {
    let sample = &bytes[..bytes.len().min(SAMPLE_SIZE)];
    let bom = detect_bom(sample);

    if bom.is_none() && is_binary(sample) {
        debug!(path = %rel_path.display(), "classified as binary");
        return (ContentBody::Binary, None);
    }

    let encoding = bom.unwrap_or_else(|| detect_encoding(bytes));
    if encoding == TextEncoding::Utf8Lossy {
        warn!(path = %rel_path.display(), "invalid UTF-8, decoding with replacement");
    }
    (ContentBody::Text(decode(bytes, encoding)), Some(encoding))
}

/// Binary heuristic over a leading sample.
///
/// A null byte, a known binary signature, or more than 10% control bytes
/// (other than tab, newline, carriage return, form feed and escape) marks the
/// sample as binary. Empty samples are text.
pub fn is_binary(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return false;
    }
    if MAGIC_SIGNATURES.iter().any(|sig| sample.starts_with(sig)) {
        return true;
    }
    if sample.contains(&0) {
        return true;
    }
    let control = sample
        .iter()
        .filter(|&&b| b < 9 || (b > 13 && b < 32 && b != 27) || b == 127)
        .count();
    control as f32 / sample.len() as f32 > BINARY_RATIO
}

fn detect_bom(bytes: &[u8]) -> Option<TextEncoding> {
    if bytes.starts_with(UTF8_BOM) {
        Some(TextEncoding::Utf8Bom)
    } else if bytes.starts_with(UTF16LE_BOM) {
        Some(TextEncoding::Utf16Le)
    } else if bytes.starts_with(UTF16BE_BOM) {
        Some(TextEncoding::Utf16Be)
    } else {
        None
    }
}

/// Detect the encoding of a full text buffer
pub fn detect_encoding(bytes: &[u8]) -> TextEncoding {
    if let Some(bom) = detect_bom(bytes) {
        return bom;
    }
    match std::str::from_utf8(bytes) {
        Ok(_) => TextEncoding::Utf8,
        Err(_) => TextEncoding::Utf8Lossy,
    }
}

/// Decode bytes with the given encoding, replacing invalid sequences
pub fn decode(bytes: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Utf8 | TextEncoding::Utf8Lossy => String::from_utf8_lossy(bytes).into_owned(),
        TextEncoding::Utf8Bom => {
            let rest = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
            String::from_utf8_lossy(rest).into_owned()
        }
        TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
            let rest = &bytes[bytes.len().min(2)..];
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| match encoding {
                    TextEncoding::Utf16Le => u16::from_le_bytes([pair[0], pair[1]]),
                    _ => u16::from_be_bytes([pair[0], pair[1]]),
                })
                .collect();
            let mut text = String::from_utf16_lossy(&units);
            if rest.len() % 2 == 1 {
                text.push(char::REPLACEMENT_CHARACTER);
            }
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_is_binary_detection() {
        assert!(is_binary(b"\x00\x01\x02\x03"));
        assert!(is_binary(b"\xff\xd8\xff\xe0 jpeg"));
        assert!(is_binary(b"%PDF-1.7 document"));
        assert!(is_binary(b"\x7fELF\x02\x01\x01"));

        assert!(!is_binary(b"Hello, World!"));
        assert!(!is_binary(b"{\"key\": \"value\"}"));
        assert!(!is_binary(b"# Python code\n\tindented\r\n"));
        assert!(!is_binary("Hello, 世界!".as_bytes()));
        assert!(!is_binary(b""));
    }

    #[test]
    fn test_control_ratio_threshold() {
        // 1 control byte in 20 is 5%, under the threshold
        let mut mostly_text = vec![b'a'; 19];
        mostly_text.push(0x01);
        assert!(!is_binary(&mostly_text));

        let mut noisy = vec![b'a'; 8];
        noisy.extend_from_slice(&[0x01, 0x02]);
        assert!(is_binary(&noisy));
    }

    #[test]
    fn test_classify_text_and_encoding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("utf8.txt");
        let content = "Hello, 世界!";
        fs::write(&path, content).unwrap();

        let result = classify(&path, Path::new("utf8.txt"), content.len() as u64, 1024);
        assert_eq!(result.text(), Some(content));
        assert_eq!(result.encoding, Some(TextEncoding::Utf8));
        assert_eq!(result.path, Path::new("utf8.txt"));
    }

    #[test]
    fn test_classify_utf16_with_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.txt");
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "hi".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        fs::write(&path, &bytes).unwrap();

        let result = classify(&path, Path::new("wide.txt"), bytes.len() as u64, 1024);
        assert_eq!(result.text(), Some("hi"));
        assert_eq!(result.encoding, Some(TextEncoding::Utf16Le));
    }

    #[test]
    fn test_utf16_trailing_odd_byte_is_replaced() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "ok".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes.push(b'!');
        assert_eq!(decode(&bytes, TextEncoding::Utf16Le), "ok\u{FFFD}");
    }

    #[test]
    fn test_classify_invalid_utf8_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        fs::write(&path, b"caf\xe9 au lait").unwrap();

        let result = classify(&path, Path::new("latin1.txt"), 12, 1024);
        assert_eq!(result.encoding, Some(TextEncoding::Utf8Lossy));
        assert_eq!(result.text(), Some("caf\u{FFFD} au lait"));
    }

    #[test]
    fn test_classify_binary_and_too_large() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, [0u8, 1, 2, 3]).unwrap();

        let binary = classify(&path, Path::new("data.bin"), 4, 1024);
        assert_eq!(binary.body, ContentBody::Binary);
        assert_eq!(binary.size, 4);

        let large = classify(&path, Path::new("data.bin"), 4, 3);
        assert_eq!(large.body, ContentBody::TooLarge);
    }

    #[test]
    fn test_classify_missing_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vanished.txt");

        let result = classify(&path, Path::new("vanished.txt"), 10, 1024);
        assert!(matches!(
            result.body,
            ContentBody::Unreadable {
                kind: WarningKind::Vanished,
                ..
            }
        ));
    }

    #[test]
    fn test_file_grown_past_cap_is_too_large() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("growing.txt");
        fs::write(&path, "0123456789").unwrap();

        // Listed at 4 bytes but now holds 10, cap is 5
        let result = classify(&path, Path::new("growing.txt"), 4, 5);
        assert_eq!(result.body, ContentBody::TooLarge);
    }
}
