use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const READ_CHUNK_SIZE: usize = 16384;

/// Lowercase hex SHA-1 of a file, streamed in chunks.
pub fn sha1_file(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha1::new();

    let mut buffer = [0u8; READ_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Lowercase hex SHA-1 of an in-memory buffer.
pub fn sha1_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// True when `path` exists and hashes to `expected` (case-insensitive).
/// Unreadable files count as a mismatch.
pub fn file_matches_sha1(path: &Path, expected: &str) -> bool {
    match sha1_file(path) {
        Ok(computed) => computed.eq_ignore_ascii_case(expected.trim()),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_of_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        assert_eq!(
            sha1_file(&path).unwrap(),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
        assert!(file_matches_sha1(
            &path,
            "AAF4C61DDCC5E8A2DABEDE0F3B482CD9AEA9434D"
        ));
    }

    #[test]
    fn missing_file_never_matches() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!file_matches_sha1(
            &dir.path().join("nope"),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        ));
    }
}
