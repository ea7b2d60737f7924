//! MD5 checksums of local files, comparable with Drive's `md5Checksum`.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::{Digest, Md5};

const BLOCK_SIZE: usize = 64 * 1024;

/// Compute the lowercase hex MD5 of a file, reading it in blocks.
pub fn md5_file<P: AsRef<Path>>(path: P) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; BLOCK_SIZE];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Lowercase hex MD5 of an in-memory buffer.
pub fn md5_bytes(content: &[u8]) -> String {
    hex::encode(Md5::digest(content))
}
