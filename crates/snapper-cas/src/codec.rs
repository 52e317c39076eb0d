//! Blob codecs and the codec-agnostic read adapter.
//!
//! The codec of a stored blob is never sniffed from its contents; it is
//! implied by the file suffix found next to the address. Probing walks
//! [`Codec::PROBE_ORDER`], so adding a codec means adding one entry there.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};

use flate2::read::MultiGzDecoder;
use snap::read::FrameDecoder;
use snap::write::FrameEncoder;

/// Compression format a blob is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Legacy uncompressed blob, no suffix.
    Raw,
    /// Legacy gzip blob, `.gz`.
    Gzip,
    /// Current snappy (framed) blob, `.snappy`.
    Snappy,
}

impl Codec {
    /// Probe priority used by existence checks and loads.
    pub const PROBE_ORDER: [Codec; 3] = [Codec::Raw, Codec::Gzip, Codec::Snappy];

    /// Codec used for every new write.
    pub const CURRENT: Codec = Codec::Snappy;

    /// File name suffix appended to the blob location.
    pub fn suffix(self) -> &'static str {
        match self {
            Codec::Raw => "",
            Codec::Gzip => ".gz",
            Codec::Snappy => ".snappy",
        }
    }

    /// Infer the codec from a file name.
    pub fn from_file_name(name: &str) -> Codec {
        if name.ends_with(Codec::Snappy.suffix()) {
            Codec::Snappy
        } else if name.ends_with(Codec::Gzip.suffix()) {
            Codec::Gzip
        } else {
            Codec::Raw
        }
    }

    /// Wrap an open blob file in the matching decoder.
    pub fn reader(self, file: File) -> BlobReader {
        match self {
            Codec::Raw => BlobReader::Raw(file),
            Codec::Gzip => BlobReader::Gzip(MultiGzDecoder::new(file)),
            Codec::Snappy => BlobReader::Snappy(FrameDecoder::new(file)),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Raw => write!(f, "raw"),
            Codec::Gzip => write!(f, "gzip"),
            Codec::Snappy => write!(f, "snappy"),
        }
    }
}

/// Decompressing stream over a stored blob.
///
/// Every variant owns its file handle, so dropping the reader closes the
/// descriptor exactly once whichever codec was selected. Gzip blobs may be
/// several concatenated members; all of them are decoded.
pub enum BlobReader {
    Raw(File),
    Gzip(MultiGzDecoder<File>),
    Snappy(FrameDecoder<File>),
}

impl BlobReader {
    pub fn codec(&self) -> Codec {
        match self {
            BlobReader::Raw(_) => Codec::Raw,
            BlobReader::Gzip(_) => Codec::Gzip,
            BlobReader::Snappy(_) => Codec::Snappy,
        }
    }

    /// Read the remaining decoded bytes and release the file.
    pub fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl fmt::Debug for BlobReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobReader")
            .field("codec", &self.codec())
            .finish()
    }
}

impl Read for BlobReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BlobReader::Raw(f) => f.read(buf),
            BlobReader::Gzip(d) => d.read(buf),
            BlobReader::Snappy(d) => d.read(buf),
        }
    }
}

/// Compress `data` into `out` with the current codec and hand `out` back
/// once every frame has been flushed.
pub fn encode_current<W: Write>(out: W, data: &[u8]) -> io::Result<W> {
    let mut encoder = FrameEncoder::new(out);
    encoder.write_all(data)?;
    encoder
        .into_inner()
        .map_err(|e| io::Error::new(e.error().kind(), e.error().to_string()))
}

/// Stream `src` through the current codec into `out`.
pub fn transcode_current<R: Read, W: Write>(src: &mut R, out: W) -> io::Result<(W, u64)> {
    let mut encoder = FrameEncoder::new(out);
    let copied = io::copy(src, &mut encoder)?;
    let out = encoder
        .into_inner()
        .map_err(|e| io::Error::new(e.error().kind(), e.error().to_string()))?;
    Ok((out, copied))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use tempfile::TempDir;

    fn write_blob(dir: &TempDir, name: &str, bytes: &[u8]) -> File {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        File::open(path).unwrap()
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(Codec::Raw.suffix(), "");
        assert_eq!(Codec::Gzip.suffix(), ".gz");
        assert_eq!(Codec::Snappy.suffix(), ".snappy");
        assert_eq!(Codec::CURRENT, Codec::Snappy);
    }

    #[test]
    fn test_probe_order_is_raw_gzip_snappy() {
        assert_eq!(
            Codec::PROBE_ORDER,
            [Codec::Raw, Codec::Gzip, Codec::Snappy]
        );
    }

    #[test]
    fn test_from_file_name() {
        assert_eq!(Codec::from_file_name("ABC.snappy"), Codec::Snappy);
        assert_eq!(Codec::from_file_name("ABC.gz"), Codec::Gzip);
        assert_eq!(Codec::from_file_name("ABC"), Codec::Raw);
    }

    #[test]
    fn test_raw_passthrough() {
        let dir = TempDir::new().unwrap();
        let file = write_blob(&dir, "raw", b"plain bytes");
        let reader = Codec::Raw.reader(file);
        assert_eq!(reader.codec(), Codec::Raw);
        assert_eq!(reader.into_bytes().unwrap(), b"plain bytes");
    }

    #[test]
    fn test_gzip_reader() {
        let dir = TempDir::new().unwrap();
        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(b"legacy gzip payload").unwrap();
        let file = write_blob(&dir, "blob.gz", &gz.finish().unwrap());

        let reader = Codec::Gzip.reader(file);
        assert_eq!(reader.into_bytes().unwrap(), b"legacy gzip payload");
    }

    #[test]
    fn test_gzip_reader_concatenated_members() {
        let dir = TempDir::new().unwrap();
        let mut bytes = Vec::new();
        for part in [&b"first half|"[..], &b"second half"[..]] {
            let mut gz = GzEncoder::new(Vec::new(), Compression::default());
            gz.write_all(part).unwrap();
            bytes.extend(gz.finish().unwrap());
        }
        let file = write_blob(&dir, "multi.gz", &bytes);

        let reader = Codec::Gzip.reader(file);
        assert_eq!(reader.into_bytes().unwrap(), b"first half|second half");
    }

    #[test]
    fn test_snappy_reader() {
        let dir = TempDir::new().unwrap();
        let encoded = encode_current(Vec::new(), b"current snappy payload").unwrap();
        let file = write_blob(&dir, "blob.snappy", &encoded);

        let reader = Codec::Snappy.reader(file);
        assert_eq!(reader.into_bytes().unwrap(), b"current snappy payload");
    }

    #[test]
    fn test_transcode_counts_bytes() {
        let mut src: &[u8] = b"0123456789";
        let (out, copied) = transcode_current(&mut src, Vec::new()).unwrap();
        assert_eq!(copied, 10);

        let mut decoded = Vec::new();
        FrameDecoder::new(&out[..]).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, b"0123456789");
    }

    #[test]
    fn test_corrupt_snappy_is_read_error() {
        let dir = TempDir::new().unwrap();
        let file = write_blob(&dir, "bad.snappy", b"definitely not snappy framing");
        let result = Codec::Snappy.reader(file).into_bytes();
        assert!(result.is_err());
    }

    #[test]
    fn test_corrupt_gzip_is_read_error() {
        let dir = TempDir::new().unwrap();
        let file = write_blob(&dir, "bad.gz", b"definitely not gzip");
        let result = Codec::Gzip.reader(file).into_bytes();
        assert!(result.is_err());
    }
}
