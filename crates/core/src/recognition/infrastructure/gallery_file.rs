//! On-disk enrollment snapshots.
//!
//! Binary layout (all little-endian):
//!
//! ```text
//! magic "AGAL" | u32 version | u32 count |
//!   count × (i64 person_id | u32 name_len | name utf-8 | 1024-byte encoding)
//! ```
//!
//! Encodings use the fixed-width interchange format of `FaceEncoding`, so
//! loading and re-saving a gallery never changes a stored vector.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{ENCODING_BYTES, GALLERY_EXTENSIONS};
use crate::shared::face_encoding::{EncodingError, FaceEncoding};
use crate::shared::person::PersonId;

const MAGIC: &[u8; 4] = b"AGAL";
const FORMAT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum GalleryFileError {
    #[error("gallery I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read gallery: {0}")]
    Read(#[source] io::Error),
    #[error("not a gallery file (bad magic)")]
    BadMagic,
    #[error("unsupported gallery format version {0}")]
    UnsupportedVersion(u32),
    #[error("gallery file truncated in record {record}")]
    Truncated { record: usize },
    #[error("record {record} has a name that is not valid UTF-8")]
    InvalidName { record: usize },
    #[error("record {record}: {source}")]
    Encoding {
        record: usize,
        #[source]
        source: EncodingError,
    },
    #[error("failed to parse JSON gallery {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One enrolled person as stored on disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrolledFace {
    pub person_id: PersonId,
    pub name: String,
    pub encoding: FaceEncoding,
}

pub fn write_gallery<W: Write>(writer: &mut W, faces: &[EnrolledFace]) -> io::Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&(faces.len() as u32).to_le_bytes())?;
    for face in faces {
        let name = face.name.as_bytes();
        writer.write_all(&face.person_id.to_le_bytes())?;
        writer.write_all(&(name.len() as u32).to_le_bytes())?;
        writer.write_all(name)?;
        writer.write_all(&face.encoding.to_bytes())?;
    }
    writer.flush()
}

pub fn read_gallery<R: Read>(reader: &mut R) -> Result<Vec<EnrolledFace>, GalleryFileError> {
    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|e| eof_or_read(e, GalleryFileError::BadMagic))?;
    if &magic != MAGIC {
        return Err(GalleryFileError::BadMagic);
    }

    let header_err = |e| eof_or_read(e, GalleryFileError::Truncated { record: 0 });
    let version = read_u32(reader).map_err(header_err)?;
    if version != FORMAT_VERSION {
        return Err(GalleryFileError::UnsupportedVersion(version));
    }
    let count = read_u32(reader).map_err(header_err)? as usize;

    let mut faces = Vec::with_capacity(count.min(1024));
    for record in 0..count {
        faces.push(read_record(reader, record)?);
    }
    Ok(faces)
}

fn read_record<R: Read>(reader: &mut R, record: usize) -> Result<EnrolledFace, GalleryFileError> {
    let truncated = |e| eof_or_read(e, GalleryFileError::Truncated { record });

    let mut id = [0u8; 8];
    reader.read_exact(&mut id).map_err(truncated)?;
    let name_len = read_u32(reader).map_err(truncated)? as usize;

    let mut name = Vec::new();
    reader
        .by_ref()
        .take(name_len as u64)
        .read_to_end(&mut name)
        .map_err(truncated)?;
    if name.len() != name_len {
        return Err(GalleryFileError::Truncated { record });
    }
    let name = String::from_utf8(name).map_err(|_| GalleryFileError::InvalidName { record })?;

    let mut encoding = [0u8; ENCODING_BYTES];
    reader.read_exact(&mut encoding).map_err(truncated)?;
    let encoding = FaceEncoding::from_bytes(&encoding)
        .map_err(|source| GalleryFileError::Encoding { record, source })?;

    Ok(EnrolledFace {
        person_id: i64::from_le_bytes(id),
        name,
        encoding,
    })
}

/// Running out of bytes is a format error; anything else is a read failure.
fn eof_or_read(err: io::Error, on_eof: GalleryFileError) -> GalleryFileError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        on_eof
    } else {
        GalleryFileError::Read(err)
    }
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn save(path: &Path, faces: &[EnrolledFace]) -> Result<(), GalleryFileError> {
    let io_err = |source| GalleryFileError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = io::BufWriter::new(fs::File::create(path).map_err(io_err)?);
    write_gallery(&mut file, faces).map_err(io_err)
}

/// Loads a binary gallery, or a JSON array of `EnrolledFace` for any
/// extension not registered as binary.
pub fn load(path: &Path) -> Result<Vec<EnrolledFace>, GalleryFileError> {
    let io_err = |source| GalleryFileError::Io {
        path: path.to_path_buf(),
        source,
    };
    if is_binary_gallery(path) {
        let mut file = io::BufReader::new(fs::File::open(path).map_err(io_err)?);
        read_gallery(&mut file).map_err(|e| match e {
            GalleryFileError::Read(source) => io_err(source),
            other => other,
        })
    } else {
        let json = fs::read_to_string(path).map_err(io_err)?;
        serde_json::from_str(&json).map_err(|source| GalleryFileError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

pub fn is_binary_gallery(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| GALLERY_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
