use std::path::PathBuf;

use thiserror::Error;

/// The track list could not be obtained. Fatal to the session: no tracks are shown.
#[derive(Debug, Error)]
pub enum FetchError
{
   #[error("unable to read track list {location}: {reason}")]
   Unreachable { location: String, reason: String },

   #[error("malformed track list {location}: {reason}")]
   Malformed { location: String, reason: String },
}

/// A track's geometry could not be turned into an overlay.
#[derive(Debug, Error)]
pub enum RenderError
{
   #[error("unable to read GPX {location}: {reason}")]
   Fetch { location: String, reason: String },

   #[error("unable to parse GPX {location}: {reason}")]
   Parse { location: String, reason: String },

   #[error("GPX {0} contains no track points")]
   Empty(String),
}

/// A photograph could not be fetched or is not a decodable image.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("error loading image {url}: {reason}")]
pub struct ImageLoadError
{
   pub url:    String,
   pub reason: String,
}

/// Descriptive text from an image is malformed. Always recovered locally by keeping the raw text.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MetadataDecodeError
{
   #[error("description is not Latin-1 wrapped UTF-8 (offending char {0:?})")]
   WideChar(char),

   #[error("description bytes are not valid UTF-8")]
   InvalidUtf8,

   #[error("unrecognised capture timestamp {0:?}")]
   Timestamp(String),
}

/// The track list generator could not read its inputs or write the list.
#[derive(Debug, Error)]
pub enum GenerateError
{
   #[error("unable to read {path}: {source}")]
   Read { path: PathBuf, source: std::io::Error },

   #[error("no .gpx files in {0}")]
   NoTracks(PathBuf),

   #[error("unable to encode track list: {0}")]
   Encode(#[from] serde_json::Error),

   #[error("unable to write {path}: {source}")]
   Write { path: PathBuf, source: std::io::Error },
}
