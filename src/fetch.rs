use std::{fmt, path::{Path, PathBuf}};

use reqwest::Url;

/// Where a track list, GPX file or photograph lives.
#[derive(Debug, Clone, PartialEq)]
pub enum Location
{
   File(PathBuf),
   Url(Url),
}

impl Location
{
   pub fn parse(text: &str) -> Location
   //----------------------------------
   {
      let trimmed = text.trim();
      let lower = trimmed.to_ascii_lowercase();
      if lower.starts_with("http://") || lower.starts_with("https://")
      {
         if let Ok(url) = Url::parse(trimmed)
         {
            return Location::Url(url);
         }
         log::warn!("{trimmed} looks like a URL but does not parse, treating it as a path");
      }
      Location::File(PathBuf::from(trimmed))
   }

   /// Resolve `reference` relative to this location. A full URL is returned as is, as is an
   /// absolute path when the base is itself a file. A relative path is looked up next to the
   /// base first and then from the working directory, so lists written with references from a
   /// site root still load; when neither exists the path next to the base is kept.
   pub fn join(&self, reference: &str) -> Location
   //----------------------------------------------
   {
      let candidate = Location::parse(reference);
      match (&candidate, self)
      {
         | (Location::Url(_), _) => candidate,
         | (Location::File(_), Location::Url(base)) => match base.join(reference.trim())
         {
            | Ok(url) => Location::Url(url),
            | Err(e) =>
            {
               log::warn!("Cannot resolve {reference} against {base}: {e}");
               candidate
            }
         },
         | (Location::File(p), Location::File(_)) if p.is_absolute() => candidate,
         | (Location::File(p), Location::File(base)) =>
         {
            let dir = base.parent().unwrap_or_else(|| Path::new(""));
            let beside = dir.join(p);
            if !beside.exists() && p.exists()
            {
               log::debug!("{} not found, using {} from the working directory", beside.display(), p.display());
               return candidate;
            }
            Location::File(beside)
         }
      }
   }
}

impl fmt::Display for Location
{
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
   {
      match self
      {
         | Location::File(p) => write!(f, "{}", p.display()),
         | Location::Url(u) => write!(f, "{u}"),
      }
   }
}

/// Blocking read of the whole resource. Must not be called on the UI thread.
pub fn fetch_bytes(location: &Location) -> Result<Vec<u8>, String>
//----------------------------------------------------------------
{
   match location
   {
      | Location::File(path) => std::fs::read(path).map_err(|e| format!("{}: {e}", path.display())),
      | Location::Url(url) =>
      {
         let response = reqwest::blocking::get(url.clone())
            .map_err(|e| format!("request failed: {e}"))?;
         let status = response.status();
         if !status.is_success()
         {
            return Err(format!("HTTP error: {status}"));
         }
         let bytes = response.bytes()
            .map_err(|e| format!("failed to read response: {e}"))?;
         Ok(bytes.to_vec())
      }
   }
}
