//! Builds the track list the viewer reads from a directory of daily GPX files and a directory of
//! photographs. GPX files are taken in name order, one per day; photographs are dated by their
//! EXIF capture time and attached to the day they were taken.

use std::{collections::BTreeMap, fs, path::{Component, Path, PathBuf}};

use chrono::{Days, NaiveDate, NaiveDateTime};
use walkdir::WalkDir;

use crate::{data::{ImageJSON, TrackJSON}, error::GenerateError, photo_meta::read_capture_time};

/// Track colours, reused in order once there are more days than entries.
pub const PALETTE: [&str; 12] = ["#0000FF", "#FF0000", "#00FF00", "#FF00FF", "#00FFFF", "#FFFF00",
                                 "#FFA500", "#800080", "#008000", "#808000", "#800000", "#008080"];

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Clone)]
pub struct GenerateOptions
{
   pub gpx_dir:   PathBuf,
   pub image_dir: PathBuf,
   pub output:    PathBuf,
   pub trip:      String,
   /// Day of the first GPX file. The earliest photograph's day when unset.
   pub first_day: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatedPhoto
{
   pub path:  PathBuf,
   pub taken: NaiveDateTime,
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool
{
   path.extension()
       .and_then(|e| e.to_str())
       .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// The `.gpx` files directly inside `dir`, sorted by file name.
pub fn gpx_files(dir: &Path) -> Result<Vec<PathBuf>, GenerateError>
//-----------------------------------------------------------------
{
   let entries = fs::read_dir(dir).map_err(|source| GenerateError::Read { path: dir.to_path_buf(), source })?;
   let mut files: Vec<PathBuf> = entries.filter_map(|e| e.ok())
                                        .map(|e| e.path())
                                        .filter(|p| p.is_file() && has_extension(p, &["gpx"]))
                                        .collect();
   files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
   if files.is_empty()
   {
      return Err(GenerateError::NoTracks(dir.to_path_buf()));
   }
   Ok(files)
}

/// Every photograph under `dir` with a capture time, oldest first. Photographs without one are
/// skipped since they cannot be placed on a day.
pub fn dated_photos(dir: &Path) -> Vec<DatedPhoto>
//-------------------------------------------------
{
   let mut photos: Vec<DatedPhoto> = WalkDir::new(dir).into_iter()
      .filter_map(|e| e.ok())
      .filter(|e| e.file_type().is_file() && has_extension(e.path(), &IMAGE_EXTENSIONS))
      .filter_map(|e|
      {
         let path = e.into_path();
         match read_capture_time(&path)
         {
            | Some(taken) => Some(DatedPhoto { path, taken }),
            | None =>
            {
               log::warn!("No capture time in {}, skipped", path.display());
               None
            }
         }
      })
      .collect();
   photos.sort_by(|a, b| a.taken.cmp(&b.taken).then_with(|| a.path.cmp(&b.path)));
   photos
}

/// Photographs by calendar day of capture, keeping their order within each day.
pub fn group_by_day(photos: &[DatedPhoto]) -> BTreeMap<NaiveDate, Vec<PathBuf>>
//-----------------------------------------------------------------------------
{
   let mut days: BTreeMap<NaiveDate, Vec<PathBuf>> = BTreeMap::new();
   for photo in photos
   {
      days.entry(photo.taken.date()).or_default().push(photo.path.clone());
   }
   days
}

/// `path` as a `/` separated reference from the directory `base`. Falls back to the absolute
/// path when the two share no root.
pub fn relative_reference(path: &Path, base: &Path) -> String
//-----------------------------------------------------------
{
   let (Ok(path), Ok(base)) = (std::path::absolute(path), std::path::absolute(base))
   else
   {
      return path.to_string_lossy().replace('\\', "/");
   };
   let path_parts: Vec<Component> = path.components().filter(|c| *c != Component::CurDir).collect();
   let base_parts: Vec<Component> = base.components().filter(|c| *c != Component::CurDir).collect();
   let shared = path_parts.iter().zip(&base_parts).take_while(|(a, b)| a == b).count();
   if shared == 0
   {
      return path.to_string_lossy().replace('\\', "/");
   }
   let ups = std::iter::repeat_n("..".to_string(), base_parts.len() - shared);
   let downs = path_parts[shared..].iter().map(|c| c.as_os_str().to_string_lossy().into_owned());
   ups.chain(downs).collect::<Vec<String>>().join("/")
}

/// One entry per GPX file. Day `n` (from 1) gets the photographs taken `n - 1` days after
/// `first_day` and the title `"{trip} : Jour n"`.
pub fn build_track_list(gpx: &[PathBuf], days: &BTreeMap<NaiveDate, Vec<PathBuf>>, first_day: Option<NaiveDate>,
                        trip: &str, base: &Path)
                        -> Vec<TrackJSON>
//--------------------------------------------------------------------------------------------------------------
{
   let no_photos = Vec::new();
   gpx.iter().enumerate()
      .map(|(i, gpx_file)|
      {
         let day = first_day.and_then(|d| d.checked_add_days(Days::new(i as u64)));
         let photos = day.and_then(|d| days.get(&d)).unwrap_or(&no_photos);
         TrackJSON { gpx_file: relative_reference(gpx_file, base),
                     color: PALETTE[i % PALETTE.len()].to_string(),
                     day_title: format!("{trip} : Jour {}", i + 1),
                     day_description: String::new(),
                     images: photos.iter().map(|p| ImageJSON { url: relative_reference(p, base) }).collect() }
      })
      .collect()
}

/// Scans the inputs and writes the track list to `options.output`. References in the list are
/// relative to the output's directory, which is where the viewer resolves them. Returns the
/// number of days written.
pub fn generate(options: &GenerateOptions) -> Result<usize, GenerateError>
//------------------------------------------------------------------------
{
   let gpx = gpx_files(&options.gpx_dir)?;
   let photos = dated_photos(&options.image_dir);
   let days = group_by_day(&photos);
   let first_day = options.first_day.or_else(|| days.keys().next().copied());
   if let Some(first) = first_day
   {
      let last = first.checked_add_days(Days::new(gpx.len().saturating_sub(1) as u64));
      let unplaced: usize = days.iter()
                                .filter(|(d, _)| **d < first || last.is_some_and(|l| **d > l))
                                .map(|(_, p)| p.len())
                                .sum();
      if unplaced > 0
      {
         log::warn!("{unplaced} photographs fall outside the {} days starting {first}", gpx.len());
      }
   }

   let base = match options.output.parent()
   {
      | Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
      | _ => PathBuf::from("."),
   };
   let tracks = build_track_list(&gpx, &days, first_day, &options.trip, &base);
   let json = serde_json::to_string_pretty(&tracks)?;
   fs::write(&options.output, json).map_err(|source| GenerateError::Write { path: options.output.clone(), source })?;
   log::info!("Wrote {} days and {} photographs to {}", tracks.len(), photos.len(), options.output.display());
   Ok(tracks.len())
}
