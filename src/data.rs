use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{error::FetchError, fetch::{Location, fetch_bytes}, gpx::Overlay};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageJSON
{
   pub url: String,
}

/// One entry of the track list as published next to the GPX files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackJSON
{
   #[serde(rename = "gpxFile")]
   pub gpx_file: String,
   #[serde(default)]
   pub color: String,
   #[serde(rename = "dayTitle", default)]
   pub day_title: String,
   #[serde(rename = "dayDescription", default)]
   pub day_description: String,
   #[serde(default)]
   pub images: Vec<ImageJSON>,
}

pub fn parse_tracks_json(json_str: &str) -> Result<Vec<TrackJSON>, String>
{
   serde_json::from_str(json_str).map_err(|e| format!("Failed to parse track list JSON: {}", e))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image
{
   pub url:   String,
   pub index: usize,
}

#[derive(Debug, Clone)]
pub struct Track
{
   pub index:           usize,
   pub geometry_source: String,
   pub color:           String,
   pub day_title:       String,
   pub day_description: String,
   pub images:          Vec<Image>,
   overlay:             Option<Arc<Overlay>>,
}

impl Track
{
   pub fn overlay(&self) -> Option<&Arc<Overlay>> { self.overlay.as_ref() }

   /// Display colour as RGB. Accepts `#rgb`, `#rrggbb` and the common CSS colour names.
   pub fn rgb(&self) -> [u8; 3] { parse_color(&self.color).unwrap_or(DEFAULT_TRACK_COLOR) }
}

pub const DEFAULT_TRACK_COLOR: [u8; 3] = [0, 0, 255];

pub fn parse_color(color: &str) -> Option<[u8; 3]>
//-------------------------------------------------
{
   let color = color.trim().to_ascii_lowercase();
   if let Some(hex) = color.strip_prefix('#')
   {
      let digits: Vec<u8> = hex.chars().map(|c| c.to_digit(16).map(|d| d as u8)).collect::<Option<Vec<u8>>>()?;
      return match digits.len()
      {
         | 3 => Some([digits[0] * 17, digits[1] * 17, digits[2] * 17]),
         | 6 => Some([digits[0] * 16 + digits[1], digits[2] * 16 + digits[3], digits[4] * 16 + digits[5]]),
         | _ => None,
      };
   }
   let rgb = match color.as_str()
   {
      | "red" => [255, 0, 0],
      | "green" => [0, 128, 0],
      | "blue" => [0, 0, 255],
      | "yellow" => [255, 255, 0],
      | "orange" => [255, 165, 0],
      | "purple" => [128, 0, 128],
      | "magenta" | "fuchsia" => [255, 0, 255],
      | "cyan" | "aqua" => [0, 255, 255],
      | "black" => [0, 0, 0],
      | "white" => [255, 255, 255],
      | "brown" => [165, 42, 42],
      | "pink" => [255, 192, 203],
      | "gray" | "grey" => [128, 128, 128],
      | "darkred" => [139, 0, 0],
      | "darkgreen" => [0, 100, 0],
      | "darkblue" => [0, 0, 139],
      | "navy" => [0, 0, 128],
      | "teal" => [0, 128, 128],
      | "olive" => [128, 128, 0],
      | "maroon" => [128, 0, 0],
      | "lime" => [0, 255, 0],
      | _ => return None,
   };
   Some(rgb)
}

/// The ordered list of tracks for the session. Only the overlay handle of each track changes
/// after construction, and only once.
#[derive(Debug, Clone, Default)]
pub struct TrackRepository
{
   tracks: Vec<Track>,
}

impl TrackRepository
{
   /// Builds the repository from the parsed list, resolving GPX and image references against
   /// `base` (the location the list was read from).
   pub fn from_json(base: &Location, list: Vec<TrackJSON>) -> Self
   //--------------------------------------------------------------
   {
      let tracks = list.into_iter().enumerate()
         .map(|(index, t)| Track { index,
                                   geometry_source: base.join(&t.gpx_file).to_string(),
                                   color: t.color,
                                   day_title: t.day_title,
                                   day_description: t.day_description,
                                   images: t.images.iter().enumerate()
                                             .map(|(i, img)| Image { url: base.join(&img.url).to_string(), index: i })
                                             .collect(),
                                   overlay: None })
         .collect();
      TrackRepository { tracks }
   }

   /// Fetches and parses the track list. Either every track is returned or none.
   pub fn load(source: &Location) -> Result<TrackRepository, FetchError>
   //--------------------------------------------------------------------
   {
      let data = fetch_bytes(source)
         .map_err(|reason| FetchError::Unreachable { location: source.to_string(), reason })?;
      let text = String::from_utf8(data)
         .map_err(|e| FetchError::Malformed { location: source.to_string(), reason: e.to_string() })?;
      let list = parse_tracks_json(&text)
         .map_err(|reason| FetchError::Malformed { location: source.to_string(), reason })?;
      Ok(TrackRepository::from_json(source, list))
   }

   /// Attaches the rendered overlay. Returns false, leaving the track untouched, when the index
   /// is unknown or an overlay was already attached.
   pub fn attach_overlay(&mut self, track_index: usize, overlay: Arc<Overlay>) -> bool
   //---------------------------------------------------------------------------------
   {
      match self.tracks.get_mut(track_index)
      {
         | Some(track) if track.overlay.is_none() =>
         {
            track.overlay = Some(overlay);
            true
         }
         | Some(_) =>
         {
            log::warn!("Track {track_index} already has an overlay, ignoring the second one");
            false
         }
         | None =>
         {
            log::warn!("No track {track_index} to attach an overlay to");
            false
         }
      }
   }

   pub fn get(&self, index: usize) -> Option<&Track> { self.tracks.get(index) }

   pub fn len(&self) -> usize { self.tracks.len() }

   pub fn is_empty(&self) -> bool { self.tracks.is_empty() }

   pub fn iter(&self) -> impl Iterator<Item = &Track> { self.tracks.iter() }
}
