use std::{collections::{HashMap, HashSet}, fmt::Display, sync::Arc};

use chrono::{Local, TimeZone};

use crate::{data::Track,
            error::ImageLoadError,
            gpx::Overlay,
            photo_meta::{format_capture_timestamp, recover_text_encoding},
            ut::{format_clock_time, format_distance, format_elevation, format_moving_time}};

use super::{ImageKey, Job, Request, dispatch::{DescribedImage, Dispatcher}, view::PanelView};

pub const ERROR_LOADING_IMAGE: &str = "Error loading image";

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryItem
{
   pub label: &'static str,
   pub value: String,
}

/// The track info box: start, finish, moving time, distance and elevation figures.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSummary
{
   pub items: Vec<SummaryItem>,
}

impl TrackSummary
{
   pub fn from_overlay(overlay: &Overlay) -> Self { TrackSummary::from_overlay_in(overlay, &Local) }

   pub fn from_overlay_in<Tz>(overlay: &Overlay, tz: &Tz) -> Self
      where Tz: TimeZone,
            Tz::Offset: Display
   //------------------------------------------------------------
   {
      let item = |label, value| SummaryItem { label, value };
      TrackSummary { items: vec![item("Départ", format_clock_time(overlay.start_time, tz)),
                                 item("Arrivée", format_clock_time(overlay.end_time, tz)),
                                 item("Durée de déplacement", format_moving_time(overlay.moving_time)),
                                 item("Distance", format_distance(overlay.distance)),
                                 item("Dénivelé positif", format_elevation(overlay.elevation_gain)),
                                 item("Dénivelé négatif", format_elevation(overlay.elevation_loss)),
                                 item("Altitude max", format_elevation(overlay.elevation_max))] }
   }

   #[cfg(test)]
   pub fn value(&self, label: &str) -> Option<&str>
   {
      self.items.iter().find(|i| i.label == label).map(|i| i.value.as_str())
   }
}

/// A populated panel entry: the photograph plus its cleaned up caption and capture time.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageEntry
{
   pub key:         ImageKey,
   pub url:         String,
   pub bytes:       Arc<[u8]>,
   pub timestamp:   String,
   pub description: String,
}

impl ImageEntry
{
   fn from_described(key: ImageKey, described: DescribedImage) -> Self
   //------------------------------------------------------------------
   {
      let raw = described.metadata.unwrap_or_default();
      let timestamp = match raw.date_time_original
      {
         | Some(t) => format_capture_timestamp(&t).unwrap_or_else(|e|
         {
            log::debug!("Keeping raw capture time for {key:?}: {e}");
            t.clone()
         }),
         | None => String::new(),
      };
      let description = match raw.description
      {
         | Some(d) => recover_text_encoding(&d).unwrap_or_else(|e|
         {
            log::debug!("Keeping raw description for {key:?}: {e}");
            d.clone()
         }),
         | None => String::new(),
      };
      ImageEntry { key, url: described.url, bytes: described.bytes, timestamp, description }
   }
}

#[derive(Debug, Clone)]
enum Settled
{
   Loaded(ImageEntry),
   Failed,
}

/// Drives the information panel for the selected track. Description results are kept per image
/// so that re-selecting a track shows what already arrived without asking again.
#[derive(Debug, Default)]
pub struct InfoPanelController
{
   shown:     Option<usize>,
   settled:   HashMap<ImageKey, Settled>,
   in_flight: HashSet<ImageKey>,
}

impl InfoPanelController
{
   pub fn new() -> Self { InfoPanelController::default() }

   /// Forgets everything, for a new track list.
   pub fn reset(&mut self)
   {
      self.shown = None;
      self.settled.clear();
      self.in_flight.clear();
   }

   /// Clears the panel and lays it out for `track`: header, summary box, one placeholder per image
   /// in image order. Images already settled are rendered at once; the others are requested
   /// unless a request is already outstanding. Returns the keys rendered immediately.
   pub fn rebuild(&mut self, track: &Track, panel: &mut dyn PanelView, generation: u64, dispatcher: &dyn Dispatcher) -> Vec<ImageKey>
   //----------------------------------------------------------------------------------------------------------------------------------
   {
      panel.clear();
      panel.render_header(&track.day_title, &track.day_description);
      self.render_summary(track, panel);
      self.shown = Some(track.index);

      let keys: Vec<ImageKey> = track.images.iter().map(|i| ImageKey::new(track.index, i.index)).collect();
      for key in &keys
      {
         panel.render_placeholder(*key);
      }

      let mut populated = Vec::new();
      for (key, image) in keys.into_iter().zip(&track.images)
      {
         if self.render_settled(key, panel)
         {
            populated.push(key);
         }
         else if self.in_flight.insert(key)
         {
            dispatcher.dispatch(Request { generation, job: Job::DescribeImage { key, url: image.url.clone() } });
         }
      }
      panel.scroll_to_top();
      populated
   }

   /// Replaces the summary box from the track's overlay, or removes it while there is none.
   pub fn render_summary(&self, track: &Track, panel: &mut dyn PanelView)
   {
      let summary = track.overlay().map(|o| TrackSummary::from_overlay(o));
      panel.render_summary(summary.as_ref());
   }

   /// Records a description result. Returns true when the entry was drawn into the panel, i.e.
   /// its track is the one on display.
   pub fn settle(&mut self, key: ImageKey, result: Result<DescribedImage, ImageLoadError>, panel: &mut dyn PanelView) -> bool
   //-------------------------------------------------------------------------------------------------------------------------
   {
      self.in_flight.remove(&key);
      let settled = match result
      {
         | Ok(described) => Settled::Loaded(ImageEntry::from_described(key, described)),
         | Err(e) =>
         {
            log::warn!("{e}");
            Settled::Failed
         }
      };
      self.settled.insert(key, settled);
      self.render_settled(key, panel)
   }

   /// True once the entry for `key` holds content (or an error) in the panel on display.
   pub fn is_populated(&self, key: ImageKey) -> bool
   {
      self.shown == Some(key.track_index) && self.settled.contains_key(&key)
   }

   fn render_settled(&self, key: ImageKey, panel: &mut dyn PanelView) -> bool
   //------------------------------------------------------------------------
   {
      if self.shown != Some(key.track_index)
      {
         return false;
      }
      match self.settled.get(&key)
      {
         | Some(Settled::Loaded(entry)) => panel.render_image_entry(entry),
         | Some(Settled::Failed) => panel.render_error(key, ERROR_LOADING_IMAGE),
         | None => return false,
      }
      true
   }
}
