use std::collections::BTreeMap;

use crate::gpx::{Bounds, Point};

use super::{ImageKey, markers::{Appearance, Marker}, panel::{ImageEntry, TrackSummary}};

/// Whatever displays the map: markers can be attached, detached and restyled, and the viewport
/// can be moved.
pub trait MapSurface
{
   fn attach_marker(&mut self, marker: &Marker);
   fn detach_marker(&mut self, key: ImageKey);
   fn update_marker(&mut self, marker: &Marker);
   fn fit_bounds(&mut self, bounds: Bounds);
   fn set_view(&mut self, center: Point, zoom: f64);
}

/// Whatever displays the information panel for the selected track.
pub trait PanelView
{
   fn clear(&mut self);
   fn render_header(&mut self, title: &str, description: &str);
   /// `None` removes the summary box.
   fn render_summary(&mut self, summary: Option<&TrackSummary>);
   fn render_placeholder(&mut self, key: ImageKey);
   fn render_image_entry(&mut self, entry: &ImageEntry);
   fn render_error(&mut self, key: ImageKey, message: &str);
   fn scroll_to(&mut self, key: ImageKey);
   fn scroll_to_top(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewRequest
{
   FitBounds(Bounds),
   Center { center: Point, zoom: f64 },
}

/// In-memory map surface. The front end draws the attached markers every frame and applies
/// the latest viewport request to its map memory.
#[derive(Debug, Default)]
pub struct MapState
{
   attached:     BTreeMap<ImageKey, Marker>,
   view_request: Option<ViewRequest>,
}

impl MapState
{
   pub fn new() -> Self { MapState::default() }

   #[cfg(test)]
   pub fn attached_keys(&self) -> Vec<ImageKey> { self.attached.keys().copied().collect() }

   #[cfg(test)]
   pub fn marker(&self, key: ImageKey) -> Option<&Marker> { self.attached.get(&key) }

   /// Attached markers in stacking order: highlighted markers come last so they draw on top.
   pub fn markers_in_draw_order(&self) -> Vec<Marker>
   //------------------------------------------------
   {
      let mut markers: Vec<Marker> = self.attached.values().cloned().collect();
      markers.sort_by_key(|m| (m.appearance == Appearance::Highlighted, m.key));
      markers
   }

   pub fn take_view_request(&mut self) -> Option<ViewRequest> { self.view_request.take() }
}

impl MapSurface for MapState
{
   fn attach_marker(&mut self, marker: &Marker) { self.attached.insert(marker.key, marker.clone()); }

   fn detach_marker(&mut self, key: ImageKey) { self.attached.remove(&key); }

   fn update_marker(&mut self, marker: &Marker)
   {
      if let Some(m) = self.attached.get_mut(&marker.key)
      {
         *m = marker.clone();
      }
   }

   fn fit_bounds(&mut self, bounds: Bounds) { self.view_request = Some(ViewRequest::FitBounds(bounds)); }

   fn set_view(&mut self, center: Point, zoom: f64) { self.view_request = Some(ViewRequest::Center { center, zoom }); }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelEntry
{
   Placeholder(ImageKey),
   Loaded(ImageEntry),
   Failed { key: ImageKey, message: String },
}

impl PanelEntry
{
   pub fn key(&self) -> ImageKey
   {
      match self
      {
         | PanelEntry::Placeholder(key) => *key,
         | PanelEntry::Loaded(entry) => entry.key,
         | PanelEntry::Failed { key, .. } => *key,
      }
   }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollRequest
{
   Top,
   Entry(ImageKey),
}

/// In-memory information panel; entries sit at their image index so out of order arrivals
/// land in the right slot.
#[derive(Debug, Default)]
pub struct PanelState
{
   pub title:       String,
   pub description: String,
   pub summary:     Option<TrackSummary>,
   pub entries:     Vec<PanelEntry>,
   scroll:          Option<ScrollRequest>,
}

impl PanelState
{
   pub fn new() -> Self { PanelState::default() }

   pub fn take_scroll_request(&mut self) -> Option<ScrollRequest> { self.scroll.take() }

   fn replace(&mut self, key: ImageKey, entry: PanelEntry)
   //------------------------------------------------------
   {
      match self.entries.get_mut(key.image_index)
      {
         | Some(slot) if slot.key() == key => *slot = entry,
         | _ => log::debug!("Panel has no slot for {key:?}, dropping entry"),
      }
   }
}

impl PanelView for PanelState
{
   fn clear(&mut self)
   {
      self.title.clear();
      self.description.clear();
      self.summary = None;
      self.entries.clear();
      self.scroll = None;
   }

   fn render_header(&mut self, title: &str, description: &str)
   {
      self.title = title.to_string();
      self.description = description.to_string();
   }

   fn render_summary(&mut self, summary: Option<&TrackSummary>) { self.summary = summary.cloned(); }

   fn render_placeholder(&mut self, key: ImageKey)
   {
      if key.image_index == self.entries.len()
      {
         self.entries.push(PanelEntry::Placeholder(key));
      }
      else
      {
         self.replace(key, PanelEntry::Placeholder(key));
      }
   }

   fn render_image_entry(&mut self, entry: &ImageEntry) { self.replace(entry.key, PanelEntry::Loaded(entry.clone())); }

   fn render_error(&mut self, key: ImageKey, message: &str)
   {
      self.replace(key, PanelEntry::Failed { key, message: message.to_string() });
   }

   fn scroll_to(&mut self, key: ImageKey) { self.scroll = Some(ScrollRequest::Entry(key)); }

   fn scroll_to_top(&mut self) { self.scroll = Some(ScrollRequest::Top); }
}
