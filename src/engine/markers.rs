use crate::{data::{Track, TrackRepository}, gpx::Point, photo_meta::GeoTag};

use super::{ImageKey, Job, Request, dispatch::Dispatcher, view::MapSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Appearance
{
   #[default]
   Normal,
   Highlighted,
}

/// A map pin for one geotagged photograph. The key is the only link back to the track.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker
{
   pub key:        ImageKey,
   pub position:   Point,
   pub appearance: Appearance,
}

/// Per track, one slot per image; a slot fills once that image's location resolves.
#[derive(Debug, Default)]
pub struct MarkerRegistry
{
   slots: Vec<Vec<Option<Marker>>>,
}

impl MarkerRegistry
{
   pub fn new() -> Self { MarkerRegistry::default() }

   /// Sizes the registry for the loaded tracks, dropping any previous markers.
   pub fn prepare(&mut self, tracks: &TrackRepository)
   {
      self.slots = tracks.iter().map(|t| vec![None; t.images.len()]).collect();
   }

   /// Asks for the location of every image of the track.
   pub fn populate(&self, track: &Track, generation: u64, dispatcher: &dyn Dispatcher)
   //----------------------------------------------------------------------------------
   {
      for image in &track.images
      {
         dispatcher.dispatch(Request { generation,
                                       job: Job::LocateImage { key: ImageKey::new(track.index, image.index),
                                                               url: image.url.clone() } });
      }
   }

   /// Stores the marker for a resolved location. Writes are keyed by image so a late or repeated
   /// result replaces rather than duplicates. Returns the stored marker, or `None` when there was
   /// no geotag or the key is unknown.
   pub fn record(&mut self, key: ImageKey, location: Option<GeoTag>) -> Option<&Marker>
   //---------------------------------------------------------------------------------
   {
      let Some(tag) = location
      else
      {
         log::info!("No GPS data found in image {} of track {}", key.image_index, key.track_index);
         return None;
      };
      let Some(slot) = self.slots.get_mut(key.track_index).and_then(|t| t.get_mut(key.image_index))
      else
      {
         log::warn!("Location for unknown image {key:?} ignored");
         return None;
      };
      let (lat, lon) = tag.to_lat_lng();
      log::debug!("GPS coordinates for {key:?}: {lat:.6}, {lon:.6}");
      *slot = Some(Marker { key, position: Point { lat, lon }, appearance: Appearance::Normal });
      slot.as_ref()
   }

   pub fn get(&self, key: ImageKey) -> Option<&Marker>
   {
      self.slots.get(key.track_index)?.get(key.image_index)?.as_ref()
   }

   fn get_mut(&mut self, key: ImageKey) -> Option<&mut Marker>
   {
      self.slots.get_mut(key.track_index)?.get_mut(key.image_index)?.as_mut()
   }

   pub fn markers_for(&self, track_index: usize) -> impl Iterator<Item = &Marker>
   {
      self.slots.get(track_index).into_iter().flatten().flatten()
   }

   #[cfg(test)]
   pub fn count(&self) -> usize { self.slots.iter().flatten().flatten().count() }

   pub fn hide_all(&self, surface: &mut dyn MapSurface)
   //---------------------------------------------------
   {
      for marker in self.slots.iter().flatten().flatten()
      {
         surface.detach_marker(marker.key);
      }
   }

   /// Detaches every marker, then attaches the resolved markers of `track_index`.
   pub fn show(&self, track_index: usize, surface: &mut dyn MapSurface)
   //-------------------------------------------------------------------
   {
      self.hide_all(surface);
      for marker in self.markers_for(track_index)
      {
         surface.attach_marker(marker);
      }
   }

   pub fn highlight(&mut self, key: ImageKey, surface: &mut dyn MapSurface) { self.restyle(key, Appearance::Highlighted, surface); }

   pub fn reset(&mut self, key: ImageKey, surface: &mut dyn MapSurface) { self.restyle(key, Appearance::Normal, surface); }

   fn restyle(&mut self, key: ImageKey, appearance: Appearance, surface: &mut dyn MapSurface)
   //----------------------------------------------------------------------------------------
   {
      if let Some(marker) = self.get_mut(key)
      {
         marker.appearance = appearance;
         surface.update_marker(marker);
      }
   }

   pub fn center(&self, key: ImageKey, zoom: f64, surface: &mut dyn MapSurface)
   {
      if let Some(marker) = self.get(key)
      {
         surface.set_view(marker.position, zoom);
      }
   }
}
