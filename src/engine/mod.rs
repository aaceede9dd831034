//! Track/image synchronisation: which track is selected, which photo markers are on the map and
//! what the information panel shows, kept consistent while renders and metadata reads complete
//! in any order.

pub mod dispatch;
pub mod markers;
pub mod panel;
pub mod selection;
pub mod session;
pub mod view;

use crate::{error::RenderError, gpx::Overlay, photo_meta::{GeoTag, RawDescription}};

pub use dispatch::{Completion, Dispatcher, ImageCache, Job, Request, ThreadDispatcher};
pub use markers::{Appearance, Marker, MarkerRegistry};
pub use panel::{ImageEntry, InfoPanelController, TrackSummary};
pub use selection::{Selection, Transition};
pub use session::{Session, SessionConfig, UserEvent};
pub use view::{MapState, MapSurface, PanelEntry, PanelState, PanelView, ScrollRequest, ViewRequest};

/// Stable identity of a photograph within the session: its track and its position in that
/// track's image list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageKey
{
   pub track_index: usize,
   pub image_index: usize,
}

impl ImageKey
{
   pub fn new(track_index: usize, image_index: usize) -> Self { ImageKey { track_index, image_index } }
}

/// Reads embedded geolocation and descriptive tags from encoded image bytes.
pub trait MetadataExtractor: Send + Sync
{
   /// `None` when the image carries no geotag, which is a normal outcome.
   fn extract_location(&self, image: &[u8]) -> Option<GeoTag>;
   fn extract_description(&self, image: &[u8]) -> Option<RawDescription>;
}

/// Turns a track's geometry source into a drawable overlay with summary statistics.
pub trait TrackRenderer: Send + Sync
{
   fn render(&self, geometry_source: &str) -> Result<Overlay, RenderError>;
}

/// Fetches the encoded bytes of a photograph.
pub trait ImageSource: Send + Sync
{
   fn fetch(&self, url: &str) -> Result<Vec<u8>, String>;
}
