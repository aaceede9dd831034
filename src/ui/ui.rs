use std::{collections::HashMap, path::PathBuf, sync::{Arc, mpsc::{Receiver, Sender, channel}}};

use eframe::{CreationContext, egui::TextureHandle};
use walkers::{HttpTiles, MapMemory, lon_lat, sources::OpenStreetMap};

use crate::{StartupParameters,
            components::{self, CAMERA_ICON, FLASH_ICON, ToastManager},
            engine::{Completion, ImageKey, MapState, PanelState, Session, SessionConfig, ThreadDispatcher, UserEvent,
                     dispatch::{Capabilities, LocationImageSource}, ImageCache},
            gpx::{GpxRenderer, Point},
            photo_meta::ExifExtractor};

const WORKER_THREADS: usize = 4;
const ICON_SIZE: u32 = 32;

pub(crate) type AlbumSession = Session<ThreadDispatcher, MapState, PanelState>;

pub struct GPXAlbumUI
//===================
{
   pub(crate) session:             AlbumSession,
   pub(crate) completions:         crossbeam::channel::Receiver<Completion>,
   pub(crate) events:              (crossbeam::channel::Sender<UserEvent>, crossbeam::channel::Receiver<UserEvent>),
   pub(crate) open_dialog_channel: (Sender<PathBuf>, Receiver<PathBuf>),
   pub(crate) toast_manager:       ToastManager,
   pub(crate) textures:            HashMap<String, TextureHandle>,
   pub(crate) tiles:               Option<HttpTiles>,
   pub(crate) map_memory:          MapMemory,
   pub(crate) home:                Point,
   pub(crate) hovered_image:       Option<ImageKey>,
   pub(crate) loaded_reported:     bool,
}

impl GPXAlbumUI
{
   pub(crate) fn new(cc: &CreationContext, startup: StartupParameters) -> Self
   //--------------------------------------------------------------------------
   {
      let (home, initial_zoom, marker_zoom) =
      {
         let settings = crate::settings().lock();
         (Point { lat: settings.initial_latitude, lon: settings.initial_longitude }, settings.initial_zoom, settings.marker_zoom)
      };

      let (completion_tx, completion_rx) = crossbeam::channel::unbounded();
      let ctx = cc.egui_ctx.clone();
      let capabilities = Capabilities { extractor: Arc::new(ExifExtractor),
                                        renderer: Arc::new(GpxRenderer::new(startup.method)),
                                        source: Arc::new(LocationImageSource),
                                        images: Arc::new(ImageCache::new()) };
      let dispatcher = ThreadDispatcher::new(capabilities, WORKER_THREADS, completion_tx, move || ctx.request_repaint());
      let mut session = Session::new(dispatcher, MapState::new(), PanelState::new(), SessionConfig { marker_zoom });
      session.load(startup.source);

      let mut map_memory = MapMemory::default();
      map_memory.center_at(lon_lat(home.lon, home.lat));
      if map_memory.set_zoom(initial_zoom).is_err()
      {
         log::warn!("Initial zoom {initial_zoom} rejected by the map");
      }

      let mut textures = HashMap::new();
      for name in [CAMERA_ICON, FLASH_ICON]
      {
         match components::load_svg_texture(&cc.egui_ctx, name, ICON_SIZE)
         {
            | Ok(texture) =>
            {
               textures.insert(name.to_string(), texture);
            }
            | Err(e) => log::warn!("Failed to load {name} icon texture: {e}"),
         }
      }

      GPXAlbumUI { session,
                   completions: completion_rx,
                   events: crossbeam::channel::unbounded(),
                   open_dialog_channel: channel(),
                   toast_manager: ToastManager::new(),
                   textures,
                   tiles: Some(HttpTiles::new(OpenStreetMap, cc.egui_ctx.clone())),
                   map_memory,
                   home,
                   hovered_image: None,
                   loaded_reported: false }
   }

   /// Folds finished background work into the session.
   pub(crate) fn drain_completions(&mut self)
   //-----------------------------------------
   {
      while let Ok(completion) = self.completions.try_recv()
      {
         self.session.apply(completion);
      }
      if let Some(e) = self.session.take_load_error()
      {
         self.toast_manager.error(format!("Error loading track data: {e}"));
      }
      if !self.loaded_reported && !self.session.tracks().is_empty()
      {
         self.toast_manager.info(format!("{} days loaded", self.session.tracks().len()));
         self.loaded_reported = true;
      }
   }

   /// Hands queued map and panel events to the session.
   pub(crate) fn drain_events(&mut self)
   //------------------------------------
   {
      while let Ok(event) = self.events.1.try_recv()
      {
         log::trace!("{event:?}");
         self.session.handle(event);
      }
   }

   pub(crate) fn send(&self, event: UserEvent)
   {
      if self.events.0.send(event).is_err()
      {
         log::warn!("Event {event:?} dropped");
      }
   }
}
