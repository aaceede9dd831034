use std::sync::Arc;

use crate::{data::{Track, TrackRepository}, error::FetchError, fetch::Location};

use super::{ImageKey, Job, Request,
            dispatch::{Completion, Dispatcher},
            markers::MarkerRegistry,
            panel::InfoPanelController,
            selection::{Selection, Transition},
            view::{MapSurface, PanelView}};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig
{
   /// Zoom used when an image click centres the map on its marker.
   pub marker_zoom: f64,
}

impl Default for SessionConfig
{
   fn default() -> Self { SessionConfig { marker_zoom: 15.0 } }
}

/// Everything the user can do to the album.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEvent
{
   Previous,
   Next,
   OverlayClicked(usize),
   MarkerClicked(ImageKey),
   ImageHovered(ImageKey),
   ImageUnhovered(ImageKey),
   ImageClicked(ImageKey),
}

/// The album session. Owns the loaded tracks, the marker registry, the selection and the panel
/// controller, and is the only thing that touches the map and panel views. Work goes out through
/// the dispatcher; its results come back through `apply` in whatever order they finish.
pub struct Session<D, M, P>
   where D: Dispatcher,
         M: MapSurface,
         P: PanelView
{
   dispatcher:     D,
   map:            M,
   panel:          P,
   config:         SessionConfig,
   tracks:         TrackRepository,
   markers:        MarkerRegistry,
   selection:      Selection,
   info:           InfoPanelController,
   pending_scroll: Option<ImageKey>,
   generation:     u64,
   load_error:     Option<FetchError>,
}

impl<D, M, P> Session<D, M, P>
   where D: Dispatcher,
         M: MapSurface,
         P: PanelView
{
   pub fn new(dispatcher: D, map: M, panel: P, config: SessionConfig) -> Self
   //-------------------------------------------------------------------------
   {
      Session { dispatcher, map, panel, config,
                tracks: TrackRepository::default(),
                markers: MarkerRegistry::new(),
                selection: Selection::new(),
                info: InfoPanelController::new(),
                pending_scroll: None,
                generation: 0,
                load_error: None }
   }

   /// Drops the current album and asks for the track list at `source`. Anything still in flight
   /// for the previous album is discarded when it completes.
   pub fn load(&mut self, source: Location)
   //--------------------------------------
   {
      self.markers.hide_all(&mut self.map);
      self.panel.clear();
      self.generation += 1;
      self.dispatcher.forget_images(self.generation);
      self.tracks = TrackRepository::default();
      self.markers = MarkerRegistry::new();
      self.selection = Selection::new();
      self.info.reset();
      self.pending_scroll = None;
      self.load_error = None;
      log::info!("Loading tracks from {source}");
      self.dispatcher.dispatch(Request { generation: self.generation, job: Job::LoadTracks(source) });
   }

   /// Folds one finished request into the session. Results are always recorded; they only touch
   /// the views when they concern the track on display.
   pub fn apply(&mut self, completion: Completion)
   //---------------------------------------------
   {
      if completion.generation() != self.generation
      {
         log::debug!("Dropping completion from superseded load {}", completion.generation());
         return;
      }
      match completion
      {
         | Completion::TracksLoaded { result, .. } => self.on_tracks_loaded(result),
         | Completion::TrackRendered { track_index, result, .. } => match result
         {
            | Ok(overlay) =>
            {
               if self.tracks.attach_overlay(track_index, Arc::new(overlay)) && self.selection.current() == Some(track_index)
               {
                  self.refresh_overlay(track_index);
               }
            }
            | Err(e) => log::warn!("Track {track_index} not rendered: {e}"),
         },
         | Completion::ImageLocated { key, result, .. } => match result
         {
            | Ok(location) =>
            {
               let current = self.selection.current();
               if let Some(marker) = self.markers.record(key, location)
                  && current == Some(key.track_index)
               {
                  self.map.attach_marker(marker);
               }
            }
            | Err(e) => log::warn!("No location for {key:?}: {e}"),
         },
         | Completion::ImageDescribed { key, result, .. } =>
         {
            if self.info.settle(key, result, &mut self.panel)
            {
               self.scroll_if_pending(key);
            }
         }
      }
   }

   pub fn handle(&mut self, event: UserEvent)
   //-----------------------------------------
   {
      match event
      {
         | UserEvent::Previous => self.select(Transition::Previous),
         | UserEvent::Next => self.select(Transition::Next),
         | UserEvent::OverlayClicked(track_index) => self.select(Transition::Select(track_index)),
         | UserEvent::MarkerClicked(key) =>
         {
            if let Some(index) = self.selection.apply(Transition::Select(key.track_index))
            {
               self.transition(index);
               self.pending_scroll = Some(key);
               if self.info.is_populated(key)
               {
                  self.scroll_if_pending(key);
               }
            }
         }
         | UserEvent::ImageHovered(key) => self.markers.highlight(key, &mut self.map),
         | UserEvent::ImageUnhovered(key) => self.markers.reset(key, &mut self.map),
         | UserEvent::ImageClicked(key) => self.markers.center(key, self.config.marker_zoom, &mut self.map),
      }
   }

   fn on_tracks_loaded(&mut self, result: Result<TrackRepository, FetchError>)
   //-------------------------------------------------------------------------
   {
      match result
      {
         | Ok(tracks) =>
         {
            log::info!("Loaded {} tracks", tracks.len());
            self.tracks = tracks;
            self.markers.prepare(&self.tracks);
            for track in self.tracks.iter()
            {
               self.dispatcher.dispatch(Request { generation: self.generation,
                                                  job: Job::RenderTrack { track_index: track.index,
                                                                          geometry_source: track.geometry_source.clone() } });
               self.markers.populate(track, self.generation, &self.dispatcher);
            }
            if let Some(first) = self.selection.on_loaded(self.tracks.len())
            {
               self.transition(first);
            }
         }
         | Err(e) =>
         {
            log::error!("Error loading track data: {e}");
            self.load_error = Some(e);
         }
      }
   }

   fn select(&mut self, transition: Transition)
   {
      if let Some(index) = self.selection.apply(transition)
      {
         self.transition(index);
      }
   }

   /// Swaps the visible markers, rebuilds the panel and focuses the track's bounds, in that order.
   fn transition(&mut self, index: usize)
   //-------------------------------------
   {
      self.pending_scroll = None;
      self.markers.show(index, &mut self.map);
      let Some(track) = self.tracks.get(index) else { return };
      self.info.rebuild(track, &mut self.panel, self.generation, &self.dispatcher);
      if let Some(overlay) = track.overlay()
      {
         self.map.fit_bounds(overlay.bounds);
      }
   }

   fn refresh_overlay(&mut self, index: usize)
   {
      let Some(track) = self.tracks.get(index) else { return };
      self.info.render_summary(track, &mut self.panel);
      if let Some(overlay) = track.overlay()
      {
         self.map.fit_bounds(overlay.bounds);
      }
   }

   fn scroll_if_pending(&mut self, key: ImageKey)
   {
      if self.pending_scroll == Some(key)
      {
         self.panel.scroll_to(key);
         self.pending_scroll = None;
      }
   }

   pub fn tracks(&self) -> &TrackRepository { &self.tracks }

   pub fn current_track(&self) -> Option<&Track> { self.tracks.get(self.selection.current()?) }

   pub fn selection(&self) -> &Selection { &self.selection }

   #[cfg(test)]
   pub fn markers(&self) -> &MarkerRegistry { &self.markers }

   pub fn map(&self) -> &M { &self.map }

   pub fn map_mut(&mut self) -> &mut M { &mut self.map }

   pub fn panel(&self) -> &P { &self.panel }

   pub fn panel_mut(&mut self) -> &mut P { &mut self.panel }

   pub fn dispatcher(&self) -> &D { &self.dispatcher }

   #[cfg(test)]
   pub fn generation(&self) -> u64 { self.generation }

   #[cfg(test)]
   pub fn pending_scroll(&self) -> Option<ImageKey> { self.pending_scroll }

   /// The error of the last failed load, once.
   pub fn take_load_error(&mut self) -> Option<FetchError> { self.load_error.take() }
}

#[cfg(test)]
mod tests
{
   use std::sync::Arc;

   use super::*;
   use crate::{data::{ImageJSON, TrackJSON},
               engine::{dispatch::{DescribedImage, tests::{FixedSource, PNG_MAGIC, QueueDispatcher}},
                        view::{MapState, PanelEntry, PanelState, ScrollRequest, ViewRequest}},
               error::ImageLoadError,
               gpx::{Bounds, Overlay},
               photo_meta::{GeoTag, RawDescription}};

   type TestSession = Session<QueueDispatcher, MapState, PanelState>;

   fn tracks(image_counts: &[usize]) -> TrackRepository
   {
      let list = image_counts.iter().enumerate()
         .map(|(t, &n)| TrackJSON { gpx_file: format!("day{t}.gpx"),
                                    color: "#ff0000".into(),
                                    day_title: format!("Day {t}"),
                                    day_description: format!("About day {t}"),
                                    images: (0..n).map(|i| ImageJSON { url: format!("t{t}_{i}.jpg") }).collect() })
         .collect();
      TrackRepository::from_json(&Location::parse("tracks.json"), list)
   }

   fn tag() -> GeoTag
   {
      GeoTag { latitude: [42.0, 41.0, 0.0], latitude_ref: 'N', longitude: [0.0, 36.0, 43.6], longitude_ref: 'E' }
   }

   fn overlay(north: f64) -> Overlay
   {
      Overlay { segments: vec![],
                bounds: Bounds { south: 42.0, west: 0.5, north, east: 0.7 },
                distance: Some(10_000.0),
                start_time: None,
                end_time: None,
                moving_time: Some(3_600_000),
                elevation_gain: Some(500.0),
                elevation_loss: Some(400.0),
                elevation_max: Some(1800.0) }
   }

   fn described(key: ImageKey) -> DescribedImage
   {
      DescribedImage { url: format!("t{}_{}.jpg", key.track_index, key.image_index),
                       bytes: Arc::from(&b"jpeg"[..]),
                       metadata: Some(RawDescription { description: Some(format!("photo {key:?}")),
                                                       date_time_original: Some("2024:07:01 09:15:42".into()) }) }
   }

   /// A session with `image_counts` tracks loaded and the startup requests drained.
   fn loaded(image_counts: &[usize]) -> (TestSession, Vec<Request>)
   {
      let mut session = Session::new(QueueDispatcher::default(), MapState::new(), PanelState::new(), SessionConfig::default());
      session.load(Location::parse("tracks.json"));
      let generation = session.generation();
      let requests = session.dispatcher().take();
      assert_eq!(requests.len(), 1);
      assert!(matches!(requests[0].job, Job::LoadTracks(_)));
      session.apply(Completion::TracksLoaded { generation, result: Ok(tracks(image_counts)) });
      let requests = session.dispatcher().take();
      (session, requests)
   }

   fn located(session: &mut TestSession, key: ImageKey, location: Option<GeoTag>)
   {
      let generation = session.generation();
      session.apply(Completion::ImageLocated { generation, key, result: Ok(location) });
   }

   fn describe(session: &mut TestSession, key: ImageKey, result: Result<DescribedImage, ImageLoadError>)
   {
      let generation = session.generation();
      session.apply(Completion::ImageDescribed { generation, key, result });
   }

   fn entry_keys(panel: &PanelState) -> Vec<ImageKey> { panel.entries.iter().map(|e| e.key()).collect() }

   #[test]
   fn startup_requests_everything_and_selects_the_first_track()
   {
      let (session, requests) = loaded(&[2, 1]);
      let renders = requests.iter().filter(|r| matches!(r.job, Job::RenderTrack { .. })).count();
      let locates = requests.iter().filter(|r| matches!(r.job, Job::LocateImage { .. })).count();
      let describes: Vec<&Request> = requests.iter().filter(|r| matches!(r.job, Job::DescribeImage { .. })).collect();
      assert_eq!(renders, 2);
      assert_eq!(locates, 3);
      assert_eq!(describes.len(), 2);
      assert!(describes.iter().all(|r| matches!(&r.job, Job::DescribeImage { key, .. } if key.track_index == 0)));
      assert_eq!(session.selection().current(), Some(0));
      assert_eq!(session.panel().title, "Day 0");
      assert_eq!(entry_keys(session.panel()), vec![ImageKey::new(0, 0), ImageKey::new(0, 1)]);
      assert!(session.panel().summary.is_none());
   }

   #[test]
   fn failed_load_leaves_no_tracks()
   {
      let mut session = Session::new(QueueDispatcher::default(), MapState::new(), PanelState::new(), SessionConfig::default());
      session.load(Location::parse("missing.json"));
      session.dispatcher().take();
      let error = FetchError::Unreachable { location: "missing.json".into(), reason: "gone".into() };
      session.apply(Completion::TracksLoaded { generation: session.generation(), result: Err(error) });
      assert!(session.tracks().is_empty());
      assert_eq!(session.selection().current(), None);
      assert!(session.dispatcher().take().is_empty());
      assert!(session.take_load_error().is_some());
      assert!(session.take_load_error().is_none());

      session.handle(UserEvent::Next);
      session.handle(UserEvent::OverlayClicked(0));
      assert!(session.current_track().is_none());
   }

   #[test]
   fn two_tracks_end_to_end()
   {
      let (mut session, _) = loaded(&[2, 2]);

      located(&mut session, ImageKey::new(0, 1), None);
      located(&mut session, ImageKey::new(0, 0), Some(tag()));
      assert_eq!(session.markers().markers_for(0).count(), 1);
      assert_eq!(session.map().attached_keys(), vec![ImageKey::new(0, 0)]);

      // Track 1 resolves while hidden: recorded, not shown.
      located(&mut session, ImageKey::new(1, 1), Some(tag()));
      assert_eq!(session.map().attached_keys(), vec![ImageKey::new(0, 0)]);

      session.handle(UserEvent::Next);
      assert_eq!(session.selection().current(), Some(1));
      assert_eq!(session.map().attached_keys(), vec![ImageKey::new(1, 1)]);
      let requests = session.dispatcher().take();
      assert_eq!(requests.len(), 2);

      let first = ImageKey::new(1, 0);
      let second = ImageKey::new(1, 1);
      describe(&mut session, first, Err(ImageLoadError { url: "t1_0.jpg".into(), reason: "404".into() }));
      assert!(matches!(&session.panel().entries[0], PanelEntry::Failed { key, .. } if *key == first));
      assert!(matches!(&session.panel().entries[1], PanelEntry::Placeholder(_)));
      describe(&mut session, second, Ok(described(second)));
      assert!(matches!(&session.panel().entries[0], PanelEntry::Failed { .. }));
      match &session.panel().entries[1]
      {
         | PanelEntry::Loaded(entry) => assert_eq!(entry.timestamp, "2024/07/01 09:15"),
         | other => panic!("unexpected {other:?}"),
      }
   }

   #[test]
   fn navigation_stops_at_the_ends()
   {
      let (mut session, _) = loaded(&[0, 0, 0]);
      session.handle(UserEvent::Previous);
      assert_eq!(session.selection().current(), Some(0));
      session.handle(UserEvent::OverlayClicked(2));
      session.handle(UserEvent::Next);
      assert_eq!(session.selection().current(), Some(2));
      session.handle(UserEvent::OverlayClicked(7));
      assert_eq!(session.selection().current(), Some(2));
      assert_eq!(session.current_track().map(|t| t.day_title.as_str()), Some("Day 2"));
   }

   #[test]
   fn markers_never_leak_across_selection_changes()
   {
      let (mut session, _) = loaded(&[3, 2, 1]);
      for (t, n) in [(0, 3), (1, 2), (2, 1)]
      {
         for i in 0..n
         {
            located(&mut session, ImageKey::new(t, i), Some(tag()));
         }
      }
      for event in [UserEvent::Next, UserEvent::Next, UserEvent::Previous, UserEvent::OverlayClicked(0), UserEvent::Next,
                    UserEvent::MarkerClicked(ImageKey::new(2, 0)), UserEvent::Previous]
      {
         session.handle(event);
         let current = session.selection().current().unwrap();
         let expected: Vec<ImageKey> = session.markers().markers_for(current).map(|m| m.key).collect();
         assert_eq!(session.map().attached_keys(), expected);
      }
   }

   #[test]
   fn overlay_arrival_fills_the_summary_and_focuses_the_map()
   {
      let (mut session, _) = loaded(&[1, 1]);
      let generation = session.generation();

      session.apply(Completion::TrackRendered { generation, track_index: 1, result: Ok(overlay(43.0)) });
      assert!(session.panel().summary.is_none());
      assert!(session.map_mut().take_view_request().is_none());

      session.apply(Completion::TrackRendered { generation, track_index: 0, result: Ok(overlay(42.5)) });
      let summary = session.panel().summary.clone().unwrap();
      assert_eq!(summary.value("Distance"), Some("10.00 km"));
      assert_eq!(summary.value("Durée de déplacement"), Some("01h00"));
      assert!(matches!(session.map_mut().take_view_request(), Some(ViewRequest::FitBounds(b)) if b.north == 42.5));

      // A second overlay for the same track is refused.
      session.apply(Completion::TrackRendered { generation, track_index: 0, result: Ok(overlay(50.0)) });
      assert!(session.map_mut().take_view_request().is_none());

      session.handle(UserEvent::Next);
      assert!(session.panel().summary.is_some());
      assert!(matches!(session.map_mut().take_view_request(), Some(ViewRequest::FitBounds(b)) if b.north == 43.0));
   }

   #[test]
   fn render_failure_only_affects_its_track()
   {
      let (mut session, _) = loaded(&[1, 1]);
      let generation = session.generation();
      session.apply(Completion::TrackRendered { generation, track_index: 0,
                                                result: Err(crate::error::RenderError::Empty("day0.gpx".into())) });
      session.apply(Completion::TrackRendered { generation, track_index: 1, result: Ok(overlay(43.0)) });
      assert!(session.tracks().get(0).unwrap().overlay().is_none());
      assert!(session.tracks().get(1).unwrap().overlay().is_some());
      assert!(session.panel().summary.is_none());
   }

   #[test]
   fn marker_click_scrolls_once_the_entry_is_populated()
   {
      let (mut session, _) = loaded(&[1, 2]);
      let key = ImageKey::new(1, 1);
      located(&mut session, key, Some(tag()));

      session.handle(UserEvent::MarkerClicked(key));
      assert_eq!(session.selection().current(), Some(1));
      assert_eq!(session.pending_scroll(), Some(key));
      assert_eq!(session.panel_mut().take_scroll_request(), Some(ScrollRequest::Top));

      describe(&mut session, ImageKey::new(1, 0), Ok(described(ImageKey::new(1, 0))));
      assert_eq!(session.panel_mut().take_scroll_request(), None);
      describe(&mut session, key, Err(ImageLoadError { url: "t1_1.jpg".into(), reason: "timeout".into() }));
      assert_eq!(session.panel_mut().take_scroll_request(), Some(ScrollRequest::Entry(key)));
      assert_eq!(session.pending_scroll(), None);
   }

   #[test]
   fn marker_click_on_a_settled_entry_scrolls_immediately()
   {
      let (mut session, _) = loaded(&[1, 1]);
      let key = ImageKey::new(1, 0);
      session.handle(UserEvent::Next);
      describe(&mut session, key, Ok(described(key)));
      session.handle(UserEvent::Previous);
      session.dispatcher().take();

      session.handle(UserEvent::MarkerClicked(key));
      assert!(session.dispatcher().take().iter().all(|r| !matches!(&r.job, Job::DescribeImage { key: k, .. } if *k == key)));
      assert_eq!(session.panel_mut().take_scroll_request(), Some(ScrollRequest::Entry(key)));
      assert_eq!(session.pending_scroll(), None);
   }

   #[test]
   fn changing_track_cancels_a_pending_scroll()
   {
      let (mut session, _) = loaded(&[1, 1]);
      let key = ImageKey::new(1, 0);
      session.handle(UserEvent::MarkerClicked(key));
      session.handle(UserEvent::Previous);
      assert_eq!(session.pending_scroll(), None);
      session.panel_mut().take_scroll_request();

      describe(&mut session, key, Ok(described(key)));
      assert_eq!(session.panel_mut().take_scroll_request(), None);
      session.handle(UserEvent::Next);
      assert_eq!(session.panel_mut().take_scroll_request(), Some(ScrollRequest::Top));
   }

   #[test]
   fn image_hover_and_click_drive_the_marker()
   {
      let (mut session, _) = loaded(&[2]);
      let key = ImageKey::new(0, 1);
      located(&mut session, key, Some(tag()));

      session.handle(UserEvent::ImageHovered(ImageKey::new(0, 0)));
      session.handle(UserEvent::ImageHovered(key));
      assert_eq!(session.map().marker(key).unwrap().appearance, crate::engine::Appearance::Highlighted);
      session.handle(UserEvent::ImageUnhovered(key));
      assert_eq!(session.map().marker(key).unwrap().appearance, crate::engine::Appearance::Normal);
      session.handle(UserEvent::ImageClicked(key));
      match session.map_mut().take_view_request()
      {
         | Some(ViewRequest::Center { center, zoom }) =>
         {
            assert_eq!(zoom, 15.0);
            assert!((center.lat - 42.68333).abs() < 1e-4);
         }
         | other => panic!("unexpected {other:?}"),
      }
   }

   #[test]
   fn reload_discards_stale_completions()
   {
      let (mut session, _) = loaded(&[1]);
      let stale = session.generation();
      located(&mut session, ImageKey::new(0, 0), Some(tag()));
      assert_eq!(session.map().attached_keys().len(), 1);

      session.load(Location::parse("other.json"));
      assert!(session.map().attached_keys().is_empty());
      assert!(session.panel().entries.is_empty());
      assert_ne!(session.generation(), stale);

      session.apply(Completion::TracksLoaded { generation: stale, result: Ok(tracks(&[4])) });
      session.apply(Completion::TrackRendered { generation: stale, track_index: 0, result: Ok(overlay(42.5)) });
      assert!(session.tracks().is_empty());
      assert_eq!(session.selection().current(), None);
      assert_eq!(session.markers().count(), 0);
   }

   #[test]
   fn reload_releases_the_previous_albums_images()
   {
      let (mut session, _) = loaded(&[1]);
      let mut source = FixedSource::default();
      source.images.insert("t0_0.jpg".into(), [PNG_MAGIC, &b"day one"[..]].concat());
      session.dispatcher().images.load("t0_0.jpg", &source, session.generation()).unwrap();
      assert!(session.dispatcher().images.get("t0_0.jpg").is_some());

      let stale = session.generation();
      session.load(Location::parse("other.json"));
      assert!(session.dispatcher().images.get("t0_0.jpg").is_none());
      session.dispatcher().images.load("t0_0.jpg", &source, stale).unwrap();
      assert!(session.dispatcher().images.get("t0_0.jpg").is_none());
   }
}
