use std::{collections::HashMap, sync::Arc, thread};

use crossbeam::channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

use crate::{data::TrackRepository,
            error::{FetchError, ImageLoadError, RenderError},
            fetch::{Location, fetch_bytes},
            gpx::Overlay,
            photo_meta::{GeoTag, RawDescription}};

use super::{ImageKey, ImageSource, MetadataExtractor, TrackRenderer};

#[derive(Debug, Clone, PartialEq)]
pub enum Job
{
   LoadTracks(Location),
   RenderTrack { track_index: usize, geometry_source: String },
   LocateImage { key: ImageKey, url: String },
   DescribeImage { key: ImageKey, url: String },
}

/// A job tagged with the session generation that asked for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Request
{
   pub generation: u64,
   pub job:        Job,
}

#[derive(Debug, Clone)]
pub struct DescribedImage
{
   pub url:      String,
   pub bytes:    Arc<[u8]>,
   pub metadata: Option<RawDescription>,
}

/// The single result of a request.
#[derive(Debug)]
pub enum Completion
{
   TracksLoaded { generation: u64, result: Result<TrackRepository, FetchError> },
   TrackRendered { generation: u64, track_index: usize, result: Result<Overlay, RenderError> },
   ImageLocated { generation: u64, key: ImageKey, result: Result<Option<GeoTag>, ImageLoadError> },
   ImageDescribed { generation: u64, key: ImageKey, result: Result<DescribedImage, ImageLoadError> },
}

impl Completion
{
   pub fn generation(&self) -> u64
   {
      match self
      {
         | Completion::TracksLoaded { generation, .. }
         | Completion::TrackRendered { generation, .. }
         | Completion::ImageLocated { generation, .. }
         | Completion::ImageDescribed { generation, .. } => *generation,
      }
   }
}

/// Accepts requests; each must eventually come back as exactly one `Completion`.
pub trait Dispatcher
{
   fn dispatch(&self, request: Request);

   /// Releases fetched image data held for generations before `generation`.
   fn forget_images(&self, generation: u64);
}

/// Photographs fetched through `Location`, so both paths and URLs work.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocationImageSource;

impl ImageSource for LocationImageSource
{
   fn fetch(&self, url: &str) -> Result<Vec<u8>, String> { fetch_bytes(&Location::parse(url)) }
}

/// Encoded image bytes by URL, shared by the marker and panel jobs so each photograph is
/// downloaded once. Only successful loads are kept. Entries belong to one album generation:
/// `forget` empties the cache and stops loads started for older generations from refilling it.
#[derive(Debug, Default)]
pub struct ImageCache
{
   inner: Mutex<CacheEntries>,
}

#[derive(Debug, Default)]
struct CacheEntries
{
   generation: u64,
   bytes:      HashMap<String, Arc<[u8]>>,
}

impl ImageCache
{
   pub fn new() -> Self { ImageCache::default() }

   pub fn get(&self, url: &str) -> Option<Arc<[u8]>> { self.inner.lock().bytes.get(url).cloned() }

   /// Drops every entry and only accepts loads from `generation` onwards.
   pub fn forget(&self, generation: u64)
   //-----------------------------------
   {
      let mut inner = self.inner.lock();
      log::debug!("Releasing {} cached images", inner.bytes.len());
      inner.bytes.clear();
      inner.generation = inner.generation.max(generation);
   }

   pub fn load(&self, url: &str, source: &dyn ImageSource, generation: u64) -> Result<Arc<[u8]>, ImageLoadError>
   //------------------------------------------------------------------------------------------------------------
   {
      if let Some(bytes) = self.get(url)
      {
         return Ok(bytes);
      }
      let data = source.fetch(url)
         .map_err(|reason| ImageLoadError { url: url.to_string(), reason })?;
      if let Err(e) = image::guess_format(&data)
      {
         return Err(ImageLoadError { url: url.to_string(), reason: format!("not a recognised image: {e}") });
      }
      let bytes: Arc<[u8]> = Arc::from(data);
      let mut inner = self.inner.lock();
      if generation >= inner.generation
      {
         inner.bytes.insert(url.to_string(), bytes.clone());
      }
      Ok(bytes)
   }
}

/// The external services a job may call.
#[derive(Clone)]
pub struct Capabilities
{
   pub extractor: Arc<dyn MetadataExtractor>,
   pub renderer:  Arc<dyn TrackRenderer>,
   pub source:    Arc<dyn ImageSource>,
   pub images:    Arc<ImageCache>,
}

/// Runs one job to completion on the calling thread.
pub fn run_job(request: Request, capabilities: &Capabilities) -> Completion
//-------------------------------------------------------------------------
{
   let generation = request.generation;
   match request.job
   {
      | Job::LoadTracks(location) =>
      {
         Completion::TracksLoaded { generation, result: TrackRepository::load(&location) }
      }
      | Job::RenderTrack { track_index, geometry_source } =>
      {
         let result = capabilities.renderer.render(&geometry_source);
         Completion::TrackRendered { generation, track_index, result }
      }
      | Job::LocateImage { key, url } =>
      {
         let result = capabilities.images.load(&url, capabilities.source.as_ref(), generation)
            .map(|bytes| capabilities.extractor.extract_location(&bytes));
         Completion::ImageLocated { generation, key, result }
      }
      | Job::DescribeImage { key, url } =>
      {
         let result = capabilities.images.load(&url, capabilities.source.as_ref(), generation)
            .map(|bytes|
            {
               let metadata = capabilities.extractor.extract_description(&bytes);
               DescribedImage { url: url.clone(), bytes, metadata }
            });
         Completion::ImageDescribed { generation, key, result }
      }
   }
}

/// Runs requests on a fixed set of worker threads and posts completions back to the UI thread.
pub struct ThreadDispatcher
{
   requests: Sender<Request>,
   images:   Arc<ImageCache>,
}

impl ThreadDispatcher
{
   pub fn new<F>(capabilities: Capabilities, workers: usize, completions: Sender<Completion>, notify: F) -> Self
      where F: Fn() + Send + Sync + 'static
   //-------------------------------------------------------------------------------------------------------------
   {
      let (requests, queue): (Sender<Request>, Receiver<Request>) = unbounded();
      let notify = Arc::new(notify);
      let images = capabilities.images.clone();
      for n in 0..workers.max(1)
      {
         let queue = queue.clone();
         let completions = completions.clone();
         let capabilities = capabilities.clone();
         let notify = notify.clone();
         let spawned = thread::Builder::new().name(format!("album-worker-{n}")).spawn(move ||
         {
            while let Ok(request) = queue.recv()
            {
               let completion = run_job(request, &capabilities);
               if completions.send(completion).is_err()
               {
                  break;
               }
               notify();
            }
         });
         if let Err(e) = spawned
         {
            log::error!("Failed to start worker thread {n}: {e}");
         }
      }
      ThreadDispatcher { requests, images }
   }

   pub fn images(&self) -> &Arc<ImageCache> { &self.images }
}

impl Dispatcher for ThreadDispatcher
{
   fn dispatch(&self, request: Request)
   {
      if let Err(e) = self.requests.send(request)
      {
         log::error!("Worker queue closed, dropping {:?}", e.0.job);
      }
   }

   fn forget_images(&self, generation: u64) { self.images.forget(generation); }
}
