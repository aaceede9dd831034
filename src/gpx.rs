use std::io::Cursor;

use chrono::{DateTime, FixedOffset};
use gpx::{Gpx, Waypoint, read};

use crate::{engine::TrackRenderer, error::RenderError, fetch::{Location, fetch_bytes}};

const EARTH_RADIUS_METERS: f64 = 6_371_000.0; // mean, spherical model

// WGS84 ellipsoid
const WGS84_A: f64 = 6_378_137.0;
const WGS84_E_SQ: f64 = (2.0 - 1.0 / 298.257_223_563) / 298.257_223_563;

/// Point intervals at or above this are pauses and do not count towards moving time.
const MAX_POINT_INTERVAL_MS: i64 = 15_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point
{
   pub lat: f64,
   pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ECEFCoord
{
   x: f64,
   y: f64,
   z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DistanceMethod
{
   #[default]
   Haversine,
   ECEF,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds
{
   pub south: f64,
   pub west:  f64,
   pub north: f64,
   pub east:  f64,
}

impl Bounds
{
   fn around(p: Point) -> Self { Bounds { south: p.lat, west: p.lon, north: p.lat, east: p.lon } }

   fn extend(&mut self, p: Point)
   {
      self.south = self.south.min(p.lat);
      self.north = self.north.max(p.lat);
      self.west = self.west.min(p.lon);
      self.east = self.east.max(p.lon);
   }

   pub fn center(&self) -> Point
   {
      Point { lat: (self.south + self.north) / 2.0, lon: (self.west + self.east) / 2.0 }
   }
}

/// The drawable result of rendering one track: geometry plus the summary statistics shown in the
/// info panel. Every statistic is optional because a GPX file may lack times or elevations.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay
{
   pub segments:       Vec<Vec<Point>>,
   pub bounds:         Bounds,
   pub distance:       Option<f64>, // meters
   pub start_time:     Option<DateTime<FixedOffset>>,
   pub end_time:       Option<DateTime<FixedOffset>>,
   pub moving_time:    Option<u64>, // milliseconds
   pub elevation_gain: Option<f64>,
   pub elevation_loss: Option<f64>,
   pub elevation_max:  Option<f64>,
}

impl From<Point> for ECEFCoord
{
   /// Position on the WGS84 ellipsoid surface, ignoring altitude.
   fn from(p: Point) -> Self
   {
      let (sin_lat, cos_lat) = p.lat.to_radians().sin_cos();
      let (sin_lon, cos_lon) = p.lon.to_radians().sin_cos();
      let normal = WGS84_A / (1.0 - WGS84_E_SQ * sin_lat * sin_lat).sqrt();
      ECEFCoord { x: normal * cos_lat * cos_lon, y: normal * cos_lat * sin_lon, z: normal * (1.0 - WGS84_E_SQ) * sin_lat }
   }
}

impl DistanceMethod
{
   /// Metres from `from` to `to`: great circle on a sphere for Haversine, straight chord between
   /// ellipsoid positions for ECEF.
   pub fn between(self, from: Point, to: Point) -> f64
   //--------------------------------------------------
   {
      match self
      {
         | DistanceMethod::Haversine =>
         {
            let (phi1, phi2) = (from.lat.to_radians(), to.lat.to_radians());
            let half_dphi = (phi2 - phi1) / 2.0;
            let half_dlambda = (to.lon - from.lon).to_radians() / 2.0;
            let h = half_dphi.sin().powi(2) + phi1.cos() * phi2.cos() * half_dlambda.sin().powi(2);
            2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
         }
         | DistanceMethod::ECEF =>
         {
            let (a, b) = (ECEFCoord::from(from), ECEFCoord::from(to));
            ((b.x - a.x).powi(2) + (b.y - a.y).powi(2) + (b.z - a.z).powi(2)).sqrt()
         }
      }
   }
}

fn waypoint_time(point: &Waypoint) -> Option<DateTime<FixedOffset>>
//-----------------------------------------------------------------
{
   let text = point.time.as_ref()?.format().ok()?;
   DateTime::parse_from_rfc3339(&text).ok()
}

/// Running totals while walking the points of one segment.
#[derive(Default)]
struct Accumulator
{
   distance:       f64,
   moving_ms:      i64,
   timed:          bool,
   gain:           f64,
   loss:           f64,
   max_elevation:  Option<f64>,
   start_time:     Option<DateTime<FixedOffset>>,
   end_time:       Option<DateTime<FixedOffset>>,
}

impl Accumulator
{
   fn add_segment(&mut self, points: &[Waypoint], method: DistanceMethod) -> Vec<Point>
   //----------------------------------------------------------------------------------
   {
      let mut line = Vec::with_capacity(points.len());
      let mut last: Option<(Point, Option<f64>, Option<DateTime<FixedOffset>>)> = None;
      for waypoint in points
      {
         let current = Point { lat: waypoint.point().y(), lon: waypoint.point().x() };
         let elevation = waypoint.elevation;
         let time = waypoint_time(waypoint);

         if let Some(e) = elevation
         {
            self.max_elevation = Some(self.max_elevation.map_or(e, |m| m.max(e)));
         }
         if let Some(t) = time
         {
            if self.start_time.is_none()
            {
               self.start_time = Some(t);
            }
            self.end_time = Some(t);
         }

         if let Some((prev, prev_elevation, prev_time)) = last
         {
            self.distance += method.between(prev, current);
            if let (Some(a), Some(b)) = (prev_elevation, elevation)
            {
               let delta = b - a;
               if delta > 0.0 { self.gain += delta; } else { self.loss -= delta; }
            }
            if let (Some(a), Some(b)) = (prev_time, time)
            {
               self.timed = true;
               let interval = (b - a).num_milliseconds().abs();
               if interval < MAX_POINT_INTERVAL_MS
               {
                  self.moving_ms += interval;
               }
            }
         }
         line.push(current);
         last = Some((current, elevation, time));
      }
      line
   }
}

/// Builds an overlay from the raw bytes of a GPX document. All tracks, all of their segments and
/// all routes contribute geometry and statistics.
pub fn build_overlay(data: &[u8], method: DistanceMethod, location: &str) -> Result<Overlay, RenderError>
//------------------------------------------------------------------------------------------------------
{
   let gpx: Gpx = read(Cursor::new(data))
      .map_err(|e| RenderError::Parse { location: location.to_string(), reason: e.to_string() })?;

   let mut acc = Accumulator::default();
   let mut segments = Vec::new();
   for track in &gpx.tracks
   {
      for segment in &track.segments
      {
         let line = acc.add_segment(&segment.points, method);
         if !line.is_empty()
         {
            segments.push(line);
         }
      }
   }
   for route in &gpx.routes
   {
      let line = acc.add_segment(&route.points, method);
      if !line.is_empty()
      {
         segments.push(line);
      }
   }

   let mut points = segments.iter().flatten();
   let mut bounds = match points.next()
   {
      | Some(p) => Bounds::around(*p),
      | None => return Err(RenderError::Empty(location.to_string())),
   };
   for p in points
   {
      bounds.extend(*p);
   }
   let has_elevation = acc.max_elevation.is_some();
   log::debug!("{location}: {} segments, {:.2} meters", segments.len(), acc.distance);

   Ok(Overlay { segments,
                bounds,
                distance: Some(acc.distance),
                start_time: acc.start_time,
                end_time: acc.end_time,
                moving_time: if acc.timed { Some(acc.moving_ms as u64) } else { None },
                elevation_gain: if has_elevation { Some(acc.gain) } else { None },
                elevation_loss: if has_elevation { Some(acc.loss) } else { None },
                elevation_max: acc.max_elevation })
}

/// Renders tracks by fetching and reading their GPX files.
pub struct GpxRenderer
{
   method: DistanceMethod,
}

impl GpxRenderer
{
   pub fn new(method: DistanceMethod) -> Self { GpxRenderer { method } }
}

impl TrackRenderer for GpxRenderer
{
   fn render(&self, geometry_source: &str) -> Result<Overlay, RenderError>
   //---------------------------------------------------------------------
   {
      let location = Location::parse(geometry_source);
      let data = fetch_bytes(&location)
         .map_err(|reason| RenderError::Fetch { location: geometry_source.to_string(), reason })?;
      build_overlay(&data, self.method, geometry_source)
   }
}

#[cfg(test)]
mod tests
{
   use super::*;

   const DAY_ONE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><name>day one</name><trkseg>
    <trkpt lat="42.6800" lon="0.6100"><ele>1000</ele><time>2024-07-01T08:00:00Z</time></trkpt>
    <trkpt lat="42.6810" lon="0.6110"><ele>1010</ele><time>2024-07-01T08:00:10Z</time></trkpt>
    <trkpt lat="42.6820" lon="0.6120"><ele>1005</ele><time>2024-07-01T08:00:20Z</time></trkpt>
    <trkpt lat="42.6830" lon="0.6130"><ele>1030</ele><time>2024-07-01T08:10:20Z</time></trkpt>
  </trkseg></trk>
</gpx>"#;

   const NO_TIMES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><trkseg>
    <trkpt lat="10.0" lon="20.0"></trkpt>
    <trkpt lat="10.5" lon="19.5"></trkpt>
  </trkseg></trk>
</gpx>"#;

   const EMPTY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1"></gpx>"#;

   #[test]
   fn haversine_matches_known_distance()
   {
      // One degree of latitude is ~111.2 km on the spherical model.
      let d = DistanceMethod::Haversine.between(Point { lat: 0.0, lon: 0.0 }, Point { lat: 1.0, lon: 0.0 });
      assert!((d - 111_195.0).abs() < 10.0, "{d}");
      let e = DistanceMethod::ECEF.between(Point { lat: 0.0, lon: 0.0 }, Point { lat: 1.0, lon: 0.0 });
      assert!((e - 110_574.0).abs() < 200.0, "{e}");
   }

   #[test]
   fn overlay_statistics()
   {
      let overlay = build_overlay(DAY_ONE.as_bytes(), DistanceMethod::Haversine, "day1.gpx").unwrap();
      assert_eq!(overlay.segments.len(), 1);
      assert_eq!(overlay.segments[0].len(), 4);
      assert_eq!(overlay.bounds, Bounds { south: 42.68, west: 0.61, north: 42.683, east: 0.613 });
      assert!(overlay.distance.unwrap() > 300.0 && overlay.distance.unwrap() < 500.0);
      // The final 10 minute gap is a pause.
      assert_eq!(overlay.moving_time, Some(20_000));
      assert_eq!(overlay.elevation_gain, Some(35.0));
      assert_eq!(overlay.elevation_loss, Some(5.0));
      assert_eq!(overlay.elevation_max, Some(1030.0));
      assert_eq!(overlay.start_time.unwrap().to_rfc3339(), "2024-07-01T08:00:00+00:00");
      assert_eq!(overlay.end_time.unwrap().to_rfc3339(), "2024-07-01T08:10:20+00:00");
   }

   #[test]
   fn missing_times_and_elevations_are_absent()
   {
      let overlay = build_overlay(NO_TIMES.as_bytes(), DistanceMethod::ECEF, "bare.gpx").unwrap();
      assert!(overlay.start_time.is_none());
      assert!(overlay.end_time.is_none());
      assert!(overlay.moving_time.is_none());
      assert!(overlay.elevation_gain.is_none());
      assert!(overlay.elevation_max.is_none());
      let center = overlay.bounds.center();
      assert!((center.lat - 10.25).abs() < 1e-9 && (center.lon - 19.75).abs() < 1e-9);
   }

   #[test]
   fn empty_and_garbage_documents_fail()
   {
      assert!(matches!(build_overlay(EMPTY.as_bytes(), DistanceMethod::Haversine, "e.gpx"), Err(RenderError::Empty(_))));
      assert!(matches!(build_overlay(b"not xml", DistanceMethod::Haversine, "g.gpx"), Err(RenderError::Parse { .. })));
   }

   #[test]
   fn renderer_reads_from_disk()
   {
      let dir = tempfile::tempdir().unwrap();
      let path = dir.path().join("day1.gpx");
      std::fs::write(&path, DAY_ONE).unwrap();
      let renderer = GpxRenderer::new(DistanceMethod::Haversine);
      assert!(renderer.render(&path.display().to_string()).is_ok());
      assert!(matches!(renderer.render(&dir.path().join("nope.gpx").display().to_string()),
                       Err(RenderError::Fetch { .. })));
   }
}
