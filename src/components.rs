use std::{sync::Arc, time::{Duration, Instant}};

use crossbeam::channel::Sender;
use eframe::egui::{self, Color32, ColorImage, Context, Pos2, Rect, TextureHandle, Vec2};
use include_dir::{Dir, include_dir};
use walkers::{MapMemory, Plugin, Projector, lon_lat};

use crate::{engine::{Appearance, ImageKey, UserEvent}, gpx::{Bounds, Overlay, Point}};

// Embed the entire assets directory at compile time
pub(crate) static ASSETS_DIR: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/assets");

pub(crate) const CAMERA_ICON: &str = "camera";
pub(crate) const FLASH_ICON: &str = "camera_flash";

const CAMERA_SIZE: f32 = 24.0;
const FLASH_SIZE: f32 = 32.0;
const THUMBNAIL_WIDTH: f32 = 100.0;
const TRACK_HIT_DISTANCE: f32 = 6.0;
const TILE_SIZE: f64 = 256.0;
const MAX_FIT_ZOOM: f64 = 17.0;

/// One track polyline as drawn on the map.
pub struct TrackLine
{
   pub index:    usize,
   pub overlay:  Arc<Overlay>,
   pub color:    Color32,
   pub selected: bool,
}

/// One attached photo marker, with the photograph's bytes once they have been fetched.
pub struct PhotoPin
{
   pub key:        ImageKey,
   pub position:   Point,
   pub appearance: Appearance,
   pub thumbnail:  Option<(String, Arc<[u8]>)>,
}

/// Walkers plugin drawing every track overlay and the visible photo markers. Clicks become
/// `UserEvent`s; a marker under the pointer wins over a track line.
pub struct AlbumLayer
{
   pub tracks: Vec<TrackLine>,
   pub pins:   Vec<PhotoPin>,
   pub camera: Option<TextureHandle>,
   pub flash:  Option<TextureHandle>,
   pub events: Sender<UserEvent>,
}

impl Plugin for AlbumLayer
//========================
{
   fn run(self: Box<Self>, ui: &mut egui::Ui, response: &egui::Response, projector: &Projector, _map_memory: &MapMemory)
   //--------------------------------------------------------------------------------------------------------------------
   {
      let project = |p: &Point| projector.project(lon_lat(p.lon, p.lat)).to_pos2();
      let painter = ui.painter().clone();

      let mut screen_tracks: Vec<(usize, Vec<Vec<Pos2>>)> = Vec::with_capacity(self.tracks.len());
      let (selected, others): (Vec<&TrackLine>, Vec<&TrackLine>) = self.tracks.iter().partition(|t| t.selected);
      for track in others.into_iter().chain(selected)
      {
         let width = if track.selected { 5.0 } else { 3.0 };
         let segments: Vec<Vec<Pos2>> = track.overlay.segments.iter().map(|s| s.iter().map(project).collect()).collect();
         for segment in &segments
         {
            painter.add(egui::Shape::line(segment.clone(), egui::Stroke::new(width, track.color)));
         }
         if let Some(start) = segments.first().and_then(|s| s.first())
         {
            painter.circle(*start, 5.0, Color32::from_rgb(40, 167, 69), egui::Stroke::new(1.5, Color32::WHITE));
         }
         if let Some(end) = segments.last().and_then(|s| s.last())
         {
            painter.circle(*end, 5.0, Color32::from_rgb(220, 53, 69), egui::Stroke::new(1.5, Color32::WHITE));
         }
         screen_tracks.push((track.index, segments));
      }

      let mut pin_rects: Vec<(&PhotoPin, Rect)> = Vec::with_capacity(self.pins.len());
      for pin in &self.pins
      {
         let (texture, size) = match pin.appearance
         {
            | Appearance::Normal => (self.camera.as_ref(), CAMERA_SIZE),
            | Appearance::Highlighted => (self.flash.as_ref(), FLASH_SIZE),
         };
         let rect = pin_rect(project(&pin.position), size);
         match texture
         {
            | Some(texture) =>
            {
               painter.image(texture.id(), rect, Rect::from_min_max(Pos2::ZERO, egui::pos2(1.0, 1.0)), Color32::WHITE);
            }
            | None =>
            {
               let color = if pin.appearance == Appearance::Highlighted { Color32::YELLOW } else { Color32::from_rgb(60, 120, 216) };
               painter.circle(rect.center(), size / 3.0, color, egui::Stroke::new(1.5, Color32::WHITE));
            }
         }
         pin_rects.push((pin, rect));
      }

      let Some(pointer) = response.hover_pos() else { return };
      // Later pins are drawn on top so they are hit first.
      let hovered = pin_rects.iter().rev().find(|(_, rect)| rect.contains(pointer)).map(|(pin, _)| *pin);
      if let Some(pin) = hovered
      {
         ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
         if let Some((url, bytes)) = &pin.thumbnail
         {
            let uri = format!("bytes://{url}");
            let bytes = bytes.clone();
            response.clone().on_hover_ui_at_pointer(|ui|
            {
               ui.add(egui::Image::from_bytes(uri, bytes).max_width(THUMBNAIL_WIDTH));
            });
         }
      }
      if !response.clicked()
      {
         return;
      }
      let event = match hovered
      {
         | Some(pin) => Some(UserEvent::MarkerClicked(pin.key)),
         | None => track_under(pointer, &screen_tracks).map(UserEvent::OverlayClicked),
      };
      if let Some(event) = event
         && self.events.send(event).is_err()
      {
         log::warn!("Map event {event:?} dropped, receiver gone");
      }
   }
}

/// Icon rectangle anchored at its bottom centre, like a pin.
fn pin_rect(anchor: Pos2, size: f32) -> Rect
{
   Rect::from_min_size(anchor - Vec2::new(size / 2.0, size), Vec2::splat(size))
}

/// Index of the track whose line passes within `TRACK_HIT_DISTANCE` of `pointer`. Tracks are
/// listed in draw order, so the last match is the one on top.
fn track_under(pointer: Pos2, tracks: &[(usize, Vec<Vec<Pos2>>)]) -> Option<usize>
//--------------------------------------------------------------------------------
{
   tracks.iter().rev()
      .find(|(_, segments)|
      {
         segments.iter().any(|s| s.windows(2).any(|w| segment_distance(pointer, w[0], w[1]) <= TRACK_HIT_DISTANCE))
      })
      .map(|(index, _)| *index)
}

/// Distance from `p` to the segment `a`-`b` in screen units.
fn segment_distance(p: Pos2, a: Pos2, b: Pos2) -> f32
//----------------------------------------------------
{
   let ab = b - a;
   let length_sq = ab.length_sq();
   if length_sq == 0.0
   {
      return p.distance(a);
   }
   let t = ((p - a).dot(ab) / length_sq).clamp(0.0, 1.0);
   p.distance(a + ab * t)
}

/// Largest zoom level at which `bounds` fits in a `width` x `height` viewport in web mercator,
/// leaving a small margin. Degenerate bounds (a single point) give the closest zoom allowed.
pub fn fit_zoom(bounds: &Bounds, width: f64, height: f64) -> f64
//--------------------------------------------------------------
{
   let mercator_y = |lat: f64| (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
   let dx = (bounds.east - bounds.west).abs() / 360.0;
   let dy = (mercator_y(bounds.north) - mercator_y(bounds.south)).abs() / (2.0 * std::f64::consts::PI);
   let usable_width = (width * 0.9).max(1.0);
   let usable_height = (height * 0.9).max(1.0);
   let zoom_x = if dx > 0.0 { (usable_width / (TILE_SIZE * dx)).log2() } else { MAX_FIT_ZOOM };
   let zoom_y = if dy > 0.0 { (usable_height / (TILE_SIZE * dy)).log2() } else { MAX_FIT_ZOOM };
   zoom_x.min(zoom_y).floor().clamp(0.0, MAX_FIT_ZOOM)
}

/// Rasterize an SVG from embedded asset data
pub fn rasterize_svg_from_bytes(svg_data: &[u8], width: u32, height: u32) -> Result<ColorImage, String>
//------------------------------------------------------------------------------------------------------
{
   let tree = usvg::Tree::from_data(svg_data, &usvg::Options::default()).map_err(|e| format!("Failed to parse SVG: {}", e))?;
   let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or_else(|| "Failed to create pixmap".to_string())?;

   let svg_size = tree.size();
   let scale = (width as f32 / svg_size.width()).min(height as f32 / svg_size.height());
   resvg::render(&tree, tiny_skia::Transform::from_scale(scale, scale), &mut pixmap.as_mut());

   // tiny_skia pixels are premultiplied RGBA
   Ok(ColorImage::from_rgba_premultiplied([width as usize, height as usize], pixmap.data()))
}

/// Load an SVG icon texture from embedded assets
pub fn load_svg_texture(ctx: &Context, name: &str, size: u32) -> Result<TextureHandle, String>
//--------------------------------------------------------------------------------------------
{
   let asset_name = format!("{name}.svg");
   let svg_data = ASSETS_DIR
      .get_file(&asset_name)
      .ok_or_else(|| format!("Failed to find embedded asset: {}", asset_name))?
      .contents();
   let color_image = rasterize_svg_from_bytes(svg_data, size * 2, size * 2)?;
   Ok(ctx.load_texture(name, color_image, egui::TextureOptions::LINEAR))
}

//-----------------------------------------------------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToastLevel
{
   Info,
   Error,
}

impl ToastLevel
{
   fn color(&self) -> Color32
   {
      match self
      {
         | ToastLevel::Info => Color32::from_rgb(60, 120, 216),
         | ToastLevel::Error => Color32::from_rgb(220, 53, 69),
      }
   }

   fn icon(&self) -> &str
   {
      match self
      {
         | ToastLevel::Info => "ℹ",
         | ToastLevel::Error => "✖",
      }
   }
}

#[derive(Clone)]
pub struct Toast
{
   message:    String,
   level:      ToastLevel,
   created_at: Instant,
   duration:   Duration,
}

impl Toast
{
   pub fn new(message: impl Into<String>, level: ToastLevel, duration: Duration) -> Self
   {
      Self { message: message.into(), level, created_at: Instant::now(), duration }
   }

   pub fn is_expired(&self) -> bool { self.created_at.elapsed() > self.duration }

   /// Fraction of the display time left, 1 when new and 0 when expired.
   pub fn remaining_time(&self) -> f32
   {
      let elapsed = self.created_at.elapsed().as_secs_f32();
      let total = self.duration.as_secs_f32();
      if total <= 0.0 { 0.0 } else { ((total - elapsed) / total).max(0.0) }
   }
}

#[derive(Default)]
pub struct ToastManager
{
   toasts: Vec<Toast>,
}

impl ToastManager
{
   pub fn new() -> Self { Self::default() }

   pub fn info(&mut self, message: impl Into<String>) { self.toasts.push(Toast::new(message, ToastLevel::Info, Duration::from_secs(3))); }

   /// Errors stay up longer than notices.
   pub fn error(&mut self, message: impl Into<String>) { self.toasts.push(Toast::new(message, ToastLevel::Error, Duration::from_secs(8))); }

   pub fn show(&mut self, ctx: &Context)
   //-----------------------------------
   {
      self.toasts.retain(|toast| !toast.is_expired());
      if self.toasts.is_empty()
      {
         return;
      }

      let screen_rect = ctx.content_rect();
      let toast_width = 350.0;
      let margin = 20.0;
      let mut y_offset = margin;
      for (index, toast) in self.toasts.iter().enumerate()
      {
         egui::Area::new(egui::Id::new("toast").with(index))
            .fixed_pos(egui::pos2(screen_rect.right() - toast_width - margin, screen_rect.top() + y_offset))
            .order(egui::Order::Foreground)
            .show(ctx, |ui|
            {
               egui::Frame::new()
                  .fill(Color32::from_black_alpha(230))
                  .stroke(egui::Stroke::new(2.0, toast.level.color()))
                  .corner_radius(8.0)
                  .inner_margin(12.0)
                  .show(ui, |ui|
                  {
                     ui.set_width(toast_width - 24.0);
                     ui.horizontal(|ui|
                     {
                        ui.label(egui::RichText::new(toast.level.icon()).color(toast.level.color()).size(24.0));
                        ui.add_space(8.0);
                        ui.label(egui::RichText::new(&toast.message).color(Color32::WHITE).size(14.0));
                     });

                     ui.add_space(4.0);
                     let (rect, _) = ui.allocate_exact_size(egui::vec2(toast_width - 24.0, 3.0), egui::Sense::hover());
                     let remaining = Rect::from_min_size(rect.min, egui::vec2((toast_width - 24.0) * toast.remaining_time(), 3.0));
                     ui.painter().rect_filled(remaining, 0.0, toast.level.color().linear_multiply(0.8));
                  });
            });
         y_offset += 90.0;
      }
      // Keep animating the progress bars
      ctx.request_repaint();
   }
}

#[cfg(test)]
mod tests
{
   use super::*;

   #[test]
   fn whole_world_fits_at_zoom_zero()
   {
      let world = Bounds { south: -85.0, west: -180.0, north: 85.0, east: 180.0 };
      assert_eq!(fit_zoom(&world, 256.0, 256.0), 0.0);
   }

   #[test]
   fn a_day_in_the_pyrenees_fits_at_a_walking_zoom()
   {
      // Roughly 20 km by 10 km.
      let bounds = Bounds { south: 42.60, west: 0.50, north: 42.70, east: 0.75 };
      let zoom = fit_zoom(&bounds, 1024.0, 600.0);
      assert!((10.0..=13.0).contains(&zoom), "zoom {zoom}");
      // Smaller viewports never zoom in further.
      assert!(fit_zoom(&bounds, 400.0, 300.0) <= zoom);
   }

   #[test]
   fn a_single_point_uses_the_closest_zoom()
   {
      let point = Bounds { south: 42.68, west: 0.61, north: 42.68, east: 0.61 };
      assert_eq!(fit_zoom(&point, 800.0, 600.0), MAX_FIT_ZOOM);
   }

   #[test]
   fn segment_distance_clamps_to_the_ends()
   {
      let a = egui::pos2(0.0, 0.0);
      let b = egui::pos2(10.0, 0.0);
      assert_eq!(segment_distance(egui::pos2(5.0, 3.0), a, b), 3.0);
      assert_eq!(segment_distance(egui::pos2(-4.0, 3.0), a, b), 5.0);
      assert!((segment_distance(egui::pos2(3.0, 4.0), a, a) - 5.0).abs() < 1e-6);
   }

   #[test]
   fn the_topmost_track_wins_a_click()
   {
      let line = |y: f32| vec![vec![egui::pos2(0.0, y), egui::pos2(100.0, y)]];
      let tracks = vec![(0, line(0.0)), (3, line(4.0))];
      assert_eq!(track_under(egui::pos2(50.0, 2.0), &tracks), Some(3));
      assert_eq!(track_under(egui::pos2(50.0, -5.0), &tracks), Some(0));
      assert_eq!(track_under(egui::pos2(50.0, 40.0), &tracks), None);
   }

   #[test]
   fn pins_hang_above_their_anchor()
   {
      let rect = pin_rect(egui::pos2(100.0, 100.0), 24.0);
      assert_eq!(rect.min, egui::pos2(88.0, 76.0));
      assert_eq!(rect.max, egui::pos2(112.0, 100.0));
   }

   #[test]
   fn embedded_icons_rasterize()
   {
      for name in [CAMERA_ICON, FLASH_ICON]
      {
         let svg = ASSETS_DIR.get_file(format!("{name}.svg")).unwrap().contents();
         let image = rasterize_svg_from_bytes(svg, 48, 48).unwrap();
         assert_eq!(image.size, [48, 48]);
         assert!(image.pixels.iter().any(|p| p.a() > 0));
      }
   }

   #[test]
   fn toasts_are_queued()
   {
      let mut toasts = ToastManager::new();
      toasts.error("no tracks");
      toasts.info("loaded");
      assert_eq!(toasts.toasts.len(), 2);
      assert!(matches!(toasts.toasts[0].level, ToastLevel::Error));
      assert!(Toast::new("x", ToastLevel::Info, Duration::ZERO).remaining_time() == 0.0);
   }
}
