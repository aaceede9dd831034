use std::{future::Future, path::PathBuf, sync::mpsc::Sender};

use eframe::egui::{self, Color32, Context, Frame, RichText, Sense};
use walkers::{Map, lon_lat};

use crate::{components::{self, AlbumLayer, CAMERA_ICON, FLASH_ICON, PhotoPin, TrackLine},
            engine::{ImageKey, PanelEntry, ScrollRequest, UserEvent, ViewRequest},
            fetch::Location};

use super::ui::GPXAlbumUI;

const IMAGE_WIDTH: f32 = 480.0;
const ERROR_COLOR: Color32 = Color32::from_rgb(220, 53, 69);

impl eframe::App for GPXAlbumUI
//=============================
{
   fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame)
   //------------------------------------------------------------------
   {
      set_style(ctx);
      if let Ok(path) = self.open_dialog_channel.1.try_recv() // new track list chosen
      {
         if let Some(name) = path.file_name()
         {
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(format!("GPXAlbum: {}", name.to_string_lossy())));
         }
         self.hovered_image = None;
         self.loaded_reported = false;
         self.session.load(Location::File(path));
      }
      self.drain_events();
      self.drain_completions();

      egui::TopBottomPanel::top("top_panel").min_height(36.0)
      .frame(Frame::new().fill(Color32::from_rgb(169, 157, 133)).inner_margin(6.0))
      .show(ctx, |ui|
      {
         ui.horizontal(|ui|
         {
            if ui.button("📂 Open").on_hover_text("Open a track list (JSON)").clicked()
            {
               open_file_dialog(ui.ctx(), self.open_dialog_channel.0.clone());
            }
            ui.add_space(5.0);
            ui.separator();
            ui.add_space(5.0);

            let current = self.session.selection().current();
            let count = self.session.selection().track_count();
            if ui.add_enabled(current.is_some_and(|c| c > 0), egui::Button::new("◀")).clicked()
            {
               self.send(UserEvent::Previous);
            }
            let label = match current
            {
               | Some(c) => format!("Jour {} / {}", c + 1, count),
               | None => "Jour - / -".to_string(),
            };
            ui.label(RichText::new(label).strong());
            if ui.add_enabled(current.is_some_and(|c| c + 1 < count), egui::Button::new("▶")).clicked()
            {
               self.send(UserEvent::Next);
            }
            if let Some(track) = self.session.current_track()
            {
               ui.add_space(10.0);
               ui.label(RichText::new(&track.day_title).color(Color32::BLACK));
            }
         });
      });

      egui::TopBottomPanel::bottom("info_panel").resizable(true).default_height(320.0).min_height(120.0)
      .show(ctx, |ui|
      {
         info_panel(self, ui);
      });

      egui::CentralPanel::default().frame(Frame::new())
      .show(ctx, |ui|
      {
         let size = ui.available_size();
         if let Some(request) = self.session.map_mut().take_view_request()
         {
            let (center, zoom) = match request
            {
               | ViewRequest::FitBounds(bounds) => (bounds.center(), components::fit_zoom(&bounds, size.x as f64, size.y as f64)),
               | ViewRequest::Center { center, zoom } => (center, zoom),
            };
            self.map_memory.center_at(lon_lat(center.lon, center.lat));
            if self.map_memory.set_zoom(zoom).is_err()
            {
               log::debug!("Zoom {zoom} out of range");
            }
         }
         let layer = album_layer(self);
         let home = lon_lat(self.home.lon, self.home.lat);
         if let Some(tiles) = &mut self.tiles
         {
            ui.add(Map::new(Some(tiles), &mut self.map_memory, home).with_plugin(layer));
         }
      });

      // Clicks from this frame are handled on the next one.
      if !self.events.1.is_empty()
      {
         ctx.request_repaint();
      }
      self.toast_manager.show(ctx);
   }
}

/// Snapshot of what the map plugin draws this frame.
fn album_layer(me: &GPXAlbumUI) -> AlbumLayer
//--------------------------------------------
{
   let session = &me.session;
   let current = session.selection().current();
   let tracks = session.tracks().iter()
      .filter_map(|t|
      {
         let [r, g, b] = t.rgb();
         t.overlay().map(|o| TrackLine { index: t.index, overlay: o.clone(), color: Color32::from_rgb(r, g, b),
                                         selected: current == Some(t.index) })
      })
      .collect();
   let images = session.dispatcher().images();
   let pins = session.map().markers_in_draw_order().into_iter()
      .map(|m|
      {
         let thumbnail = session.tracks().get(m.key.track_index)
            .and_then(|t| t.images.get(m.key.image_index))
            .and_then(|image| images.get(&image.url).map(|bytes| (image.url.clone(), bytes)));
         PhotoPin { key: m.key, position: m.position, appearance: m.appearance, thumbnail }
      })
      .collect();
   AlbumLayer { tracks,
                pins,
                camera: me.textures.get(CAMERA_ICON).cloned(),
                flash: me.textures.get(FLASH_ICON).cloned(),
                events: me.events.0.clone() }
}

/// Draws the information panel from the session's panel state and turns image hover and clicks
/// into events.
fn info_panel(me: &mut GPXAlbumUI, ui: &mut egui::Ui)
//----------------------------------------------------
{
   let scroll = me.session.panel_mut().take_scroll_request();
   let mut hovered: Option<ImageKey> = None;
   let mut clicked: Option<ImageKey> = None;
   let panel = me.session.panel();

   let mut area = egui::ScrollArea::vertical().auto_shrink([false, false]);
   if scroll == Some(ScrollRequest::Top)
   {
      area = area.vertical_scroll_offset(0.0);
   }
   area.show(ui, |ui|
   {
      ui.heading(&panel.title);
      if !panel.description.is_empty()
      {
         ui.label(&panel.description);
      }
      if let Some(summary) = &panel.summary
      {
         Frame::group(ui.style()).show(ui, |ui|
         {
            ui.horizontal_wrapped(|ui|
            {
               for item in &summary.items
               {
                  ui.label(RichText::new(format!("{}:", item.label)).strong());
                  ui.label(&item.value);
                  ui.add_space(12.0);
               }
            });
         });
      }
      ui.separator();

      for entry in &panel.entries
      {
         let response = match entry
         {
            | PanelEntry::Placeholder(_) => ui.horizontal(|ui|
            {
               ui.spinner();
               ui.label("…");
            }).response,
            | PanelEntry::Loaded(image) => ui.vertical(|ui|
            {
               let picture = ui.add(egui::Image::from_bytes(format!("bytes://{}", image.url), image.bytes.clone())
                                       .max_width(IMAGE_WIDTH)
                                       .sense(Sense::click()));
               if picture.hovered()
               {
                  hovered = Some(image.key);
               }
               if picture.clicked()
               {
                  clicked = Some(image.key);
               }
               if !image.timestamp.is_empty()
               {
                  ui.label(RichText::new(&image.timestamp).small().italics());
               }
               if !image.description.is_empty()
               {
                  ui.label(&image.description);
               }
            }).response,
            | PanelEntry::Failed { message, .. } => ui.colored_label(ERROR_COLOR, message),
         };
         if scroll == Some(ScrollRequest::Entry(entry.key()))
         {
            response.scroll_to_me(Some(egui::Align::Center));
         }
         ui.add_space(8.0);
      }
   });

   if hovered != me.hovered_image
   {
      if let Some(previous) = me.hovered_image
      {
         me.send(UserEvent::ImageUnhovered(previous));
      }
      if let Some(key) = hovered
      {
         me.send(UserEvent::ImageHovered(key));
      }
      me.hovered_image = hovered;
   }
   if let Some(key) = clicked
   {
      me.send(UserEvent::ImageClicked(key));
   }
}

fn open_file_dialog(ctx: &Context, sender: Sender<PathBuf>)
//---------------------------------------------------------
{
   let pick_dir = crate::settings().lock().get_last_directorybuf();
   let dialog_future = rfd::AsyncFileDialog::new()
      .set_directory(pick_dir)
      .add_filter("Track list", &["json"])
      .pick_file();
   let ctxx = ctx.clone();
   execute(async move
   {
      if let Some(fileinfo) = dialog_future.await
      {
         let path = fileinfo.path().to_path_buf();
         if let Some(d) = path.parent()
         {
            crate::settings().lock().set_last_directorybuf(d);
         }
         if sender.send(path).is_err()
         {
            log::warn!("Open dialog result dropped");
         }
         ctxx.request_repaint();
      }
   });
}

fn execute<F: Future<Output = ()> + Send + 'static>(f: F)
{
   std::thread::spawn(move || futures::executor::block_on(f));
}

fn set_style(ctx: &Context)
//-------------------------
{
   let mut style: egui::Style = (*ctx.style()).clone();
   style.visuals.window_fill = Color32::from_rgb(30, 30, 30);
   style.visuals.image_loading_spinners = true;
   style.text_styles = [(egui::TextStyle::Heading, egui::FontId::new(24.0, egui::FontFamily::Proportional)),
                        (egui::TextStyle::Body, egui::FontId::new(16.0, egui::FontFamily::Proportional)),
                        (egui::TextStyle::Monospace, egui::FontId::new(16.0, egui::FontFamily::Monospace)),
                        (egui::TextStyle::Button, egui::FontId::new(18.0, egui::FontFamily::Proportional)),
                        (egui::TextStyle::Small, egui::FontId::new(13.0, egui::FontFamily::Proportional))].into();
   ctx.set_style(style);
}
