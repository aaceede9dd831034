use std::{path::PathBuf, sync::{Arc, OnceLock}};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use eframe::egui;

mod components;
mod data;
mod engine;
mod error;
mod fetch;
mod generate;
mod gpx;
mod photo_meta;
mod settings;
mod ui;
mod ut;

use crate::{fetch::Location, gpx::DistanceMethod, ui::GPXAlbumUI};
use settings::Settings;

#[derive(Parser, Debug)]
#[command(version, about = "Daily GPX tracks on a map with their geotagged photographs", long_about = None,
          args_conflicts_with_subcommands = true)]
struct Args
{
   #[command(subcommand)]
   command: Option<Command>,

   /// Select gpx distance calculation method h = Haversine, e = ECEF
   #[arg(short = 'm', long = "method", default_value = "h")]
   method: char,

   /// Track list (JSON) to open, a file path or an http(s) URL
   #[arg(default_value = "data/tracks.json")]
   source: String,
}

#[derive(Subcommand, Debug)]
enum Command
{
   /// Write a track list from a directory of daily GPX files and a directory of photographs
   Generate(GenerateArgs),
}

#[derive(clap::Args, Debug)]
struct GenerateArgs
{
   /// Directory holding one GPX file per day, taken in file name order
   gpx_dir: PathBuf,

   /// Directory searched recursively for .jpg, .jpeg and .png photographs
   image_dir: PathBuf,

   /// Track list to write; references in it are relative to its directory
   #[arg(short = 'o', long = "output", default_value = "tracks.json")]
   output: PathBuf,

   /// Put in front of every day title, as in "<TRIP> : Jour 3"
   #[arg(short = 't', long = "trip", default_value = "Album")]
   trip: String,

   /// Day of the first GPX file (YYYY-MM-DD), by default the day of the earliest photograph
   #[arg(long = "first-day")]
   first_day: Option<NaiveDate>,
}

impl From<GenerateArgs> for generate::GenerateOptions
{
   fn from(args: GenerateArgs) -> Self
   {
      generate::GenerateOptions { gpx_dir: args.gpx_dir, image_dir: args.image_dir, output: args.output, trip: args.trip,
                                  first_day: args.first_day }
   }
}

fn run_generate(args: GenerateArgs)
//---------------------------------
{
   let options = generate::GenerateOptions::from(args);
   match generate::generate(&options)
   {
      | Ok(days) => println!("{days} days written to {}", options.output.display()),
      | Err(e) =>
      {
         log::error!("Track list generation failed: {e}");
         eprintln!("Error: {e}");
         std::process::exit(1);
      }
   }
}

pub(crate) struct StartupParameters
{
   pub(crate) method: DistanceMethod,
   pub(crate) source: Location,
}

static SETTINGS: OnceLock<Arc<parking_lot::Mutex<Settings>>> = OnceLock::new();

pub(crate) fn settings() -> &'static Arc<parking_lot::Mutex<Settings>>
{
   SETTINGS.get_or_init(|| Arc::new(parking_lot::Mutex::new(Settings::new().get_settings_or_default())))
}

fn main()
{
   env_logger::init();
   let args = Args::parse();
   if let Some(Command::Generate(generate_args)) = args.command
   {
      run_generate(generate_args);
      return;
   }
   let method = match args.method
   {
      | 'h' | 'H' => DistanceMethod::Haversine,
      | 'e' | 'E' => DistanceMethod::ECEF,
      | _ =>
      {
         eprintln!("Invalid method. Use 'h' for Haversine or 'e' for ECEF.");
         return;
      }
   };
   let startup = StartupParameters { method, source: Location::parse(&args.source) };
   log::debug!("Starting with {:?} distances, tracks from {}", startup.method, startup.source);

   let options = eframe::NativeOptions { viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 960.0]),
                                         ..Default::default() };
   let ret = eframe::run_native("GPXAlbum",
                                options,
                                Box::new(move |cc| {
                                   egui_extras::install_image_loaders(&cc.egui_ctx);
                                   Ok(Box::new(GPXAlbumUI::new(cc, startup)))
                                }));
   if let Err(e) = ret
   {
      log::error!("Error starting user interface: {e}");
      eprintln!("Error starting user interface: {e}");
   }
}

#[cfg(test)]
mod tests
{
   use super::*;

   #[test]
   fn viewer_and_generator_command_lines()
   {
      let viewer = Args::try_parse_from(["GPXAlbum", "-m", "e", "trip/tracks.json"]).unwrap();
      assert!(viewer.command.is_none());
      assert_eq!((viewer.method, viewer.source.as_str()), ('e', "trip/tracks.json"));
      let default = Args::try_parse_from(["GPXAlbum"]).unwrap();
      assert_eq!(default.source, "data/tracks.json");

      let generator = Args::try_parse_from(["GPXAlbum", "generate", "data/gpx", "data/images", "-o", "data/tracks.json",
                                            "--trip", "HRP", "--first-day", "2025-07-06"]).unwrap();
      match generator.command
      {
         | Some(Command::Generate(g)) =>
         {
            assert_eq!(g.gpx_dir, PathBuf::from("data/gpx"));
            assert_eq!(g.output, PathBuf::from("data/tracks.json"));
            assert_eq!(g.trip, "HRP");
            assert_eq!(g.first_day, NaiveDate::from_ymd_opt(2025, 7, 6));
         }
         | other => panic!("unexpected {other:?}"),
      }
      assert!(Args::try_parse_from(["GPXAlbum", "generate", "data/gpx"]).is_err());
   }
}
