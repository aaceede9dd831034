use std::{env, fs::File, io::Write, path::{Path, PathBuf}};

const PROGRAM: &str = "GPXAlbum";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Settings
{
   #[serde(default = "Settings::get_home_dir")]
   last_directory:        PathBuf,
   #[serde(default = "Settings::default_latitude")]
   pub(crate) initial_latitude:  f64,
   #[serde(default = "Settings::default_longitude")]
   pub(crate) initial_longitude: f64,
   #[serde(default = "Settings::default_zoom")]
   pub(crate) initial_zoom:      f64,
   #[serde(default = "Settings::default_marker_zoom")]
   pub(crate) marker_zoom:       f64,
}

impl Default for Settings
{
   fn default() -> Self
   //------------------
   {
      Self { last_directory:    Settings::get_home_dir(),
             initial_latitude:  Settings::default_latitude(),
             initial_longitude: Settings::default_longitude(),
             initial_zoom:      Settings::default_zoom(),
             marker_zoom:       Settings::default_marker_zoom() }
   }
}

impl Settings
//===========
{
   pub fn new() -> Self { Settings::default() }

   fn default_latitude() -> f64 { 42.6839 }

   fn default_longitude() -> f64 { 0.6121 }

   fn default_zoom() -> f64 { 8.0 }

   fn default_marker_zoom() -> f64 { 15.0 }

   /// Reads the settings file, creating it with defaults when there is none. Any failure falls
   /// back to defaults; startup never stops over settings.
   pub fn get_settings_or_default(&self) -> Settings
   //------------------------------------------------
   {
      let path = match self.get_settings_path()
      {
         | Ok(p) => p,
         | Err(e) =>
         {
            log::warn!("Error getting settings path: {e}");
            return Settings::default();
         }
      };
      if !path.exists()
      {
         let defaults = Settings::default();
         if let Err(e) = defaults.write_to(&path)
         {
            log::warn!("Error creating default settings {}: {e}", path.display());
         }
         return defaults;
      }
      Settings::read_from(&path)
   }

   /// Parses a settings file; missing fields take their defaults, a corrupt file gives defaults.
   pub fn read_from(path: &Path) -> Settings
   //---------------------------------------
   {
      let file = match File::open(path)
      {
         | Ok(f) => f,
         | Err(e) =>
         {
            log::warn!("Error opening settings file {}: {e}", path.display());
            return Settings::default();
         }
      };
      match serde_json::from_reader(file)
      {
         | Ok(s) => s,
         | Err(e) =>
         {
            log::warn!("Error reading settings {}: {e}", path.display());
            Settings::default()
         }
      }
   }

   pub fn write_to(&self, path: &Path) -> Result<(), std::io::Error>
   //----------------------------------------------------------------
   {
      let mut file = File::create(path)?;
      let json = serde_json::to_string_pretty(&self)?;
      file.write_all(json.as_bytes())?;
      log::debug!("Wrote settings to {}", path.display());
      Ok(())
   }

   pub(crate) fn write_settings(&self) -> Result<PathBuf, std::io::Error>
   //--------------------------------------------------------------------
   {
      let path = self.get_settings_path()?;
      self.write_to(&path)?;
      Ok(path)
   }

   /// Remembers the directory of the last opened track list. Returns false if `path` is not a
   /// directory or the settings could not be saved.
   pub fn set_last_directorybuf(&mut self, path: &Path) -> bool
   //-----------------------------------------------------------
   {
      if !path.is_dir()
      {
         log::warn!("{} is not a directory", path.display());
         return false;
      }
      self.last_directory = path.to_path_buf();
      match self.write_settings()
      {
         | Ok(_) => true,
         | Err(e) =>
         {
            log::warn!("Failed to write settings file: {e}");
            false
         }
      }
   }

   pub fn get_last_directorybuf(&self) -> PathBuf { self.last_directory.clone() }

   /// `GPXAlbum` under the platform config directory (`~/.config` when the platform has none),
   /// created on first use.
   pub fn get_config_path(&self) -> Result<PathBuf, std::io::Error>
   //---------------------------------------------------------------
   {
      let base = dirs::config_dir().unwrap_or_else(|| Settings::get_home_dir().join(".config"));
      let config_path = base.join(PROGRAM);
      if config_path.exists() && !config_path.is_dir()
      {
         return Err(std::io::Error::other(format!("Config path {} exists and is not a directory", config_path.display())));
      }
      std::fs::create_dir_all(&config_path)?;
      Ok(config_path)
   }

   pub fn get_settings_path(&self) -> Result<PathBuf, std::io::Error>
   {
      Ok(self.get_config_path()?.join(SETTINGS_FILE))
   }

   pub fn get_home_dir() -> PathBuf
   //-------------------------------
   {
      dirs::home_dir().unwrap_or_else(env::temp_dir)
   }
}
