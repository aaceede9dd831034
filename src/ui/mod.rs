pub mod ui;
pub mod frame;

pub use ui::GPXAlbumUI;
