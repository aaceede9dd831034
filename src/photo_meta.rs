use std::{fs::File, io::{BufReader, Cursor}, path::Path};

use chrono::NaiveDateTime;
use exif::{In, Tag, Value};

use crate::{engine::MetadataExtractor, error::MetadataDecodeError};

/// Degrees, minutes and seconds as stored in the EXIF GPS tags, plus hemisphere letters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTag
{
   pub latitude:      [f64; 3],
   pub latitude_ref:  char,
   pub longitude:     [f64; 3],
   pub longitude_ref: char,
}

impl GeoTag
{
   /// Signed decimal (latitude, longitude).
   pub fn to_lat_lng(&self) -> (f64, f64)
   {
      (to_decimal_degrees(self.latitude, self.latitude_ref), to_decimal_degrees(self.longitude, self.longitude_ref))
   }
}

/// Description and capture time exactly as found in the image, before any clean up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDescription
{
   pub description:        Option<String>,
   pub date_time_original: Option<String>,
}

/// `dd = deg + min/60 + sec/3600`, negated for the southern and western hemispheres.
pub fn to_decimal_degrees(dms: [f64; 3], hemisphere: char) -> f64
//---------------------------------------------------------------
{
   let dd = dms[0] + dms[1] / 60.0 + dms[2] / 3600.0;
   match hemisphere.to_ascii_uppercase()
   {
      | 'S' | 'W' => -dd,
      | _ => dd,
   }
}

/// `YYYY:MM:DD HH:MM:SS` becomes `YYYY/MM/DD HH:MM`; seconds are dropped, not rounded. The time
/// part is cut to its first five characters, so a short one is kept as is.
pub fn format_capture_timestamp(raw: &str) -> Result<String, MetadataDecodeError>
//-------------------------------------------------------------------------------
{
   let trimmed = raw.trim();
   let mut parts = trimmed.split(' ');
   match (parts.next(), parts.next(), parts.next())
   {
      | (Some(date), Some(time), None) if !date.is_empty() =>
      {
         let hours_minutes = time.char_indices().nth(5).map_or(time, |(end, _)| &time[..end]);
         Ok(format!("{} {}", date.replace(':', "/"), hours_minutes))
      }
      | _ => Err(MetadataDecodeError::Timestamp(raw.to_string())),
   }
}

/// `YYYY:MM:DD HH:MM:SS` as a date and time, for ordering photographs.
pub fn parse_capture_time(raw: &str) -> Option<NaiveDateTime>
{
   NaiveDateTime::parse_from_str(raw.trim(), "%Y:%m:%d %H:%M:%S").ok()
}

/// `DateTimeOriginal` of the image file at `path`. `None` when the file cannot be opened or
/// carries no usable capture time.
pub fn read_capture_time(path: &Path) -> Option<NaiveDateTime>
//------------------------------------------------------------
{
   let file = match File::open(path)
   {
      | Ok(f) => f,
      | Err(e) =>
      {
         log::warn!("Cannot open {}: {e}", path.display());
         return None;
      }
   };
   let exif_data = exif::Reader::new().read_from_container(&mut BufReader::new(file)).ok()?;
   parse_capture_time(&ascii_field(&exif_data, Tag::DateTimeOriginal)?)
}

/// Undo the classic mis-decoding where UTF-8 bytes were read one byte per char. Every char must
/// fit in a byte and the resulting bytes must be valid UTF-8, otherwise the text is left alone
/// by the caller.
pub fn recover_text_encoding(raw: &str) -> Result<String, MetadataDecodeError>
//----------------------------------------------------------------------------
{
   let mut bytes = Vec::with_capacity(raw.len());
   for c in raw.chars()
   {
      let code = c as u32;
      if code > 0xFF
      {
         return Err(MetadataDecodeError::WideChar(c));
      }
      bytes.push(code as u8);
   }
   String::from_utf8(bytes).map_err(|_| MetadataDecodeError::InvalidUtf8)
}

/// Byte per char view of an EXIF ASCII field, which is what a Latin-1 reader would see.
fn latin1(bytes: &[u8]) -> String { bytes.iter().map(|&b| b as char).collect() }

fn ascii_field(exif_data: &exif::Exif, tag: Tag) -> Option<String>
//-----------------------------------------------------------------
{
   let field = exif_data.get_field(tag, In::PRIMARY)?;
   match field.value
   {
      | Value::Ascii(ref vec) if !vec.is_empty() =>
      {
         let text = latin1(&vec[0]);
         let text = text.trim_end_matches('\0').to_string();
         if text.trim().is_empty() { None } else { Some(text) }
      }
      | _ => None,
   }
}

/// Degrees, minutes, seconds from three EXIF rationals.
fn dms_field(exif_data: &exif::Exif, tag: Tag) -> Option<[f64; 3]>
//-----------------------------------------------------------------
{
   let field = exif_data.get_field(tag, In::PRIMARY)?;
   if let Value::Rational(ref rats) = field.value
      && rats.len() >= 3
   {
      if rats[..3].iter().any(|r| r.denom == 0)
      {
         return None;
      }
      return Some([rats[0].to_f64(), rats[1].to_f64(), rats[2].to_f64()]);
   }
   None
}

fn hemisphere_field(exif_data: &exif::Exif, tag: Tag, default: char) -> char
//--------------------------------------------------------------------------
{
   ascii_field(exif_data, tag)
      .and_then(|s| s.trim().chars().next())
      .map(|c| c.to_ascii_uppercase())
      .unwrap_or(default)
}

pub fn read_exif_data(bytes: &[u8]) -> Option<exif::Exif>
//--------------------------------------------------------
{
   let mut reader = Cursor::new(bytes);
   exif::Reader::new().read_from_container(&mut reader).ok()
}

/// Reads geotags and descriptions with `kamadak-exif`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifExtractor;

impl MetadataExtractor for ExifExtractor
{
   fn extract_location(&self, image: &[u8]) -> Option<GeoTag>
   //---------------------------------------------------------
   {
      let exif_data = read_exif_data(image)?;
      let latitude = dms_field(&exif_data, Tag::GPSLatitude)?;
      let longitude = dms_field(&exif_data, Tag::GPSLongitude)?;
      Some(GeoTag { latitude,
                    latitude_ref: hemisphere_field(&exif_data, Tag::GPSLatitudeRef, 'N'),
                    longitude,
                    longitude_ref: hemisphere_field(&exif_data, Tag::GPSLongitudeRef, 'E') })
   }

   fn extract_description(&self, image: &[u8]) -> Option<RawDescription>
   //--------------------------------------------------------------------
   {
      let exif_data = read_exif_data(image)?;
      Some(RawDescription { description: ascii_field(&exif_data, Tag::ImageDescription),
                            date_time_original: ascii_field(&exif_data, Tag::DateTimeOriginal) })
   }
}

#[cfg(test)]
mod tests
{
   use super::*;

   fn close(a: f64, b: f64) -> bool { (a - b).abs() < 1e-4 }

   #[test]
   fn decimal_degrees_are_sign_correct()
   {
      assert!(close(to_decimal_degrees([42.0, 41.0, 0.0], 'N'), 42.68333));
      assert!(close(to_decimal_degrees([0.0, 36.0, 43.6], 'W'), -0.61211));
      assert!(close(to_decimal_degrees([33.0, 52.0, 4.0], 'S'), -33.86778));
      assert!(close(to_decimal_degrees([151.0, 12.0, 36.0], 'E'), 151.21));
      assert_eq!(to_decimal_degrees([0.0, 0.0, 0.0], 'S'), 0.0);
      for hemisphere in ['N', 'E', 'n', 'e']
      {
         assert!(to_decimal_degrees([1.0, 2.0, 3.0], hemisphere) > 0.0);
      }
      for hemisphere in ['S', 'W', 's', 'w']
      {
         assert!(to_decimal_degrees([1.0, 2.0, 3.0], hemisphere) < 0.0);
      }
   }

   #[test]
   fn geotag_converts_both_axes()
   {
      let tag = GeoTag { latitude: [42.0, 41.0, 0.0], latitude_ref: 'N', longitude: [0.0, 36.0, 43.6], longitude_ref: 'W' };
      let (lat, lng) = tag.to_lat_lng();
      assert!(close(lat, 42.68333) && close(lng, -0.61211));
   }

   #[test]
   fn capture_timestamp_is_reformatted()
   {
      assert_eq!(format_capture_timestamp("2024:07:01 14:32:59").unwrap(), "2024/07/01 14:32");
      assert_eq!(format_capture_timestamp(" 2024:07:01 08:05:00 ").unwrap(), "2024/07/01 08:05");
      assert!(format_capture_timestamp("yesterday").is_err());
      assert_eq!(format_capture_timestamp("2024:07:01 8:5").unwrap(), "2024/07/01 8:5");
      assert_eq!(format_capture_timestamp("2024:07:01 9:05:07").unwrap(), "2024/07/01 9:05:");
      assert!(format_capture_timestamp("2024:07:01 14:32:59 extra").is_err());
   }

   #[test]
   fn capture_time_orders_photographs()
   {
      let morning = parse_capture_time("2025:07:06 08:12:30").unwrap();
      let evening = parse_capture_time(" 2025:07:06 19:01:02 ").unwrap();
      assert!(morning < evening);
      assert_eq!(morning.format("%Y-%m-%d %H:%M:%S").to_string(), "2025-07-06 08:12:30");
      assert!(parse_capture_time("2025:07:06").is_none());
      assert!(parse_capture_time("0000:00:00 00:00:00").is_none());
      assert!(read_capture_time(Path::new("no/such/photo.jpg")).is_none());
   }

   #[test]
   fn text_recovery()
   {
      // "Col de la Croix-Blanche, été" written as UTF-8 and read back one byte per char.
      let garbled = latin1("Croix-Blanche, été".as_bytes());
      assert_ne!(garbled, "Croix-Blanche, été");
      assert_eq!(recover_text_encoding(&garbled).unwrap(), "Croix-Blanche, été");
      assert_eq!(recover_text_encoding("plain ascii").unwrap(), "plain ascii");
      // Genuine Latin-1 text is not valid UTF-8 once flattened to bytes.
      assert_eq!(recover_text_encoding("été"), Err(MetadataDecodeError::InvalidUtf8));
      assert_eq!(recover_text_encoding("\u{2603}"), Err(MetadataDecodeError::WideChar('\u{2603}')));
   }

   #[test]
   fn non_images_have_no_metadata()
   {
      let extractor = ExifExtractor;
      assert!(extractor.extract_location(b"definitely not a jpeg").is_none());
      assert!(extractor.extract_description(b"").is_none());
   }
}
