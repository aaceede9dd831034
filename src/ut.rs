use std::fmt::Display;

use chrono::{DateTime, FixedOffset, TimeZone};

pub const NOT_AVAILABLE: &str = "N/A";

/// Zero counts as missing: a track without distance or climb shows `N/A`, not `0 m`.
fn measured(value: Option<f64>) -> Option<f64> { value.filter(|v| *v != 0.0 && !v.is_nan()) }

/// Meters to kilometres with two decimals.
pub fn format_distance(meters: Option<f64>) -> String
{
   match measured(meters)
   {
      | Some(m) => format!("{:.2} km", m / 1000.0),
      | None => NOT_AVAILABLE.to_string(),
   }
}

/// Whole meters, halves rounded away from zero.
pub fn format_elevation(meters: Option<f64>) -> String
{
   match measured(meters)
   {
      | Some(m) => format!("{:.0} m", m.round()),
      | None => NOT_AVAILABLE.to_string(),
   }
}

/// 24 hour `HH:MM` in the given time zone (the caller passes `chrono::Local` for the user's).
pub fn format_clock_time<Tz>(time: Option<DateTime<FixedOffset>>, tz: &Tz) -> String
   where Tz: TimeZone,
         Tz::Offset: Display
//-----------------------------------------------------------------------------------
{
   match time
   {
      | Some(t) => t.with_timezone(tz).format("%H:%M").to_string(),
      | None => NOT_AVAILABLE.to_string(),
   }
}

/// `HHhMM` for a moving time, `N/A` when there is none or it is zero.
pub fn format_moving_time(milliseconds: Option<u64>) -> String
{
   match milliseconds
   {
      | Some(ms) if ms > 0 => format_duration(ms),
      | _ => NOT_AVAILABLE.to_string(),
   }
}

/// `HHhMM`; seconds are truncated. Hours are not capped at 24.
pub fn format_duration(milliseconds: u64) -> String
//-------------------------------------------------
{
   let seconds = milliseconds / 1000;
   let hours = seconds / 3600;
   let minutes = (seconds % 3600) / 60;
   format!("{:02}h{:02}", hours, minutes)
}
