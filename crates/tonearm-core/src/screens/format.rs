//! Text formatting helpers for the player screens.

use core::time::Duration;

use crate::model::Volume;
use crate::widget::FontHandle;

/// Format a duration as `m:ss`, or `h:mm:ss` from one hour on.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total / 60) % 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// `elapsed / total`, or just `elapsed` for streams of unknown length.
pub fn position_string(position: Duration, duration: Option<Duration>) -> String {
    match duration {
        Some(total) => format!("{} / {}", format_duration(position), format_duration(total)),
        None => format_duration(position),
    }
}

/// Filled width of a `width` pixel slider at `position`.
pub fn slider_fill(width: u32, position: Duration, duration: Option<Duration>) -> u32 {
    let Some(total) = duration.filter(|total| !total.is_zero()) else {
        return 0;
    };
    let ratio = position.as_millis().min(total.as_millis()) * u128::from(width) / total.as_millis();
    ratio as u32
}

pub fn volume_label(volume: Volume) -> String {
    if volume.muted {
        "Muted".into()
    } else {
        format!("Vol {}", volume.level.min(100))
    }
}

/// Cut `text` so that it fits into `width` pixels, marking the cut with
/// `..`.
pub fn fit_text(text: &str, font: FontHandle, width: u32) -> String {
    let fitting = font.chars_fitting(width);
    if text.chars().count() <= fitting {
        return text.into();
    }
    if fitting < 2 {
        return text.chars().take(fitting).collect();
    }
    let mut cut: String = text.chars().take(fitting - 2).collect();
    cut.push_str("..");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00");
        assert_eq!(format_duration(Duration::from_millis(62_900)), "1:02");
        assert_eq!(format_duration(Duration::from_secs(3_725)), "1:02:05");
    }

    #[test]
    fn test_position_string() {
        let total = Some(Duration::from_secs(225));
        assert_eq!(position_string(Duration::from_secs(61), total), "1:01 / 3:45");
        assert_eq!(position_string(Duration::from_secs(61), None), "1:01");
    }

    #[test]
    fn test_slider_fill_is_proportional_and_clamped() {
        let total = Some(Duration::from_secs(200));
        assert_eq!(slider_fill(100, Duration::from_secs(50), total), 25);
        assert_eq!(slider_fill(100, Duration::from_secs(500), total), 100);
        assert_eq!(slider_fill(100, Duration::from_secs(50), None), 0);
        assert_eq!(slider_fill(100, Duration::from_secs(50), Some(Duration::ZERO)), 0);
    }

    #[test]
    fn test_volume_label() {
        assert_eq!(volume_label(Volume { level: 45, muted: false }), "Vol 45");
        assert_eq!(volume_label(Volume { level: 45, muted: true }), "Muted");
    }

    #[test]
    fn test_fit_text() {
        let font = FontHandle::by_name("6x10").unwrap();
        assert_eq!(fit_text("short", font, 60), "short");
        assert_eq!(fit_text("a long title", font, 36), "a lo..");
        assert_eq!(fit_text("abc", font, 6), "a");
    }
}
