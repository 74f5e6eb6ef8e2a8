use std::time::Duration;

/// Formats a track length as `m:ss`, or `h:mm:ss` from one hour on.
///
/// Sub-second precision is truncated.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use cssorbot::util::format_duration;
///
/// assert_eq!(format_duration(Duration::from_secs(215)), "3:35");
/// assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, total / 60 % 60, total % 60);

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
