//! Quiet-hours suppression
//!
//! Windows are expressed in minutes of the local day (0..1440). A window
//! whose start is after its end wraps past midnight.

use crate::prefs::Preferences;

/// Whether engagement is suppressed at the given minute of day
///
/// The mute flag short-circuits to suppressed regardless of the window.
/// An unset window never suppresses; a degenerate `start == end` window is
/// treated as a no-op rather than an error.
#[must_use]
pub fn within_quiet_hours(prefs: &Preferences, now_minutes: u16) -> bool {
    if prefs.muted {
        return true;
    }

    let (Some(start), Some(end)) = (prefs.quiet_start, prefs.quiet_end) else {
        return false;
    };

    match start.cmp(&end) {
        std::cmp::Ordering::Equal => false,
        std::cmp::Ordering::Less => start <= now_minutes && now_minutes < end,
        // Window wraps midnight
        std::cmp::Ordering::Greater => now_minutes >= start || now_minutes < end,
    }
}
