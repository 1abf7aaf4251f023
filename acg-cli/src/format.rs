//! Various formatting utilities.

use std::time::Duration;
use std::fmt;


/// Common human-readable date format.
pub const DATE_FORMAT: &str = "%a %b %e %T %Y";

/// A wrapper that can be used to format a remaining duration for human-readable format,
/// only the most significant unit is shown.
#[derive(Debug)]
pub struct DurationFmt(pub Duration);

impl fmt::Display for DurationFmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {

        let secs = self.0.as_secs();

        let days = secs / 86400;
        if days > 0 {
            return write!(f, "{days} days");
        }

        let hours = secs / 3600;
        if hours > 0 {
            return write!(f, "{hours} hours");
        }

        let minutes = secs / 60;
        if minutes > 0 {
            return write!(f, "{minutes} minutes");
        }

        write!(f, "{secs} seconds")

    }
}
