//! Various utilities to ease outputting human or machine readable logs.
//!
//! All logs are written to the standard error, the standard output is reserved for
//! the printed profiles.

use std::io::{self, IsTerminal, Write};
use std::fmt::{self, Display, Write as _};
use std::env;


/// An abstraction for outputting logs in any format, the goal is to provide an
/// interface for outputting at the same time both human readable and machine outputs.
#[derive(Debug)]
pub struct Output {
    /// Mode-specific data.
    mode: OutputMode,
    /// Are cursor escape code supported on stderr.
    escape_cursor_cap: bool,
    /// Are color escape code supported on stderr.
    escape_color_cap: bool,
    /// Set when the last human-readable line is a pending one, that has not been
    /// terminated by a newline and will be overwritten by the next line.
    pending_line: bool,
}

#[derive(Debug)]
enum OutputMode {
    Human {
        log_level: LogLevel,
    },
    TabSeparated {  },
}

impl Output {

    pub fn human(log_level: LogLevel) -> Self {
        Self::new(OutputMode::Human { log_level })
    }

    pub fn tab_separated() -> Self {
        Self::new(OutputMode::TabSeparated {  })
    }

    fn new(mode: OutputMode) -> Self {

        let term_dumb = !io::stderr().is_terminal() || (cfg!(unix) && env::var_os("TERM").map(|term| term == "dumb").unwrap_or_default());
        let no_color = env::var_os("NO_COLOR").map(|s| !s.is_empty()).unwrap_or_default();

        Self {
            mode,
            escape_cursor_cap: !term_dumb,
            escape_color_cap: !term_dumb && !no_color,
            pending_line: false,
        }

    }

    /// Return true if this output is meant to be read by humans.
    #[inline]
    pub fn is_human(&self) -> bool {
        matches!(self.mode, OutputMode::Human { .. })
    }

    /// Log an information with a simple code referencing it, the returned handle is
    /// used to add arguments for machine-readable output and messages for
    /// human-readable output. The machine-readable line is written when the handle
    /// is dropped.
    pub fn log<D: Display>(&mut self, code: D) -> Log<'_> {

        let mut line = String::new();
        if let OutputMode::TabSeparated {  } = self.mode {
            write!(line, "{code}").unwrap();
        }

        Log {
            output: self,
            line,
            displayed: true,
        }

    }

    /// Terminate the current pending line, if any, so that it's not overwritten.
    fn terminate_pending(&mut self, writer: &mut impl Write) {
        if self.pending_line {
            let _ = writer.write_all(b"\n");
            self.pending_line = false;
        }
    }

}

/// A handle to a log line, allows adding more context to the log.
#[derive(Debug)]
pub struct Log<'a> {
    /// Exclusive access to output.
    output: &'a mut Output,
    /// Machine-readable line buffer, printed when the log is dropped.
    line: String,
    /// For human-readable only, false if the last line has been discarded because of
    /// its level, in which case additional lines are discarded too.
    displayed: bool,
}

impl Log<'_> {

    /// Append an argument for machine-readable output.
    pub fn arg<D: Display>(&mut self, arg: D) -> &mut Self {
        if let OutputMode::TabSeparated {  } = self.output.mode {
            self.line.push('\t');
            write!(EscapeWriter(&mut self.line), "{arg}").unwrap();
        }
        self
    }

    /// Append many arguments for machine-readable output.
    pub fn args<D, I>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = D>,
        D: Display,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// For human-readable output, terminate the current pending line so that the next
    /// message doesn't overwrite it.
    pub fn newline(&mut self) -> &mut Self {
        if let OutputMode::Human { .. } = self.output.mode {
            let mut writer = io::stderr().lock();
            self.output.terminate_pending(&mut writer);
            let _ = writer.flush();
        }
        self
    }

    /// Associate a human-readable message to this log with an associated level, level
    /// is only relevant here because machine-readable outputs are always verbose.
    ///
    /// A pending line is not terminated and will be overwritten by the next line,
    /// unless the additional level is used, in which case it's printed below.
    pub fn line<D: Display>(&mut self, level: LogLevel, message: D) -> &mut Self {

        let OutputMode::Human { log_level } = self.output.mode else {
            return self;
        };

        if level == LogLevel::Additional {
            if self.displayed {
                let mut writer = io::stderr().lock();
                self.output.terminate_pending(&mut writer);
                let _ = writeln!(writer, "         {message}");
                let _ = writer.flush();
            }
            return self;
        }

        self.displayed = level >= log_level;
        if !self.displayed {
            return self;
        }

        let (name, color) = match level {
            LogLevel::Info => ("INFO", "\x1b[34m"),
            LogLevel::Pending => ("..", ""),
            LogLevel::Success => ("OK", "\x1b[92m"),
            LogLevel::Warning => ("WARN", "\x1b[33m"),
            LogLevel::Error => ("FAILED", "\x1b[31m"),
            LogLevel::Additional => unreachable!(),
        };

        let mut writer = io::stderr().lock();

        if self.output.pending_line {
            if self.output.escape_cursor_cap {
                let _ = writer.write_all(b"\r\x1b[K");
            } else {
                // Without cursor control we can't rewrite the line.
                let _ = writer.write_all(b"\n");
            }
        }

        if !self.output.escape_color_cap || color.is_empty() {
            let _ = write!(writer, "[{name:^6}] {message}");
        } else {
            let _ = write!(writer, "[{color}{name:^6}\x1b[0m] {message}");
        }

        self.output.pending_line = level == LogLevel::Pending;
        if !self.output.pending_line {
            let _ = writer.write_all(b"\n");
        }

        let _ = writer.flush();
        self

    }

    #[inline]
    pub fn info<D: Display>(&mut self, message: D) -> &mut Self {
        self.line(LogLevel::Info, message)
    }

    #[inline]
    pub fn pending<D: Display>(&mut self, message: D) -> &mut Self {
        self.line(LogLevel::Pending, message)
    }

    #[inline]
    pub fn success<D: Display>(&mut self, message: D) -> &mut Self {
        self.line(LogLevel::Success, message)
    }

    #[inline]
    pub fn warning<D: Display>(&mut self, message: D) -> &mut Self {
        self.line(LogLevel::Warning, message)
    }

    #[inline]
    pub fn error<D: Display>(&mut self, message: D) -> &mut Self {
        self.line(LogLevel::Error, message)
    }

    #[inline]
    pub fn additional<D: Display>(&mut self, message: D) -> &mut Self {
        self.line(LogLevel::Additional, message)
    }

}

/// Flush the machine-readable line.
impl Drop for Log<'_> {
    fn drop(&mut self) {
        if let OutputMode::TabSeparated {  } = self.output.mode {
            let mut writer = io::stderr().lock();
            let _ = writer.write_all(self.line.as_bytes());
            let _ = writer.write_all(b"\n");
            let _ = writer.flush();
        }
    }
}

/// Level for a human-readable log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// This log is something indicative, discarded when not in verbose mode.
    Info,
    /// This log indicate something is in progress and the definitive state is unknown.
    Pending,
    /// This log indicate a success.
    Success,
    /// This log is a warning.
    Warning,
    /// This log is an error.
    Error,
    /// Additional details below the previous line, only displayed if it was.
    Additional,
}

/// Escape line returns and tabs of machine-readable arguments.
struct EscapeWriter<'a>(&'a mut String);

impl fmt::Write for EscapeWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            match ch {
                '\n' => self.0.push_str("\\n"),
                '\t' => self.0.push_str("\\t"),
                _ => self.0.push(ch),
            }
        }
        Ok(())
    }
}
