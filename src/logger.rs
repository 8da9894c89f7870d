// Copyright 2020 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

//! A very simple logger.
//!
//! Informational messages go to stdout, everything else to stderr, each
//! prefixed with a colorized level tag. Filtering is left to
//! `log::set_max_level()`.

use lazy_static::lazy_static;
use log::{Level, Log};
use std::{
    fmt,
    io::{self, Write},
    sync::RwLock,
};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// A simple logger.
pub struct Logger {
    inner: RwLock<InnerLogger>,
    info_cspec: ColorSpec,
    warn_cspec: ColorSpec,
    error_cspec: ColorSpec,
    plain_cspec: ColorSpec,
}

struct InnerLogger {
    stdout: StandardStream,
    stderr: StandardStream,
}

lazy_static! {
    static ref LOGGER: Logger = {
        let stdout = StandardStream::stdout(ColorChoice::Auto);
        let stderr = StandardStream::stderr(ColorChoice::Auto);
        let mut info_cspec = ColorSpec::new();
        let mut warn_cspec = ColorSpec::new();
        let mut error_cspec = ColorSpec::new();

        info_cspec.set_fg(Some(Color::Green)).set_bold(true);
        warn_cspec.set_fg(Some(Color::Yellow)).set_bold(true);
        error_cspec.set_fg(Some(Color::Red)).set_bold(true);

        Logger {
            inner: RwLock::new(InnerLogger { stdout, stderr }),
            info_cspec,
            warn_cspec,
            error_cspec,
            plain_cspec: ColorSpec::new(),
        }
    };
}

impl Logger {
    /// Set up this type as the global static logger.
    pub fn init() -> Result<(), log::SetLoggerError> {
        log::set_logger(&*LOGGER)
    }

    /// Print one entry of an error's cause chain, following a top-level
    /// `error!` message.
    pub fn print_cause(cause: &(dyn std::error::Error + 'static)) {
        if let Ok(mut inner) = LOGGER.inner.write() {
            emit(
                &mut inner.stderr,
                &LOGGER.error_cspec,
                "caused by:",
                format_args!("{}", cause),
            );
        }
    }

    fn style(&self, level: Level) -> (&ColorSpec, &'static str) {
        match level {
            Level::Trace => (&self.plain_cspec, "trace:"),
            Level::Debug => (&self.plain_cspec, "debug:"),
            Level::Info => (&self.info_cspec, "info:"),
            Level::Warn => (&self.warn_cspec, "warning:"),
            Level::Error => (&self.error_cspec, "error:"),
        }
    }
}

fn emit(stream: &mut StandardStream, cspec: &ColorSpec, tag: &str, args: fmt::Arguments) {
    let _r = stream.set_color(cspec);
    let _r = write!(stream, "{}", tag);
    let _r = stream.reset();
    let _r = writeln!(stream, " {}", args);
}

impl Log for Logger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        // Rely on `log::set_max_level()` for filtering
        true
    }

    fn log(&self, record: &log::Record) {
        let (cspec, tag) = self.style(record.level());

        if let Ok(mut inner) = self.inner.write() {
            let stream = if record.level() == Level::Info {
                &mut inner.stdout
            } else {
                &mut inner.stderr
            };

            emit(stream, cspec, tag, *record.args());
        }
    }

    fn flush(&self) {
        let _r = io::stdout().flush();
    }
}
