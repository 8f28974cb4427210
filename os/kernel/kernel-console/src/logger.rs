use core::fmt::{self, Write};
use kernel_sync::SyncOnceCell;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Byte sink behind the console.
pub trait ConsoleSink: Sync {
    fn write_bytes(&self, bytes: &[u8]);
}

/// Logger writing `[LEVEL] target: message` lines to a [`ConsoleSink`].
pub struct ConsoleLogger {
    sink: &'static dyn ConsoleSink,
    max_level: LevelFilter,
}

/// The installed logger; `log::set_logger` needs a `&'static`.
static LOGGER: SyncOnceCell<ConsoleLogger> = SyncOnceCell::new();

impl ConsoleLogger {
    #[must_use]
    pub const fn new(sink: &'static dyn ConsoleSink, max_level: LevelFilter) -> Self {
        Self { sink, max_level }
    }

    /// Install as the global logger. Call this once during early init.
    ///
    /// # Errors
    /// Fails if a logger has already been installed.
    pub fn init(self) -> Result<(), SetLoggerError> {
        let max_level = self.max_level;
        let logger = match LOGGER.set(self) {
            Ok(logger) => logger,
            // Let `log` produce the error for the second registration.
            Err(_) => return log::set_logger(&NOP),
        };
        log::set_logger(logger)?;
        log::set_max_level(max_level);
        Ok(())
    }
}

struct SinkWriter(&'static dyn ConsoleSink);

impl Write for SinkWriter {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_bytes(s.as_bytes());
        Ok(())
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = writeln!(
            SinkWriter(self.sink),
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

struct Nop;

impl Log for Nop {
    fn enabled(&self, _: &Metadata) -> bool {
        false
    }

    fn log(&self, _: &Record) {}

    fn flush(&self) {}
}

static NOP: Nop = Nop;

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_sync::SpinLock;
    use log::Level;

    struct Capture(SpinLock<Vec<u8>>);

    impl ConsoleSink for Capture {
        fn write_bytes(&self, bytes: &[u8]) {
            self.0.lock().extend_from_slice(bytes);
        }
    }

    static CAPTURE: Capture = Capture(SpinLock::new(Vec::new()));

    fn captured() -> String {
        String::from_utf8(CAPTURE.0.lock().clone()).unwrap()
    }

    #[test]
    fn formats_level_target_and_message() {
        let logger = ConsoleLogger::new(&CAPTURE, LevelFilter::Debug);
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .target("vm")
                .args(format_args!("fault: {:#010x}", 0x40_0000))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Trace)
                .target("vm")
                .args(format_args!("filtered"))
                .build(),
        );
        let out = captured();
        assert!(out.contains("[DEBUG] vm: fault: 0x00400000\n"));
        assert!(!out.contains("filtered"));
    }

    #[test]
    fn second_init_fails() {
        static SILENT: Capture = Capture(SpinLock::new(Vec::new()));
        let first = ConsoleLogger::new(&SILENT, LevelFilter::Off).init();
        let second = ConsoleLogger::new(&SILENT, LevelFilter::Off).init();
        assert!(first.is_ok());
        assert!(second.is_err());
    }
}
