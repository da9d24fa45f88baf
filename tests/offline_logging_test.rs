//! Offline logging tests
//!
//! Installs a process-wide logger, so it lives in its own test binary.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use log::{Level, LevelFilter, Log, Metadata, Record};
use openwebif::{ClientOptions, DeviceClient};

struct WarnCounter {
    warnings: AtomicUsize,
}

impl Log for WarnCounter {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with("openwebif")
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) && record.level() == Level::Warn {
            self.warnings.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn flush(&self) {}
}

static LOGGER: WarnCounter = WarnCounter {
    warnings: AtomicUsize::new(0),
};

#[tokio::test]
async fn test_offline_is_warned_once() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Debug);

    // Nothing listens on port 1
    let options = ClientOptions::new("127.0.0.1")
        .with_port(1)
        .with_mac_address("00:1d:ec:01:02:03")
        .with_timeout(Duration::from_secs(2));
    let mut client = DeviceClient::new(options).unwrap();

    client.refresh_state().await.unwrap();
    client.refresh_state().await.unwrap();
    assert!(!client.channel_up().await.unwrap());

    assert!(client.is_offline());
    assert_eq!(LOGGER.warnings.load(Ordering::SeqCst), 1);
}
