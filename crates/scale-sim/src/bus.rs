//! Virtual serial bus
//!
//! Maps port names to virtual scales and hands out links that implement
//! [`ScaleLink`].

use std::collections::HashMap;
use std::io;

use scale_detect::{DetectError, PortOpener, ScaleLink, SerialConfig};
use tracing::trace;

use crate::scale::VirtualScale;

/// A set of named ports with virtual scales attached
#[derive(Debug, Clone, Default)]
pub struct VirtualBus {
    ports: HashMap<String, VirtualScale>,
}

impl VirtualBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a scale to `port`
    pub fn with_scale(mut self, port: impl Into<String>, scale: VirtualScale) -> Self {
        self.ports.insert(port.into(), scale);
        self
    }

    /// Port names on this bus, sorted
    pub fn port_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.ports.keys().cloned().collect();
        names.sort();
        names
    }
}

impl PortOpener for VirtualBus {
    type Link = VirtualLink;

    fn open(&self, port: &str, config: &SerialConfig) -> Result<Self::Link, DetectError> {
        let unavailable = |reason: &str| DetectError::PortUnavailable {
            port: port.to_string(),
            reason: reason.to_string(),
        };

        let scale = self
            .ports
            .get(port)
            .ok_or_else(|| unavailable("No such file or directory"))?;

        {
            let mut state = scale.state();
            if state.unplugged {
                return Err(unavailable("device disconnected"));
            }
            if state.rejected.contains(config) {
                return Err(unavailable("configuration not supported by device"));
            }
            state.open_count += 1;
            state.open_handles += 1;
            state.rx.clear();
        }

        trace!("Virtual open {} at {}", port, config);
        Ok(VirtualLink {
            scale: scale.clone(),
            config: *config,
        })
    }
}

/// An open link to a virtual scale
#[derive(Debug)]
pub struct VirtualLink {
    scale: VirtualScale,
    config: SerialConfig,
}

impl VirtualLink {
    /// Configuration this link was opened with
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    fn check_connected(&self) -> io::Result<()> {
        if self.scale.state().unplugged {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device disconnected",
            ));
        }
        Ok(())
    }
}

impl ScaleLink for VirtualLink {
    fn bytes_available(&mut self) -> io::Result<usize> {
        self.check_connected()?;
        let mut state = self.scale.state();
        state.refill(&self.config);
        Ok(state.rx.len())
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        self.check_connected()?;
        Ok(std::mem::take(&mut self.scale.state().rx))
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.check_connected()?;
        self.scale.state().rx.clear();
        Ok(())
    }

    fn clear_output(&mut self) -> io::Result<()> {
        self.check_connected()
    }

    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.check_connected()?;
        self.scale.state().receive(data, &self.config);
        Ok(())
    }
}

impl Drop for VirtualLink {
    fn drop(&mut self) {
        let mut state = self.scale.state();
        state.open_handles = state.open_handles.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use scale_detect::{ConfigProbe, ProbeConfig, ReadStrategy, ReadTiming, StrategyConfig};
    use scale_protocol::{ReadMethod, WeightFormat};

    use super::*;

    fn fast_strategy() -> ReadStrategy {
        ReadStrategy::with_config(StrategyConfig {
            timing: ReadTiming {
                command_settle: Duration::ZERO,
                passive_timeout: Duration::ZERO,
                passive_interval: Duration::ZERO,
            },
            ..Default::default()
        })
    }

    fn fast_probe() -> ConfigProbe {
        ConfigProbe::with_config(ProbeConfig {
            settle: Duration::ZERO,
            ..Default::default()
        })
    }

    #[test]
    fn test_missing_port() {
        let bus = VirtualBus::new();
        let err = bus.open("COM9", &SerialConfig::new(9600)).unwrap_err();
        assert!(matches!(err, DetectError::PortUnavailable { .. }));
    }

    #[test]
    fn test_port_names_sorted() {
        let bus = VirtualBus::new()
            .with_scale("COM4", VirtualScale::silent())
            .with_scale("COM10", VirtualScale::silent())
            .with_scale("COM3", VirtualScale::silent());
        assert_eq!(bus.port_names(), vec!["COM10", "COM3", "COM4"]);
        assert!(VirtualBus::new().port_names().is_empty());
    }

    #[test]
    fn test_accepted_link_keeps_its_config() {
        let scale = VirtualScale::silent().reject(SerialConfig::new(9600));
        let bus = VirtualBus::new().with_scale("COM3", scale);

        let outcome = fast_probe().attempt(&bus, "COM3", &fast_strategy()).unwrap();
        assert_eq!(outcome.link.config(), &outcome.config);
        assert_eq!(outcome.link.config().to_string(), "9600-7-E-1");
    }

    #[test]
    fn test_handles_tracked() {
        let scale = VirtualScale::silent();
        let bus = VirtualBus::new().with_scale("COM3", scale.clone());

        let link = bus.open("COM3", &SerialConfig::new(9600)).unwrap();
        assert_eq!(scale.open_handles(), 1);
        drop(link);
        assert_eq!(scale.open_handles(), 0);
        assert_eq!(scale.open_count(), 1);
    }

    #[test]
    fn test_on_request_reply() {
        let scale = VirtualScale::on_request(b"W\r\n", "  +012.340 kg\r\n");
        let bus = VirtualBus::new().with_scale("COM3", scale.clone());
        let mut link = bus.open("COM3", &SerialConfig::new(9600)).unwrap();

        let result = fast_strategy().read(&mut link).unwrap();
        let reading = result.reading().unwrap();
        assert_eq!(reading.kilograms, 12.34);
        assert_eq!(reading.format, WeightFormat::SignedDecimal);
        assert_eq!(reading.method, ReadMethod::Command);
        assert_eq!(scale.sent(), vec![b"P\r\n".to_vec(), b"W\r\n".to_vec()]);
    }

    #[test]
    fn test_wrong_line_settings_are_garbled() {
        let native = SerialConfig::new(2400);
        let scale = VirtualScale::streaming("N001.50\r\n").with_native_config(native);
        let bus = VirtualBus::new().with_scale("COM3", scale);

        let mut wrong = bus.open("COM3", &SerialConfig::new(9600)).unwrap();
        assert!(!fast_strategy().read(&mut wrong).unwrap().has_weight());
        drop(wrong);

        let mut right = bus.open("COM3", &native).unwrap();
        assert_eq!(
            fast_strategy().read(&mut right).unwrap().kilograms_or_zero(),
            1.5
        );
    }

    #[test]
    fn test_probe_skips_rejected_configs() {
        let first = SerialConfig::new(9600);
        let scale = VirtualScale::streaming("T000.75\r\n").reject(first);
        let bus = VirtualBus::new().with_scale("COM3", scale.clone());

        let outcome = fast_probe().attempt(&bus, "COM3", &fast_strategy()).unwrap();
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.config.to_string(), "9600-7-E-1");
        assert_eq!(outcome.initial.kilograms_or_zero(), 0.75);
        assert_eq!(scale.open_handles(), 1);
    }

    #[test]
    fn test_probe_accepts_weightless_port() {
        let scale = VirtualScale::silent();
        let bus = VirtualBus::new().with_scale("COM3", scale);

        let outcome = fast_probe().attempt(&bus, "COM3", &fast_strategy()).unwrap();
        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.initial.has_weight());
    }

    #[test]
    fn test_probe_fails_when_nothing_opens() {
        let scale = VirtualScale::silent();
        scale.unplug();
        let bus = VirtualBus::new().with_scale("COM3", scale);

        let err = fast_probe()
            .attempt(&bus, "COM3", &fast_strategy())
            .err()
            .unwrap();
        match err {
            DetectError::NoValidConfiguration { attempts, .. } => assert_eq!(attempts, 5),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_once_closes_link() {
        let native = SerialConfig::new(4800);
        let scale = VirtualScale::streaming("ST,GS,  3.000kg\r\n").with_native_config(native);
        let bus = VirtualBus::new().with_scale("COM3", scale.clone());
        let probe = fast_probe();

        let read = probe
            .read_once(&bus, "COM3", probe.candidates(), &fast_strategy())
            .unwrap();
        assert_eq!(read.config, native);
        assert_eq!(read.result.kilograms_or_zero(), 3.0);
        assert_eq!(scale.open_handles(), 0);
        assert_eq!(scale.open_count(), 4);
    }
}
