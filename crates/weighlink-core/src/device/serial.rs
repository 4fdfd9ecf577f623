//! Serial port handling
//!
//! Port discovery and opening with the indicator's line settings.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{DeviceError, NO_PORTS_FOUND, READ_TIMEOUT_MS};
use crate::settings::{ConnectionParams, DataBits, Parity, StopBits};

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// USB manufacturer string
    pub manufacturer: Option<String>,

    /// USB product string
    pub product: Option<String>,

    /// USB serial number
    pub serial_number: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial_number: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb_info) => Self {
                name: info.port_name,
                vid: Some(usb_info.vid),
                pid: Some(usb_info.pid),
                manufacturer: usb_info.manufacturer,
                product: usb_info.product,
                serial_number: usb_info.serial_number,
            },
            _ => Self::bare(info.port_name),
        }
    }
}

/// Position of a port family in the selection list; USB-RS232 adapters first,
/// onboard UARTs last
fn port_rank(port: &PortInfo, family: &str) -> u8 {
    let usb_adapter = family == "ttyUSB"
        || family.contains("usbserial")
        || (port.vid.is_some() && family != "ttyACM");
    if usb_adapter {
        0
    } else if family.eq_ignore_ascii_case("COM") {
        1
    } else if family == "ttyACM" {
        2
    } else if family == "ttyS" {
        3
    } else {
        4
    }
}

/// Rank, then name without its unit number, then the unit number itself, so
/// COM10 sorts after COM9
fn port_sort_key(port: &PortInfo) -> (u8, String, u32) {
    let basename = port.name.rsplit('/').next().unwrap_or(&port.name);
    let family = basename.trim_end_matches(|c: char| c.is_ascii_digit());
    let unit = basename[family.len()..].parse().unwrap_or(0);
    (port_rank(port, family), family.to_string(), unit)
}

/// Order ports for display and drop duplicate names
fn sort_ports(ports: &mut Vec<PortInfo>) {
    ports.sort_by_cached_key(port_sort_key);
    ports.dedup_by(|a, b| a.name == b.name);
}

/// List available serial ports, most likely indicator connection first
pub fn list_ports() -> Vec<PortInfo> {
    let mut ports: Vec<PortInfo> = match serialport::available_ports() {
        Ok(found) => found.into_iter().map(PortInfo::from).collect(),
        Err(e) => {
            warn!("Serial port enumeration failed: {}", e);
            Vec::new()
        }
    };
    sort_ports(&mut ports);
    debug!("Found {} serial port(s)", ports.len());
    ports
}

/// Port names for a selection list, or the single placeholder entry when empty
pub fn port_names() -> Vec<String> {
    let names: Vec<String> = list_ports().into_iter().map(|p| p.name).collect();
    if names.is_empty() {
        vec![NO_PORTS_FOUND.to_string()]
    } else {
        names
    }
}

/// Port to preselect: the saved one if it is still present, else the first
/// discovered port, else the placeholder
pub fn preferred_port(saved: &str, available: &[String]) -> String {
    if available.iter().any(|name| name == saved) {
        return saved.to_string();
    }
    available
        .first()
        .cloned()
        .unwrap_or_else(|| NO_PORTS_FOUND.to_string())
}

pub(crate) fn to_serialport_data_bits(bits: DataBits) -> serialport::DataBits {
    match bits {
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    }
}

pub(crate) fn to_serialport_parity(parity: Parity) -> Result<serialport::Parity, DeviceError> {
    match parity {
        Parity::None => Ok(serialport::Parity::None),
        Parity::Even => Ok(serialport::Parity::Even),
        Parity::Odd => Ok(serialport::Parity::Odd),
        Parity::Mark | Parity::Space => {
            Err(DeviceError::Unsupported(format!("{} parity", parity)))
        }
    }
}

pub(crate) fn to_serialport_stop_bits(
    bits: StopBits,
) -> Result<serialport::StopBits, DeviceError> {
    match bits {
        StopBits::One => Ok(serialport::StopBits::One),
        StopBits::Two => Ok(serialport::StopBits::Two),
        StopBits::OnePointFive => Err(DeviceError::Unsupported("1.5 stop bits".to_string())),
    }
}

/// Open a serial port with the given connection parameters.
///
/// Pending input and output are discarded right after opening so the first
/// read starts on fresh data.
pub fn open_port(params: &ConnectionParams) -> Result<Box<dyn SerialPort>, DeviceError> {
    if params.port.trim().is_empty() || params.port == NO_PORTS_FOUND {
        return Err(DeviceError::NoPortSelected);
    }

    let parity = to_serialport_parity(params.parity)?;
    let stop_bits = to_serialport_stop_bits(params.stop_bits)?;
    let flow_control = if params.flow_control {
        serialport::FlowControl::Hardware
    } else {
        serialport::FlowControl::None
    };

    let port = serialport::new(&params.port, params.baud_rate)
        .data_bits(to_serialport_data_bits(params.data_bits))
        .parity(parity)
        .stop_bits(stop_bits)
        .flow_control(flow_control)
        .timeout(Duration::from_millis(READ_TIMEOUT_MS))
        .open()
        .map_err(|e| DeviceError::ConnectionFailed {
            port: params.port.clone(),
            reason: e.to_string(),
        })?;

    port.clear(serialport::ClearBuffer::All)
        .map_err(|e| DeviceError::ConnectionFailed {
            port: params.port.clone(),
            reason: e.to_string(),
        })?;

    info!(
        "Opened {} at {} baud ({}-{}-{})",
        params.port,
        params.baud_rate,
        u8::from(params.data_bits),
        params.parity,
        f64::from(params.stop_bits)
    );

    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ports() {
        // Only checks enumeration does not panic on this host
        let ports = list_ports();
        for port in &ports {
            println!("Found port: {} - {:?}", port.name, port.product);
        }
        assert!(!port_names().is_empty());
    }

    fn sorted(ports: Vec<PortInfo>) -> Vec<String> {
        let mut ports = ports;
        sort_ports(&mut ports);
        ports.into_iter().map(|p| p.name).collect()
    }

    fn bare(names: &[&str]) -> Vec<PortInfo> {
        names.iter().map(|n| PortInfo::bare(n.to_string())).collect()
    }

    #[test]
    fn test_usb_adapters_sort_before_onboard_uarts() {
        let ports = bare(&[
            "/dev/ttyS1",
            "/dev/ttyACM0",
            "/dev/ttyUSB10",
            "/dev/ttyS0",
            "/dev/ttyUSB2",
            "/dev/ttyUSB2",
        ]);
        assert_eq!(
            sorted(ports),
            vec![
                "/dev/ttyUSB2",
                "/dev/ttyUSB10",
                "/dev/ttyACM0",
                "/dev/ttyS0",
                "/dev/ttyS1",
            ]
        );
    }

    #[test]
    fn test_com_ports_sort_numerically_with_usb_adapter_first() {
        let mut ports = bare(&["COM10", "COM3", "COM1"]);
        let mut adapter = PortInfo::bare("COM7".to_string());
        adapter.vid = Some(0x067b);
        adapter.pid = Some(0x2303);
        ports.push(adapter);

        assert_eq!(sorted(ports), vec!["COM7", "COM1", "COM3", "COM10"]);
    }

    #[test]
    fn test_macos_usbserial_before_bluetooth() {
        let ports = bare(&["/dev/cu.Bluetooth-Incoming-Port", "/dev/cu.usbserial-1410"]);
        assert_eq!(
            sorted(ports),
            vec!["/dev/cu.usbserial-1410", "/dev/cu.Bluetooth-Incoming-Port"]
        );
    }

    #[test]
    fn test_preferred_port() {
        let available = vec!["COM3".to_string(), "COM4".to_string()];
        assert_eq!(preferred_port("COM4", &available), "COM4");
        assert_eq!(preferred_port("COM9", &available), "COM3");
        assert_eq!(preferred_port("COM9", &[]), NO_PORTS_FOUND);
    }

    #[test]
    fn test_open_rejects_placeholder_port() {
        let params = ConnectionParams::default();
        assert!(matches!(open_port(&params), Err(DeviceError::NoPortSelected)));

        let params = ConnectionParams {
            port: "  ".to_string(),
            ..ConnectionParams::default()
        };
        assert!(matches!(open_port(&params), Err(DeviceError::NoPortSelected)));
    }

    #[test]
    fn test_open_rejects_settings_the_os_layer_lacks() {
        let params = ConnectionParams {
            port: "/dev/ttyUSB0".to_string(),
            parity: Parity::Mark,
            ..ConnectionParams::default()
        };
        match open_port(&params) {
            Err(DeviceError::Unsupported(what)) => assert!(what.contains("Mark")),
            other => panic!("expected unsupported parity, got {:?}", other.err()),
        }

        let params = ConnectionParams {
            port: "/dev/ttyUSB0".to_string(),
            stop_bits: StopBits::OnePointFive,
            ..ConnectionParams::default()
        };
        assert!(matches!(open_port(&params), Err(DeviceError::Unsupported(_))));
    }
}
