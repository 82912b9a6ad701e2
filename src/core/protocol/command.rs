//! Command opcodes and the value tables carried inside payloads

use super::ProtocolError;
use serde::Serialize;
use std::fmt;

/// Header byte of a frame sent from the host to a reader
pub const HEADER_COMMAND: u8 = 0xAA;

/// Header byte of a frame sent from a reader to the host
pub const HEADER_RESPONSE: u8 = 0x55;

/// Node id addressing every reader on the bus
pub const BROADCAST_NODE: u8 = 0xFF;

/// Reader command opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum Command {
    /// Reset Network (0x00)
    ResetNetwork = 0x00,
    /// Enable Auto Polling (0x01)
    EnableAutoPolling = 0x01,
    /// Disable Auto Polling (0x02)
    DisableAutoPolling = 0x02,
    /// Ping Reader (0x03)
    Ping = 0x03,
    /// Set Network ID (0x04)
    SetNetworkId = 0x04,
    /// Set Reader ID (0x05)
    SetReaderId = 0x05,
    /// Get Tag Packet (0x06)
    GetTagPacket = 0x06,
    /// Get RSSI threshold (0x07)
    GetRssiThreshold = 0x07,
    /// Set RSSI threshold (0x08)
    SetRssiThreshold = 0x08,
    /// Set Site Code (0x09)
    SetSiteCode = 0x09,
    /// Get Site Code (0x0A)
    GetSiteCode = 0x0A,
    /// Set Receiver Gain (0x0B)
    SetReceiverGain = 0x0B,
    /// Get Receiver Gain (0x0C)
    GetReceiverGain = 0x0C,
    /// Set Alarm Filter (0x0D)
    SetAlarmFilter = 0x0D,
    /// Get Alarm Filter (0x0E)
    GetAlarmFilter = 0x0E,
    /// Get Number of Invalid Tags (0x0F)
    GetInvalidTagCount = 0x0F,
    /// Get Supply Voltage (0x10)
    GetSupplyVoltage = 0x10,
    /// Start RF white noise calculation (0x11)
    StartWhiteNoise = 0x11,
    /// Get RF white noise result (0x12)
    GetWhiteNoise = 0x12,
    /// Set Baud Rate (0xFE)
    SetBaudRate = 0xFE,
    /// Get Version Information (0xFF)
    GetVersionInfo = 0xFF,
}

impl Command {
    /// Get command from its opcode
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Command::ResetNetwork),
            0x01 => Some(Command::EnableAutoPolling),
            0x02 => Some(Command::DisableAutoPolling),
            0x03 => Some(Command::Ping),
            0x04 => Some(Command::SetNetworkId),
            0x05 => Some(Command::SetReaderId),
            0x06 => Some(Command::GetTagPacket),
            0x07 => Some(Command::GetRssiThreshold),
            0x08 => Some(Command::SetRssiThreshold),
            0x09 => Some(Command::SetSiteCode),
            0x0A => Some(Command::GetSiteCode),
            0x0B => Some(Command::SetReceiverGain),
            0x0C => Some(Command::GetReceiverGain),
            0x0D => Some(Command::SetAlarmFilter),
            0x0E => Some(Command::GetAlarmFilter),
            0x0F => Some(Command::GetInvalidTagCount),
            0x10 => Some(Command::GetSupplyVoltage),
            0x11 => Some(Command::StartWhiteNoise),
            0x12 => Some(Command::GetWhiteNoise),
            0xFE => Some(Command::SetBaudRate),
            0xFF => Some(Command::GetVersionInfo),
            _ => None,
        }
    }

    /// Opcode byte
    pub fn opcode(self) -> u8 {
        self as u8
    }

    /// Get name of command
    pub fn name(&self) -> &'static str {
        match self {
            Command::ResetNetwork => "Reset Network",
            Command::EnableAutoPolling => "Enable Auto Polling",
            Command::DisableAutoPolling => "Disable Auto Polling",
            Command::Ping => "Ping Reader",
            Command::SetNetworkId => "Set Network ID",
            Command::SetReaderId => "Set Reader ID",
            Command::GetTagPacket => "Get Tag Packet",
            Command::GetRssiThreshold => "Get RSSI Value",
            Command::SetRssiThreshold => "Set RSSI Value",
            Command::SetSiteCode => "Set Site Code",
            Command::GetSiteCode => "Get Site Code",
            Command::SetReceiverGain => "Set Receiver Gain",
            Command::GetReceiverGain => "Get Receiver Gain",
            Command::SetAlarmFilter => "Set Alarm Filter",
            Command::GetAlarmFilter => "Get Alarm Filter",
            Command::GetInvalidTagCount => "Get Number of Invalid Tags",
            Command::GetSupplyVoltage => "Get Supply Voltage",
            Command::StartWhiteNoise => "Start RF white noise calculation",
            Command::GetWhiteNoise => "Get RF white noise result",
            Command::SetBaudRate => "Set Baud Rate",
            Command::GetVersionInfo => "Get Version Information",
        }
    }
}

/// Name for a raw opcode, `"Unknown"` when it is not in the command table
pub fn command_name(code: u8) -> &'static str {
    Command::from_u8(code).map_or("Unknown", |c| c.name())
}

/// Fault strings reported in byte 0 of a ping reply, indexed by error code
pub const PING_ERRORS: [&str; 10] = [
    "No errors encountered",
    "Unknown reader command received",
    "Tag Table underflow error",
    "Command Packet checksum error",
    "RF Module - Unknown command response",
    "RF Module - Unknown general response",
    "RF Module - Re-sync failure",
    "RF Module - Command response failure",
    "RF Module - Receive response failure",
    "No response packet received from polled reader",
];

/// Label for a ping error code
pub fn ping_error_label(code: u8) -> &'static str {
    PING_ERRORS.get(code as usize).copied().unwrap_or("Unknown")
}

/// A one-byte enumeration carried on the wire
pub trait WireValue: Copy + Sized {
    /// Parse a raw byte, `None` for values outside the table
    fn from_raw(raw: u8) -> Option<Self>;
    /// Raw byte
    fn raw(self) -> u8;
    /// Human readable label
    fn label(self) -> &'static str;
}

/// A decoded table value, keeping the raw byte when it is not recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Code<T> {
    /// Value found in the table
    Known(T),
    /// Value outside the table
    Unknown(u8),
}

impl<T: WireValue> Code<T> {
    /// Interpret a raw byte
    pub fn from_raw(raw: u8) -> Self {
        T::from_raw(raw).map_or(Code::Unknown(raw), Code::Known)
    }

    /// Raw byte as seen on the wire
    pub fn raw(&self) -> u8 {
        match *self {
            Code::Known(value) => value.raw(),
            Code::Unknown(raw) => raw,
        }
    }

    /// Recognized value, if any
    pub fn known(&self) -> Option<T> {
        match *self {
            Code::Known(value) => Some(value),
            Code::Unknown(_) => None,
        }
    }
}

impl<T: WireValue> fmt::Display for Code<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Code::Known(value) => write!(f, "{}", value.label()),
            Code::Unknown(raw) => write!(f, "invalid (0x{:02X})", raw),
        }
    }
}

/// Receiver gain mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GainMode {
    /// Short range reader
    Low,
    /// Long range reader
    High,
}

impl WireValue for GainMode {
    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(GainMode::Low),
            1 => Some(GainMode::High),
            _ => None,
        }
    }

    fn raw(self) -> u8 {
        match self {
            GainMode::Low => 0,
            GainMode::High => 1,
        }
    }

    fn label(self) -> &'static str {
        match self {
            GainMode::Low => "Low Gain Mode - Short range reader",
            GainMode::High => "High Gain Mode - Long range reader",
        }
    }
}

impl TryFrom<u8> for GainMode {
    type Error = ProtocolError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::from_raw(raw)
            .ok_or_else(|| ProtocolError::InvalidArgument(format!("gain must be 0 or 1, got {raw}")))
    }
}

/// Alarm tag filter setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlarmFilter {
    /// Report all tags
    All,
    /// Report only tags with an alarm condition
    WithAlarm,
    /// Report only tags without any alarm condition
    WithoutAlarm,
}

impl WireValue for AlarmFilter {
    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(AlarmFilter::All),
            1 => Some(AlarmFilter::WithAlarm),
            2 => Some(AlarmFilter::WithoutAlarm),
            _ => None,
        }
    }

    fn raw(self) -> u8 {
        match self {
            AlarmFilter::All => 0,
            AlarmFilter::WithAlarm => 1,
            AlarmFilter::WithoutAlarm => 2,
        }
    }

    fn label(self) -> &'static str {
        match self {
            AlarmFilter::All => "Report all tags",
            AlarmFilter::WithAlarm => "Report only tags with an Alarm condition",
            AlarmFilter::WithoutAlarm => "Report only tags without any Alarm condition",
        }
    }
}

impl TryFrom<u8> for AlarmFilter {
    type Error = ProtocolError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::from_raw(raw).ok_or_else(|| {
            ProtocolError::InvalidArgument(format!("alarm filter must be 0, 1 or 2, got {raw}"))
        })
    }
}

/// Bus baud rates, in the order of their wire index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BaudRate {
    /// 115200 bps (index 0)
    B115200,
    /// 57600 bps (index 1)
    B57600,
    /// 38800 bps (index 2)
    B38800,
    /// 19200 bps (index 3)
    B19200,
    /// 9600 bps (index 4)
    B9600,
}

impl BaudRate {
    /// Get all baud rates in wire order
    pub fn all() -> &'static [BaudRate] {
        &[
            BaudRate::B115200,
            BaudRate::B57600,
            BaudRate::B38800,
            BaudRate::B19200,
            BaudRate::B9600,
        ]
    }

    /// Bits per second
    pub fn bps(self) -> u32 {
        match self {
            BaudRate::B115200 => 115_200,
            BaudRate::B57600 => 57_600,
            BaudRate::B38800 => 38_800,
            BaudRate::B19200 => 19_200,
            BaudRate::B9600 => 9_600,
        }
    }

    /// Look up a baud rate by bits per second
    pub fn from_bps(bps: u32) -> Result<Self, ProtocolError> {
        Self::all()
            .iter()
            .copied()
            .find(|b| b.bps() == bps)
            .ok_or_else(|| {
                let valid: Vec<u32> = Self::all().iter().map(|b| b.bps()).collect();
                ProtocolError::InvalidArgument(format!("baud rate must be in {valid:?}, got {bps}"))
            })
    }
}

impl WireValue for BaudRate {
    fn from_raw(raw: u8) -> Option<Self> {
        Self::all().get(raw as usize).copied()
    }

    fn raw(self) -> u8 {
        match self {
            BaudRate::B115200 => 0,
            BaudRate::B57600 => 1,
            BaudRate::B38800 => 2,
            BaudRate::B19200 => 3,
            BaudRate::B9600 => 4,
        }
    }

    fn label(self) -> &'static str {
        match self {
            BaudRate::B115200 => "115200",
            BaudRate::B57600 => "57600",
            BaudRate::B38800 => "38800",
            BaudRate::B19200 => "19200",
            BaudRate::B9600 => "9600",
        }
    }
}

/// Tag transmission interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransmissionInterval {
    /// 15 seconds (0x20)
    Sec15,
    /// 30 seconds (0x30)
    Sec30,
    /// 1.5 seconds (0x31)
    Sec1_5,
    /// 0.8 seconds (0x32)
    Sec0_8,
    /// 0.4 seconds (0x33)
    Sec0_4,
}

impl WireValue for TransmissionInterval {
    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x20 => Some(TransmissionInterval::Sec15),
            0x30 => Some(TransmissionInterval::Sec30),
            0x31 => Some(TransmissionInterval::Sec1_5),
            0x32 => Some(TransmissionInterval::Sec0_8),
            0x33 => Some(TransmissionInterval::Sec0_4),
            _ => None,
        }
    }

    fn raw(self) -> u8 {
        match self {
            TransmissionInterval::Sec15 => 0x20,
            TransmissionInterval::Sec30 => 0x30,
            TransmissionInterval::Sec1_5 => 0x31,
            TransmissionInterval::Sec0_8 => 0x32,
            TransmissionInterval::Sec0_4 => 0x33,
        }
    }

    fn label(self) -> &'static str {
        match self {
            TransmissionInterval::Sec15 => "15 sec",
            TransmissionInterval::Sec30 => "30 sec",
            TransmissionInterval::Sec1_5 => "1.5 sec",
            TransmissionInterval::Sec0_8 => "0.8 sec",
            TransmissionInterval::Sec0_4 => "0.4 sec",
        }
    }
}

/// Tag hardware type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TagType {
    /// Fused, non-programmable (0x30)
    FusedNonProgrammable,
    /// Not fused, programmable (0x33)
    NotFusedProgrammable,
}

impl WireValue for TagType {
    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x30 => Some(TagType::FusedNonProgrammable),
            0x33 => Some(TagType::NotFusedProgrammable),
            _ => None,
        }
    }

    fn raw(self) -> u8 {
        match self {
            TagType::FusedNonProgrammable => 0x30,
            TagType::NotFusedProgrammable => 0x33,
        }
    }

    fn label(self) -> &'static str {
        match self {
            TagType::FusedNonProgrammable => "Fused, non-programmable",
            TagType::NotFusedProgrammable => "Not fused, programmable",
        }
    }
}
