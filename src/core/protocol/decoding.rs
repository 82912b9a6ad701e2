//! Semantic interpretation of packet payloads
//!
//! A [`DecodedView`] is a pure function of the packet bytes. Opcodes without
//! an interpretation yield [`PayloadView::NotImplemented`] and values outside a
//! table are kept as [`Code::Unknown`], so one odd field never fails a decode.

use super::command::{
    command_name, ping_error_label, AlarmFilter, BaudRate, Code, Command, GainMode, TagType,
    TransmissionInterval,
};
use super::packet::{Packet, PacketKind};
use serde::Serialize;

/// Shortest tag report payload: 29 data bytes and the 2-byte footer
pub const TAG_REPORT_MIN_LEN: usize = 31;

/// Readable form of a whole packet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedView {
    /// Command, response or unknown header
    pub kind: PacketKind,
    /// Network id
    pub network_id: u8,
    /// Reader id
    pub reader_id: u8,
    /// Node id
    pub node_id: u8,
    /// Raw opcode
    pub command: u8,
    /// Command name, `"Unknown"` for opcodes outside the table
    pub command_name: &'static str,
    /// Payload interpretation, `None` when the packet carries no data
    pub data: Option<PayloadView>,
}

/// Interpretation of a payload, keyed by opcode
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PayloadView {
    /// Ping reply status
    Ping(PingStatus),
    /// Network or reader id being assigned
    Id(u8),
    /// Tag transmission report
    Tag(Box<TagReport>),
    /// RSSI threshold
    Rssi(u8),
    /// Acceptance site code
    SiteCode(SiteCode),
    /// Receiver gain mode
    Gain(Code<GainMode>),
    /// Alarm tag filter
    AlarmFilter(Code<AlarmFilter>),
    /// Invalid tag messages since the last query
    InvalidTagCount(u16),
    /// Supply voltage in volts
    SupplyVoltage(f32),
    /// RF white noise level, as an RSSI value
    WhiteNoise(u8),
    /// Baud rate index
    BaudRate(Code<BaudRate>),
    /// Hardware and firmware versions
    Version(VersionInfo),
    /// Payload shorter than the opcode requires
    Truncated {
        /// Bytes the interpretation needs
        expected: usize,
        /// Bytes actually present
        actual: usize,
    },
    /// Opcode without a payload interpretation
    NotImplemented,
}

/// Error code returned by a pinged reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PingStatus {
    /// Raw error code, 0 means no error
    pub code: u8,
}

impl PingStatus {
    /// Status carried by a ping reply, an empty payload counts as no error
    pub fn from_reply(reply: &Packet) -> Self {
        Self {
            code: reply.payload().first().copied().unwrap_or(0),
        }
    }

    /// True when the reader reported no error
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// Fault description for the code
    pub fn label(&self) -> &'static str {
        ping_error_label(self.code)
    }
}

/// Three-byte acceptance site code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SiteCode(pub [u8; 3]);

impl SiteCode {
    /// Site code as a 24-bit integer
    pub fn value(&self) -> u32 {
        u32::from_be_bytes([0, self.0[0], self.0[1], self.0[2]])
    }

    /// True when site code filtering is disabled
    pub fn is_disabled(&self) -> bool {
        self.value() == 0
    }
}

/// Reader version information, each value already divided by ten
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VersionInfo {
    /// Controller firmware version
    pub controller_firmware: f32,
    /// RF module firmware version
    pub rf_firmware: f32,
    /// Controller hardware version
    pub controller_hardware: f32,
    /// RF module hardware version
    pub rf_hardware: f32,
}

impl VersionInfo {
    fn parse(data: &[u8; 4]) -> Self {
        Self {
            controller_firmware: tenths(data[0]),
            rf_firmware: tenths(data[1]),
            controller_hardware: tenths(data[2]),
            rf_hardware: tenths(data[3]),
        }
    }
}

/// A single tag transmission as relayed by a reader
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagReport {
    /// Fixed leading bytes (`! * *`)
    pub header: [u8; 3],
    /// Transmission interval
    pub interval: Code<TransmissionInterval>,
    /// Reed switch state (bit 7 of byte 4)
    pub reed: bool,
    /// Rolling counter (bits 0-6 of byte 4)
    pub counter: u8,
    /// Tag firmware version
    pub firmware_version: f32,
    /// Alarm counter
    pub alarm_counter: u8,
    /// Tag age
    pub age: u32,
    /// 24-bit site code
    pub site_code: u32,
    /// 32-bit tag id
    pub tag_id: u32,
    /// Tag hardware type
    pub tag_type: Code<TagType>,
    /// Address of the reader that received the tag
    pub reader_address: u8,
    /// Received signal strength of the tag
    pub rssi: u8,
    /// Tag CRC byte
    pub crc: u8,
    /// Alarm byte
    pub alarm_byte: u8,
    /// Node id of the receiving reader
    pub node_id: u8,
    /// Network id of the receiving reader
    pub network_id: u8,
    /// Reader RSSI
    pub reader_rssi: u8,
    /// Fixed trailing bytes (LF CR)
    pub footer: [u8; 2],
}

impl TagReport {
    /// Parse a tag report payload, `None` if it is too short
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < TAG_REPORT_MIN_LEN {
            return None;
        }
        let n = data.len();
        Some(Self {
            header: [data[0], data[1], data[2]],
            interval: Code::from_raw(data[3]),
            reed: data[4] & 0x80 != 0,
            counter: data[4] & 0x7F,
            firmware_version: tenths(data[5]),
            alarm_counter: data[8],
            age: u32::from_be_bytes([data[9], data[10], data[11], data[12]]),
            site_code: u32::from_be_bytes([0, data[13], data[14], data[15]]),
            tag_id: u32::from_be_bytes([data[16], data[17], data[18], data[19]]),
            tag_type: Code::from_raw(data[20]),
            reader_address: data[21],
            rssi: data[22],
            crc: data[23],
            alarm_byte: data[25],
            node_id: data[26],
            network_id: data[27],
            reader_rssi: data[28],
            footer: [data[n - 2], data[n - 1]],
        })
    }
}

fn tenths(raw: u8) -> f32 {
    f32::from(raw) / 10.0
}

/// Interpret a packet by its opcode
pub fn decode_semantics(packet: &Packet) -> DecodedView {
    let data = packet.payload();
    DecodedView {
        kind: packet.kind(),
        network_id: packet.network_id(),
        reader_id: packet.reader_id(),
        node_id: packet.node_id(),
        command: packet.command_code(),
        command_name: command_name(packet.command_code()),
        data: if data.is_empty() {
            None
        } else {
            Some(decode_payload(packet.command(), data))
        },
    }
}

fn decode_payload(command: Option<Command>, data: &[u8]) -> PayloadView {
    let Some(command) = command else {
        return PayloadView::NotImplemented;
    };
    let needed = match command {
        Command::GetTagPacket => TAG_REPORT_MIN_LEN,
        Command::SetSiteCode | Command::GetSiteCode => 3,
        Command::GetInvalidTagCount => 2,
        Command::GetVersionInfo => 4,
        _ => 1,
    };
    if data.len() < needed {
        return PayloadView::Truncated {
            expected: needed,
            actual: data.len(),
        };
    }

    match command {
        Command::Ping => PayloadView::Ping(PingStatus { code: data[0] }),
        Command::SetNetworkId | Command::SetReaderId => PayloadView::Id(data[0]),
        Command::GetTagPacket => match TagReport::parse(data) {
            Some(report) => PayloadView::Tag(Box::new(report)),
            None => PayloadView::Truncated {
                expected: TAG_REPORT_MIN_LEN,
                actual: data.len(),
            },
        },
        Command::GetRssiThreshold | Command::SetRssiThreshold => PayloadView::Rssi(data[0]),
        Command::SetSiteCode | Command::GetSiteCode => {
            PayloadView::SiteCode(SiteCode([data[0], data[1], data[2]]))
        }
        Command::SetReceiverGain | Command::GetReceiverGain => {
            PayloadView::Gain(Code::from_raw(data[0]))
        }
        Command::SetAlarmFilter | Command::GetAlarmFilter => {
            PayloadView::AlarmFilter(Code::from_raw(data[0]))
        }
        Command::GetInvalidTagCount => {
            PayloadView::InvalidTagCount(u16::from_be_bytes([data[0], data[1]]))
        }
        Command::GetSupplyVoltage => PayloadView::SupplyVoltage(tenths(data[0])),
        Command::GetWhiteNoise => PayloadView::WhiteNoise(data[0]),
        Command::SetBaudRate => PayloadView::BaudRate(Code::from_raw(data[0])),
        Command::GetVersionInfo => {
            PayloadView::Version(VersionInfo::parse(&[data[0], data[1], data[2], data[3]]))
        }
        Command::ResetNetwork
        | Command::EnableAutoPolling
        | Command::DisableAutoPolling
        | Command::StartWhiteNoise => PayloadView::NotImplemented,
    }
}
