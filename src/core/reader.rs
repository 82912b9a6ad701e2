//! Per-reader commands
//!
//! [`ReaderCommands`] turns typed operations into command packets addressed
//! to one reader and sends each through [`NetworkController::ask`]. Getters
//! return `Ok(None)` when the reader does not answer in time. Arguments
//! outside their allowed values are rejected before anything is sent.

use crate::core::network::{NetworkController, NetworkError};
use crate::core::protocol::{
    AlarmFilter, BaudRate, Code, Command, GainMode, Packet, PacketCodec, PayloadView, PingStatus,
    SiteCode, TagReport, VersionInfo, WireValue,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Bus address of a reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReaderAddress {
    /// Network id
    pub network_id: u8,
    /// Persistent reader id
    pub reader_id: u8,
    /// Node id on the bus
    pub node_id: u8,
}

impl ReaderAddress {
    /// Create an address
    pub fn new(network_id: u8, reader_id: u8, node_id: u8) -> Self {
        Self {
            network_id,
            reader_id,
            node_id,
        }
    }
}

impl fmt::Display for ReaderAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "net {} / reader {} / node {}",
            self.network_id, self.reader_id, self.node_id
        )
    }
}

/// Command helper bound to one reader
#[derive(Debug, Clone)]
pub struct ReaderCommands {
    network: Arc<NetworkController>,
    address: ReaderAddress,
    timeout: Duration,
}

impl ReaderCommands {
    /// Create a helper using the network's default ask timeout
    pub fn new(network: Arc<NetworkController>, address: ReaderAddress) -> Self {
        let timeout = network.config().timeouts.ask();
        Self {
            network,
            address,
            timeout,
        }
    }

    /// Use a different reply timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Address the commands are sent to
    pub fn address(&self) -> ReaderAddress {
        self.address
    }

    /// Build a command packet for this reader
    pub fn packet(&self, command: Command, payload: &[u8]) -> Result<Packet, NetworkError> {
        Ok(PacketCodec::command(
            command,
            self.address.network_id,
            self.address.reader_id,
            self.address.node_id,
            payload,
        )?)
    }

    async fn ask(&self, command: Command, payload: &[u8]) -> Result<Option<Packet>, NetworkError> {
        let packet = self.packet(command, payload)?;
        self.network.ask(&packet, self.timeout).await
    }

    async fn ask_view(
        &self,
        command: Command,
        payload: &[u8],
    ) -> Result<Option<PayloadView>, NetworkError> {
        Ok(self
            .ask(command, payload)
            .await?
            .and_then(|reply| reply.decode().data))
    }

    /// Check the reader is alive
    pub async fn ping(&self) -> Result<Option<PingStatus>, NetworkError> {
        let reply = self.ask(Command::Ping, &[]).await?;
        Ok(reply.as_ref().map(PingStatus::from_reply))
    }

    /// Assign a network id
    pub async fn set_network_id(&self, id: u8) -> Result<Option<Packet>, NetworkError> {
        self.ask(Command::SetNetworkId, &[id]).await
    }

    /// Assign a permanent reader id.
    ///
    /// Nothing is sent when the reader already has `id`. On success later
    /// commands are addressed with the new id.
    pub async fn set_reader_id(&mut self, id: u8) -> Result<Option<Packet>, NetworkError> {
        if id == self.address.reader_id {
            tracing::debug!(reader = %self.address, "Reader id unchanged, not sending");
            return Ok(None);
        }
        let reply = self.ask(Command::SetReaderId, &[id]).await?;
        self.address.reader_id = id;
        Ok(reply)
    }

    /// Fetch one buffered tag transmission (manual polling mode)
    pub async fn get_tag_packet(&self) -> Result<Option<TagReport>, NetworkError> {
        Ok(match self.ask_view(Command::GetTagPacket, &[]).await? {
            Some(PayloadView::Tag(tag)) => Some(*tag),
            _ => None,
        })
    }

    /// Set the RSSI rejection threshold, 0 disables filtering
    pub async fn set_rssi_threshold(&self, rssi: u8) -> Result<Option<Packet>, NetworkError> {
        self.ask(Command::SetRssiThreshold, &[rssi]).await
    }

    /// Query the RSSI rejection threshold
    pub async fn get_rssi_threshold(&self) -> Result<Option<u8>, NetworkError> {
        Ok(match self.ask_view(Command::GetRssiThreshold, &[]).await? {
            Some(PayloadView::Rssi(value)) => Some(value),
            _ => None,
        })
    }

    /// Set the acceptance site code, all zero disables filtering
    pub async fn set_site_code(&self, site: [u8; 3]) -> Result<Option<Packet>, NetworkError> {
        self.ask(Command::SetSiteCode, &site).await
    }

    /// Query the acceptance site code
    pub async fn get_site_code(&self) -> Result<Option<SiteCode>, NetworkError> {
        Ok(match self.ask_view(Command::GetSiteCode, &[]).await? {
            Some(PayloadView::SiteCode(site)) => Some(site),
            _ => None,
        })
    }

    /// Select short or long range reception
    pub async fn set_receiver_gain(&self, gain: GainMode) -> Result<Option<Packet>, NetworkError> {
        self.ask(Command::SetReceiverGain, &[gain.raw()]).await
    }

    /// Like [`set_receiver_gain`](Self::set_receiver_gain) from a raw value
    pub async fn set_receiver_gain_raw(&self, raw: u8) -> Result<Option<Packet>, NetworkError> {
        let gain = GainMode::try_from(raw)?;
        self.set_receiver_gain(gain).await
    }

    /// Query the receiver gain
    pub async fn get_receiver_gain(&self) -> Result<Option<Code<GainMode>>, NetworkError> {
        Ok(match self.ask_view(Command::GetReceiverGain, &[]).await? {
            Some(PayloadView::Gain(gain)) => Some(gain),
            _ => None,
        })
    }

    /// Set the alarm tag filter
    pub async fn set_alarm_filter(
        &self,
        filter: AlarmFilter,
    ) -> Result<Option<Packet>, NetworkError> {
        self.ask(Command::SetAlarmFilter, &[filter.raw()]).await
    }

    /// Like [`set_alarm_filter`](Self::set_alarm_filter) from a raw value
    pub async fn set_alarm_filter_raw(&self, raw: u8) -> Result<Option<Packet>, NetworkError> {
        let filter = AlarmFilter::try_from(raw)?;
        self.set_alarm_filter(filter).await
    }

    /// Query the alarm tag filter
    pub async fn get_alarm_filter(&self) -> Result<Option<Code<AlarmFilter>>, NetworkError> {
        Ok(match self.ask_view(Command::GetAlarmFilter, &[]).await? {
            Some(PayloadView::AlarmFilter(filter)) => Some(filter),
            _ => None,
        })
    }

    /// Invalid tag messages received since the last query
    pub async fn get_invalid_tag_count(&self) -> Result<Option<u16>, NetworkError> {
        Ok(match self.ask_view(Command::GetInvalidTagCount, &[]).await? {
            Some(PayloadView::InvalidTagCount(count)) => Some(count),
            _ => None,
        })
    }

    /// Supply voltage in volts
    pub async fn get_supply_voltage(&self) -> Result<Option<f32>, NetworkError> {
        Ok(match self.ask_view(Command::GetSupplyVoltage, &[]).await? {
            Some(PayloadView::SupplyVoltage(volts)) => Some(volts),
            _ => None,
        })
    }

    /// Start the 40 second RF white noise evaluation.
    ///
    /// Any command sent during the evaluation aborts it and resets the reader.
    pub async fn start_white_noise(&self) -> Result<Option<Packet>, NetworkError> {
        self.ask(Command::StartWhiteNoise, &[]).await
    }

    /// White noise level from the last evaluation, as an RSSI value
    pub async fn get_white_noise(&self) -> Result<Option<u8>, NetworkError> {
        Ok(match self.ask_view(Command::GetWhiteNoise, &[]).await? {
            Some(PayloadView::WhiteNoise(level)) => Some(level),
            _ => None,
        })
    }

    /// Change this reader's baud rate.
    ///
    /// Prefer [`NetworkController::set_baud_rate`]; readers on different
    /// rates disturb the bus.
    pub async fn set_baud_rate(&self, bps: u32) -> Result<Option<Packet>, NetworkError> {
        let baud = BaudRate::from_bps(bps)?;
        self.ask(Command::SetBaudRate, &[baud.raw()]).await
    }

    /// Hardware and firmware versions
    pub async fn get_version_info(&self) -> Result<Option<VersionInfo>, NetworkError> {
        Ok(match self.ask_view(Command::GetVersionInfo, &[]).await? {
            Some(PayloadView::Version(version)) => Some(version),
            _ => None,
        })
    }
}
