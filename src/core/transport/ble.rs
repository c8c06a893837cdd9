//! BLE (Nordic UART Service) transport
//!
//! Connects to a peripheral by name or address, subscribes to the RX
//! characteristic and forwards every notification as one inbound chunk, in
//! arrival order. Writes go to the TX characteristic without response.

use super::{Transport, TransportError};
use async_trait::async_trait;
use btleplug::api::{Central, Manager as _, Characteristic, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use bytes::Bytes;
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// BLE service/characteristic UUIDs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BleServiceConfig {
    /// Service UUID
    pub service_uuid: String,
    /// TX characteristic UUID (written by us)
    pub tx_characteristic: String,
    /// RX characteristic UUID (notifies us)
    pub rx_characteristic: String,
}

impl Default for BleServiceConfig {
    fn default() -> Self {
        // Nordic UART Service (NUS), the de-facto BLE serial profile
        Self {
            service_uuid: "6e400001-b5a3-f393-e0a9-e50e24dcca9e".to_string(),
            tx_characteristic: "6e400002-b5a3-f393-e0a9-e50e24dcca9e".to_string(),
            rx_characteristic: "6e400003-b5a3-f393-e0a9-e50e24dcca9e".to_string(),
        }
    }
}

/// Bluetooth connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BluetoothConfig {
    /// Device name or address
    pub device: String,
    /// Service/characteristic UUIDs
    pub ble_service: BleServiceConfig,
    /// Scan duration while locating the device, in seconds
    pub scan_secs: u64,
    /// Connection timeout in seconds
    pub timeout_secs: u64,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            ble_service: BleServiceConfig::default(),
            scan_secs: 3,
            timeout_secs: 10,
        }
    }
}

/// BLE transport over the Nordic UART Service
pub struct BleTransport {
    config: BluetoothConfig,
    peripheral: Option<Peripheral>,
    tx_char: Option<Characteristic>,
    inbound: Option<mpsc::UnboundedReceiver<Bytes>>,
    notification_task: Option<tokio::task::JoinHandle<()>>,
}

impl BleTransport {
    /// Create a transport for the given configuration
    pub fn new(config: BluetoothConfig) -> Self {
        Self {
            config,
            peripheral: None,
            tx_char: None,
            inbound: None,
            notification_task: None,
        }
    }

    async fn find_peripheral(&self, adapter: &Adapter) -> Result<Peripheral, TransportError> {
        let peripherals = adapter
            .peripherals()
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("failed to get peripherals: {e}")))?;

        for peripheral in peripherals {
            if let Ok(Some(props)) = peripheral.properties().await {
                let name = props.local_name.unwrap_or_default();
                let address = peripheral.id().to_string();
                if name == self.config.device || address == self.config.device {
                    return Ok(peripheral);
                }
            }
        }

        Err(TransportError::ConnectionFailed(format!(
            "device '{}' not found",
            self.config.device
        )))
    }

    async fn discover_characteristics(
        &self,
        peripheral: &Peripheral,
    ) -> Result<(Characteristic, Characteristic), TransportError> {
        peripheral
            .discover_services()
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("service discovery failed: {e}")))?;

        let tx_uuid = parse_uuid(&self.config.ble_service.tx_characteristic)?;
        let rx_uuid = parse_uuid(&self.config.ble_service.rx_characteristic)?;

        let mut tx_char = None;
        let mut rx_char = None;
        for characteristic in peripheral.characteristics() {
            if characteristic.uuid == tx_uuid {
                tx_char = Some(characteristic.clone());
            }
            if characteristic.uuid == rx_uuid {
                rx_char = Some(characteristic.clone());
            }
        }

        match (tx_char, rx_char) {
            (Some(tx), Some(rx)) => Ok((tx, rx)),
            (None, _) => Err(TransportError::ConnectionFailed(
                "TX characteristic not found".to_string(),
            )),
            (_, None) => Err(TransportError::ConnectionFailed(
                "RX characteristic not found".to_string(),
            )),
        }
    }

    async fn start_notifications(
        &mut self,
        peripheral: Peripheral,
        rx_char: Characteristic,
    ) -> Result<(), TransportError> {
        peripheral
            .subscribe(&rx_char)
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("subscribe failed: {e}")))?;

        let mut stream = peripheral
            .notifications()
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("notifications unavailable: {e}")))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            while let Some(data) = stream.next().await {
                if tx.send(Bytes::from(data.value)).is_err() {
                    break;
                }
            }
            // stream end closes the channel, which the session reads as
            // connection loss
            tracing::debug!("BLE notification stream ended");
        });

        self.inbound = Some(rx);
        self.notification_task = Some(task);
        Ok(())
    }
}

fn parse_uuid(text: &str) -> Result<Uuid, TransportError> {
    Uuid::parse_str(text)
        .map_err(|e| TransportError::ConnectionFailed(format!("invalid UUID '{text}': {e}")))
}

#[async_trait]
impl Transport for BleTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let manager = Manager::new()
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("failed to create manager: {e}")))?;

        let adapters = manager
            .adapters()
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("failed to get adapters: {e}")))?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::ConnectionFailed("no Bluetooth adapter found".to_string()))?;

        // brief scan so the peripheral shows up in the adapter cache
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("failed to start scan: {e}")))?;
        tokio::time::sleep(Duration::from_secs(self.config.scan_secs)).await;

        let result = self.find_peripheral(&adapter).await;
        if let Err(e) = adapter.stop_scan().await {
            tracing::warn!("failed to stop scan: {e}");
        }
        let peripheral = result?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        tokio::time::timeout(timeout, peripheral.connect())
            .await
            .map_err(|_| TransportError::Timeout(self.config.timeout_secs))?
            .map_err(|e| TransportError::ConnectionFailed(format!("failed to connect: {e}")))?;

        let (tx_char, rx_char) = self.discover_characteristics(&peripheral).await?;
        self.start_notifications(peripheral.clone(), rx_char).await?;

        self.peripheral = Some(peripheral);
        self.tx_char = Some(tx_char);
        tracing::info!(device = %self.config.device, "BLE connected");
        Ok(())
    }

    fn take_inbound(&mut self) -> Option<mpsc::UnboundedReceiver<Bytes>> {
        self.inbound.take()
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let peripheral = self.peripheral.as_ref().ok_or(TransportError::NotConnected)?;
        let tx_char = self.tx_char.as_ref().ok_or(TransportError::NotConnected)?;

        peripheral
            .write(tx_char, data, WriteType::WithoutResponse)
            .await
            .map_err(|e| TransportError::WriteFailed(e.to_string()))
    }

    async fn close(&mut self) {
        if let Some(task) = self.notification_task.take() {
            task.abort();
        }
        if let Some(peripheral) = self.peripheral.take() {
            if let Err(e) = peripheral.disconnect().await {
                tracing::debug!("BLE disconnect: {e}");
            }
        }
        self.tx_char = None;
        self.inbound = None;
    }

    fn connection_info(&self) -> String {
        match &self.peripheral {
            Some(peripheral) => format!("BLE: {} ({})", self.config.device, peripheral.id()),
            None => format!("BLE: {} (disconnected)", self.config.device),
        }
    }
}
