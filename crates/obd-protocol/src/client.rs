//! OBD-II Client for ELM327 Adapters
//!
//! Owns the outbound half of the adapter link. Reading happens in a
//! background task that only forwards lines onto the inbound channel.

use crate::error::ObdError;
use crate::simulator::SimulatedAdapter;
use crate::transport::{inbound_channel, InboundEvent, InboundReceiver, LineSplitter, Transport};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, error, info, warn};

/// Read buffer size for the serial reader task
const READ_CHUNK: usize = 256;

/// Byte-stream link served by a reader and a writer task.
/// The tasks own the two halves of the stream.
struct StreamLink {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl StreamLink {
    /// Stop both tasks, releasing the stream
    fn close(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

enum Link {
    Stream(StreamLink),
    Simulated(SimulatedAdapter),
}

/// OBD-II client for communicating with ELM327-compatible adapters
pub struct ObdClient {
    /// Serial port device path (e.g., "/dev/rfcomm0") or "simulated"
    device: String,
    link: Link,
    /// Whether the client is connected
    connected: bool,
}

impl ObdClient {
    /// Open a serial adapter and start its reader and writer tasks.
    ///
    /// Must be called inside a tokio runtime.
    pub fn connect_serial(
        device: &str,
        baud_rate: u32,
    ) -> Result<(Self, InboundReceiver), ObdError> {
        info!("Opening OBD adapter {} at {} baud", device, baud_rate);

        let port = tokio_serial::new(device, baud_rate)
            .open_native_async()
            .map_err(|e| ObdError::SerialError(e.to_string()))?;
        Ok(Self::connect_stream(port, device))
    }

    /// Serve an already open byte stream (serial port, TCP socket of a
    /// Wi-Fi adapter, ...). Must be called inside a tokio runtime.
    pub fn connect_stream<S>(stream: S, device: &str) -> (Self, InboundReceiver)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);

        let (inbound_tx, inbound_rx) = inbound_channel();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let name = device.to_string();
        let reader = tokio::spawn(async move {
            let mut splitter = LineSplitter::new();
            let mut buf = [0u8; READ_CHUNK];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => {
                        warn!("Adapter {} closed the link", name);
                        break;
                    }
                    Ok(n) => {
                        if !splitter.forward(&buf[..n], &inbound_tx) {
                            debug!("Inbound receiver dropped, stopping reader");
                            return;
                        }
                    }
                    Err(e) => {
                        error!("Read from {} failed: {}", name, e);
                        break;
                    }
                }
            }
            let _ = inbound_tx.send(InboundEvent::Disconnected);
        });

        let writer = tokio::spawn(async move {
            while let Some(bytes) = outbound_rx.recv().await {
                if let Err(e) = writer.write_all(&bytes).await {
                    error!("Write to adapter failed: {}", e);
                    break;
                }
            }
            debug!("Adapter writer stopped");
        });

        (
            Self {
                device: device.to_string(),
                link: Link::Stream(StreamLink {
                    outbound: outbound_tx,
                    reader,
                    writer,
                }),
                connected: true,
            },
            inbound_rx,
        )
    }

    /// Create a client backed by an in-process simulated adapter.
    ///
    /// `responses` holds `(header, request, payload)` triples.
    pub fn simulated<I, H, R, P>(responses: I) -> (Self, InboundReceiver)
    where
        I: IntoIterator<Item = (H, R, P)>,
        H: AsRef<str>,
        R: AsRef<str>,
        P: AsRef<str>,
    {
        info!("Creating simulated OBD adapter");
        let (tx, rx) = inbound_channel();
        (
            Self {
                device: "simulated".to_string(),
                link: Link::Simulated(SimulatedAdapter::new(tx, responses)),
                connected: true,
            },
            rx,
        )
    }

    /// Check if client is connected
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// The simulated adapter, if this client is simulated
    pub fn simulator_mut(&mut self) -> Option<&mut SimulatedAdapter> {
        match &mut self.link {
            Link::Simulated(sim) => Some(sim),
            Link::Stream(_) => None,
        }
    }

    /// Disconnect from the OBD adapter
    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        info!("Disconnecting OBD client {}", self.device);
        self.connected = false;
        match &self.link {
            Link::Stream(link) => link.close(),
            Link::Simulated(sim) => sim.disconnect(),
        }
    }
}

impl Drop for ObdClient {
    fn drop(&mut self) {
        if let Link::Stream(link) = &self.link {
            link.close();
        }
    }
}

impl Transport for ObdClient {
    fn send(&mut self, bytes: &[u8]) -> Result<(), ObdError> {
        if !self.connected {
            return Err(ObdError::NotConnected);
        }
        match &mut self.link {
            Link::Stream(link) => {
                if link.outbound.send(bytes.to_vec()).is_err() {
                    self.connected = false;
                    return Err(ObdError::Disconnected);
                }
                Ok(())
            }
            Link::Simulated(sim) => {
                sim.handle(bytes);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_client_round_trip() {
        let (mut client, mut rx) = ObdClient::simulated([("7E4", "220105", "620105AA")]);
        assert!(client.is_connected());

        client.send(b"ATSH7E4\r").unwrap();
        client.send(b"220105\r").unwrap();

        let mut lines = Vec::new();
        while let Ok(InboundEvent::Line(line)) = rx.try_recv() {
            lines.push(String::from_utf8(line).unwrap());
        }
        assert_eq!(lines, ["OK", ">", "620105AA", ">"]);
    }

    #[tokio::test]
    async fn test_disconnect_rejects_send() {
        let (mut client, mut rx) = ObdClient::simulated(Vec::<(&str, &str, &str)>::new());
        client.disconnect();
        assert!(matches!(client.send(b"ATZ\r"), Err(ObdError::NotConnected)));
        assert_eq!(rx.recv().await, Some(InboundEvent::Disconnected));
    }

    #[tokio::test]
    async fn test_stream_link_forwards_lines() {
        let (local, mut adapter) = tokio::io::duplex(256);
        let (mut client, mut rx) = ObdClient::connect_stream(local, "duplex");

        client.send(b"ATZ\r").unwrap();
        let mut buf = [0u8; 16];
        let n = adapter.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ATZ\r");

        adapter.write_all(b"ELM327 v1.5\r\r>").await.unwrap();
        assert_eq!(rx.recv().await, Some(InboundEvent::Line(b"ELM327 v1.5".to_vec())));
    }

    #[tokio::test]
    async fn test_disconnect_releases_stream() {
        let (local, mut adapter) = tokio::io::duplex(256);
        let (mut client, mut rx) = ObdClient::connect_stream(local, "duplex");

        client.disconnect();
        assert!(!client.is_connected());
        assert!(matches!(client.send(b"ATZ\r"), Err(ObdError::NotConnected)));

        // Reader task gone: its inbound sender is dropped
        let closed = tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok());

        // Both stream halves dropped: the adapter side sees EOF
        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(std::time::Duration::from_secs(1), adapter.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_drop_releases_stream() {
        let (local, _adapter) = tokio::io::duplex(256);
        let (client, mut rx) = ObdClient::connect_stream(local, "duplex");
        drop(client);

        let closed = tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok());
    }

    #[tokio::test]
    async fn test_open_missing_serial_port_fails() {
        let result = ObdClient::connect_serial("/dev/does-not-exist-obd", 38400);
        assert!(matches!(result, Err(ObdError::SerialError(_))));
    }
}
