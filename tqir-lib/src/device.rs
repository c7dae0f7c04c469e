//! The device session: transport ownership, the background receive loop and
//! the high-level operations (open, close, mode changes, IR send/receive).

use crate::constants::{MAX_CMD_ID, MAX_PACKET_INDEX};
use crate::error::TqError;
use crate::fragment::{self, Reassembler};
use crate::frame::{CmdType, DeviceMode, Frame, VersionInfo};
use crate::nec;
use crate::reply::ReplySlot;
use bytes::Bytes;
use nusb::transfer::{RequestBuffer, TransferError};
use nusb::Interface;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

// USB device identification
pub const VID: u16 = 0x10C4;
pub const VID_ALT: u16 = 0x045E;
pub const PID: u16 = 0x8468;
pub const ENDPOINT_OUT: u8 = 0x01;
pub const ENDPOINT_IN: u8 = 0x81;

/// Timeout for ordinary command acknowledgments.
const CMD_REPLY_TIMEOUT: Duration = Duration::from_millis(500);

/// Timeout for the IR-output acknowledgment, which only arrives once the
/// device finishes emitting the signal.
const IR_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for a single outbound bulk transfer.
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Carrier frequencies (Hz) the transceiver can synthesize, indexed by the
/// frequency id byte of an IR-output frame.
pub const IR_FREQ_TABLE: [u32; 30] = [
    38000, 37900, 37917, 36000, 40000, 39700, 35750, 36400, 36700, 37000, 37700, 38380, 38400,
    38462, 38740, 39200, 42000, 43600, 44000, 33000, 33500, 34000, 34500, 35000, 40500, 41000,
    41500, 42500, 43000, 45000,
];

/// State shared between caller tasks and the receive loop. One mutex guards
/// everything; it is never held across an await point.
#[derive(Debug, Default)]
struct Shared {
    mode: DeviceMode,
    reply: ReplySlot,
}

/// An open session with a Tiqiaa Tview transceiver.
///
/// Owns the claimed USB interface and the background receive loop. Writes
/// happen on the caller's task, reads exclusively on the loop task.
pub struct TqIr {
    interface: Interface,
    shared: Arc<Mutex<Shared>>,
    running: Arc<AtomicBool>,
    read_task: Option<JoinHandle<()>>,
    ir_rx: Option<mpsc::UnboundedReceiver<Bytes>>,
    packet_index: u8,
    cmd_id: u8,
}

impl TqIr {
    /// Find the transceiver, claim it and bring it into send mode.
    ///
    /// Resets the device, claims interface 0, starts the receive loop, then
    /// performs a version query and a switch-to-send-mode exchange. Any
    /// failure tears the session down again; no half-open session is ever
    /// returned.
    pub async fn open() -> Result<Self, TqError> {
        info!("Searching for Tiqiaa Tview IR transceiver...");
        let device_info = nusb::list_devices()?
            .find(|d| (d.vendor_id() == VID || d.vendor_id() == VID_ALT) && d.product_id() == PID)
            .ok_or(TqError::DeviceNotFound)?;

        info!(
            "Found device on bus {} addr {}",
            device_info.bus_number(),
            device_info.device_address()
        );

        let device = device_info.open()?;
        info!("Performing USB device reset...");
        device.reset()?;
        tokio::time::sleep(Duration::from_millis(50)).await;

        device.set_configuration(1)?;
        let interface = device.detach_and_claim_interface(0)?;
        info!("Interface claimed successfully.");

        let shared = Arc::new(Mutex::new(Shared::default()));
        let running = Arc::new(AtomicBool::new(true));
        let (ir_tx, ir_rx) = mpsc::unbounded_channel();
        let read_task = tokio::spawn(read_loop(
            interface.clone(),
            Arc::clone(&shared),
            Arc::clone(&running),
            ir_tx,
        ));

        let mut session = TqIr {
            interface,
            shared,
            running,
            read_task: Some(read_task),
            ir_rx: Some(ir_rx),
            packet_index: 0,
            cmd_id: 0,
        };

        if let Err(e) = session.handshake().await {
            warn!("Device handshake failed: {e}");
            session.stop_read_loop().await;
            return Err(e);
        }
        Ok(session)
    }

    async fn handshake(&mut self) -> Result<(), TqError> {
        let id = self.next_cmd_id();
        self.send_cmd_and_wait(CmdType::Version, id, CMD_REPLY_TIMEOUT)
            .await?;
        let id = self.next_cmd_id();
        self.send_cmd_and_wait(CmdType::SendMode, id, CMD_REPLY_TIMEOUT)
            .await
    }

    /// Shut the session down.
    ///
    /// Asks the device to go idle first (best effort, while the receive loop
    /// can still process the acknowledgment), then stops and joins the loop.
    /// The transport is released when the session is dropped.
    pub async fn close(mut self) {
        if let Err(e) = self.set_idle().await {
            warn!("Idle request during close failed: {e}");
        }
        self.stop_read_loop().await;
    }

    async fn stop_read_loop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.read_task.take() {
            task.abort();
            let _ = task.await;
        }
    }

    /// Last mode reported by the device itself.
    pub fn mode(&self) -> DeviceMode {
        self.shared_state().mode
    }

    /// Take the receiving end of the IR data channel.
    ///
    /// Every fully reassembled Data frame payload is delivered here by the
    /// receive loop. Returns `None` after the first call.
    pub fn take_ir_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<Bytes>> {
        self.ir_rx.take()
    }

    /// Switch the device to idle mode, succeeding immediately when it
    /// already is idle.
    pub async fn set_idle(&mut self) -> Result<(), TqError> {
        if self.mode() == DeviceMode::Idle {
            return Ok(());
        }
        let id = self.next_cmd_id();
        self.send_cmd_and_wait(CmdType::IdleMode, id, CMD_REPLY_TIMEOUT)
            .await?;
        if self.mode() == DeviceMode::Idle {
            Ok(())
        } else {
            Err(TqError::Protocol(
                "device did not report idle mode".to_string(),
            ))
        }
    }

    /// Transmit a raw device-format IR signal and wait for the device to
    /// acknowledge the completed emission.
    ///
    /// `freq` is either a carrier frequency in Hz present in
    /// [`IR_FREQ_TABLE`] or a direct table index (values up to 255).
    /// Switches the device into send mode first when necessary.
    pub async fn send_ir(&mut self, freq: u32, pulses: &[u8]) -> Result<(), TqError> {
        if self.mode() != DeviceMode::Send {
            let id = self.next_cmd_id();
            self.send_cmd_and_wait(CmdType::SendMode, id, CMD_REPLY_TIMEOUT)
                .await?;
            if self.mode() != DeviceMode::Send {
                return Err(TqError::Protocol(
                    "device did not report send mode".to_string(),
                ));
            }
        }
        let freq_id = frequency_id(freq)?;
        let id = self.next_cmd_id();
        let frame = Frame::ir_output(id, freq_id, pulses);
        let rx = self.begin_reply_wait(CmdType::Output, id)?;
        if let Err(e) = self.send_frame(&frame).await {
            self.cancel_reply_wait();
            return Err(e);
        }
        self.wait_reply(rx, IR_REPLY_TIMEOUT).await
    }

    /// Encode and transmit one NEC code at the standard 38 kHz carrier.
    pub async fn send_nec(&mut self, code: u16) -> Result<(), TqError> {
        let ticks = nec::encode_to_device_ticks(code);
        self.send_ir(38_000, &ticks).await
    }

    /// Arm the device to capture one IR signal.
    ///
    /// Switches into receive mode (clearing any stale capture with a Cancel
    /// exchange) when necessary, then issues the Output command that starts
    /// the capture. The captured signal arrives as a Data payload on the IR
    /// channel; call this again for every further signal. Capture stops when
    /// the session is set idle or asked to send.
    pub async fn start_receive(&mut self) -> Result<(), TqError> {
        if self.mode() != DeviceMode::Receive {
            let id = self.next_cmd_id();
            self.send_cmd_and_wait(CmdType::RecvMode, id, CMD_REPLY_TIMEOUT)
                .await?;
            if self.mode() != DeviceMode::Receive {
                return Err(TqError::Protocol(
                    "device did not report receive mode".to_string(),
                ));
            }
            let id = self.next_cmd_id();
            self.send_cmd_and_wait(CmdType::Cancel, id, CMD_REPLY_TIMEOUT)
                .await?;
        }
        let id = self.next_cmd_id();
        self.send_cmd(CmdType::Output, id).await
    }

    /// Send a command frame without waiting for its reply.
    pub async fn send_cmd(&mut self, cmd_type: CmdType, cmd_id: u8) -> Result<(), TqError> {
        self.send_frame(&Frame::command(cmd_type, cmd_id)).await
    }

    /// Send a command frame and block until the matching reply arrives or
    /// the timeout elapses.
    pub async fn send_cmd_and_wait(
        &mut self,
        cmd_type: CmdType,
        cmd_id: u8,
        reply_timeout: Duration,
    ) -> Result<(), TqError> {
        let rx = self.begin_reply_wait(cmd_type, cmd_id)?;
        if let Err(e) = self.send_cmd(cmd_type, cmd_id).await {
            self.cancel_reply_wait();
            return Err(e);
        }
        self.wait_reply(rx, reply_timeout).await
    }

    fn begin_reply_wait(
        &self,
        cmd_type: CmdType,
        cmd_id: u8,
    ) -> Result<oneshot::Receiver<()>, TqError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(TqError::Closed);
        }
        self.shared_state().reply.begin(cmd_type, cmd_id)
    }

    fn cancel_reply_wait(&self) {
        self.shared_state().reply.cancel();
    }

    async fn wait_reply(
        &self,
        rx: oneshot::Receiver<()>,
        reply_timeout: Duration,
    ) -> Result<(), TqError> {
        match timeout(reply_timeout, rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => {
                self.cancel_reply_wait();
                Err(TqError::Closed)
            }
            Err(elapsed) => {
                self.cancel_reply_wait();
                Err(elapsed.into())
            }
        }
    }

    /// Serialize a frame, fragment it and write every fragment as one bulk
    /// transfer. A failed write aborts immediately; no partial retry.
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), TqError> {
        let encoded = frame.encode();
        let packet_index = self.next_packet_index();
        let fragments = fragment::fragment(&encoded, packet_index)?;
        for frag in fragments {
            let completion = timeout(WRITE_TIMEOUT, self.interface.bulk_out(ENDPOINT_OUT, frag)).await?;
            let sent = completion.into_result()?;
            trace!("Sent fragment of {} bytes", sent.actual_length());
        }
        Ok(())
    }

    fn next_cmd_id(&mut self) -> u8 {
        if self.cmd_id < MAX_CMD_ID {
            self.cmd_id += 1;
        } else {
            self.cmd_id = 1;
        }
        self.cmd_id
    }

    fn next_packet_index(&mut self) -> u8 {
        if self.packet_index < MAX_PACKET_INDEX {
            self.packet_index += 1;
        } else {
            self.packet_index = 1;
        }
        self.packet_index
    }

    fn shared_state(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for TqIr {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
    }
}

/// Look up the IR-output frequency id byte.
///
/// Values above 255 are treated as a frequency in Hz and must match a table
/// entry; values up to 255 are direct table indices.
fn frequency_id(freq: u32) -> Result<u8, TqError> {
    if freq > 255 {
        IR_FREQ_TABLE
            .iter()
            .position(|&f| f == freq)
            .map(|i| i as u8)
            .ok_or(TqError::InvalidFrequency(freq))
    } else if (freq as usize) < IR_FREQ_TABLE.len() {
        Ok(freq as u8)
    } else {
        Err(TqError::InvalidFrequency(freq))
    }
}

/// The background receive loop: blocking bulk reads, fragment reassembly and
/// frame dispatch, for the lifetime of the session.
async fn read_loop(
    interface: Interface,
    shared: Arc<Mutex<Shared>>,
    running: Arc<AtomicBool>,
    ir_tx: mpsc::UnboundedSender<Bytes>,
) {
    let mut reassembler = Reassembler::new();
    while running.load(Ordering::SeqCst) {
        let completion = interface.bulk_in(ENDPOINT_IN, RequestBuffer::new(64)).await;
        let data = match completion.into_result() {
            Ok(data) => data,
            Err(TransferError::Cancelled) | Err(TransferError::Disconnected) => break,
            Err(e) => {
                debug!("Bulk read failed: {e}");
                continue;
            }
        };
        trace!("Received {} bytes", data.len());
        let Some(interior) = reassembler.push(&data) else {
            continue;
        };
        match Frame::try_from(interior) {
            Ok(frame) => dispatch(&shared, &ir_tx, frame),
            Err(e) => debug!("Discarding undecodable frame: {e}"),
        }
    }
    debug!("Receive loop stopped");
}

/// Resolve a pending reply wait and apply the frame's session-level effects.
///
/// The mode byte is adopted for every acknowledgment type regardless of
/// command id, so unsolicited notifications keep the tracked mode fresh.
fn dispatch(shared: &Mutex<Shared>, ir_tx: &mpsc::UnboundedSender<Bytes>, frame: Frame) {
    {
        let mut state = shared.lock().unwrap_or_else(|e| e.into_inner());
        state.reply.complete(frame.cmd_type, frame.cmd_id);
        match frame.cmd_type {
            CmdType::Version => {
                if let Ok(version) = VersionInfo::parse(&frame.payload) {
                    info!(
                        "Device firmware {}{}, state {:?}",
                        version.version_char as char, version.version_int, version.state
                    );
                    state.mode = version.state;
                }
            }
            CmdType::IdleMode
            | CmdType::SendMode
            | CmdType::RecvMode
            | CmdType::Output
            | CmdType::Cancel
            | CmdType::Handshake => {
                if let Some(&mode) = frame.payload.first() {
                    state.mode = DeviceMode::from(mode);
                }
            }
            _ => {}
        }
    }
    if frame.cmd_type == CmdType::Data {
        let _ = ir_tx.send(frame.payload);
    }
}
