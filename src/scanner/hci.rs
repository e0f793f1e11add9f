//! Raw HCI socket radio backend.
//!
//! Scans for BLE advertisements over a raw Linux HCI socket, without the
//! BlueZ daemon. Requires CAP_NET_RAW and CAP_NET_ADMIN capabilities or root
//! privileges.
//!
//! Advertising reports are delivered as [`RawAdvertisement`] events with the
//! full advertising data buffer as the payload; no per-AD-structure filtering
//! happens here. The HCI controller has no native scan duration, so this
//! backend bounds each scan with a timer task that disables scanning and
//! emits [`RadioEvent::ScanStopped`]. Explicit stops do not emit an event;
//! the caller issuing them already knows the scan is over, and a stale stop
//! event would race a restart.

use super::{
    EVENT_CHANNEL_BUFFER_SIZE, Radio, RadioError, RadioEvent, RawAdvertisement, ScanStatus,
};
use crate::mac_address::MacAddress;
use libc::{AF_BLUETOOTH, SOCK_CLOEXEC, SOCK_RAW, c_int, c_void, sockaddr, socklen_t};
use log::debug;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// HCI protocol constants
const BTPROTO_HCI: c_int = 1;
const HCI_FILTER: c_int = 2;

// HCI packet types
const HCI_EVENT_PKT: u8 = 0x04;

// HCI events
const EVT_LE_META_EVENT: u8 = 0x3E;

// LE Meta event sub-events
const EVT_LE_ADVERTISING_REPORT: u8 = 0x02;

// HCI commands
const OGF_LE_CTL: u16 = 0x08;
const OCF_LE_SET_SCAN_PARAMETERS: u16 = 0x000B;
const OCF_LE_SET_SCAN_ENABLE: u16 = 0x000C;

// Scan types
const LE_SCAN_PASSIVE: u8 = 0x00;

// Own address type
const LE_PUBLIC_ADDRESS: u8 = 0x00;

// Filter policy
const FILTER_POLICY_ACCEPT_ALL: u8 = 0x00;

/// HCI socket address structure
#[repr(C)]
struct SockaddrHci {
    hci_family: u16,
    hci_dev: u16,
    hci_channel: u16,
}

/// HCI filter structure for raw sockets
#[repr(C)]
struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

impl HciFilter {
    fn new() -> Self {
        Self {
            type_mask: 0,
            event_mask: [0, 0],
            opcode: 0,
        }
    }

    fn set_ptype(&mut self, ptype: u8) {
        self.type_mask |= 1 << (ptype as u32);
    }

    fn set_event(&mut self, event: u8) {
        let bit = event as usize;
        self.event_mask[bit / 32] |= 1 << (bit % 32);
    }
}

/// LE Set Scan Parameters command
#[repr(C, packed)]
struct LeSetScanParametersCmd {
    scan_type: u8,
    interval: u16,
    window: u16,
    own_address_type: u8,
    filter_policy: u8,
}

/// LE Set Scan Enable command
#[repr(C, packed)]
struct LeSetScanEnableCmd {
    enable: u8,
    filter_dup: u8,
}

/// Create an HCI command packet
fn hci_command_packet(ogf: u16, ocf: u16, params: &[u8]) -> Vec<u8> {
    let opcode = (ogf << 10) | ocf;
    let mut packet = Vec::with_capacity(4 + params.len());
    packet.push(0x01); // HCI command packet type
    packet.push((opcode & 0xFF) as u8);
    packet.push((opcode >> 8) as u8);
    packet.push(params.len() as u8);
    packet.extend_from_slice(params);
    packet
}

/// Open a raw HCI socket
fn open_hci_socket() -> Result<OwnedFd, RadioError> {
    // Create a raw Bluetooth HCI socket using libc directly
    // since nix doesn't support BTPROTO_HCI
    // SOCK_NONBLOCK is required for AsyncFd to work properly
    let fd = unsafe {
        libc::socket(
            AF_BLUETOOTH,
            SOCK_RAW | SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
            BTPROTO_HCI,
        )
    };

    if fd < 0 {
        return Err(RadioError::Unavailable(format!(
            "failed to create HCI socket: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Bind HCI socket to a device
fn bind_hci_socket(fd: &OwnedFd, dev_id: u16) -> Result<(), RadioError> {
    let addr = SockaddrHci {
        hci_family: AF_BLUETOOTH as u16,
        hci_dev: dev_id,
        hci_channel: 0, // HCI_CHANNEL_RAW
    };

    let ret = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            &addr as *const SockaddrHci as *const sockaddr,
            mem::size_of::<SockaddrHci>() as socklen_t,
        )
    };

    if ret < 0 {
        return Err(RadioError::Unavailable(format!(
            "failed to bind HCI socket: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

/// Set HCI socket filter to LE meta events only
fn set_hci_filter(fd: &OwnedFd) -> Result<(), RadioError> {
    let mut filter = HciFilter::new();
    filter.set_ptype(HCI_EVENT_PKT);
    filter.set_event(EVT_LE_META_EVENT);

    let ret = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            0, // SOL_HCI
            HCI_FILTER,
            &filter as *const HciFilter as *const c_void,
            mem::size_of::<HciFilter>() as socklen_t,
        )
    };

    if ret < 0 {
        return Err(RadioError::Unavailable(format!(
            "failed to set HCI filter: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

/// Send an HCI command
fn send_hci_command(fd: &OwnedFd, packet: &[u8]) -> Result<(), RadioError> {
    let ret = unsafe {
        libc::write(
            fd.as_raw_fd(),
            packet.as_ptr() as *const c_void,
            packet.len(),
        )
    };

    if ret < 0 {
        return Err(RadioError::Io(io::Error::last_os_error()));
    }

    Ok(())
}

/// Configure LE scan parameters: passive scan, 50ms interval, 30ms window
/// (in 0.625ms units), enough to catch the sensors' advertising cadence.
fn set_scan_parameters(fd: &OwnedFd) -> Result<(), RadioError> {
    let params = LeSetScanParametersCmd {
        scan_type: LE_SCAN_PASSIVE,
        interval: 0x0050,
        window: 0x0030,
        own_address_type: LE_PUBLIC_ADDRESS,
        filter_policy: FILTER_POLICY_ACCEPT_ALL,
    };

    let params_bytes = unsafe {
        std::slice::from_raw_parts(
            &params as *const LeSetScanParametersCmd as *const u8,
            mem::size_of::<LeSetScanParametersCmd>(),
        )
    };

    let packet = hci_command_packet(OGF_LE_CTL, OCF_LE_SET_SCAN_PARAMETERS, params_bytes);
    send_hci_command(fd, &packet)
}

/// Enable or disable LE scanning
fn set_scan_enable(fd: &OwnedFd, enable: bool) -> Result<(), RadioError> {
    let cmd = LeSetScanEnableCmd {
        enable: enable as u8,
        filter_dup: 0x00, // Don't filter duplicates
    };

    let cmd_bytes = unsafe {
        std::slice::from_raw_parts(
            &cmd as *const LeSetScanEnableCmd as *const u8,
            mem::size_of::<LeSetScanEnableCmd>(),
        )
    };

    let packet = hci_command_packet(OGF_LE_CTL, OCF_LE_SET_SCAN_ENABLE, cmd_bytes);
    send_hci_command(fd, &packet)
}

/// Parse an LE advertising report event into a raw advertisement.
///
/// `data` is the full HCI event packet starting at the packet-type byte.
/// Only the first report in the event is extracted; controllers batching
/// several reports re-deliver the rest in subsequent events in practice.
fn parse_advertising_report(data: &[u8]) -> Option<RawAdvertisement> {
    // Minimum size for an advertising report
    if data.len() < 12 {
        return None;
    }

    // Skip HCI header (1 byte packet type + 1 byte event code + 1 byte param len + 1 byte subevent)
    let report = &data[4..];

    // Number of reports
    let num_reports = *report.first()? as usize;
    if num_reports == 0 {
        return None;
    }

    // First report layout: event_type(1) + addr_type(1) + addr(6) + data_len(1)
    if report.len() < 10 {
        return None;
    }

    // Extract address (6 bytes, in reverse order)
    let mut addr = [0u8; 6];
    addr.copy_from_slice(&report[3..9]);
    addr.reverse(); // HCI uses little-endian address

    let data_len = report[9] as usize;
    if report.len() < 10 + data_len + 1 {
        return None;
    }

    let payload = report[10..10 + data_len].to_vec();

    // RSSI trails the advertising data
    let rssi = i16::from(report[10 + data_len] as i8);

    Some(RawAdvertisement {
        address: MacAddress(addr),
        payload,
        rssi,
    })
}

/// Radio backend over raw HCI sockets.
///
/// Created with [`HciRadio::open`], which also hands out the event channel.
/// Must be opened from within a tokio runtime; the reader task lives for the
/// lifetime of the process.
pub struct HciRadio {
    cmd_fd: Arc<OwnedFd>,
    events: mpsc::Sender<RadioEvent>,
    stop_timer: Option<JoinHandle<()>>,
}

impl HciRadio {
    /// Open the HCI device and start the advertisement reader task.
    ///
    /// Returns the radio handle and the receiving end of the event channel.
    pub fn open(dev_id: u16) -> Result<(Self, mpsc::Receiver<RadioEvent>), RadioError> {
        // Event socket receives advertising reports
        let event_fd = open_hci_socket()?;
        bind_hci_socket(&event_fd, dev_id)?;
        set_hci_filter(&event_fd)?;

        // Separate socket for sending commands
        let cmd_fd = open_hci_socket()?;
        bind_hci_socket(&cmd_fd, dev_id)?;
        set_scan_parameters(&cmd_fd)?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER_SIZE);

        let async_fd = AsyncFd::new(event_fd).map_err(|e| {
            RadioError::Unavailable(format!(
                "failed to register HCI socket with the runtime: {e}"
            ))
        })?;

        tokio::spawn(reader_task(async_fd, tx.clone()));

        Ok((
            Self {
                cmd_fd: Arc::new(cmd_fd),
                events: tx,
                stop_timer: None,
            },
            rx,
        ))
    }

    fn cancel_stop_timer(&mut self) {
        if let Some(timer) = self.stop_timer.take() {
            timer.abort();
        }
    }
}

impl Radio for HciRadio {
    fn start_scan(&mut self, duration_secs: u32) -> Result<(), RadioError> {
        self.cancel_stop_timer();
        set_scan_enable(&self.cmd_fd, true)?;
        let _ = self
            .events
            .try_send(RadioEvent::ScanStarted(ScanStatus::Success));

        // Bound the scan: disable after the duration and report the stop
        let cmd_fd = Arc::clone(&self.cmd_fd);
        let events = self.events.clone();
        self.stop_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(u64::from(duration_secs))).await;
            if let Err(e) = set_scan_enable(&cmd_fd, false) {
                debug!("disabling scan after duration failed: {e}");
            }
            let _ = events
                .send(RadioEvent::ScanStopped(ScanStatus::Success))
                .await;
        }));

        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), RadioError> {
        self.cancel_stop_timer();
        set_scan_enable(&self.cmd_fd, false)
    }
}

impl Drop for HciRadio {
    fn drop(&mut self) {
        self.cancel_stop_timer();
    }
}

/// Read HCI events from the socket and forward advertising reports.
async fn reader_task(async_fd: AsyncFd<OwnedFd>, tx: mpsc::Sender<RadioEvent>) {
    let mut buf = [0u8; 258]; // Max HCI event size

    loop {
        // Wait for the socket to be readable
        let mut guard = match async_fd.readable().await {
            Ok(guard) => guard,
            Err(_) => break,
        };

        // Drain all available packets before waiting again
        loop {
            let n = match guard.try_io(|inner| {
                let ret = unsafe {
                    libc::read(
                        inner.as_raw_fd(),
                        buf.as_mut_ptr() as *mut c_void,
                        buf.len(),
                    )
                };
                if ret < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(ret as usize)
                }
            }) {
                Ok(Ok(n)) if n > 0 => n,
                Ok(Ok(_)) => break,  // EOF or empty read
                Ok(Err(_)) => break, // Read error
                Err(_) => break,     // WouldBlock - no more data
            };

            if n >= 4
                && buf[0] == HCI_EVENT_PKT
                && buf[1] == EVT_LE_META_EVENT
                && buf[3] == EVT_LE_ADVERTISING_REPORT
                && let Some(adv) = parse_advertising_report(&buf[..n])
                && tx.send(RadioEvent::Advertisement(adv)).await.is_err()
            {
                // Receiver gone, nothing left to do
                return;
            }
        }
    }
}
