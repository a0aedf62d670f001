use crate::error::{CoreError, Result};
use crate::wire::LineFramer;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serialport::{SerialPort, SerialPortInfo};
use std::io::{self, ErrorKind, Read};
use std::time::{Duration, Instant};

const READ_TIMEOUT: Duration = Duration::from_millis(20);
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct PortInfo {
    pub port_name: String,
    pub port_type: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (port_type, vid, pid, product) = match &info.port_type {
            serialport::SerialPortType::UsbPort(usb) => {
                ("USB".to_string(), Some(usb.vid), Some(usb.pid), usb.product.clone())
            }
            serialport::SerialPortType::PciPort => ("PCI".to_string(), None, None, None),
            serialport::SerialPortType::BluetoothPort => ("Bluetooth".to_string(), None, None, None),
            serialport::SerialPortType::Unknown => ("Unknown".to_string(), None, None, None),
        };
        Self {
            port_name: info.port_name,
            port_type,
            vid,
            pid,
            product,
        }
    }
}

impl PortInfo {
    /// One-line label for port pickers, e.g. `COM5 (2341:0043)`.
    pub fn display_name(&self) -> String {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => format!("{} ({:04X}:{:04X})", self.port_name, vid, pid),
            _ => self.port_name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: serialport::DataBits,
    pub parity: serialport::Parity,
    pub stop_bits: serialport::StopBits,
    /// Initial DTR level. Most Arduino boards reset when DTR is asserted.
    pub dtr: bool,
    /// Consecutive hard read failures tolerated before the worker gives up.
    pub max_read_failures: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 9_600,
            data_bits: serialport::DataBits::Eight,
            parity: serialport::Parity::None,
            stop_bits: serialport::StopBits::One,
            dtr: true,
            max_read_failures: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SerialEvent {
    Opened(String),
    /// A complete line, stamped with the host clock when its terminator arrived.
    Line { bytes: Vec<u8>, at: Instant },
    Error(String),
    Closed,
}

enum Command {
    SetDtr(bool),
    Close,
}

pub struct SerialService {
    cfg: SerialConfig,
    tx_cmd: Sender<Command>,
    rx_evt: Receiver<SerialEvent>,
}

impl SerialService {
    pub fn list_ports() -> Vec<PortInfo> {
        match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(PortInfo::from).collect(),
            Err(e) => {
                log::warn!("port enumeration failed: {e}");
                Vec::new()
            }
        }
    }

    pub fn open(cfg: SerialConfig) -> Result<Self> {
        if cfg.port_name.is_empty() {
            return Err(CoreError::NoPort);
        }

        let mut port = serialport::new(&cfg.port_name, cfg.baud_rate)
            .data_bits(cfg.data_bits)
            .parity(cfg.parity)
            .stop_bits(cfg.stop_bits)
            .flow_control(serialport::FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|source| CoreError::Open { port: cfg.port_name.clone(), source })?;

        if let Err(e) = port.write_data_terminal_ready(cfg.dtr) {
            log::warn!("{}: cannot set DTR: {e}", cfg.port_name);
        }
        log::info!("opened {} at {} baud", cfg.port_name, cfg.baud_rate);

        let (tx_cmd, rx_cmd) = unbounded::<Command>();
        let (tx_evt, rx_evt) = unbounded::<SerialEvent>();
        let worker_cfg = cfg.clone();

        std::thread::Builder::new()
            .name(format!("serial-{}", cfg.port_name))
            .spawn(move || run_worker(port, worker_cfg, rx_cmd, tx_evt))
            .map_err(CoreError::Spawn)?;

        Ok(Self { cfg, tx_cmd, rx_evt })
    }

    pub fn set_dtr(&self, state: bool) -> Result<()> {
        self.tx_cmd.send(Command::SetDtr(state)).map_err(|_| CoreError::Disconnected)
    }

    pub fn close(&self) {
        let _ = self.tx_cmd.send(Command::Close);
    }

    pub fn events(&self) -> &Receiver<SerialEvent> {
        &self.rx_evt
    }

    pub fn config(&self) -> &SerialConfig {
        &self.cfg
    }
}

impl Drop for SerialService {
    fn drop(&mut self) {
        self.close();
    }
}

fn is_transient(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted)
}

/// Counts consecutive hard read failures; any successful read starts over.
struct ReadRetry {
    failures: u32,
    max: u32,
}

enum ReadOutcome {
    Data(usize),
    Idle,
    Retry(io::Error),
    GiveUp(io::Error),
}

impl ReadRetry {
    fn new(max: u32) -> Self {
        Self { failures: 0, max }
    }

    fn on_read(&mut self, res: io::Result<usize>) -> ReadOutcome {
        match res {
            Ok(0) => ReadOutcome::Idle,
            Ok(n) => {
                self.failures = 0;
                ReadOutcome::Data(n)
            }
            Err(e) if is_transient(e.kind()) => ReadOutcome::Idle,
            Err(e) => {
                self.failures += 1;
                if self.failures >= self.max {
                    ReadOutcome::GiveUp(e)
                } else {
                    ReadOutcome::Retry(e)
                }
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Backoff,
    Stop,
}

/// One read from the port: frames and forwards lines, reports hard errors.
fn read_step<R: Read + ?Sized>(
    port: &mut R,
    buf: &mut [u8],
    framer: &mut LineFramer,
    retry: &mut ReadRetry,
    port_name: &str,
    tx_evt: &Sender<SerialEvent>,
) -> Flow {
    match retry.on_read(port.read(buf)) {
        ReadOutcome::Data(n) => {
            for bytes in framer.push(&buf[..n]) {
                let at = Instant::now();
                if tx_evt.send(SerialEvent::Line { bytes, at }).is_err() {
                    return Flow::Stop;
                }
            }
            Flow::Continue
        }
        ReadOutcome::Idle => Flow::Continue,
        ReadOutcome::Retry(e) => {
            log::warn!("{port_name}: read failed ({}/{}): {e}", retry.failures, retry.max);
            let _ = tx_evt.send(SerialEvent::Error(e.to_string()));
            framer.clear();
            Flow::Backoff
        }
        ReadOutcome::GiveUp(e) => {
            log::warn!("{port_name}: giving up after {} read failures: {e}", retry.failures);
            let _ = tx_evt.send(SerialEvent::Error(e.to_string()));
            let _ = tx_evt.send(SerialEvent::Closed);
            Flow::Stop
        }
    }
}

fn run_worker(
    mut port: Box<dyn SerialPort>,
    cfg: SerialConfig,
    rx_cmd: Receiver<Command>,
    tx_evt: Sender<SerialEvent>,
) {
    let _ = tx_evt.send(SerialEvent::Opened(cfg.port_name.clone()));
    let mut framer = LineFramer::new();
    let mut retry = ReadRetry::new(cfg.max_read_failures);
    let mut buf = [0u8; 256];

    loop {
        match read_step(&mut *port, &mut buf, &mut framer, &mut retry, &cfg.port_name, &tx_evt) {
            Flow::Continue => {}
            Flow::Backoff => std::thread::sleep(RETRY_BACKOFF),
            Flow::Stop => return,
        }

        while let Ok(cmd) = rx_cmd.try_recv() {
            match cmd {
                Command::SetDtr(state) => {
                    if let Err(e) = port.write_data_terminal_ready(state) {
                        let _ = tx_evt.send(SerialEvent::Error(e.to_string()));
                    }
                }
                Command::Close => {
                    log::info!("closing {}", cfg.port_name);
                    let _ = tx_evt.send(SerialEvent::Closed);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays a fixed sequence of read results, then times out forever.
    struct Scripted(VecDeque<io::Result<Vec<u8>>>);

    impl Scripted {
        fn new(script: impl IntoIterator<Item = io::Result<Vec<u8>>>) -> Self {
            Self(script.into_iter().collect())
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::from(ErrorKind::TimedOut)),
            }
        }
    }

    fn hard() -> io::Result<Vec<u8>> {
        Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged"))
    }

    fn soft(kind: ErrorKind) -> io::Result<Vec<u8>> {
        Err(io::Error::from(kind))
    }

    fn drive(port: &mut Scripted, max: u32, steps: usize) -> (Vec<Flow>, Vec<SerialEvent>) {
        let (tx, rx) = unbounded();
        let mut framer = LineFramer::new();
        let mut retry = ReadRetry::new(max);
        let mut buf = [0u8; 256];
        let mut flows = Vec::new();
        for _ in 0..steps {
            let flow = read_step(port, &mut buf, &mut framer, &mut retry, "test", &tx);
            let stop = flow == Flow::Stop;
            flows.push(flow);
            if stop {
                break;
            }
        }
        drop(tx);
        (flows, rx.iter().collect())
    }

    #[test]
    fn transient_errors_never_count() {
        let mut script = Vec::new();
        for _ in 0..20 {
            script.push(soft(ErrorKind::TimedOut));
            script.push(soft(ErrorKind::WouldBlock));
            script.push(soft(ErrorKind::Interrupted));
        }
        let mut port = Scripted::new(script);
        let (flows, events) = drive(&mut port, 2, 60);
        assert!(flows.iter().all(|f| *f == Flow::Continue));
        assert!(events.is_empty());
    }

    #[test]
    fn gives_up_after_consecutive_hard_errors() {
        let mut port = Scripted::new([hard(), hard(), hard()]);
        let (flows, events) = drive(&mut port, 3, 10);
        assert_eq!(flows, [Flow::Backoff, Flow::Backoff, Flow::Stop]);
        assert_eq!(events.len(), 4);
        assert!(events[..3].iter().all(|e| matches!(e, SerialEvent::Error(m) if m == "unplugged")));
        assert!(matches!(events[3], SerialEvent::Closed));
    }

    #[test]
    fn good_read_resets_failure_count() {
        let mut port = Scripted::new([
            hard(),
            hard(),
            Ok(b"01.01.2000 00:00:01\r\n".to_vec()),
            hard(),
            hard(),
        ]);
        let (flows, events) = drive(&mut port, 3, 8);
        assert!(!flows.contains(&Flow::Stop));
        let errors = events.iter().filter(|e| matches!(e, SerialEvent::Error(_))).count();
        assert_eq!(errors, 4);
        assert!(!events.iter().any(|e| matches!(e, SerialEvent::Closed)));
        assert!(events
            .iter()
            .any(|e| matches!(e, SerialEvent::Line { bytes, .. } if bytes == b"01.01.2000 00:00:01")));
    }

    #[test]
    fn hard_error_drops_partial_line() {
        let mut port = Scripted::new([Ok(b"01.01.20".to_vec()), hard(), Ok(b"garbage\n".to_vec())]);
        let (_, events) = drive(&mut port, 5, 3);
        let lines: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SerialEvent::Line { bytes, .. } => Some(bytes.as_slice()),
                _ => None,
            })
            .collect();
        assert_eq!(lines, [b"garbage".as_slice()]);
    }
}
