//! Byte level synchronization of an *NMEA 0183* stream.
//!
//! [`SentenceReader`](struct.SentenceReader.html) is a push state machine fed
//! one byte at a time. It never buffers more than one field and never trusts
//! the framing: any violation drops the partial sentence and the reader waits
//! for the next `$`.
//!
//! [`NmeaReader`](struct.NmeaReader.html) runs a `SentenceReader` over a
//! blocking byte stream on a background thread and delivers the completed
//! sentences to its listeners.

use arrayvec::ArrayVec;
use chrono::Utc;
use crossbeam_channel::{self, Receiver, RecvTimeoutError, TryRecvError};

use std::collections::HashMap;
use std::io::{self, BufReader, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use err::{ReaderError, SyncError};
use listener::{ListenerRegistry, SentenceListener};
use parser::{FieldParser, GgaParser, RmcParser};
use sentence::{Sentence, TALKER_ID_LENGTH};

/// Maximum length of an NMEA sentence, including `$` and the line ending.
pub const MAX_SENTENCE_LENGTH: usize = 82;

const SENTENCE_TYPE_LENGTH: usize = 3;

static THREAD_COUNT: AtomicUsize = AtomicUsize::new(0);

/// The states of the sentence reader. Field parsers return the state the
/// reader continues with after each field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    WaitingForSynch,
    ReadingTalkerId,
    ReadingSentenceType,
    ReadingField,
    ReadingChecksum,
    DoneSentence,
}

fn wall_clock() -> i64 {
    Utc::now().timestamp_millis()
}

/// Splits a byte stream into sentences and dispatches their fields to the
/// registered field parsers.
pub struct SentenceReader {
    state: State,
    buffer: ArrayVec<u8, MAX_SENTENCE_LENGTH>,
    talker_id: [u8; TALKER_ID_LENGTH],
    parsers: HashMap<[u8; SENTENCE_TYPE_LENGTH], Box<dyn FieldParser>>,
    active: Option<[u8; SENTENCE_TYPE_LENGTH]>,
    started_at: i64,
    checksum: u8,
    verify_checksum: bool,
    clock: fn() -> i64,
}

impl Default for SentenceReader {
    fn default() -> Self {
        SentenceReader::new()
    }
}

impl SentenceReader {
    /// Creates a reader with parsers for GGA and RMC registered.
    pub fn new() -> Self {
        let mut reader = SentenceReader {
            state: State::WaitingForSynch,
            buffer: ArrayVec::new(),
            talker_id: [0; TALKER_ID_LENGTH],
            parsers: HashMap::new(),
            active: None,
            started_at: 0,
            checksum: 0,
            verify_checksum: false,
            clock: wall_clock,
        };
        reader.register(Box::new(GgaParser::new()));
        reader.register(Box::new(RmcParser::new()));
        reader
    }

    /// Compare the checksum field against the XOR of the sentence content.
    /// Without verification the checksum only has to be two hex digits.
    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    /// Replaces the wall clock used for the sentence timestamps.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a field parser for its sentence type, replacing any parser
    /// previously registered for that type.
    pub fn register(&mut self, parser: Box<dyn FieldParser>) {
        self.parsers.insert(*parser.sentence_type(), parser);
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Feeds all of `bytes` and collects the completed sentences.
    pub fn feed_all(&mut self, bytes: &[u8]) -> Vec<Sentence> {
        bytes.iter().filter_map(|&b| self.feed(b)).collect()
    }

    /// Advances the state machine by one byte. Returns the sentence it
    /// completed, if any.
    pub fn feed(&mut self, byte: u8) -> Option<Sentence> {
        trace!("{:?}: {:?}", self.state, byte as char);

        match self.state {
            State::WaitingForSynch => {
                if byte == b'$' {
                    self.buffer.clear();
                    self.checksum = 0;
                    self.started_at = (self.clock)();
                    self.state = State::ReadingTalkerId;
                } else if self.buffer.try_push(byte).is_err() {
                    warn!(
                        "Discarded {} bytes while waiting for synchronization",
                        self.buffer.len()
                    );
                    self.buffer.clear();
                }
            }
            State::ReadingTalkerId => match byte {
                b',' | b'*' | b'\r' | b'\n' => resync!(self, SyncError::TalkerId(byte)),
                _ => {
                    self.checksum ^= byte;
                    if self.buffer.try_push(byte).is_err() {
                        resync!(self, SyncError::Overflow("talker id", TALKER_ID_LENGTH));
                    }
                    if self.buffer.len() == TALKER_ID_LENGTH {
                        self.talker_id.copy_from_slice(&self.buffer);
                        self.buffer.clear();
                        self.state = State::ReadingSentenceType;
                    }
                }
            },
            State::ReadingSentenceType => match byte {
                b',' | b'*' => {
                    if self.buffer.len() != SENTENCE_TYPE_LENGTH {
                        resync!(self, SyncError::SentenceType(self.buffer.len()));
                    }
                    let mut kind = [0; SENTENCE_TYPE_LENGTH];
                    kind.copy_from_slice(&self.buffer);
                    self.buffer.clear();
                    if byte == b',' {
                        self.checksum ^= byte;
                    }

                    match self.parsers.get_mut(&kind) {
                        Some(parser) => {
                            parser.reset(self.talker_id);
                            self.active = Some(kind);
                            self.state = State::ReadingField;
                        }
                        None => {
                            debug!(
                                "Ignoring unsupported sentence {}{}",
                                String::from_utf8_lossy(&self.talker_id),
                                String::from_utf8_lossy(&kind)
                            );
                            self.state = State::WaitingForSynch;
                        }
                    }
                }
                b'\r' | b'\n' => resync!(self, SyncError::LineEnding("sentence type")),
                _ => {
                    if self.buffer.len() == SENTENCE_TYPE_LENGTH {
                        resync!(self, SyncError::SentenceType(SENTENCE_TYPE_LENGTH + 1));
                    }
                    self.checksum ^= byte;
                    self.buffer.push(byte);
                }
            },
            State::ReadingField => match byte {
                b',' | b'*' => {
                    let next = match self.active {
                        Some(ref kind) => match self.parsers.get_mut(kind) {
                            Some(parser) => parser.parse_field(&self.buffer),
                            None => State::WaitingForSynch,
                        },
                        None => State::WaitingForSynch,
                    };
                    if byte == b',' {
                        self.checksum ^= byte;
                    }
                    self.buffer.clear();
                    self.state = next;
                }
                b'\r' | b'\n' => resync!(self, SyncError::LineEnding("field")),
                _ => {
                    if self.buffer.try_push(byte).is_err() {
                        resync!(self, SyncError::Overflow("field", MAX_SENTENCE_LENGTH));
                    }
                    self.checksum ^= byte;
                }
            },
            State::ReadingChecksum => match byte {
                b'\r' => {
                    let actual = match parse_checksum(&self.buffer) {
                        Ok(actual) => actual,
                        Err(err) => resync!(self, err),
                    };
                    if self.verify_checksum && actual != self.checksum {
                        resync!(self, SyncError::ChecksumMismatch(self.checksum, actual));
                    }
                    self.buffer.clear();
                    self.state = State::DoneSentence;
                }
                b'\n' => resync!(self, SyncError::LineEnding("checksum")),
                _ => {
                    if self.buffer.try_push(byte).is_err() {
                        resync!(self, SyncError::Overflow("checksum", MAX_SENTENCE_LENGTH));
                    }
                }
            },
            State::DoneSentence => {
                if byte != b'\n' {
                    error!("NMEA synchronization error: {}", SyncError::Termination(byte));
                }
                self.state = State::WaitingForSynch;
                return self.finish();
            }
        }

        None
    }

    fn finish(&mut self) -> Option<Sentence> {
        let kind = self.active.take()?;
        let mut sentence = self.parsers.get(&kind)?.sentence();
        {
            let header = sentence.header_mut();
            header.started_at = self.started_at;
            header.finished_at = (self.clock)();
        }
        debug!("Read sentence {}", sentence);
        Some(sentence)
    }
}

fn parse_checksum(field: &[u8]) -> Result<u8, SyncError> {
    if field.len() != 2 || !field.iter().all(|b| b.is_ascii_hexdigit()) {
        return Err(SyncError::ChecksumFormat(field.len()));
    }
    Ok(u8::from_str_radix(&String::from_utf8_lossy(field), 16)?)
}

struct Running {
    stop: Arc<AtomicBool>,
    // disconnected once the reader thread has returned
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

/// Reads sentences on a dedicated thread and delivers them synchronously to
/// the registered sentence listeners.
pub struct NmeaReader {
    listeners: Arc<ListenerRegistry<dyn SentenceListener>>,
    verify_checksum: bool,
    running: Option<Running>,
}

impl NmeaReader {
    pub fn new(listeners: Arc<ListenerRegistry<dyn SentenceListener>>) -> Self {
        NmeaReader {
            listeners,
            verify_checksum: false,
            running: None,
        }
    }

    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry<dyn SentenceListener>> {
        &self.listeners
    }

    /// Whether the reader thread is alive. A reader that hit the end of its
    /// input is no longer running.
    pub fn is_running(&self) -> bool {
        match self.running {
            Some(ref running) => running.done.try_recv() == Err(TryRecvError::Empty),
            None => false,
        }
    }

    /// Spawns the reader thread on `input`.
    ///
    /// Fails with `ReaderError::AlreadyStarted` while a previous thread is
    /// still running.
    pub fn start<R>(&mut self, input: R) -> Result<(), ReaderError>
    where
        R: Read + Send + 'static,
    {
        if self.is_running() {
            return Err(ReaderError::AlreadyStarted);
        }
        if let Some(finished) = self.running.take() {
            if finished.handle.join().is_err() {
                error!("Previous NMEA reader thread panicked");
            }
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
        let mut reader = SentenceReader::new().with_checksum_verification(self.verify_checksum);
        let listeners = self.listeners.clone();
        let flag = stop.clone();
        let name = format!(
            "NMEA reader thread {}",
            THREAD_COUNT.fetch_add(1, Ordering::SeqCst)
        );

        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            let _done = done_tx;
            run(&mut reader, input, &flag, &listeners);
        })?;
        info!("Started {}", name);

        self.running = Some(Running {
            stop,
            done: done_rx,
            handle,
        });
        Ok(())
    }

    /// Signals the reader thread to terminate without waiting for it.
    pub fn request_stop(&self) {
        if let Some(ref running) = self.running {
            running.stop.store(true, Ordering::SeqCst);
        }
    }

    /// Stops the reader thread and waits at most `timeout` for it. Stopping a
    /// reader that is not running succeeds.
    pub fn stop(&mut self, timeout: Duration) -> Result<(), ReaderError> {
        let running = match self.running.take() {
            Some(running) => running,
            None => return Ok(()),
        };
        running.stop.store(true, Ordering::SeqCst);

        if let Err(RecvTimeoutError::Timeout) = running.done.recv_timeout(timeout) {
            warn!("NMEA reader thread still blocked after {:?}, detaching it", timeout);
            return Err(ReaderError::StopTimeout(timeout));
        }
        if running.handle.join().is_err() {
            error!("NMEA reader thread panicked");
        }
        Ok(())
    }

    /// Blocks until the reader thread terminated or `timeout` elapsed.
    /// Returns `true` if the thread is gone.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.running {
            Some(ref running) => match running.done.recv_timeout(timeout) {
                Err(RecvTimeoutError::Timeout) => false,
                _ => true,
            },
            None => true,
        }
    }
}

impl Drop for NmeaReader {
    fn drop(&mut self) {
        self.request_stop();
    }
}

fn run<R: Read>(
    reader: &mut SentenceReader,
    input: R,
    stop: &AtomicBool,
    listeners: &ListenerRegistry<dyn SentenceListener>,
) {
    let mut bytes = BufReader::new(input).bytes();

    loop {
        if stop.load(Ordering::SeqCst) {
            info!("NMEA reader stopped on request");
            break;
        }

        match bytes.next() {
            None => {
                info!("End of NMEA input reached");
                break;
            }
            Some(Ok(byte)) => {
                if let Some(sentence) = reader.feed(byte) {
                    listeners.notify("sentence", |l| l.receive_sentence(&sentence));
                }
            }
            Some(Err(ref err)) if is_transient(err) => continue,
            Some(Err(err)) => {
                if stop.load(Ordering::SeqCst) {
                    info!("NMEA input failed during stop: {}", err);
                } else {
                    error!("Reading NMEA input failed: {}", err);
                }
                break;
            }
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => true,
        _ => false,
    }
}
