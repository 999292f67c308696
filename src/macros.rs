/// Unwraps the `Result` of decoding a field inside `FieldParser::parse_field`.
/// On error the problem is logged together with the raw field and the parser
/// tells the reader to re-synchronize.
macro_rules! try_field {
    ($raw:expr, $name:expr, $expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => {
                error!(
                    "Invalid NMEA {} {:?}: {}",
                    $name,
                    String::from_utf8_lossy($raw),
                    e
                );
                return State::WaitingForSynch;
            }
        }
    };
}

/// Like `try_field!` for the reader itself: logs a `SyncError` and drops back
/// to waiting for the next `$`.
macro_rules! resync {
    ($self:expr, $err:expr) => {{
        let err: SyncError = $err;
        error!("NMEA synchronization error: {}", err);
        $self.buffer.clear();
        $self.state = State::WaitingForSynch;
        return None;
    }};
}
