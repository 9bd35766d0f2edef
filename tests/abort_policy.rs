//! The default abort handler really terminates the process. The test binary
//! re-runs itself with `LUMBERJACK_ABORT_CHILD` set; the child logs an error
//! and must exit non-zero after its streams were flushed.

use std::io;
use std::process::Command;

use lumberjack::logging;
use lumberjack::prelude::*;

const CHILD_ENV: &str = "LUMBERJACK_ABORT_CHILD";

#[test]
fn error_exits_after_flushing() {
    if std::env::var_os(CHILD_ENV).is_some() {
        logging::initialize();
        let stream = LumberjackStream::new(io::stdout(), NoComm, 5)
            .with_format(MessageFormat::new("child: {level} {message} x{count}"));
        logging::add_stream_to_all_msg_levels(shared(stream));
        logging::log_message(Level::Info, "before the end", "", 0, true);
        logging::log_error_message("fatal", file!(), line!());
        unreachable!("abort handler returned");
    }

    let exe = std::env::current_exe().expect("test binary path");
    let output = Command::new(exe)
        .args(["error_exits_after_flushing", "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, "1")
        .output()
        .expect("spawn child");

    assert_eq!(output.status.code(), Some(logging::ABORT_EXIT_CODE));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("child: INFO before the end x1"), "stdout: {stdout}");
    assert!(stdout.contains("child: ERROR fatal x1"), "stdout: {stdout}");
}
