use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use stracy_protocol::{SseDecoder, StreamMessage};

const CHANNEL_CAPACITY: usize = 4096;

/// Start the reader thread. It only decodes frames and forwards them; all
/// timeline state stays on the UI thread. The channel disconnects when the
/// input ends.
pub fn spawn_reader(input: Option<&Path>) -> Result<Receiver<StreamMessage>> {
    let reader: Box<dyn BufRead + Send> = match input {
        Some(path) if path != Path::new("-") => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        _ => Box::new(BufReader::new(io::stdin())),
    };

    let (tx, rx) = crossbeam_channel::bounded(CHANNEL_CAPACITY);
    thread::Builder::new()
        .name("stracy-reader".into())
        .spawn(move || forward(reader, &tx))
        .context("failed to spawn reader thread")?;
    Ok(rx)
}

fn forward(reader: impl BufRead, tx: &Sender<StreamMessage>) {
    let mut decoder = SseDecoder::new();
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                log::warn!("input read failed: {err}");
                let _ = tx.send(StreamMessage::Error(err.to_string()));
                return;
            }
        };
        if let Some(message) = decoder.push_line(&line)
            && tx.send(message).is_err()
        {
            log::debug!("viewer closed, reader stopping");
            return;
        }
    }
    if let Some(message) = decoder.finish() {
        let _ = tx.send(message);
    }
    log::debug!("input exhausted");
}
