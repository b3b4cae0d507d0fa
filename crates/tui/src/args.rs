use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "stracy",
    about = "Live timeline of traced system calls, one column per process",
    after_help = "\
EXAMPLES:
    stracy trace.sse                     Replay a recorded event stream
    curl -sN localhost:8080/events | stracy
                                         Follow a live stream from stdin
    stracy --bucket-ms 1 trace.ndjson    Finer time buckets"
)]
pub struct Args {
    /// Event stream to read (SSE frames or NDJSON); `-` or omitted for stdin
    #[arg(value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// JSON file overriding timeline settings
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Width of one time bucket in milliseconds
    #[arg(long, value_name = "MS")]
    pub bucket_ms: Option<u64>,

    /// Drop rendered content of buckets once they scroll out of view
    #[arg(long)]
    pub evict: bool,

    /// Most stream messages ingested per frame
    #[arg(long, default_value = "512")]
    pub batch: usize,
}
