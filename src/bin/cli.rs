use std::path::PathBuf;

use clap::Parser;
use mpegps_inspector::constants::DEFAULT_QUEUE_CAPACITY;
use mpegps_inspector::inspector::{detail, run, Options, Outcome};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(about = "Demultiplex and inspect an MPEG Program Stream file")]
struct Opt {
    /// Program stream file to inspect
    #[clap(long)]
    file: PathBuf,

    /// Where --dump-video writes the video elementary stream
    #[clap(long, default_value = "./output.video")]
    output_video: PathBuf,

    /// Where --dump-audio writes the audio elementary stream
    #[clap(long, default_value = "./output.audio")]
    output_audio: PathBuf,

    #[clap(long, default_value_t = false)]
    dump_video: bool,

    #[clap(long, default_value_t = false)]
    dump_audio: bool,

    /// Log the decoded fields of every pack header
    #[clap(long, default_value_t = false)]
    print_ps_header: bool,

    /// Log the decoded fields of every system header
    #[clap(long, default_value_t = false)]
    print_sys_header: bool,

    /// Log the decoded fields of every program stream map
    #[clap(long, default_value_t = false)]
    print_psm: bool,

    /// Debug logging, including every packet's field tree
    #[clap(long, default_value_t = false)]
    verbose: bool,

    /// Log the first 16 bytes of every PES packet
    #[clap(long, default_value_t = false)]
    dump_pes_start_bytes: bool,

    /// List pack headers in the packet table too
    #[clap(long, default_value_t = false)]
    report_pack_headers: bool,

    /// Capacity of the packet event queue
    #[clap(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Print the run summary as JSON
    #[clap(long, default_value_t = false)]
    json: bool,

    /// Decode only the packet starting at this byte offset and print its fields
    #[clap(long)]
    detail: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();

    let default_level = if opt.verbose { "mpegps_inspector=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    if let Some(offset) = opt.detail {
        let (kind, tree) = detail(&opt.file, offset)?;
        println!("{kind} at byte {offset}");
        print!("{tree}");
        return Ok(());
    }

    let report = run(Options {
        file: opt.file,
        output_video: opt.output_video,
        output_audio: opt.output_audio,
        dump_video: opt.dump_video,
        dump_audio: opt.dump_audio,
        print_ps_header: opt.print_ps_header,
        print_sys_header: opt.print_sys_header,
        print_psm: opt.print_psm,
        verbose: opt.verbose,
        dump_pes_start_bytes: opt.dump_pes_start_bytes,
        report_pack_headers: opt.report_pack_headers,
        queue_capacity: opt.queue_capacity,
        json: opt.json,
    })
    .await?;

    if report.outcome == Outcome::Failed {
        anyhow::bail!("demux failed: {}", report.error.unwrap_or_default());
    }
    Ok(())
}
