mod logging;

use std::path::PathBuf;

use anyhow::Result;
use bates::pipeline::LogProgress;
use bates::{Production, ProductionJob, RunSummary, StampColor, StampPosition, StampStyle};
use chrono::Local;
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "bates", version, about = "Bates-number a folder of documents for production")]
struct Args {
    /// Input directory, or a single file
    input: PathBuf,

    /// Output root; directory runs create a timestamped folder inside it
    output: PathBuf,

    /// Label prefix, e.g. ABC
    #[arg(long, default_value = "")]
    prefix: String,

    /// Digits in the numeric part of each label
    #[arg(long, default_value_t = 5)]
    zero_pad: usize,

    /// First number to assign
    #[arg(long, default_value_t = 1)]
    start: u64,

    /// top-left, top-center, ... bottom-right
    #[arg(long, default_value = "bottom-right")]
    position: StampPosition,

    /// black, red, blue, green or gray
    #[arg(long, default_value = "black")]
    color: StampColor,

    /// Stamp opacity in percent
    #[arg(long, default_value_t = 100)]
    opacity: u8,

    /// Line width of a box around the label; 0 draws no box
    #[arg(long, default_value_t = 0.0)]
    box_width: f32,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    x_offset: i32,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    y_offset: i32,

    /// Conversion workers; 0 uses every CPU
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,

    /// Seconds before an external converter is killed
    #[arg(long)]
    converter_timeout: Option<u64>,

    /// Office program used for word-processing and other documents
    #[arg(long)]
    office_command: Option<String>,

    /// Skip bates_report.xlsx
    #[arg(long)]
    no_report: bool,

    /// Skip the combined PDF
    #[arg(long)]
    no_merge: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Emit console logs as JSON
    #[arg(long)]
    log_json: bool,

    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn job(&self) -> ProductionJob {
        let mut job = ProductionJob::new(&self.input, &self.output).with_prefix(&self.prefix);
        job.zero_pad = self.zero_pad;
        job.start = self.start;
        job.style = StampStyle {
            position: self.position,
            color: self.color,
            opacity: self.opacity,
            box_width: self.box_width,
            x_offset: self.x_offset,
            y_offset: self.y_offset,
        };
        job.workers = match self.jobs {
            0 => bates::worker::available_workers(),
            n => n,
        };
        if let Some(secs) = self.converter_timeout {
            job.converter_timeout_secs = secs;
        }
        if let Some(command) = &self.office_command {
            job.office_command = command.clone();
        }
        job.build_report = !self.no_report;
        job.build_merge = !self.no_merge;
        job
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let production = Production::new(args.job())?;
    let layout = production.layout(Local::now());

    logging::init(logging::LoggingOptions {
        verbose: args.verbose,
        json: args.log_json,
        log_file: layout.log_path.as_deref(),
    })?;

    info!(
        prefix = %production.job().prefix,
        workers = production.job().workers,
        "Starting production"
    );

    let summary = production.run_with_layout(layout, &LogProgress)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("Output:      {}", summary.run_directory.display());
    println!("Files seen:  {}", summary.files_seen);
    println!("Numbered:    {}", summary.recorded);
    if let (Some(first), Some(last)) = (&summary.first_label, &summary.last_label) {
        println!(
            "Labels:      {} - {} ({} pages)",
            first, last, summary.total_pages
        );
    }
    println!("Next number: {}", summary.next_number);

    if !summary.skipped.is_empty() {
        println!("Skipped:     {}", summary.skipped.len());
        for path in &summary.skipped {
            println!("  {}", path.display());
        }
    }

    if !summary.quarantined.is_empty() {
        println!("With issues: {}", summary.quarantined.len());
        for entry in &summary.quarantined {
            println!("  {} ({})", entry.source.display(), entry.reason);
        }
    }

    if let Some(path) = &summary.report_path {
        println!("Report:      {}", path.display());
    }
    if let Some(path) = &summary.merged_path {
        println!("Combined:    {}", path.display());
    }
    if let Some(path) = &summary.log_path {
        println!("Log:         {}", path.display());
    }
}
