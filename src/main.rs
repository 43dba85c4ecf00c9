use anyhow::Result;
use clap::Parser;
use stackscope::cli::Cli;
use stackscope::context::MemoryContext;
use stackscope::process::PtraceTarget;
use stackscope::render::{render_frame, RenderConfig};
use stackscope::walker::FrameWalker;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let config = RenderConfig {
        label_width: args.label_width,
        box_width: args.box_width,
    };

    // The target stays stopped until this handle drops.
    let target = PtraceTarget::attach(args.pid)?;

    let frames = target.thread_frames()?;
    if frames.is_empty() {
        println!("No frames available");
        return Ok(());
    }

    for frame in FrameWalker::new(&target, frames, args.frames) {
        let frame = frame?;
        print!("{}", render_frame(&frame, &config));
        println!();
    }

    Ok(())
}
