use atc_listener::app::{self, Options, RunError};
use atc_listener::scanner::hci::HciRadio;
use atc_listener::scheduler;
use clap::Parser;
use std::panic::{self, PanicHookInfo};

#[cfg(not(feature = "hci"))]
compile_error!("the atc-listener binary requires the `hci` backend feature");

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

/// Bring up the radio and scheduler, then hand off to the core run loop.
async fn run(options: Options) -> Result<(), RunError> {
    let (radio, events) = HciRadio::open(options.device)?;
    let (ticks, _ticker) = scheduler::schedule(options.interval);

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();
    app::run_with_io(options, radio, events, ticks, &mut out, &mut err).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set up panic hook to ensure clean exit codes for process managers
    // (e.g., systemd) that monitor exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let options = Options::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if options.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    match run(options).await {
        Ok(_) => std::process::exit(EXIT_SUCCESS),
        Err(why) => {
            eprintln!("error: {}", why);
            std::process::exit(EXIT_ERROR);
        }
    }
}
