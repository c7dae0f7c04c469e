use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::process::ExitCode;
use tqir_lib::nec;
use tqir_lib::signal::PulseTrain;
use tqir_lib::TqIr;
use tracing::debug;

/// Command line utility for the Tiqiaa Tview USB IR transceiver.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// NEC code to transmit, in hex (e.g. 0x1234).
    #[arg(short, long, value_name = "CODE", value_parser = parse_nec_code)]
    send: Option<u16>,

    /// Wait for one IR signal and print the decoded NEC code.
    #[arg(short, long)]
    receive: bool,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

fn parse_nec_code(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("not a 16-bit hex code: {e}"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbose.tracing_level_filter())
        .init();

    let mut ir = match TqIr::open().await {
        Ok(ir) => ir,
        Err(e) => {
            eprintln!("Could not open the device: {e}");
            return ExitCode::from(1);
        }
    };

    if let Some(code) = cli.send {
        eprintln!("Sending...");
        match ir.send_nec(code).await {
            Ok(()) => println!("Sent code {code:#06x}"),
            Err(e) => eprintln!("Send failure: {e}"),
        }
    }

    if cli.receive {
        eprintln!("Receiving...");
        receive_one(&mut ir).await;
    }

    debug!("Session mode at close: {:?}", ir.mode());
    ir.close().await;
    ExitCode::SUCCESS
}

/// Capture signals until one decodes as NEC, then print it.
async fn receive_one(ir: &mut TqIr) {
    let Some(mut rx) = ir.take_ir_receiver() else {
        eprintln!("IR channel already taken");
        return;
    };
    if let Err(e) = ir.start_receive().await {
        eprintln!("Could not start receiving: {e}");
        return;
    }
    while let Some(payload) = rx.recv().await {
        let train = PulseTrain::from_device_ticks(&payload);
        println!("Captured {} bytes ({} pulses)", payload.len(), train.len());
        if let Some(decoded) = nec::decode(&train) {
            println!("NEC code: {:#06x} (raw {:#010x})", decoded.code, decoded.raw);
            return;
        }
        println!("No NEC signal in capture, rearming...");
        if let Err(e) = ir.start_receive().await {
            eprintln!("Could not rearm capture: {e}");
            return;
        }
    }
}
