use anyhow::{bail, Context};
use bt_hwcfg::domain::models::VendorEvent;
use bt_hwcfg::domain::settings::{Settings, SettingsService};
use bt_hwcfg::hci::Opcode;
use bt_hwcfg::infrastructure::conf;
use bt_hwcfg::infrastructure::logging::init_logger;
use bt_hwcfg::infrastructure::loopback::LoopbackController;
use bt_hwcfg::infrastructure::upio::LoggingUpio;
use bt_hwcfg::patch::{PatchLocator, PatchReader};
use bt_hwcfg::VendorLib;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "bt-hwcfg", version, about = "Bluetooth controller bring-up tool")]
struct Cli {
    /// JSON settings file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// bt_vendor.conf style file applied over the settings
    #[arg(long, global = true)]
    conf: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show which patch file would be used for a chip id
    FindPatch { chip: String },
    /// List the commands in a patch file
    Parse { file: PathBuf },
    /// Run the full bring-up against the loopback controller
    Simulate {
        /// Firmware version the controller reports, as 18 hex digits
        version_hex: String,
        /// Answer this opcode (hex) with a failure status
        #[arg(long, value_parser = parse_opcode)]
        fail_opcode: Option<Opcode>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings_service = match &cli.settings {
        Some(path) => SettingsService::open(path.clone()),
        None => SettingsService::new()?,
    };
    if let Some(path) = &cli.conf {
        conf::load_file(&mut settings_service.get_mut().patch, path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
    }
    let mut settings = settings_service.get().clone();
    match cli.verbose {
        0 => {}
        1 => settings.log_settings.level = "debug".to_string(),
        _ => settings.log_settings.level = "trace".to_string(),
    }

    let _logging_guard = init_logger(&settings.log_settings)?;
    info!("Starting bt-hwcfg");

    match cli.command {
        Command::FindPatch { chip } => {
            let locator = PatchLocator::from_settings(&settings.patch);
            let path = locator.try_locate(&chip)?;
            println!("{}", path.display());
        }
        Command::Parse { file } => {
            let handle =
                File::open(&file).with_context(|| format!("Cannot open {}", file.display()))?;
            let mut reader = PatchReader::new(BufReader::new(handle));
            let mut count = 0usize;
            while let Some(cmd) = reader.next_command()? {
                count += 1;
                println!(
                    "{:>5} {} len={:<3} {:02x?}",
                    count,
                    cmd.opcode,
                    cmd.params.len(),
                    cmd.params
                );
            }
            println!("{} command(s)", count);
        }
        Command::Simulate {
            version_hex,
            fail_opcode,
        } => {
            let version = decode_hex(&version_hex)?;
            let mut channel = LoopbackController::new(&version);
            if let Some(opcode) = fail_opcode {
                channel = channel.fail_opcode(opcode);
            }
            simulate(channel, &settings).await?;
        }
    }

    Ok(())
}

async fn simulate(channel: LoopbackController, settings: &Settings) -> anyhow::Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut vendor = VendorLib::new(channel, LoggingUpio, settings, event_tx);

    vendor.start_firmware_config();
    vendor.pump();

    let result = match event_rx.try_recv() {
        Ok(VendorEvent::FirmwareConfigured(result)) => result,
        Ok(other) => bail!("Unexpected event {:?}", other),
        Err(_) => {
            match vendor.firmware_halt() {
                Some(reason) => warn!("Firmware configuration halted: {:?}", reason),
                None => warn!("Firmware configuration produced no outcome"),
            }
            println!("firmware: halted ({:?})", vendor.firmware_halt());
            return Ok(());
        }
    };
    println!(
        "firmware: {:?} chip={} records={}",
        result,
        vendor.firmware().chip_name(),
        vendor.firmware().commands_sent()
    );
    if !result.is_success() {
        return Ok(());
    }

    let delay = vendor.settlement_delay();
    info!("Settling for {} ms", delay.as_millis());
    tokio::time::sleep(delay).await;

    if vendor.set_lpm(true).is_ok() {
        vendor.pump();
    }
    vendor.configure_sco();
    vendor.pump();
    while let Ok(event) = event_rx.try_recv() {
        println!("{:?}", event);
    }
    println!("lpm idle timeout: {} ms", vendor.lpm_idle_timeout());

    let channel = vendor.channel();
    println!(
        "{} command(s) sent, {} buffer(s) outstanding",
        channel.sent().len(),
        channel.outstanding()
    );
    Ok(())
}

fn decode_hex(text: &str) -> anyhow::Result<Vec<u8>> {
    let text = text.trim();
    if !text.is_ascii() || text.len() % 2 != 0 {
        bail!("Expected an even number of hex digits, got {:?}", text);
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .with_context(|| format!("Invalid hex at offset {} in {:?}", i, text))
        })
        .collect()
}

fn parse_opcode(text: &str) -> Result<Opcode, String> {
    let digits = text.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16)
        .map(Opcode)
        .map_err(|e| format!("invalid opcode {:?}: {}", text, e))
}
