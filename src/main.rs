use anyhow::Context;
use clap::{Parser, Subcommand};
use printbridge::{
    init_logging, list_ports, target_name, upload_reader, Config, MarlinResponse, SerialTransport,
    SimulatedPrinter, Transport, UploadSession, LONG_VERSION,
};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Stream G-code uploads to Marlin printer controllers
#[derive(Parser, Debug)]
#[command(author, version, long_version = LONG_VERSION, about, long_about = None)]
struct Cli {
    /// Config file (.toml or .json); defaults to the platform config dir
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug messages
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports that look like printer controllers
    Ports,

    /// Upload a file to the controller's SD card
    Upload {
        /// G-code file to upload
        file: PathBuf,

        /// Serial port, overriding the config file
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate, overriding the config file
        #[arg(short, long)]
        baud: Option<u32>,

        /// Name of the file on the controller
        #[arg(short, long)]
        name: Option<String>,

        /// Start printing once the upload completes
        #[arg(long)]
        print: bool,

        /// Stream to a simulated controller instead of a serial port
        #[arg(long)]
        dry_run: bool,
    },

    /// Send one command and wait for it to complete
    Send {
        /// Command line, e.g. "M117 Hello"
        line: String,

        /// Serial port, overriding the config file
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate, overriding the config file
        #[arg(short, long)]
        baud: Option<u32>,

        /// Send to a simulated controller instead of a serial port
        #[arg(long)]
        dry_run: bool,
    },

    /// Write the default configuration file
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };

    match cli.command {
        Command::Ports => print_ports(),
        Command::InitConfig { force } => init_config(&config_path, force),
        Command::Upload {
            file,
            port,
            baud,
            name,
            print,
            dry_run,
        } => {
            let config = Config::load_or_default(&config_path)?;
            let target = match name {
                Some(name) => name,
                None => target_name(&file)?,
            };
            let print = print || config.upload.print_after_upload;
            if dry_run {
                let printer = SimulatedPrinter::new();
                upload(printer.clone(), &config, &file, &target, print)?;
                if let Some(lines) = printer.file(&target) {
                    println!("Simulated controller stored {} lines", lines.len());
                }
                Ok(())
            } else {
                let transport = open_port(&config, port.as_deref(), baud)?;
                upload(transport, &config, &file, &target, print)
            }
        }
        Command::Send {
            line,
            port,
            baud,
            dry_run,
        } => {
            let config = Config::load_or_default(&config_path)?;
            if dry_run {
                send(SimulatedPrinter::new(), &config, &line)
            } else {
                let transport = open_port(&config, port.as_deref(), baud)?;
                send(transport, &config, &line)
            }
        }
    }
}

fn print_ports() -> anyhow::Result<()> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("No controller ports found");
    }
    for port in ports {
        match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => println!(
                "{}\t{} [{:04x}:{:04x}]",
                port.port_name, port.description, vid, pid
            ),
            _ => println!("{}\t{}", port.port_name, port.description),
        }
    }
    Ok(())
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to replace it)",
            path.display()
        );
    }
    Config::default().save_to_file(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn open_port(config: &Config, port: Option<&str>, baud: Option<u32>) -> anyhow::Result<SerialTransport> {
    let params = config.serial_params(port, baud);
    if params.port.is_empty() {
        anyhow::bail!("No serial port given; pass --port or set connection.port in the config");
    }
    SerialTransport::open(&params).with_context(|| format!("Failed to open {}", params.port))
}

fn session<T: Transport>(transport: T, config: &Config) -> anyhow::Result<UploadSession<T>> {
    let mut session = UploadSession::new(transport, config.streaming)?;
    session.set_listener(Box::new(|reply: &MarlinResponse| {
        tracing::info!("Controller: {}", reply)
    }));
    Ok(session)
}

fn upload<T: Transport>(
    transport: T,
    config: &Config,
    file: &Path,
    target: &str,
    print: bool,
) -> anyhow::Result<()> {
    let source = File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let mut session = session(transport, config)?;
    let report = upload_reader(
        &mut session,
        target,
        source,
        config.upload.chunk_size,
        print,
    )?;
    println!("Uploaded {}", report);
    if print {
        println!("Printing {}", target);
    }
    Ok(())
}

fn send<T: Transport>(transport: T, config: &Config, line: &str) -> anyhow::Result<()> {
    let mut session = session(transport, config)?;
    session
        .command(line)
        .with_context(|| format!("'{}' failed", line))?;
    println!("ok");
    Ok(())
}
