use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use pdpkey::{BatchPrompt, DEFAULT_RSA_BITS, KeyPair, KeyStore, Prompt, TerminalPrompt, default_dir};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "pdpkey")]
#[command(
    version,
    about = "Passphrase-protected key container for provable data possession clients."
)]
struct Cli {
    /// Directory holding pdp.pri and pdp.pub (default: ~/.pdp)
    #[arg(long, global = true, value_name = "DIR", env = "PDPKEY_DIR")]
    dir: Option<PathBuf>,

    /// Take the passphrase from PDPKEY_PASSPHRASE instead of the terminal
    #[arg(long, global = true, default_value_t = false)]
    batch: bool,

    /// Print debug logs to stderr
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generates a new PDP key pair and stores it
    Keygen {
        /// RSA modulus size in bits
        #[arg(long, default_value_t = DEFAULT_RSA_BITS)]
        rsa_bits: usize,

        /// Replace an existing key pair without asking (batch mode only)
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Unlocks the stored key pair and shows its public parameters
    Show,

    /// Shows the public key and generator without a passphrase
    Pubkey,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pdpkey={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_summary(keypair: &KeyPair, dir: &Path) {
    println!("directory:  {}", dir.display());
    println!(
        "private:    {}",
        if keypair.is_private() { "yes" } else { "no" }
    );
    println!("modulus:    {} bits", keypair.rsa().bits());
    println!("exponent:   {}", keypair.rsa().exponent());
    println!("generator:  {}", keypair.g().to_str_radix(16));
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let dir = match cli.dir {
        Some(dir) => dir,
        None => default_dir()?,
    };

    let assume_yes = matches!(cli.command, Commands::Keygen { force: true, .. });
    if assume_yes && !cli.batch {
        bail!("--force only applies together with --batch");
    }
    let mut prompt: Box<dyn Prompt> = if cli.batch {
        Box::new(BatchPrompt::from_env(assume_yes))
    } else {
        Box::new(TerminalPrompt)
    };

    match cli.command {
        Commands::Keygen { rsa_bits, .. } => {
            let ks = KeyStore::new(&dir).with_rsa_bits(rsa_bits);
            let keypair = ks.create(prompt.as_mut())?;
            println!("PDP key pair stored in {}", dir.display());
            KeyStore::destroy(keypair);
        }
        Commands::Show => {
            let ks = KeyStore::new(&dir);
            let keypair = ks.fetch(prompt.as_mut())?;
            print_summary(&keypair, &dir);
            KeyStore::destroy(keypair);
        }
        Commands::Pubkey => {
            let keypair = KeyStore::new(&dir).fetch_public_only()?;
            print_summary(&keypair, &dir);
        }
    }

    Ok(())
}
