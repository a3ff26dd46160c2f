mod client;
mod format;
mod listing;
mod process;
mod settings;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use common::ContentHash;

use crate::client::{ApiClient, Image};
use crate::format::{copy_name, format_bytes, upload_name};
use crate::listing::{SortKey, render_rows, sort_images};
use crate::process::{DEFAULT_QUALITY, OutputFormat, ProcessOptions, Resize};
use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "imgood")]
#[command(about = "Upload, list and delete images on an imgood server")]
struct Cli {
    /// Server base URL [default: saved server or http://localhost:3000]
    #[arg(long, env = "IMGOOD_SERVER")]
    server: Option<String>,

    /// Session token [default: the one saved by `imgood signin`]
    #[arg(long, env = "IMGOOD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Settings file [default: ~/.imgood/config.toml]
    #[arg(long, env = "IMGOOD_CLI_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Convert {
    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// JPEG quality (1-100); WebP output is lossless
    #[arg(short, long, default_value_t = DEFAULT_QUALITY,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Resize to W,H; 0 keeps the aspect ratio, e.g. 800,0
    #[arg(short, long, value_name = "W,H")]
    resize: Option<Resize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and save the session token
    Signin {
        #[arg(long)]
        email: String,
        #[arg(long, env = "IMGOOD_PASSWORD", hide_env_values = true)]
        password: String,
        /// Print the token without saving it
        #[arg(long)]
        no_save: bool,
    },
    /// End the session and forget the saved token
    Signout,
    /// Upload a local file, re-encoding it first unless told otherwise
    Up {
        file: PathBuf,
        /// Display name used as-is, defaults to the file name
        #[arg(short = 'k', long)]
        name: Option<String>,
        /// Convert to WebP unless --format says otherwise
        #[arg(short, long)]
        compress: bool,
        #[command(flatten)]
        convert: Convert,
        /// Name the upload after the current time, keeping the extension
        #[arg(short, long)]
        timestamp: bool,
        /// Upload the original bytes when nothing else needs re-encoding
        #[arg(long)]
        keep_metadata: bool,
        /// Ignore the EXIF orientation
        #[arg(long)]
        no_rotate: bool,
    },
    /// Upload a converted copy of an existing image
    Cp {
        /// Key of the source image
        key: String,
        /// Display name of the copy
        #[arg(short = 'k', long)]
        name: Option<String>,
        #[command(flatten)]
        convert: Convert,
    },
    /// List uploaded images
    Ls {
        #[arg(long, default_value_t = 1)]
        page: u64,
        /// Images per page
        #[arg(short, long, visible_alias = "per-page", default_value_t = 100)]
        limit: u64,
        /// Only keys starting with this, e.g. 2024/3/
        #[arg(short, long)]
        prefix: Option<String>,
        /// Sort the page [default: newest first]
        #[arg(short, long, value_enum)]
        sort: Option<SortKey>,
        /// Reverse the sort order
        #[arg(short, long, requires = "sort")]
        desc: bool,
        /// Show public URLs
        #[arg(short, long)]
        urls: bool,
    },
    /// Delete an image by key
    Rm { key: String },
    /// Print a shell completion script
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings_path = cli.config.or_else(settings::default_path);
    let mut settings = match &settings_path {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let server = settings.server(cli.server);
    let token = settings.token(cli.token);
    let client = ApiClient::new(&server, token.clone())?;

    match cli.command {
        Command::Signin {
            email,
            password,
            no_save,
        } => {
            let token = client.sign_in(&email, &password)?;
            if no_save {
                println!("{token}");
            } else {
                settings.server = Some(server);
                settings.token = Some(token);
                let path = save(&settings, settings_path.as_deref())?;
                eprintln!("Signed in; token saved to {}", path.display());
            }
        }
        Command::Signout => {
            if let Some(token) = token
                && let Err(e) = client.sign_out(&token)
            {
                eprintln!("warning: server sign-out failed: {e:#}");
            }
            if settings.token.take().is_some() {
                save(&settings, settings_path.as_deref())?;
            }
            eprintln!("Signed out");
        }
        Command::Up {
            file,
            name,
            compress,
            convert,
            timestamp,
            keep_metadata,
            no_rotate,
        } => {
            let opts = UpOptions {
                name,
                compress,
                convert,
                timestamp,
                keep_metadata,
                no_rotate,
            };
            upload(&client, &file, opts)?;
        }
        Command::Cp { key, name, convert } => copy(&client, &key, name, convert)?,
        Command::Ls {
            page,
            limit,
            prefix,
            sort,
            desc,
            urls,
        } => list(&client, page, limit, prefix.as_deref(), sort, desc, urls)?,
        Command::Rm { key } => {
            client.delete_image(&key)?;
            println!("Deleted {key}");
        }
        Command::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "imgood", &mut io::stdout());
        }
    }

    Ok(())
}

fn save(settings: &Settings, path: Option<&Path>) -> Result<PathBuf> {
    let path = path.context("No home directory; pass --config to choose a settings file")?;
    settings.save(path)?;
    Ok(path.to_path_buf())
}

struct UpOptions {
    name: Option<String>,
    compress: bool,
    convert: Convert,
    timestamp: bool,
    keep_metadata: bool,
    no_rotate: bool,
}

fn upload(client: &ApiClient, file: &Path, opts: UpOptions) -> Result<()> {
    let original =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("File path has no file name; pass --name")?;

    let format = opts
        .convert
        .format
        .or(opts.compress.then_some(OutputFormat::Webp));
    let converting = format.is_some() || opts.convert.resize.is_some();
    let rewrite = converting || !opts.keep_metadata || !opts.no_rotate;
    if converting && opts.keep_metadata {
        eprintln!("warning: metadata is dropped when converting or resizing");
    }

    let (bytes, new_ext) = if !rewrite {
        (original, None)
    } else if !converting && !process::keeps_format(&original) {
        eprintln!("note: {file_name} is uploaded unchanged; pass --format to convert it");
        (original, None)
    } else {
        let processed = process::process(
            &original,
            &ProcessOptions {
                format,
                quality: opts.convert.quality,
                resize: opts.convert.resize,
                auto_orient: !opts.no_rotate,
            },
        )?;
        report_sizes(original.len(), &processed);
        (processed.bytes, format.map(OutputFormat::extension))
    };

    let stamp = opts
        .timestamp
        .then(|| chrono::Local::now().format("%Y%m%d%H%M%S%3f").to_string());
    let name = opts
        .name
        .unwrap_or_else(|| upload_name(&file_name, new_ext, stamp.as_deref()));

    let image = send(client, &name, bytes)?;
    println!("{}", image.url);
    Ok(())
}

fn copy(client: &ApiClient, key: &str, name: Option<String>, convert: Convert) -> Result<()> {
    if convert.format.is_none() && convert.resize.is_none() {
        bail!("Nothing to convert: pass --format or --resize (an unchanged copy is a duplicate)");
    }

    let source = client.find_by_key(key)?;
    let original = client.download(&source.url)?;
    let processed = process::process(
        &original,
        &ProcessOptions {
            format: convert.format,
            quality: convert.quality,
            resize: convert.resize,
            auto_orient: true,
        },
    )?;
    report_sizes(original.len(), &processed);

    let new_ext = convert.format.map(OutputFormat::extension);
    let name = name.unwrap_or_else(|| copy_name(&source.name, new_ext));
    let image = send(client, &name, processed.bytes)?;
    println!("{}", image.url);
    Ok(())
}

fn report_sizes(original: usize, processed: &process::Processed) {
    let ratio = if original == 0 {
        100.0
    } else {
        processed.bytes.len() as f64 * 100.0 / original as f64
    };
    eprintln!(
        "Processed {}x{} {}: {} -> {} ({ratio:.1}%)",
        processed.width,
        processed.height,
        processed.format.extension(),
        format_bytes(original as u64),
        format_bytes(processed.bytes.len() as u64),
    );
}

fn send(client: &ApiClient, name: &str, bytes: Vec<u8>) -> Result<Image> {
    let hash = ContentHash::compute(&bytes).to_hex();
    let size = bytes.len() as u64;

    let upload = client.initiate_upload(name, &hash, size)?;
    eprintln!("Uploading {} ({}) to {}", name, format_bytes(size), upload.key);
    client.put_object(&upload.url, &upload.headers, bytes)?;

    client.confirm_upload(upload.id)
}

fn list(
    client: &ApiClient,
    page: u64,
    limit: u64,
    prefix: Option<&str>,
    sort: Option<SortKey>,
    desc: bool,
    urls: bool,
) -> Result<()> {
    let mut list = client.list_images(page, limit, prefix)?;
    if let Some(sort) = sort {
        sort_images(&mut list.data, sort, desc);
    }

    for row in render_rows(&list.data, urls) {
        println!("{row}");
    }
    println!(
        "Total: {} images, page {}/{}",
        list.pagination.total,
        list.pagination.page,
        list.pagination.total_pages.max(1)
    );
    Ok(())
}
