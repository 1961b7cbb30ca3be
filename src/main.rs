use chrono::Local;
use clap::{ArgGroup, Parser};
use dailystrips::collection::{Collection, RunOptions};
use dailystrips::digest::MaudRenderer;
use dailystrips::fetch::HttpFetcher;
use dailystrips::settings::{self, DEFAULT_SETTINGS_FILENAME, Settings};
use dailystrips::output;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "dailystrips", version)]
#[command(about = "Download daily web comics and build a dated HTML digest")]
#[command(long_about = "\
Download daily web comics and build a dated HTML digest

Strips are described in a definition file (strips.def by default):

  strip xkcd
      name XKCD
      homepage https://xkcd.com/
      searchpattern <img src=\"(?P<result>//imgs\\.xkcd\\.com/comics/[^\"]+)\"
      baseurl https:
  end

  group daily
      xkcd
  end

Without --download the strip pages are fetched and the matches printed.
With --download images are saved under <DIR>/<strip name>/, identical
images are symlinked to the previous day, and <DIR>/dailystrips-YYYY.MM.DD.html
plus an index.html link are written.

Run 'dailystrips --gen-settings' to print a documented dailystrips.toml.")]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["strip", "group", "list", "gen_settings"]),
))]
struct Cli {
    /// Process a single strip
    #[arg(short, long, value_name = "ID")]
    strip: Option<String>,

    /// Process every strip in a group
    #[arg(short, long, value_name = "ID")]
    group: Option<String>,

    /// List all strips and groups
    #[arg(short, long)]
    list: bool,

    /// Print a stock settings file with all options documented
    #[arg(long)]
    gen_settings: bool,

    /// Save images and the digest page into this (existing) directory
    #[arg(short, long, value_name = "DIR")]
    download: Option<PathBuf>,

    /// Stylesheet filename linked from the digest
    #[arg(long, value_name = "FILE")]
    css: Option<String>,

    /// Trace every fetch, match and save
    #[arg(short, long)]
    verbose: bool,

    /// Strip definition file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// User-Agent header for all requests
    #[arg(short, long, value_name = "UA")]
    useragent: Option<String>,

    /// PEM bundle of CA certificates to trust instead of the built-in roots
    #[arg(long, value_name = "PEM")]
    ca_certs: Option<PathBuf>,

    /// Runtime settings file
    #[arg(long, value_name = "TOML", default_value = DEFAULT_SETTINGS_FILENAME)]
    settings: PathBuf,
}

impl Cli {
    /// Layer command-line flags over file settings.
    fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(config) = &self.config {
            settings.strips_file = config.clone();
        }
        if let Some(ua) = &self.useragent {
            settings.user_agent = ua.clone();
        }
        if let Some(css) = &self.css {
            settings.css = css.clone();
        }
        if let Some(ca) = &self.ca_certs {
            settings.ca_certs = Some(ca.clone());
        }
        settings
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if cli.gen_settings {
        print!("{}", settings::stock_settings_toml());
        return Ok(());
    }

    let settings = cli.apply(settings::load_settings(&cli.settings)?);
    settings.validate()?;

    if !settings.strips_file.is_file() {
        return Err(format!(
            "Config file \"{}\" does not exist",
            settings.strips_file.display()
        )
        .into());
    }
    if let Some(dir) = &cli.download
        && !dir.is_dir()
    {
        return Err(format!("Download directory \"{}\" does not exist", dir.display()).into());
    }

    let now = Local::now().naive_local();
    let mut collection = Collection::load(&settings.strips_file, now)?;

    if cli.list {
        output::print_listing(&collection);
        return Ok(());
    }

    let ids = match (&cli.strip, &cli.group) {
        (Some(id), _) => collection.resolve_strip_id(id)?,
        (None, Some(id)) => collection.resolve_group_id(id)?,
        (None, None) => return Ok(()),
    };

    let fetcher = match &settings.ca_certs {
        Some(path) => HttpFetcher::with_ca_bundle(path)?,
        None => HttpFetcher::new()?,
    };
    let opts = RunOptions {
        download_dir: cli.download.as_deref(),
        css: settings.css(),
        user_agent: settings.user_agent(),
    };
    collection.process_strips(&ids, &fetcher, &MaudRenderer, &opts)?;

    if cli.download.is_none() {
        for strip in collection.strips_by_ids(&ids) {
            output::print_strip_info(strip);
        }
    }

    Ok(())
}
