// ABOUTME: CLI binary for the Vitrine product-media extractor.
// ABOUTME: Reads product pages from URLs, files or stdin and prints the media bundle as JSON or CSV rows.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use url::Url;
use vitrine::resource::decode_body;
use vitrine::{Extractor, MediaBundle, Request, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// The bundle as JSON
    Json,
    /// URL,Type,Variant rows
    Text,
}

#[derive(Parser, Debug)]
#[command(name = "vitrine")]
#[command(about = "Extract product images, variant images and videos from product pages")]
struct Args {
    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Output file path (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// HTML file to read instead of fetching; "-" reads stdin
    #[arg(long = "html")]
    html: Option<PathBuf>,

    /// Base URL for resolving relative media URLs
    #[arg(long = "base-url")]
    base_url: Option<String>,

    /// Do not scan the DOM when the page has no structured payload
    #[arg(long = "no-fallback")]
    no_fallback: bool,

    /// Wrap each bundle in a mediaLoaded message
    #[arg(long = "envelope")]
    envelope: bool,

    /// Single-line JSON
    #[arg(long = "compact")]
    compact: bool,

    /// Print elapsed time in ms to stderr
    #[arg(long = "timing")]
    timing: bool,

    /// Allow fetching from private/local networks
    #[arg(long = "allow-private-networks")]
    allow_private_networks: bool,

    /// Product page URLs to fetch
    #[arg()]
    urls: Vec<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_document(path: &Path) -> io::Result<String> {
    let bytes = if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        fs::read(path)?
    };
    Ok(decode_body(&bytes, None))
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn format_rows(bundles: &[MediaBundle]) -> String {
    let mut out = String::from("URL,Type,Variant");
    for row in bundles.iter().flat_map(|b| b.records()) {
        out.push('\n');
        out.push_str(&format!(
            "{},{},{}",
            csv_field(row.url),
            row.kind,
            csv_field(row.variant)
        ));
    }
    out
}

fn format_json(bundles: Vec<MediaBundle>, envelope: bool, compact: bool) -> serde_json::Result<String> {
    let values = bundles
        .into_iter()
        .map(|data| {
            if envelope {
                serde_json::to_value(Response::MediaLoaded { data })
            } else {
                serde_json::to_value(data)
            }
        })
        .collect::<serde_json::Result<Vec<_>>>()?;

    let value = if values.len() == 1 {
        values.into_iter().next().unwrap_or_default()
    } else {
        serde_json::Value::Array(values)
    };

    if compact {
        serde_json::to_string(&value)
    } else {
        serde_json::to_string_pretty(&value)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    if args.html.is_none() && args.urls.is_empty() {
        eprintln!("error: at least one URL is required, or use --html");
        return ExitCode::from(1);
    }

    if args.html.is_some() && !args.urls.is_empty() {
        eprintln!("error: cannot use both --html and positional URLs");
        return ExitCode::from(1);
    }

    let mut builder = Extractor::builder()
        .allow_dom_fallback(!args.no_fallback)
        .allow_private_networks(args.allow_private_networks);
    if let Some(base) = &args.base_url {
        match Url::parse(base) {
            Ok(url) => builder = builder.base_url(url),
            Err(e) => {
                eprintln!("error: invalid --base-url {}: {}", base, e);
                return ExitCode::from(1);
            }
        }
    }
    let extractor = builder.build();

    let start = Instant::now();
    let mut bundles: Vec<MediaBundle> = Vec::new();
    let mut had_error = false;

    if let Some(html_path) = &args.html {
        match read_document(html_path) {
            Ok(html) => match extractor.respond(&Request::GetMedia, &html) {
                Response::MediaLoaded { data } => bundles.push(data),
                Response::Received { .. } => {}
            },
            Err(e) => {
                eprintln!("error reading file {:?}: {}", html_path, e);
                had_error = true;
            }
        }
    } else {
        for url in &args.urls {
            match extractor.fetch_bundle(url).await {
                Ok(bundle) => bundles.push(bundle),
                Err(e) => {
                    eprintln!("error extracting {}: {}", url, e);
                    had_error = true;
                }
            }
        }
    }

    let elapsed = start.elapsed();

    if !bundles.is_empty() {
        if bundles.iter().all(MediaBundle::is_empty) {
            eprintln!("no media found");
        }

        let rendered = match args.format {
            Format::Text => Ok(format_rows(&bundles)),
            Format::Json => format_json(bundles, args.envelope, args.compact),
        };

        match rendered {
            Ok(output_str) => {
                if let Some(output_path) = &args.output {
                    if let Err(e) = fs::write(output_path, &output_str) {
                        eprintln!("error writing to {:?}: {}", output_path, e);
                        had_error = true;
                    }
                } else {
                    println!("{}", output_str);
                }
            }
            Err(e) => {
                eprintln!("error encoding output: {}", e);
                had_error = true;
            }
        }
    }

    if args.timing {
        let _ = writeln!(io::stderr(), "elapsed: {}ms", elapsed.as_millis());
    }

    if had_error {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
