//! Telegraph CLI
//!
//! Command-line front end for the Telegraph publishing API. Every subcommand
//! maps to one API call and prints its result as pretty JSON.

#![forbid(unsafe_code)]

mod upload;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use telegraph_core::{
    AccountField, ClientConfig, CreateAccountOpts, EditAccountInfoOpts, PageListOpts, PageOpts,
    PageViewsOpts, TelegraphClient,
};
use tracing_subscriber::EnvFilter;

/// Telegraph CLI - publish pages and files to telegra.ph
#[derive(Parser, Debug)]
#[command(name = "telegraph", author, version, about, long_about = None)]
struct Cli {
    /// API root [default: https://api.telegra.ph, or TELEGRAPH_API_URL]
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Upload endpoint [default: https://telegra.ph/upload, or TELEGRAPH_UPLOAD_URL]
    #[arg(long, global = true)]
    upload_url: Option<String>,

    /// Request timeout in seconds, 0 for none [default: 30, or TELEGRAPH_TIMEOUT_SECS]
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct TokenArg {
    /// Account access token
    #[arg(long, env = "TELEGRAPH_ACCESS_TOKEN", hide_env_values = true)]
    token: String,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct ContentArg {
    /// Page content: an HTML fragment or a JSON node array
    #[arg(long)]
    content: Option<String>,

    /// Read page content from a file
    #[arg(long)]
    file: Option<PathBuf>,
}

impl ContentArg {
    fn load(&self) -> Result<String> {
        match (&self.content, &self.file) {
            (Some(content), _) => Ok(content.clone()),
            (None, Some(file)) => {
                std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))
            }
            (None, None) => bail!("either --content or --file is required"),
        }
    }
}

#[derive(Args, Debug)]
struct AuthorArgs {
    /// Author name shown below the title
    #[arg(long)]
    author_name: Option<String>,

    /// Profile link opened when the author name is clicked
    #[arg(long)]
    author_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new account
    CreateAccount {
        short_name: String,
        #[command(flatten)]
        author: AuthorArgs,
    },
    /// Show account info
    AccountInfo {
        #[command(flatten)]
        token: TokenArg,
        /// Fields to request, comma separated [default: all]
        #[arg(long, value_delimiter = ',', value_parser = parse_field)]
        fields: Vec<AccountField>,
    },
    /// Update account info; only the given fields change
    EditAccount {
        #[command(flatten)]
        token: TokenArg,
        #[arg(long)]
        short_name: Option<String>,
        #[command(flatten)]
        author: AuthorArgs,
    },
    /// Revoke the access token and print the account with its new one
    RevokeToken {
        #[command(flatten)]
        token: TokenArg,
    },
    /// Create a page
    CreatePage {
        #[command(flatten)]
        token: TokenArg,
        #[arg(long)]
        title: String,
        #[command(flatten)]
        content: ContentArg,
        #[command(flatten)]
        author: AuthorArgs,
        /// Include the page content in the output
        #[arg(long)]
        return_content: bool,
    },
    /// Replace an existing page
    EditPage {
        #[command(flatten)]
        token: TokenArg,
        /// Page path, e.g. Sample-Page-12-15
        path: String,
        #[arg(long)]
        title: String,
        #[command(flatten)]
        content: ContentArg,
        #[command(flatten)]
        author: AuthorArgs,
        /// Include the page content in the output
        #[arg(long)]
        return_content: bool,
    },
    /// Fetch a page
    GetPage {
        path: String,
        /// Include the page content
        #[arg(long)]
        with_content: bool,
    },
    /// List the account's pages, most recent first
    ListPages {
        #[command(flatten)]
        token: TokenArg,
        #[arg(long)]
        offset: Option<i64>,
        /// 0 to 200 [server default: 50]
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Show view counts for a page
    Views {
        path: String,
        #[arg(long)]
        year: Option<i64>,
        #[arg(long, requires = "year")]
        month: Option<i64>,
        #[arg(long, requires = "month")]
        day: Option<i64>,
        #[arg(long, requires = "day")]
        hour: Option<i64>,
    },
    /// Upload files and print their hosted paths
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Number of concurrent uploads
        #[arg(short, long, default_value_t = 4)]
        jobs: usize,
    },
}

fn parse_field(raw: &str) -> std::result::Result<AccountField, String> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_string())).map_err(|_| {
        format!("unknown field {raw:?}; expected short_name, author_name, author_url, auth_url or page_count")
    })
}

impl Cli {
    fn config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::from_env().context("invalid TELEGRAPH_* environment")?;
        if let Some(url) = &self.api_url {
            config = config.with_api_url(url);
        }
        if let Some(url) = &self.upload_url {
            config = config.with_upload_url(url);
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout((secs > 0).then(|| Duration::from_secs(secs)));
        }
        Ok(config)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn page_opts(author: AuthorArgs, return_content: bool) -> PageOpts {
    PageOpts {
        author_name: author.author_name,
        author_url: author.author_url,
        return_content,
    }
}

fn run(cli: Cli) -> Result<()> {
    let client = TelegraphClient::new(cli.config()?);

    match cli.command {
        Command::CreateAccount { short_name, author } => {
            let opts = CreateAccountOpts {
                author_name: author.author_name,
                author_url: author.author_url,
            };
            print_json(&client.create_account(&short_name, &opts)?)
        }
        Command::AccountInfo { token, fields } => {
            print_json(&client.get_account_info(&token.token, &fields)?)
        }
        Command::EditAccount {
            token,
            short_name,
            author,
        } => {
            let opts = EditAccountInfoOpts {
                short_name,
                author_name: author.author_name,
                author_url: author.author_url,
            };
            print_json(&client.edit_account_info(&token.token, &opts)?)
        }
        Command::RevokeToken { token } => print_json(&client.revoke_access_token(&token.token)?),
        Command::CreatePage {
            token,
            title,
            content,
            author,
            return_content,
        } => {
            let content = content.load()?;
            let page = client.create_page(&token.token, &title, &content, &page_opts(author, return_content))?;
            print_json(&page)
        }
        Command::EditPage {
            token,
            path,
            title,
            content,
            author,
            return_content,
        } => {
            let content = content.load()?;
            let opts = page_opts(author, return_content);
            print_json(&client.edit_page(&token.token, &path, &title, &content, &opts)?)
        }
        Command::GetPage { path, with_content } => print_json(&client.get_page(&path, with_content)?),
        Command::ListPages { token, offset, limit } => {
            print_json(&client.get_page_list(&token.token, &PageListOpts { offset, limit })?)
        }
        Command::Views {
            path,
            year,
            month,
            day,
            hour,
        } => {
            let opts = PageViewsOpts {
                year,
                month,
                day,
                hour,
            };
            print_json(&client.get_views(&path, &opts)?)
        }
        Command::Upload { files, jobs } => {
            let outcomes = upload::upload_all(&client, &files, jobs)?;
            print_json(&outcomes)?;
            let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
            if failed > 0 {
                bail!("{failed} of {} uploads failed", outcomes.len());
            }
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_writer(std::io::stderr)
        .init();

    run(cli)
}
