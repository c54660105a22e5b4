//! fanout-post - Write posts and publish them to social platforms
//!
//! Command-line front end for the Fanout service: create and edit posts,
//! register platform accounts, link them, and publish now or on a schedule.

use clap::{Parser, Subcommand};
use libfanout::orchestrator::{LinkResult, RunReport};
use libfanout::scheduling::parse_schedule;
use libfanout::service::{FanoutService, NewPost, PostDetails, PostUpdate};
use libfanout::{FanoutError, PlatformAccount, Post, PostStatus, Result};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "fanout-post")]
#[command(version)]
#[command(about = "Publish one post to many social platforms")]
#[command(long_about = "\
fanout-post - Publish one post to many social platforms

DESCRIPTION:
    fanout-post manages posts and the platform accounts they are published
    to. A post is linked to one or more accounts; publishing attempts every
    link that is not yet published and records each platform's outcome on
    its own link. The post only counts as published when every link is.

COMMANDS:
    post create     Create a post (optionally publish or schedule it)
    post list       List posts
    post show       Show a post and its per-platform results
    post edit       Edit a draft or scheduled post
    post publish    Publish (or retry) a post now
    post schedule   Publish a post later
    account add     Register a platform account
    account list    List platform accounts
    account check   Check an account's credentials
    account analytics  Show account-level counters
    link            Link a post to accounts

USAGE EXAMPLES:
    fanout-post account add linkedin --token \"$LINKEDIN_TOKEN\"
    fanout-post post create \"Hello world\" --account <ACCOUNT_ID> --publish
    fanout-post post schedule <POST_ID> \"tomorrow 9am\"
    fanout-post post publish <POST_ID>     # retries failed links only

CONFIGURATION:
    Configuration file: ~/.config/fanout/config.toml
    Database location: ~/.local/share/fanout/fanout.db

    Override with environment variables:
        FANOUT_CONFIG      - Path to config file
        FANOUT_DB_PATH     - Path to database file
        FANOUT_LOG_FORMAT  - text, json or pretty
        FANOUT_LOG_LEVEL   - error, warn, info, debug, trace

EXIT CODES:
    0 - Success
    1 - Publishing failed on at least one platform, or a runtime error
    2 - Authentication error
    3 - Invalid input (empty content, unknown post/account, bad time format)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: text or json
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage posts
    #[command(subcommand)]
    Post(PostCommand),

    /// Manage platform accounts
    #[command(subcommand)]
    Account(AccountCommand),

    /// Link a post to one or more accounts
    Link {
        post_id: String,

        #[arg(required = true)]
        account_ids: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum PostCommand {
    /// Create a post
    Create {
        /// Post content
        content: String,

        /// Image or video reference (URL or local path)
        #[arg(short, long)]
        media: Option<String>,

        /// Account to publish to (repeatable)
        #[arg(short, long = "account")]
        accounts: Vec<String>,

        /// Publish immediately
        #[arg(long, conflicts_with = "schedule")]
        publish: bool,

        /// Publish later (e.g., "30m", "tomorrow 9am", RFC 3339)
        #[arg(long)]
        schedule: Option<String>,
    },

    /// List posts
    List {
        /// Only posts in this status
        #[arg(short, long)]
        status: Option<String>,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show a post and its links
    Show { post_id: String },

    /// Edit a draft or scheduled post
    Edit {
        post_id: String,

        #[arg(short, long)]
        content: Option<String>,

        #[arg(short, long, conflicts_with = "clear_media")]
        media: Option<String>,

        #[arg(long)]
        clear_media: bool,
    },

    /// Publish now; already published links are skipped
    Publish { post_id: String },

    /// Schedule a post
    Schedule {
        post_id: String,

        /// When to publish (e.g., "2h", "next monday 10am")
        time: String,
    },
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    /// Register a platform account
    Add {
        /// facebook, instagram, linkedin or youtube
        platform: String,

        /// Access token
        #[arg(long, env = "FANOUT_ACCESS_TOKEN", hide_env_values = true)]
        token: String,

        /// The platform's own id for this account
        #[arg(long)]
        platform_user_id: Option<String>,
    },

    /// List accounts
    List,

    /// Check an account's credentials
    Check { account_id: String },

    /// Show account analytics
    Analytics { account_id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libfanout::logging::init_default(cli.verbose);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let json = match cli.format.as_str() {
        "text" => false,
        "json" => true,
        other => {
            return Err(FanoutError::InvalidInput(format!(
                "Invalid format '{}'. Must be 'text' or 'json'",
                other
            )))
        }
    };

    let service = FanoutService::new().await?;

    match cli.command {
        Commands::Post(command) => cmd_post(&service, command, json).await,
        Commands::Account(command) => cmd_account(&service, command, json).await,
        Commands::Link {
            post_id,
            account_ids,
        } => {
            let links = service.link_accounts(&post_id, &account_ids).await?;
            if json {
                println!("{}", to_json(&links)?);
            } else {
                println!("Linked {} new account(s) to {}", links.len(), post_id);
            }
            Ok(0)
        }
    }
}

async fn cmd_post(service: &FanoutService, command: PostCommand, json: bool) -> Result<i32> {
    match command {
        PostCommand::Create {
            content,
            media,
            accounts,
            publish,
            schedule,
        } => {
            // Parse before writing anything so a bad time leaves no draft behind
            let at = schedule
                .as_deref()
                .map(|s| parse_schedule(s, chrono::Utc::now()))
                .transpose()?;

            let created = service
                .create_post(NewPost {
                    content,
                    media_url: media,
                    account_ids: accounts,
                    publish,
                })
                .await?;

            if let Some(at) = at {
                service.schedule(&created.post.id, at).await?;
            }
            let details = service.get_post(&created.post.id).await?;

            match created.run {
                Some(report) => {
                    print_report(&report, json)?;
                    Ok(report_exit_code(&report))
                }
                None => {
                    print_details(&details, json)?;
                    Ok(0)
                }
            }
        }
        PostCommand::List { status, limit } => {
            let status = status.as_deref().map(str::parse::<PostStatus>).transpose()?;
            let posts = service.list_posts(status, limit).await?;
            if json {
                println!("{}", to_json(&posts)?);
            } else if posts.is_empty() {
                println!("No posts");
            } else {
                for post in &posts {
                    println!("{}", post_line(post));
                }
            }
            Ok(0)
        }
        PostCommand::Show { post_id } => {
            let details = service.get_post(&post_id).await?;
            print_details(&details, json)?;
            Ok(0)
        }
        PostCommand::Edit {
            post_id,
            content,
            media,
            clear_media,
        } => {
            let post = service
                .update_post(
                    &post_id,
                    PostUpdate {
                        content,
                        media_url: media,
                        clear_media,
                    },
                )
                .await?;
            if json {
                println!("{}", to_json(&post)?);
            } else {
                println!("Updated {}", post_line(&post));
            }
            Ok(0)
        }
        PostCommand::Publish { post_id } => {
            let report = service.publish_now(&post_id).await?;
            print_report(&report, json)?;
            Ok(report_exit_code(&report))
        }
        PostCommand::Schedule { post_id, time } => {
            let at = parse_schedule(&time, chrono::Utc::now())?;
            let post = service.schedule(&post_id, at).await?;
            if json {
                println!("{}", to_json(&post)?);
            } else {
                println!("Scheduled {} for {}", post.id, at.to_rfc3339());
            }
            Ok(0)
        }
    }
}

async fn cmd_account(service: &FanoutService, command: AccountCommand, json: bool) -> Result<i32> {
    match command {
        AccountCommand::Add {
            platform,
            token,
            platform_user_id,
        } => {
            let account = service
                .add_account(&platform, &token, platform_user_id.as_deref())
                .await?;
            if json {
                println!("{}", account_json(&account));
            } else {
                println!("Added {} account {}", account.platform, account.id);
            }
            Ok(0)
        }
        AccountCommand::List => {
            let accounts = service.list_accounts().await?;
            if json {
                let list: Vec<_> = accounts.iter().map(account_json).collect();
                println!("{}", to_json(&list)?);
            } else if accounts.is_empty() {
                println!("No accounts");
            } else {
                for account in &accounts {
                    println!(
                        "{}  {:<10} {}",
                        account.id,
                        account.platform,
                        account.platform_user_id.as_deref().unwrap_or("-")
                    );
                }
            }
            Ok(0)
        }
        AccountCommand::Check { account_id } => {
            let ok = service.authenticate(&account_id).await?;
            if json {
                println!("{}", json!({"account_id": account_id, "authenticated": ok}));
            } else if ok {
                println!("{}: credentials OK", account_id);
            } else {
                println!("{}: credentials rejected or incomplete", account_id);
            }
            Ok(if ok { 0 } else { 2 })
        }
        AccountCommand::Analytics { account_id } => {
            let metrics = service.analytics(&account_id).await?;
            if json {
                println!("{}", to_json(&metrics)?);
            } else {
                for (name, value) in &metrics {
                    println!("{:<12} {}", name, value);
                }
            }
            Ok(0)
        }
    }
}

fn report_exit_code(report: &RunReport) -> i32 {
    if report.status == PostStatus::Failed {
        1
    } else {
        0
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| FanoutError::InvalidInput(format!("Could not encode output: {}", e)))
}

fn account_json(account: &PlatformAccount) -> serde_json::Value {
    json!({
        "id": account.id,
        "user_id": account.user_id,
        "platform": account.platform,
        "platform_user_id": account.platform_user_id,
        "created_at": account.created_at,
    })
}

fn post_line(post: &Post) -> String {
    let preview: String = post.content.chars().take(50).collect();
    format!("{}  {:<9} {}", post.id, post.status, preview)
}

fn print_details(details: &PostDetails, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            to_json(&json!({"post": details.post, "links": details.links}))?
        );
        return Ok(());
    }

    println!("{}", post_line(&details.post));
    if let Some(media) = &details.post.media_url {
        println!("  media: {}", media);
    }
    for link in &details.links {
        let detail = match (&link.platform_post_id, &link.error_message) {
            (_, Some(error)) if link.status == PostStatus::Failed => error.as_str(),
            (Some(id), _) => id.as_str(),
            _ => "",
        };
        println!("  {} {:<9} {}", link.account_id, link.status, detail);
    }
    Ok(())
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", to_json(report)?);
        return Ok(());
    }

    for link in &report.links {
        let platform = link.platform.as_deref().unwrap_or("?");
        match &link.result {
            LinkResult::Published { platform_post_id } => {
                println!("{}:{}", platform, platform_post_id)
            }
            LinkResult::Failed { reason } => eprintln!("{}: failed: {}", platform, reason),
            LinkResult::Skipped => println!("{}: already published", link.account_id),
        }
    }
    println!("{} {}", report.post_id, report.status);
    Ok(())
}
