//! `inboxkit` - command-line triage for an IMAP inbox.
//!
//! Lists, fetches, trashes and archives INBOX messages through the
//! `inboxkit-imap` engine.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod account;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inboxkit_imap::{Session, Uid};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use account::Account;

#[derive(Debug, Parser)]
#[command(name = "inboxkit", version, about = "Triage an IMAP inbox from the terminal")]
struct Cli {
    /// Path to the JSON account file.
    #[arg(short, long, env = "INBOXKIT_ACCOUNT", default_value = "account.json")]
    account: PathBuf,

    /// App password for the account.
    #[arg(long, env = "INBOXKIT_PASSWORD", hide_env_values = true)]
    password: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List INBOX UIDs, newest first.
    List {
        /// Maximum number of UIDs to print.
        #[arg(long, default_value_t = 20)]
        max: usize,
        /// Number of newest UIDs to skip.
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Print a JSON array instead of one UID per line.
        #[arg(long)]
        json: bool,
    },
    /// Fetch a message's raw RFC 822 bytes.
    Fetch {
        /// Message UID.
        uid: Uid,
        /// Write the message here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete a message from INBOX.
    Trash {
        /// Message UID.
        uid: Uid,
    },
    /// Move a message to an archive mailbox.
    Archive {
        /// Message UID.
        uid: Uid,
        /// Candidate mailbox; repeat to try several in order.
        #[arg(long = "mailbox")]
        mailboxes: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inboxkit=info,inboxkit_imap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let account = Account::load(&cli.account)?;

    let session = Session::new(account.provider_config(), account.credentials(&cli.password));
    session
        .connect()
        .await
        .with_context(|| format!("connecting to {}", account.host))?;
    info!(
        host = %session.config().host,
        provider = ?session.provider(),
        greeting = session.greeting().unwrap_or_default(),
        "connected"
    );

    let result = run(&session, &account, cli.command).await;
    session.disconnect().await;
    result
}

async fn run(session: &Session, account: &Account, command: Command) -> Result<()> {
    match command {
        Command::List { max, offset, json } => {
            let uids = session.fetch_inbox_uids(max, offset).await?;
            let mut stdout = std::io::stdout().lock();
            if json {
                let values: Vec<u32> = uids.iter().map(|uid| uid.get()).collect();
                serde_json::to_writer(&mut stdout, &values)?;
                writeln!(stdout)?;
            } else {
                for uid in uids {
                    writeln!(stdout, "{uid}")?;
                }
            }
        }

        Command::Fetch { uid, out } => {
            let message = session
                .fetch_message(uid)
                .await
                .with_context(|| format!("fetching UID {uid}"))?;
            info!(
                %uid,
                size = message.size(),
                flags = ?message.flags,
                date = ?message.internal_date,
                "fetched"
            );
            match out {
                Some(path) => std::fs::write(&path, &message.raw)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => std::io::stdout().lock().write_all(&message.raw)?,
            }
        }

        Command::Trash { uid } => match session.trash_message(uid).await {
            Ok(()) => println!("trashed {uid}"),
            Err(e) if e.is_not_found() => println!("{uid} already gone"),
            Err(e) => return Err(e).with_context(|| format!("trashing UID {uid}")),
        },

        Command::Archive { uid, mailboxes } => {
            let candidates = if mailboxes.is_empty() {
                account.archive.clone()
            } else {
                mailboxes
            };
            if candidates.is_empty() {
                session.archive_message_default(uid).await
            } else {
                session.archive_message(uid, &candidates).await
            }
            .with_context(|| format!("archiving UID {uid}"))?;
            println!("archived {uid}");
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_archive_with_mailboxes() {
        let cli = Cli::try_parse_from([
            "inboxkit",
            "--password",
            "pw",
            "archive",
            "7",
            "--mailbox",
            "Archive",
            "--mailbox",
            "Old",
        ])
        .unwrap();
        match cli.command {
            Command::Archive { uid, mailboxes } => {
                assert_eq!(uid.get(), 7);
                assert_eq!(mailboxes, vec!["Archive", "Old"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_uid_argument_is_validated() {
        assert!(Cli::try_parse_from(["inboxkit", "--password", "pw", "trash", "0"]).is_err());
        assert!(Cli::try_parse_from(["inboxkit", "--password", "pw", "trash", "1 2"]).is_err());
    }

    #[test]
    fn test_list_defaults() {
        let cli = Cli::try_parse_from(["inboxkit", "--password", "pw", "list"]).unwrap();
        match cli.command {
            Command::List { max, offset, json } => {
                assert_eq!((max, offset, json), (20, 0, false));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
