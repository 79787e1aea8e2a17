use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use dotsync::handlers;
use dotsync::logger;

#[derive(Parser)]
#[command(name = "dotsync")]
#[command(about = "Sync dotfiles across machines through a git repository", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Picks one entry when a path is tracked both shared and profile-specific
#[derive(Args)]
struct EntryScope {
    /// Use the profile-specific entry
    #[arg(long, conflicts_with = "shared")]
    profile_specific: bool,

    /// Use the shared entry
    #[arg(long)]
    shared: bool,
}

impl EntryScope {
    fn filter(&self) -> Option<bool> {
        if self.profile_specific {
            Some(true)
        } else if self.shared {
            Some(false)
        } else {
            None
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the sync repository and clone it
    Init {
        /// Remote git URL of the sync repository
        #[arg(short, long)]
        repo_url: String,

        /// Where to keep the local clone (default: inside the config directory)
        #[arg(long)]
        repo_path: Option<PathBuf>,

        /// Device profile for this machine (e.g. work, home)
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Start tracking one or more files or directories
    Add {
        /// Paths to track
        #[arg(required = true)]
        paths: Vec<String>,

        /// Store per device profile instead of shared
        #[arg(long)]
        profile_specific: bool,

        /// Display name (single path only)
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        /// Tags, comma-separated or repeated
        #[arg(short, long = "tag", value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Pick ~/.config directories to track
    Browse {
        /// Store the picked directories per device profile
        #[arg(long)]
        profile_specific: bool,

        /// Tags for every picked directory
        #[arg(short, long = "tag", value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Stop tracking an entry
    Remove {
        path: String,

        #[command(flatten)]
        scope: EntryScope,
    },

    /// Replace an entry's tags (comma-separated, empty to clear)
    Tag {
        path: String,

        tags: String,

        #[command(flatten)]
        scope: EntryScope,
    },

    /// List tracked entries
    List,

    /// Show or set the device profile
    Profile {
        /// New profile name; empty string clears it
        name: Option<String>,
    },

    /// Switch an entry between shared and profile-specific storage
    ToggleProfile {
        path: String,

        #[command(flatten)]
        scope: EntryScope,
    },

    /// Copy tracked entries into the repository and push
    Backup {
        /// Only back up these entries
        paths: Vec<String>,

        /// Back up even if the repository has newer content
        #[arg(short, long)]
        yes: bool,

        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Copy repository content back over local files
    Restore {
        /// Only restore these entries
        paths: Vec<String>,

        /// Restore even over local changes that were never backed up
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the sync state of every entry
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Reset local tracking data or wipe the remote repository
    Reset {
        /// Remove the local clone and all tracked entries
        #[arg(long, conflicts_with = "remote_wipe")]
        local: bool,

        /// Destroy all remote content and history
        #[arg(long)]
        remote_wipe: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    if let Err(e) = logger::init_logger() {
        eprintln!("Warning: could not initialize file logging: {:#}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            repo_url,
            repo_path,
            profile,
        } => {
            handlers::handle_init(&repo_url, repo_path, profile.as_deref())?;
        }
        Commands::Add {
            paths,
            profile_specific,
            name,
            description,
            tags,
        } => {
            handlers::handle_add(
                &paths,
                profile_specific,
                name.as_deref(),
                description.as_deref(),
                &tags,
            )?;
        }
        Commands::Browse {
            profile_specific,
            tags,
        } => {
            handlers::handle_browse(profile_specific, &tags)?;
        }
        Commands::Remove { path, scope } => {
            handlers::handle_remove(&path, scope.filter())?;
        }
        Commands::Tag { path, tags, scope } => {
            handlers::handle_tag(&path, &tags, scope.filter())?;
        }
        Commands::List => {
            handlers::handle_list()?;
        }
        Commands::Profile { name } => {
            handlers::handle_profile(name.as_deref())?;
        }
        Commands::ToggleProfile { path, scope } => {
            handlers::handle_toggle_profile(&path, scope.filter())?;
        }
        Commands::Backup {
            paths,
            yes,
            message,
        } => {
            handlers::handle_backup(&paths, yes, message.as_deref())?;
        }
        Commands::Restore { paths, yes } => {
            handlers::handle_restore(&paths, yes)?;
        }
        Commands::Status { json } => {
            handlers::handle_status(json)?;
        }
        Commands::Reset {
            local,
            remote_wipe,
            yes,
        } => {
            handlers::handle_reset(local, remote_wipe, yes)?;
        }
    }

    Ok(())
}
