//! # dotsync
//!
//! A command-line tool for keeping dotfiles in sync across machines through a Git repository.
//!
//! ## Overview
//!
//! `dotsync` tracks a chosen set of files and directories under your home directory, mirrors
//! them into a Git repository, and restores them on other machines. Each entry is stored
//! either under `shared/` (same content everywhere) or under `profiles/<profile>/` (different
//! content per machine), and a manifest committed alongside the content records a version
//! counter and content hash per entry.
//!
//! ## Key Features
//!
//! - **Content hashing**: Deterministic SHA-256 digests of files, directory trees and symlinks
//! - **Conflict detection**: Classifies every entry as clean, newer in repo, modified locally or
//!   in conflict before anything is overwritten
//! - **Device profiles**: The same path can hold per-machine content
//! - **Partial-failure tolerance**: Unreadable and special files are skipped and reported
//! - **Legacy layout migration**: Flat repositories are moved into `shared/`/`profiles/`
//!   automatically
//!
//! ## Architecture
//!
//! - Paths, entries and local settings ([`paths`], [`entry`], [`settings`], [`config`])
//! - Change detection and storage ([`hash`], [`storage`], [`manifest`], [`conflict`])
//! - Copying ([`copy`], [`engine`])
//! - Remote transport ([`scm`])
//! - Workflows ([`sync`]) and the command line front-end ([`handlers`])

/// Platform-agnostic configuration directory management for dotsync.
///
/// Provides utilities for locating the configuration file, the default local
/// clone and the log file following platform conventions (XDG on Linux,
/// Application Support on macOS, AppData on Windows).
pub mod config;

/// Local-vs-repository conflict classification.
///
/// Compares the current content hash of each entry with the hash remembered at
/// its last sync and with the manifest's version and hash.
pub mod conflict;

/// Recursive copy that recreates symlinks and skips special files.
pub mod copy;

/// Backup and restore engines streaming per-entry progress events.
pub mod engine;

/// Tracked entries, friendly names and device profile normalization.
pub mod entry;

/// Domain error types.
pub mod error;

/// Command handlers for the `dotsync` binary.
pub mod handlers;

/// Deterministic content hashing of files, directories and symlinks.
pub mod hash;

/// Logging configuration and utilities.
///
/// Sets up dual logging to both console (configurable via `RUST_LOG` environment
/// variable) and a persistent log file in the config directory. Includes automatic
/// log rotation when files exceed size limits.
pub mod logger;

/// The version manifest committed inside the sync repository.
pub mod manifest;

/// Home directory expansion and home-relative paths.
pub mod paths;

/// Git transport for the sync repository.
pub mod scm;

/// Local configuration: repository, device profile and tracked entries.
pub mod settings;

/// Storage keys and repository layout, including legacy layout migration.
pub mod storage;

/// Backup, restore, status and reset workflows.
///
/// Each workflow refreshes the local clone, consults the manifest and the
/// conflict analyzer, and only then copies anything.
pub mod sync;
