//! Subcommand handlers and the arguments they share.

pub mod filter;
pub mod import;
pub mod plan;
pub mod scopes;
pub mod show;

use anyhow::{Result, anyhow};
use clap::Args;
use rewind_core::config::{ProjectConfig, ServiceConfig};
use rewind_core::db::SqliteStore;
use rewind_core::error::ErrorCode;
use rewind_core::model::time::parse_timestamp;
use rewind_core::store::{EventStore, MemoryStore};
use rewind_core::{GroupBy, ShowError, ShowOptions, SortDir};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::output::{CliError, OutputMode, render_error};

/// What every handler gets besides its own arguments.
#[derive(Debug)]
pub struct Context {
    pub root: PathBuf,
    pub project: ProjectConfig,
    pub output: OutputMode,
}

impl Context {
    /// Report `err` in the current output mode and hand it back for `?`.
    pub fn fail(&self, code: ErrorCode, err: impl Into<anyhow::Error>) -> anyhow::Error {
        let err = err.into();
        let report = CliError::from_code(code, format!("{err:#}"));
        if let Err(render) = render_error(self.output, &report) {
            debug!(%render, "could not render error");
        }
        err
    }

    pub fn fail_show(&self, err: ShowError) -> anyhow::Error {
        self.fail(err.code(), err)
    }
}

/// Where to read events from. Falls back to `[store]` in the project config.
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Read a JSON Lines event log.
    #[arg(long, value_name = "FILE", conflicts_with = "db")]
    pub log: Option<PathBuf>,

    /// Read a SQLite store built by `rwd import`.
    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,
}

impl StoreArgs {
    pub fn open(&self, ctx: &Context) -> Result<Box<dyn EventStore>> {
        let service = ctx.project.service.clone();
        let configured = &ctx.project.store;

        let store: Box<dyn EventStore> = if let Some(log) = &self.log {
            Box::new(open_log(ctx, log, service)?)
        } else if let Some(db) = &self.db {
            Box::new(open_db(ctx, db, service)?)
        } else if let Some(db) = &configured.db {
            Box::new(open_db(ctx, &ctx.root.join(db), service)?)
        } else if let Some(log) = &configured.log {
            Box::new(open_log(ctx, &ctx.root.join(log), service)?)
        } else {
            return Err(ctx.fail(
                ErrorCode::StoreNotFound,
                anyhow!("no event store given and none configured"),
            ));
        };
        Ok(store)
    }
}

fn require(ctx: &Context, path: &Path, what: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    Err(ctx.fail(
        ErrorCode::StoreNotFound,
        anyhow!("{what} {} does not exist", path.display()),
    ))
}

fn open_log(ctx: &Context, path: &Path, service: ServiceConfig) -> Result<MemoryStore> {
    require(ctx, path, "event log")?;
    MemoryStore::load(path, service)
}

fn open_db(ctx: &Context, path: &Path, service: ServiceConfig) -> Result<SqliteStore> {
    require(ctx, path, "store database")?;
    SqliteStore::open(path, service)
}

/// Parse an `--at` value, reporting a bad one as E2003.
pub fn parse_at(ctx: &Context, at: Option<&str>) -> Result<Option<i64>> {
    at.map(parse_timestamp)
        .transpose()
        .map_err(|err| ctx.fail(ErrorCode::InvalidTimestamp, err))
}

/// Addressing path plus query options, shared by `show` and `plan`.
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Addressing path: /, /g/<graph>, /c/<collection>, /ng/<node-glob>, /n/<ids>.
    pub path: String,

    /// Point in time, RFC 3339 or unix seconds. Defaults to now.
    #[arg(long, value_name = "TIME")]
    pub at: Option<String>,

    /// Sort direction for nodes, groups, or totals.
    #[arg(long, value_name = "asc|desc")]
    pub sort: Option<SortDir>,

    /// Entries to skip after sorting; 0 skips none.
    #[arg(long, value_name = "N")]
    pub skip: Option<usize>,

    /// Entries to keep after skipping; 0 keeps all.
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Group nodes by collection name or collection type.
    #[arg(long, value_name = "collection|type")]
    pub group_by: Option<GroupBy>,

    /// Return counts instead of documents.
    #[arg(long)]
    pub counts_only: bool,

    /// Node order inside each group.
    #[arg(long, value_name = "asc|desc")]
    pub group_sort: Option<SortDir>,

    /// Nodes to skip inside each group; only applies with --group-limit.
    #[arg(long, value_name = "N")]
    pub group_skip: Option<usize>,

    /// Nodes to keep inside each group.
    #[arg(long, value_name = "N")]
    pub group_limit: Option<usize>,
}

impl QueryArgs {
    /// Build request options, taking the sort default from config.
    pub fn options(&self, ctx: &Context) -> Result<ShowOptions> {
        let timestamp = parse_at(ctx, self.at.as_deref())?;
        let group_window = self.group_skip.is_some() || self.group_limit.is_some();
        if self.group_by.is_none() && group_window {
            return Err(ctx.fail(
                ErrorCode::InvalidQueryOption,
                anyhow!("--group-skip and --group-limit need --group-by"),
            ));
        }
        if self.counts_only && (group_window || self.group_sort.is_some()) {
            debug!("group item options are ignored when counting");
        } else if self.group_skip.is_some() && self.group_limit.unwrap_or(0) == 0 {
            debug!("--group-skip has no effect without --group-limit");
        }
        Ok(ShowOptions {
            timestamp,
            sort: self.sort.or(Some(ctx.project.query.default_sort)),
            skip: self.skip,
            limit: self.limit,
            group_by: self.group_by,
            counts_only: self.counts_only,
            group_sort: self.group_sort,
            group_skip: self.group_skip,
            group_limit: self.group_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context {
            root: PathBuf::from("."),
            project: ProjectConfig::default(),
            output: OutputMode::Json,
        }
    }

    fn query(path: &str) -> QueryArgs {
        QueryArgs {
            path: path.into(),
            at: None,
            sort: None,
            skip: None,
            limit: None,
            group_by: None,
            counts_only: false,
            group_sort: None,
            group_skip: None,
            group_limit: None,
        }
    }

    #[test]
    fn config_supplies_default_sort() {
        let mut ctx = ctx();
        ctx.project.query.default_sort = SortDir::Desc;
        let opts = query("/").options(&ctx).expect("options");
        assert_eq!(opts.sort, Some(SortDir::Desc));

        let explicit = QueryArgs {
            sort: Some(SortDir::Asc),
            ..query("/")
        };
        assert_eq!(explicit.options(&ctx).expect("options").sort, Some(SortDir::Asc));
    }

    #[test]
    fn at_accepts_unix_seconds() {
        let args = QueryArgs {
            at: Some("1.5".into()),
            ..query("/")
        };
        assert_eq!(args.options(&ctx()).expect("options").timestamp, Some(1_500_000));
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let args = QueryArgs {
            at: Some("yesterday".into()),
            ..query("/")
        };
        assert!(args.options(&ctx()).is_err());
    }

    #[test]
    fn group_window_needs_group_by() {
        let args = QueryArgs {
            group_limit: Some(2),
            ..query("/")
        };
        assert!(args.options(&ctx()).is_err());
    }

    #[test]
    fn missing_store_is_reported() {
        let Err(err) = StoreArgs::default().open(&ctx()) else {
            panic!("no store configured");
        };
        assert!(err.to_string().contains("no event store"));
    }
}
