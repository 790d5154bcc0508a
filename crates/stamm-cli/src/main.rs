//! `stamm` — ingest GEDCOM files and explore the resulting family tree.
//!
//! # Usage
//!
//! ```
//! stamm ingest family.ged --interactive --geocode
//! stamm conflicts --unresolved --severity error
//! stamm path @I1@ @I42@
//! stamm --db ~/genealogy/stamm.db stats
//! ```

mod config;
mod nominatim;
mod prompt;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use config::Settings;
use nominatim::Nominatim;
use prompt::Prompt;
use serde::Serialize;
use stamm_core::{
  conflict::{ConflictId, ConflictQuery, Resolution, Severity},
  kinship::TreeNode,
  location::{GeocodeStatus, LocationId},
  person::{PersonId, ProfileUpdate},
  resolve::{DecisionSource, resolve},
  store::GenealogyStore,
};
use stamm_service::{
  IngestContext, IngestOptions, IngestSource, KinshipService, geocode::GeocodeSettings, ingest,
  resolver::resolve_all, validator,
};
use stamm_store_sqlite::SqliteStore;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "stamm", author, version, about = "GEDCOM ingestion and kinship queries")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "stamm.toml", global = true)]
  config: PathBuf,

  /// SQLite database path; overrides `store_path` from the config.
  #[arg(long, env = "STAMM_DB", global = true)]
  db: Option<PathBuf>,

  /// Print results as JSON.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Parse, load, validate and resolve a GEDCOM file.
  Ingest {
    file:          PathBuf,
    /// Clear previously loaded data first.
    #[arg(long)]
    replace:       bool,
    /// Ask about each conflict instead of leaving it for review.
    #[arg(long)]
    interactive:   bool,
    /// Geocode new locations after loading.
    #[arg(long)]
    geocode:       bool,
    #[arg(long, value_name = "N")]
    geocode_limit: Option<usize>,
  },
  /// Re-run the conflict rules over every person.
  Validate,
  /// Decide unresolved conflicts, or one conflict by id.
  Resolve {
    #[arg(long)]
    interactive: bool,
    /// Resolve only this conflict.
    #[arg(long, requires = "decision")]
    conflict:    Option<ConflictId>,
    #[arg(long, value_enum)]
    decision:    Option<Decision>,
    #[arg(long)]
    notes:       Option<String>,
  },
  /// Geocode pending locations.
  Geocode {
    #[arg(long, value_name = "N")]
    limit:        Option<usize>,
    /// Reset failed locations to pending first.
    #[arg(long)]
    retry_failed: bool,
  },
  /// Conflicts, most severe first.
  Conflicts {
    #[arg(long)]
    person:     Option<String>,
    #[arg(long)]
    severity:   Option<Severity>,
    #[arg(long)]
    unresolved: bool,
    #[arg(long)]
    limit:      Option<usize>,
  },
  /// A person with their events.
  Person { person: String },
  /// Mark or clear a person's review flag.
  Review {
    person: String,
    #[arg(long)]
    clear:  bool,
  },
  /// Set a person's notes or biography.
  Profile {
    person:    String,
    #[arg(long)]
    notes:     Option<String>,
    #[arg(long)]
    biography: Option<String>,
  },
  Ancestors {
    person:      String,
    #[arg(short, long, default_value_t = 4)]
    generations: u32,
  },
  Descendants {
    person:      String,
    #[arg(short, long, default_value_t = 4)]
    generations: u32,
  },
  /// Parents, spouses, children and siblings.
  Family { person: String },
  /// Shortest relationship path between two people.
  Path { from: String, to: String },
  /// Locations, optionally by geocode status.
  Locations {
    #[arg(long, value_enum)]
    status: Option<StatusArg>,
  },
  /// Fold duplicate locations into one.
  MergeLocations {
    target:  LocationId,
    #[arg(required = true)]
    sources: Vec<LocationId>,
  },
  /// Store counts.
  Stats,
  /// Clear a stale ingest lock.
  Unlock,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Decision {
  Confirm,
  Reject,
  Review,
}

impl From<Decision> for Resolution {
  fn from(d: Decision) -> Self {
    match d {
      Decision::Confirm => Resolution::Confirmed,
      Decision::Reject => Resolution::Rejected,
      Decision::Review => Resolution::NeedsReview,
    }
  }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StatusArg {
  Pending,
  Success,
  Failed,
  Skipped,
}

impl From<StatusArg> for GeocodeStatus {
  fn from(s: StatusArg) -> Self {
    match s {
      StatusArg::Pending => GeocodeStatus::Pending,
      StatusArg::Success => GeocodeStatus::Success,
      StatusArg::Failed => GeocodeStatus::Failed,
      StatusArg::Skipped => GeocodeStatus::Skipped,
    }
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;
  let store_path = cli.db.as_deref().map(config::expand_tilde).unwrap_or_else(|| settings.store_path.clone());

  if let Some(dir) = store_path.parent().filter(|d| !d.as_os_str().is_empty()) {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let app = App { store: Arc::new(store), settings, json: cli.json };

  app.run(cli.command).await
}

// ─── Commands ─────────────────────────────────────────────────────────────────

struct App {
  store:    Arc<SqliteStore>,
  settings: Settings,
  json:     bool,
}

impl App {
  async fn run(&self, command: Command) -> Result<()> {
    match command {
      Command::Ingest { file, replace, interactive, geocode, geocode_limit } => {
        self.ingest(file, IngestOptions { replace, geocode, geocode_limit }, interactive).await
      }
      Command::Validate => self.validate().await,
      Command::Resolve { interactive, conflict, decision, notes } => match (conflict, decision) {
        (Some(id), Some(decision)) => self.resolve_one(id, decision.into(), notes).await,
        _ => self.resolve_all(interactive).await,
      },
      Command::Geocode { limit, retry_failed } => self.geocode(limit, retry_failed).await,
      Command::Conflicts { person, severity, unresolved, limit } => {
        let person_id = match person {
          Some(p) => Some(self.person_id(&p).await?),
          None => None,
        };
        let query = ConflictQuery { person_id, severity, unresolved_only: unresolved, limit };
        let conflicts = self.store.list_conflicts(&query).await?;
        if self.json {
          return print_json(&conflicts);
        }
        for c in &conflicts {
          let state = c.resolution.map_or("open", Resolution::as_str);
          println!(
            "#{:<5} {:<7} {:<24} {:<12} person {}: {}",
            c.id, c.severity, c.conflict_type, state, c.person_id, c.description
          );
        }
        Ok(())
      }
      Command::Person { person } => {
        let id = self.person_id(&person).await?;
        let person = self.store.get_person(id).await?.context("person vanished")?;
        let events = self.store.person_events(id).await?;
        print_json(&PersonDetail { person, events })
      }
      Command::Review { person, clear } => {
        let id = self.person_id(&person).await?;
        self.store.set_needs_review(id, !clear).await?;
        info!(person_id = id, needs_review = !clear, "review flag updated");
        Ok(())
      }
      Command::Profile { person, notes, biography } => {
        if notes.is_none() && biography.is_none() {
          bail!("nothing to update: pass --notes and/or --biography");
        }
        let id = self.person_id(&person).await?;
        let updated = self.store.update_profile(id, ProfileUpdate { notes, biography }).await?;
        print_json(&updated)
      }
      Command::Ancestors { person, generations } => {
        let id = self.person_id(&person).await?;
        let tree = self.kinship().ancestors(id, generations).await?;
        self.print_tree(&tree)
      }
      Command::Descendants { person, generations } => {
        let id = self.person_id(&person).await?;
        let tree = self.kinship().descendants(id, generations).await?;
        self.print_tree(&tree)
      }
      Command::Family { person } => {
        let id = self.person_id(&person).await?;
        print_json(&self.kinship().family(id).await?)
      }
      Command::Path { from, to } => {
        let (a, b) = (self.person_id(&from).await?, self.person_id(&to).await?);
        let path = self.kinship().path(a, b).await?;
        if self.json {
          return print_json(&path);
        }
        if !path.found {
          println!("no relationship path found");
          return Ok(());
        }
        let mut line = path.nodes.first().map(|n| n.name.clone()).unwrap_or_default();
        for (label, node) in path.relationship_labels.iter().zip(path.nodes.iter().skip(1)) {
          line.push_str(&format!(" → ({label:?}) {}", node.name));
        }
        println!("{line}");
        Ok(())
      }
      Command::Locations { status } => {
        print_json(&self.store.list_locations(status.map(Into::into)).await?)
      }
      Command::MergeLocations { target, sources } => {
        let merge = self.store.merge_locations(target, sources).await?;
        info!(
          target = merge.target.id,
          merged = merge.merged_count,
          events = merge.events_updated,
          "locations merged"
        );
        print_json(&merge)
      }
      Command::Stats => {
        let stats = self.store.stats().await?;
        if self.json {
          return print_json(&stats);
        }
        println!("persons:       {} ({} need review)", stats.persons, stats.persons_needing_review);
        println!("families:      {}", stats.families);
        println!("events:        {}", stats.events);
        println!(
          "locations:     {} ({} geocoded, {} pending)",
          stats.locations, stats.locations_geocoded, stats.locations_pending
        );
        println!("conflicts:     {} ({} unresolved)", stats.conflicts, stats.conflicts_unresolved);
        Ok(())
      }
      Command::Unlock => {
        match self.store.clear_ingest_lock().await? {
          Some(run_id) => info!(%run_id, "cleared ingest lock"),
          None => info!("no ingest lock was held"),
        }
        Ok(())
      }
    }
  }

  fn kinship(&self) -> KinshipService<SqliteStore> { KinshipService::new(Arc::clone(&self.store)) }

  fn geocode_settings(&self, limit: Option<usize>) -> GeocodeSettings {
    GeocodeSettings { interval: self.settings.geocode.interval(), limit }
  }

  /// A numeric row id, or an xref with or without the surrounding `@`.
  async fn person_id(&self, arg: &str) -> Result<PersonId> {
    if let Ok(id) = arg.parse::<PersonId>() {
      return Ok(id);
    }
    let xref = format!("@{}@", arg.trim_matches('@'));
    self
      .store
      .list_persons()
      .await?
      .into_iter()
      .find(|p| p.xref == xref)
      .map(|p| p.id)
      .with_context(|| format!("no person with xref {xref}"))
  }

  async fn ingest(&self, file: PathBuf, options: IngestOptions, interactive: bool) -> Result<()> {
    let bytes = tokio::fs::read(&file)
      .await
      .with_context(|| format!("failed to read {}", file.display()))?;
    let name = file.file_name().map_or_else(
      || file.display().to_string(),
      |n| n.to_string_lossy().into_owned(),
    );

    let mut prompt = interactive.then(|| Prompt::new(operator()));
    let mut ctx = IngestContext::new(Arc::clone(&self.store));
    ctx.decisions = prompt.as_mut().map(|p| p as &mut dyn DecisionSource);
    ctx.geocode = self.geocode_settings(options.geocode_limit);
    if options.geocode {
      ctx.geocoder = Some(Arc::new(Nominatim::new(&self.settings.geocode)?));
    }

    let summary = ingest(ctx, IngestSource { name, bytes }, options).await?;
    if self.json {
      return print_json(&summary);
    }
    println!(
      "run {}: {} persons, {} families, {} events, {} new locations",
      summary.run_id,
      summary.persons_loaded,
      summary.families_loaded,
      summary.load.events,
      summary.load.locations_created
    );
    println!(
      "{} conflicts ({} new), {} persons flagged; resolved: {} confirmed, {} rejected, {} for review",
      summary.conflicts_found,
      summary.validation.conflicts_new,
      summary.validation.persons_flagged,
      summary.resolution.confirmed,
      summary.resolution.rejected,
      summary.resolution.needs_review
    );
    if let Some(g) = summary.geocode {
      println!(
        "geocoded {}: {} ok, {} failed, {} skipped{}",
        g.processed,
        g.succeeded,
        g.failed,
        g.skipped,
        if g.cancelled { " (cancelled)" } else { "" }
      );
    }
    Ok(())
  }

  async fn validate(&self) -> Result<()> {
    let summary = validator::validate_all(self.store.as_ref(), validator::today()).await?;
    if self.json {
      return print_json(&summary);
    }
    println!(
      "checked {} persons: {} conflicts ({} new), {} persons flagged",
      summary.persons_checked,
      summary.conflicts_found,
      summary.conflicts_new,
      summary.persons_flagged
    );
    Ok(())
  }

  async fn resolve_all(&self, interactive: bool) -> Result<()> {
    let mut prompt = interactive.then(|| Prompt::new(operator()));
    let source = prompt.as_mut().map(|p| p as &mut dyn DecisionSource);
    let summary = resolve_all(self.store.as_ref(), source).await?;
    if self.json {
      return print_json(&summary);
    }
    println!(
      "resolved {}: {} confirmed, {} rejected, {} for review",
      summary.total(),
      summary.confirmed,
      summary.rejected,
      summary.needs_review
    );
    Ok(())
  }

  async fn resolve_one(&self, id: ConflictId, resolution: Resolution, notes: Option<String>) -> Result<()> {
    let conflict = self
      .store
      .get_conflict(id)
      .await?
      .with_context(|| format!("no conflict #{id}"))?;
    let mut resolved = resolve(&conflict, &operator(), |_| Ok(resolution));
    resolved.notes = notes;
    let updated = self.store.apply_resolution(resolved).await?;
    print_json(&updated)
  }

  async fn geocode(&self, limit: Option<usize>, retry_failed: bool) -> Result<()> {
    if retry_failed {
      let reset = self.store.retry_failed_locations().await?;
      info!(reset, "failed locations reset to pending");
    }
    let geocoder = Arc::new(Nominatim::new(&self.settings.geocode)?);
    let mut handle =
      stamm_service::geocode::spawn(Arc::clone(&self.store), geocoder, self.geocode_settings(limit));

    let mut interrupted = false;
    loop {
      tokio::select! {
        progress = handle.progress() => match progress {
          Some(p) => info!(location_id = p.location_id, outcome = ?p.outcome, "{}/{}", p.done, p.total),
          None => break,
        },
        _ = tokio::signal::ctrl_c(), if !interrupted => {
          warn!("interrupted; stopping after the current location");
          handle.cancel();
          interrupted = true;
        }
      }
    }

    let summary = handle.finish().await?;
    if self.json {
      return print_json(&summary);
    }
    println!(
      "geocoded {}: {} ok, {} failed, {} skipped{}",
      summary.processed,
      summary.succeeded,
      summary.failed,
      summary.skipped,
      if summary.cancelled { " (cancelled)" } else { "" }
    );
    Ok(())
  }

  fn print_tree(&self, tree: &TreeNode) -> Result<()> {
    if self.json {
      return print_json(tree);
    }
    print_node(tree, 0);
    Ok(())
  }
}

// ─── Output ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct PersonDetail {
  person: stamm_core::person::Person,
  events: Vec<stamm_core::event::Event>,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value).context("failed to serialise output")?);
  Ok(())
}

fn print_node(node: &TreeNode, depth: usize) {
  let marker = if node.cycle_terminus { " (cycle)" } else { "" };
  println!("{}{} [{}]{marker}", "  ".repeat(depth), node.person.name, node.person.xref);
  for branch in &node.branches {
    print_node(branch, depth + 1);
  }
}

/// Recorded as `resolved_by` for decisions made at this terminal.
fn operator() -> String {
  std::env::var("USER").map_or_else(|_| "cli".to_string(), |user| format!("cli:{user}"))
}
