//! Logging setup for the ferry binary.
//!
//! Configuration comes from the environment:
//!
//! - `RUST_LOG` / `LOG_LEVEL`: filter directives (default supplied by the caller)
//! - `LOG_OUTPUT`: `console`, `file` or `both`
//! - `LOG_FORMAT`: `human` or `json`
//! - `LOG_FILE_PATH`: file sink location, rotated daily
//! - `LOG_REPOS`: comma-separated repository names; only events emitted while
//!   syncing one of them are shown

use std::{
    collections::HashMap,
    env,
    io::{self, Write},
    path::Path,
};
use tracing::{field::Visit, span, subscriber::Interest, Metadata, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{writer::BoxMakeWriter, MakeWriter},
    layer::{Context, Layer},
    prelude::*,
    registry::LookupSpan,
    EnvFilter,
};

/// Span field carrying the repository name.
pub const REPO_FIELD: &str = "repo";

const DEFAULT_LOG_FILE: &str = "./logs/ferry.log";

// --- Console + file writer ---
struct Tee<A, B> {
    a: A,
    b: B,
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let res_a = self.a.write(buf);
        let res_b = self.b.write(buf);
        res_a.or(res_b)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.a.flush()?;
        self.b.flush()
    }
}

#[derive(Clone)]
struct MakeTee<A, B> {
    make_a: A,
    make_b: B,
}

impl<'a, A, B> MakeWriter<'a> for MakeTee<A, B>
where
    A: MakeWriter<'a>,
    B: MakeWriter<'a>,
{
    type Writer = Tee<A::Writer, B::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        Tee {
            a: self.make_a.make_writer(),
            b: self.make_b.make_writer(),
        }
    }
}

// --- Repository scoping ---
struct RepoFilterLayer {
    repos: Vec<String>,
}

impl RepoFilterLayer {
    fn from_list(list: &str) -> Self {
        let repos = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self { repos }
    }
}

impl<S> Layer<S> for RepoFilterLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn register_callsite(&self, _meta: &'static Metadata<'static>) -> Interest {
        if self.repos.is_empty() {
            Interest::always()
        } else {
            // Depends on the current span, so it must be decided per event.
            Interest::sometimes()
        }
    }

    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = HashMap::new();
        attrs.record(&mut FieldVisitor(&mut fields));
        span.extensions_mut().insert(fields);
    }

    fn enabled(&self, meta: &Metadata<'_>, ctx: Context<'_, S>) -> bool {
        if self.repos.is_empty() || meta.is_span() {
            return true;
        }

        let Some(scope) = ctx.current_span().id().and_then(|id| ctx.span_scope(id)) else {
            return false;
        };

        scope.into_iter().any(|span_ref| {
            span_ref
                .extensions()
                .get::<HashMap<String, String>>()
                .and_then(|fields| fields.get(REPO_FIELD))
                .is_some_and(|repo| self.repos.iter().any(|wanted| wanted == repo))
        })
    }
}

struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0
            .entry(field.name().to_string())
            .or_insert_with(|| format!("{value:?}").trim_matches('"').to_string());
    }
}

/// Initializes the global tracing subscriber.
///
/// `default_level` applies when neither `RUST_LOG` nor `LOG_LEVEL` is set. The
/// returned guard must be kept alive for the file sink to flush.
pub fn init_subscriber(default_level: &str) -> Option<WorkerGuard> {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| default_level.to_string());
    let log_output = env::var("LOG_OUTPUT").unwrap_or_else(|_| "console".to_string());
    let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "human".to_string());
    let log_repos = env::var("LOG_REPOS").unwrap_or_default();
    let log_file_path =
        env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());

    let mut env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));
    for noisy in ["hyper=warn", "reqwest=warn", "rustls=warn"] {
        if let Ok(directive) = noisy.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    let use_console = log_output == "console" || log_output == "both";
    let use_file = log_output == "file" || log_output == "both";

    let mut guard = None;
    let mut file_writer = || {
        let log_path = Path::new(&log_file_path);
        let log_dir = log_path.parent().unwrap_or_else(|| Path::new("."));
        let log_filename = log_path.file_name().unwrap_or("ferry.log".as_ref());
        let appender = tracing_appender::rolling::daily(log_dir, log_filename);
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(appender);
        guard = Some(worker_guard);
        non_blocking
    };

    let writer = match (use_console, use_file) {
        (true, true) => BoxMakeWriter::new(MakeTee {
            make_a: io::stdout,
            make_b: file_writer(),
        }),
        (false, true) => BoxMakeWriter::new(file_writer()),
        _ => BoxMakeWriter::new(io::stdout),
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(false);
    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(RepoFilterLayer::from_list(&log_repos));

    // A subscriber may already be installed (tests); keep the existing one.
    let _ = if log_format == "json" {
        subscriber.with(fmt_layer.json()).try_init()
    } else {
        subscriber.with(fmt_layer).try_init()
    };

    guard
}
