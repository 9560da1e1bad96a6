// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod fields;
mod render;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use fields::{FieldArg, apply_fields, field_names};
use freeflow_app::{
    Article, ArticleFormInput, ArticleId, DashboardController, DashboardRuntime, FormKind,
    FormPayload, Invoice, InvoiceFormInput, InvoiceId, Mutation, PageKind, Record, RecordRef,
    Skill, SkillFormInput, SortKey, StatusFilter, StatusKind, ViewCommand, ViewEvent, ViewParams,
    ViewSession,
};
use freeflow_db::Store;
use freeflow_db::validation::{
    ValidationResult, parse_count, parse_optional_cents, parse_optional_count, parse_required_date,
};
use freeflow_testkit::Faker;
use render::{ExportFormat, TableRecord, render_export, render_json, render_text};
use runtime::DbRuntime;
use serde::Serialize;
use std::env;
use std::path::PathBuf;
use time::{Date, OffsetDateTime};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_DEMO_SEED: u64 = 1;
/// About a century. Longer windows should name their dates.
const MAX_WINDOW_DAYS: i64 = 36_600;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `freeflow --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;
    init_tracing(config.log_filter());

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or {}",
            db_path.display(),
            freeflow_db::DB_PATH_ENV
        )
    })?;
    store.bootstrap()?;
    if options.demo {
        let summary = store.seed_demo(&mut Faker::new(options.seed))?;
        info!(
            invoices = summary.invoices,
            articles = summary.articles,
            skills = summary.skills,
            seed = options.seed,
            "seeded demo data"
        );
    }
    if options.check_only {
        return Ok(());
    }

    let page = options
        .page
        .or_else(|| {
            options
                .mutation
                .as_ref()
                .and_then(|arg| arg.flag.implied_page())
        })
        .unwrap_or_else(|| config.default_page());
    let action = Action::from_options(&options, page)?;

    let mut controller = DashboardController::new(DbRuntime::new(&store));
    let today = OffsetDateTime::now_utc().date();
    let output = match page {
        PageKind::Invoices => {
            show_page::<Invoice, _>(&mut controller, &options, action, &config, today)?
        }
        PageKind::Articles => {
            show_page::<Article, _>(&mut controller, &options, action, &config, today)?
        }
        PageKind::Skills => {
            show_page::<Skill, _>(&mut controller, &options, action, &config, today)?
        }
    };
    print!("{output}");
    Ok(())
}

/// Console output goes to stdout, so logs are pinned to stderr.
fn init_tracing(config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_env("FREEFLOW_LOG").unwrap_or_else(|_| match config_filter {
        Some(filter) => EnvFilter::new(filter),
        None if env::var("DEBUG").is_ok() => EnvFilter::new("freeflow=debug,info"),
        None => EnvFilter::new("freeflow=info,warn"),
    });
    let format = env::var("FREEFLOW_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
    }
}

/// A record kind the binary can show: its session slot on the controller,
/// the form that edits it, and how its measure column is typed on the
/// command line.
trait PageRecord: TableRecord
where
    Self::Stats: Serialize,
{
    const FORM: FormKind;

    fn session<RT: DashboardRuntime>(
        controller: &mut DashboardController<RT>,
    ) -> &mut ViewSession<Self>;

    fn edit_form(&self) -> FormPayload;

    fn parse_measure(raw: &str) -> ValidationResult<Option<i64>> {
        parse_optional_count(raw)
    }

    fn measure_hint() -> &'static str {
        "a whole number"
    }
}

impl PageRecord for Invoice {
    const FORM: FormKind = FormKind::Invoice;

    fn session<RT: DashboardRuntime>(
        controller: &mut DashboardController<RT>,
    ) -> &mut ViewSession<Self> {
        &mut controller.invoices
    }

    fn edit_form(&self) -> FormPayload {
        FormPayload::Invoice(InvoiceFormInput::from(self))
    }

    fn parse_measure(raw: &str) -> ValidationResult<Option<i64>> {
        parse_optional_cents(raw)
    }

    fn measure_hint() -> &'static str {
        "an amount like 1250.00"
    }
}

impl PageRecord for Article {
    const FORM: FormKind = FormKind::Article;

    fn session<RT: DashboardRuntime>(
        controller: &mut DashboardController<RT>,
    ) -> &mut ViewSession<Self> {
        &mut controller.articles
    }

    fn edit_form(&self) -> FormPayload {
        FormPayload::Article(ArticleFormInput::from(self))
    }

    fn measure_hint() -> &'static str {
        "a view count"
    }
}

impl PageRecord for Skill {
    const FORM: FormKind = FormKind::Skill;

    fn session<RT: DashboardRuntime>(
        controller: &mut DashboardController<RT>,
    ) -> &mut ViewSession<Self> {
        &mut controller.skills
    }

    fn edit_form(&self) -> FormPayload {
        FormPayload::Skill(SkillFormInput::from(self))
    }

    fn measure_hint() -> &'static str {
        "an endorsement count"
    }
}

/// What one run does before rendering the page.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Show,
    Apply(Vec<Mutation>),
    Create(Vec<FieldArg>),
    Edit(i64, Vec<FieldArg>),
}

impl Action {
    fn from_options(options: &CliOptions, page: PageKind) -> Result<Self> {
        if let Some(arg) = &options.mutation {
            return arg.resolve(page).map(Self::Apply);
        }
        Ok(match options.form {
            Some(FormTarget::New) => Self::Create(options.fields.clone()),
            Some(FormTarget::Edit(id)) => Self::Edit(id, options.fields.clone()),
            None => Self::Show,
        })
    }
}

fn show_page<R, RT>(
    controller: &mut DashboardController<RT>,
    options: &CliOptions,
    action: Action,
    config: &Config,
    today: Date,
) -> Result<String>
where
    R: PageRecord,
    R::Stats: Serialize,
    RT: DashboardRuntime,
{
    let session = R::session(controller);
    configure_session(session, &options.filters, config.default_sort(), today)?;
    if options.deleted {
        session.dispatch(ViewCommand::ToggleDeleted);
    }

    // A successful change refetches on its own.
    let events = match action {
        Action::Show => controller.refresh(R::PAGE),
        Action::Apply(mutations) => match mutations.as_slice() {
            [single] => controller.apply(*single),
            batch => controller.apply_batch(R::PAGE, batch),
        },
        Action::Create(fields) => {
            let mut payload = FormPayload::blank_for(R::FORM);
            apply_fields(&mut payload, &fields)?;
            controller.submit(&payload)
        }
        Action::Edit(id, fields) => {
            check_events(controller.refresh(R::PAGE))?;
            let payload = {
                let record = R::session(controller)
                    .records()
                    .iter()
                    .find(|record| record.record_id() == id && !record.is_deleted())
                    .ok_or_else(|| {
                        anyhow!(
                            "no live {} with id {id} -- list the page to find one, or --restore it first",
                            R::PAGE.as_str().trim_end_matches('s')
                        )
                    })?;
                let mut payload = record.edit_form();
                apply_fields(&mut payload, &fields)?;
                payload
            };
            controller.edit(RecordRef::for_page(R::PAGE, id), &payload)
        }
    };
    check_events(events)?;

    let session = &*R::session(controller);
    let view = session.derived();
    if let Some(format) = options.export {
        render_export(&view, format)
    } else if options.json {
        let mut json = render_json(&view, session.notice())?;
        json.push('\n');
        Ok(json)
    } else {
        Ok(render_text(&view, session.notice(), config.page_size()))
    }
}

fn check_events(events: Vec<ViewEvent>) -> Result<()> {
    for event in events {
        match event {
            ViewEvent::FetchFailed(message)
            | ViewEvent::MutationFailed(message)
            | ViewEvent::MutationRejected(message)
            | ViewEvent::ValidationFailed(message) => bail!(message),
            _ => {}
        }
    }
    Ok(())
}

/// Translate raw filter flags into view commands for one page.
fn configure_session<R>(
    session: &mut ViewSession<R>,
    filters: &FilterArgs,
    default_sort: SortKey,
    today: Date,
) -> Result<()>
where
    R: PageRecord,
    R::Stats: Serialize,
{
    let page = R::PAGE.as_str();

    if let Some(query) = &filters.query {
        session.dispatch(ViewCommand::SetQuery(query.clone()));
    }

    if let Some(raw) = &filters.status {
        let status = StatusFilter::<R::Status>::parse(raw).ok_or_else(|| {
            let known: Vec<&str> = <R::Status as StatusKind>::ALL
                .iter()
                .map(|status| status.as_str())
                .collect();
            anyhow!(
                "unknown {page} status {raw:?}; use all, {}",
                known.join(", ")
            )
        })?;
        session.dispatch(ViewCommand::SetStatus(status));
    }

    if filters.min.is_some() || filters.max.is_some() {
        let parse = |flag: &str, raw: &Option<String>| -> Result<Option<i64>> {
            let Some(raw) = raw else {
                return Ok(None);
            };
            R::parse_measure(raw).with_context(|| {
                format!("{flag} {raw:?} for {page} -- pass {}", R::measure_hint())
            })
        };
        let min = parse("--min", &filters.min)?;
        let max = parse("--max", &filters.max)?;
        session.dispatch(ViewCommand::SetMeasureRange { min, max });
    }

    if let Some(party) = &filters.party {
        session.dispatch(ViewCommand::SetParty(R::party_filter(party.clone())));
    }

    if let Some(raw) = &filters.within_days {
        if filters.from.is_some() || filters.to.is_some() {
            bail!("--within-days cannot be combined with --from/--to -- pick one date filter");
        }
        let days = parse_count(raw)
            .with_context(|| format!("--within-days {raw:?} -- pass a whole number of days"))?;
        if days > MAX_WINDOW_DAYS {
            bail!(
                "--within-days {days} is longer than {MAX_WINDOW_DAYS} days -- use --from/--to for older records"
            );
        }
        let window = ViewParams::<R::Status>::default().within_days(today, days);
        session.dispatch(ViewCommand::SetDateRange {
            from: window.date_from,
            to: window.date_to,
        });
    } else if filters.from.is_some() || filters.to.is_some() {
        let parse = |flag: &str, raw: &Option<String>| -> Result<Option<Date>> {
            raw.as_deref()
                .map(|raw| {
                    parse_required_date(raw).with_context(|| format!("{flag} {raw:?}"))
                })
                .transpose()
        };
        let from = parse("--from", &filters.from)?;
        let to = parse("--to", &filters.to)?;
        session.dispatch(ViewCommand::SetDateRange { from, to });
    }

    let sort = match &filters.sort {
        Some(raw) => SortKey::parse(raw)
            .ok_or_else(|| anyhow!("unknown sort {raw:?}; use date, amount, name, or status"))?,
        None => default_sort,
    };
    session.dispatch(ViewCommand::SetSort(sort));
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FilterArgs {
    query: Option<String>,
    status: Option<String>,
    min: Option<String>,
    max: Option<String>,
    party: Option<String>,
    from: Option<String>,
    to: Option<String>,
    within_days: Option<String>,
    sort: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MutationFlag {
    MarkPaid,
    Send,
    Void,
    Duplicate,
    Remind,
    Delete,
    Restore,
    Helpful,
    NotHelpful,
}

impl MutationFlag {
    fn parse(flag: &str) -> Option<Self> {
        Some(match flag {
            "--mark-paid" => Self::MarkPaid,
            "--send" => Self::Send,
            "--void" => Self::Void,
            "--duplicate" => Self::Duplicate,
            "--remind" => Self::Remind,
            "--delete" => Self::Delete,
            "--restore" => Self::Restore,
            "--helpful" => Self::Helpful,
            "--not-helpful" => Self::NotHelpful,
            _ => return None,
        })
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::MarkPaid => "--mark-paid",
            Self::Send => "--send",
            Self::Void => "--void",
            Self::Duplicate => "--duplicate",
            Self::Remind => "--remind",
            Self::Delete => "--delete",
            Self::Restore => "--restore",
            Self::Helpful => "--helpful",
            Self::NotHelpful => "--not-helpful",
        }
    }

    fn implied_page(self) -> Option<PageKind> {
        match self {
            Self::MarkPaid | Self::Send | Self::Void | Self::Duplicate | Self::Remind => {
                Some(PageKind::Invoices)
            }
            Self::Helpful | Self::NotHelpful => Some(PageKind::Articles),
            Self::Delete | Self::Restore => None,
        }
    }

    fn build(self, page: PageKind, id: i64) -> Mutation {
        match self {
            Self::MarkPaid => Mutation::mark_paid(InvoiceId::new(id)),
            Self::Send => Mutation::send(InvoiceId::new(id)),
            Self::Void => Mutation::void(InvoiceId::new(id)),
            Self::Duplicate => Mutation::DuplicateInvoice(InvoiceId::new(id)),
            Self::Remind => Mutation::SendReminder(InvoiceId::new(id)),
            Self::Delete => Mutation::SoftDelete(RecordRef::for_page(page, id)),
            Self::Restore => Mutation::Restore(RecordRef::for_page(page, id)),
            Self::Helpful => Mutation::ArticleFeedback {
                id: ArticleId::new(id),
                helpful: true,
            },
            Self::NotHelpful => Mutation::ArticleFeedback {
                id: ArticleId::new(id),
                helpful: false,
            },
        }
    }
}

/// One change flag and the ids it applies to, in the order given.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MutationArg {
    flag: MutationFlag,
    ids: Vec<i64>,
}

impl MutationArg {
    fn parse(flag: MutationFlag, raw: &str) -> Result<Self> {
        let ids = raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<i64>().map_err(|_| {
                    anyhow!(
                        "{} needs numeric record ids like 4 or 4,7,9, got {part:?}",
                        flag.as_str()
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if ids.is_empty() {
            bail!("{} needs at least one record id", flag.as_str());
        }
        Ok(Self { flag, ids })
    }

    fn resolve(&self, page: PageKind) -> Result<Vec<Mutation>> {
        if let Some(implied) = self.flag.implied_page()
            && implied != page
        {
            bail!(
                "{} applies to {} -- drop the {} page argument and retry",
                self.flag.as_str(),
                implied.as_str(),
                page.as_str()
            );
        }
        Ok(self
            .ids
            .iter()
            .map(|id| self.flag.build(page, *id))
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormTarget {
    New,
    Edit(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    page: Option<PageKind>,
    filters: FilterArgs,
    mutation: Option<MutationArg>,
    form: Option<FormTarget>,
    fields: Vec<FieldArg>,
    json: bool,
    export: Option<ExportFormat>,
    deleted: bool,
    demo: bool,
    seed: u64,
    print_config_path: bool,
    print_db_path: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        page: None,
        filters: FilterArgs::default(),
        mutation: None,
        form: None,
        fields: Vec::new(),
        json: false,
        export: None,
        deleted: false,
        demo: false,
        seed: DEFAULT_DEMO_SEED,
        print_config_path: false,
        print_db_path: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(raw_arg) = iter.next() {
        let arg = raw_arg.as_ref();

        if let Some(flag) = MutationFlag::parse(arg) {
            let raw = take_value(&mut iter, arg, "record ids")?;
            if let Some(previous) = &options.mutation {
                bail!(
                    "{} and {arg} both given -- apply one kind of change per run",
                    previous.flag.as_str()
                );
            }
            options.mutation = Some(MutationArg::parse(flag, &raw)?);
            continue;
        }

        match arg {
            "--config" => {
                options.config_path = PathBuf::from(take_value(&mut iter, arg, "a file path")?);
            }
            "--query" => options.filters.query = Some(take_value(&mut iter, arg, "search text")?),
            "--status" => options.filters.status = Some(take_value(&mut iter, arg, "a status")?),
            "--min" => options.filters.min = Some(take_value(&mut iter, arg, "a value")?),
            "--max" => options.filters.max = Some(take_value(&mut iter, arg, "a value")?),
            "--party" => {
                options.filters.party = Some(take_value(&mut iter, arg, "a client or category")?);
            }
            "--from" => options.filters.from = Some(take_value(&mut iter, arg, "a YYYY-MM-DD date")?),
            "--to" => options.filters.to = Some(take_value(&mut iter, arg, "a YYYY-MM-DD date")?),
            "--within-days" => {
                options.filters.within_days = Some(take_value(&mut iter, arg, "a day count")?);
            }
            "--sort" => options.filters.sort = Some(take_value(&mut iter, arg, "a sort key")?),
            "--seed" => {
                let raw = take_value(&mut iter, arg, "a number")?;
                options.seed = raw
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("--seed needs a whole number, got {raw:?}"))?;
            }
            "--new" => set_form(&mut options.form, FormTarget::New)?,
            "--edit" => {
                let raw = take_value(&mut iter, arg, "a record id")?;
                let id = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| anyhow!("--edit needs a numeric record id, got {raw:?}"))?;
                set_form(&mut options.form, FormTarget::Edit(id))?;
            }
            "--set" => {
                let raw = take_value(&mut iter, arg, "a key=value pair")?;
                options.fields.push(FieldArg::parse(&raw)?);
            }
            "--export" => {
                let raw = take_value(&mut iter, arg, "csv or json")?;
                let format = ExportFormat::parse(&raw)
                    .ok_or_else(|| anyhow!("--export {raw:?} is not a format; use csv or json"))?;
                options.export = Some(format);
            }
            "--json" => options.json = true,
            "--deleted" => options.deleted = true,
            "--print-config-path" => options.print_config_path = true,
            "--print-path" => options.print_db_path = true,
            "--print-example-config" => options.print_example = true,
            "--demo" => options.demo = true,
            "--check" => options.check_only = true,
            "--help" | "-h" => options.show_help = true,
            unknown if unknown.starts_with('-') => {
                bail!("unknown argument {unknown:?}; run with --help to see supported options");
            }
            positional => {
                let page = PageKind::parse(positional).ok_or_else(|| {
                    anyhow!("unknown page {positional:?}; use invoices, articles, or skills")
                })?;
                if let Some(previous) = options.page {
                    bail!(
                        "page given twice ({} and {}) -- pass one page",
                        previous.as_str(),
                        page.as_str()
                    );
                }
                options.page = Some(page);
            }
        }
    }

    if options.json && options.export.is_some() {
        bail!("--json and --export both given -- --json prints the page, --export only its rows");
    }
    if options.form.is_some() && options.mutation.is_some() {
        bail!("a form and a change flag both given -- save the form and apply the change in separate runs");
    }
    if options.form.is_none() && !options.fields.is_empty() {
        bail!("--set needs --new or --edit <id> to say which record it fills");
    }
    Ok(options)
}

fn set_form(slot: &mut Option<FormTarget>, target: FormTarget) -> Result<()> {
    if slot.is_some() {
        bail!("--new and --edit given together or twice -- save one record per run");
    }
    *slot = Some(target);
    Ok(())
}

fn take_value<I, S>(iter: &mut I, flag: &str, what: &str) -> Result<String>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    iter.next()
        .map(|value| value.as_ref().to_owned())
        .ok_or_else(|| anyhow!("{flag} requires {what}"))
}

fn print_help() {
    println!("freeflow [options] [invoices|articles|skills]");
    println!();
    println!("Filters:");
    println!("  --query <text>           Match title, description, or tags (case-insensitive)");
    println!("  --status <status|all>    Keep one status or level");
    println!("  --min <value>            Lower bound on amount, views, or endorsements");
    println!("  --max <value>            Upper bound on amount, views, or endorsements");
    println!("  --party <text>           Client (substring) or category (exact)");
    println!("  --from <YYYY-MM-DD>      Earliest date, inclusive");
    println!("  --to <YYYY-MM-DD>        Latest date, inclusive");
    println!("  --within-days <n>        Only the last n days (at most {MAX_WINDOW_DAYS})");
    println!("  --sort <key>             date, amount, name, or status");
    println!();
    println!("Changes (each takes one id or a comma-separated list):");
    println!("  --mark-paid <ids>        Mark invoices paid");
    println!("  --send <ids>             Mark invoices sent");
    println!("  --void <ids>             Cancel invoices");
    println!("  --duplicate <ids>        Copy invoices as new drafts");
    println!("  --remind <ids>           Send payment reminders for unpaid invoices");
    println!("  --delete <ids>           Soft-delete records on the chosen page");
    println!("  --restore <ids>          Restore soft-deleted records");
    println!("  --helpful <ids>          Rate articles helpful");
    println!("  --not-helpful <ids>      Rate articles not helpful");
    println!();
    println!("Forms:");
    println!("  --new                    Create a record on the chosen page");
    println!("  --edit <id>              Edit an existing record");
    println!("  --set <key=value>        Fill one field; repeat for more");
    for kind in [FormKind::Invoice, FormKind::Article, FormKind::Skill] {
        println!(
            "    {:<23}{}",
            format!("{} fields:", kind.page().as_str()),
            field_names(kind).join(", ")
        );
    }
    println!();
    println!("Output and setup:");
    println!("  --json                   Print the view as JSON");
    println!("  --export <csv|json>      Print only the filtered rows, for spreadsheets");
    println!("  --deleted                Include soft-deleted records");
    println!("  --demo                   Use an in-memory database with seeded demo data");
    println!("  --seed <n>               Demo data seed (default {DEFAULT_DEMO_SEED})");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --check                  Validate config and database, then exit");
    println!("  --help                   Show this help");
}
