use crate::{
    app::App,
    bepinex::{self, RuntimeStatus},
    browse::{self, ListingQuery, Ordering, Section},
    clone,
    installer::InstallReport,
    mod_id::{ModIdentity, VersionedMod},
    profile,
};
use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
    Debug,
}

impl Verbosity {
    /// Log filter used when `RUST_LOG` is unset.
    pub fn filter(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn,lethalkit=info",
            Verbosity::Verbose => "warn,lethalkit=debug",
            Verbosity::Debug => "debug",
        }
    }
}

#[derive(Debug, Default)]
struct GlobalOptions {
    format: Option<OutputFormat>,
    profile: Option<String>,
    base: Option<PathBuf>,
    verbosity: Verbosity,
}

#[derive(Debug)]
pub struct Invocation {
    command: CliCommand,
    global: GlobalOptions,
}

impl Invocation {
    pub fn verbosity(&self) -> Verbosity {
        self.global.verbosity
    }

    fn format(&self) -> OutputFormat {
        self.global.format.unwrap_or(OutputFormat::Text)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    Install(ModIdentity),
    Remove(VersionedMod),
    List,
    Outdated,
    Update,
    Profiles(ProfilesCommand),
    Runtime(RuntimeCommand),
    Clone,
    Launch,
    Browse(ListingQuery),
    Init,
    Paths,
    Help,
    Version,
}

#[derive(Debug, PartialEq, Eq)]
enum ProfilesCommand {
    List,
    Create(String),
    Delete(String),
    Use(String),
    Rename(String, String),
}

#[derive(Debug, PartialEq, Eq)]
enum RuntimeCommand {
    Status,
    Update,
}

pub fn parse_args(args: &[String]) -> Result<Invocation> {
    let (global, tokens) = parse_global_options(args)?;
    let command = parse_command(&tokens)?;
    Ok(Invocation { command, global })
}

fn parse_global_options(args: &[String]) -> Result<(GlobalOptions, Vec<String>)> {
    let mut global = GlobalOptions::default();
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--format=") {
            global.format = Some(parse_format(value)?);
            continue;
        }
        if let Some(value) = arg.strip_prefix("--profile=") {
            global.profile = Some(value.to_string());
            continue;
        }
        if let Some(value) = arg.strip_prefix("--base=") {
            global.base = Some(PathBuf::from(value));
            continue;
        }
        match arg.as_str() {
            "--format" => {
                let value = iter.next().ok_or_else(|| anyhow!("--format requires a value"))?;
                global.format = Some(parse_format(value)?);
            }
            "--profile" => {
                let value = iter.next().ok_or_else(|| anyhow!("--profile requires a name"))?;
                global.profile = Some(value.to_string());
            }
            "--base" => {
                let value = iter.next().ok_or_else(|| anyhow!("--base requires a path"))?;
                global.base = Some(PathBuf::from(value));
            }
            "-q" | "--quiet" => global.verbosity = Verbosity::Quiet,
            "--verbose" => global.verbosity = Verbosity::Verbose,
            _ if is_verbose_flag(arg) => {
                let count = arg.chars().filter(|ch| *ch == 'v').count();
                global.verbosity = if count >= 2 {
                    Verbosity::Debug
                } else {
                    Verbosity::Verbose
                };
            }
            _ => tokens.push(arg.to_string()),
        }
    }
    Ok((global, tokens))
}

fn is_verbose_flag(arg: &str) -> bool {
    arg.len() > 1
        && arg.starts_with('-')
        && !arg.starts_with("--")
        && arg[1..].chars().all(|ch| ch == 'v')
}

fn parse_format(value: &str) -> Result<OutputFormat> {
    OutputFormat::parse(value).ok_or_else(|| anyhow!("Unknown format: {value} (use text or json)"))
}

fn parse_command(tokens: &[String]) -> Result<CliCommand> {
    let Some(head) = tokens.first() else {
        return Ok(CliCommand::Help);
    };
    let rest = &tokens[1..];
    let command = match head.as_str() {
        "install" | "add" => CliCommand::Install(parse_install_target(rest)?),
        "remove" | "rm" => CliCommand::Remove(parse_remove_target(rest)?),
        "list" | "ls" => CliCommand::List,
        "outdated" => CliCommand::Outdated,
        "update" => CliCommand::Update,
        "profiles" | "profile" => CliCommand::Profiles(parse_profiles(rest)?),
        "runtime" => match rest.first().map(String::as_str).unwrap_or("status") {
            "status" => CliCommand::Runtime(RuntimeCommand::Status),
            "update" => CliCommand::Runtime(RuntimeCommand::Update),
            other => bail!("Unknown runtime command: {other} (use 'status' or 'update')"),
        },
        "clone" => CliCommand::Clone,
        "launch" | "play" => CliCommand::Launch,
        "browse" | "search" => CliCommand::Browse(parse_browse(rest)?),
        "init" => CliCommand::Init,
        "paths" => CliCommand::Paths,
        "help" | "--help" | "-h" => CliCommand::Help,
        "version" | "--version" | "-V" => CliCommand::Version,
        other => bail!("Unknown command: {other} (see `lethalkit help`)"),
    };
    Ok(command)
}

fn parse_install_target(args: &[String]) -> Result<ModIdentity> {
    match args {
        [url] if url.contains("://") => browse::parse_mod_url(url),
        [author, name] => Ok(ModIdentity::new(author, name)?),
        _ => bail!("install requires <author> <name> or a mod page URL"),
    }
}

fn parse_remove_target(args: &[String]) -> Result<VersionedMod> {
    match args {
        [dir_name] => VersionedMod::parse(dir_name)
            .ok_or_else(|| anyhow!("Expected <author>-<name>-<version>, got {dir_name}")),
        [author, name, version] => Ok(VersionedMod::new(ModIdentity::new(author, name)?, version)?),
        _ => bail!("remove requires <author> <name> <version> or <author>-<name>-<version>"),
    }
}

fn parse_profiles(args: &[String]) -> Result<ProfilesCommand> {
    let sub = args.first().map(String::as_str).unwrap_or("list");
    let name = |index: usize| {
        args.get(index)
            .cloned()
            .ok_or_else(|| anyhow!("profiles {sub} requires a profile name"))
    };
    let command = match sub {
        "list" => ProfilesCommand::List,
        "create" | "new" => ProfilesCommand::Create(name(1)?),
        "delete" | "rm" => ProfilesCommand::Delete(name(1)?),
        "use" | "switch" => ProfilesCommand::Use(name(1)?),
        "rename" => ProfilesCommand::Rename(name(1)?, name(2)?),
        other => bail!("Unknown profiles command: {other}"),
    };
    Ok(command)
}

fn parse_browse(args: &[String]) -> Result<ListingQuery> {
    let mut query = ListingQuery::default();
    let mut words = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag, Some(value.to_string())),
            _ => (arg.as_str(), None),
        };
        let mut value = || -> Result<String> {
            match &inline {
                Some(value) => Ok(value.clone()),
                None => iter
                    .next()
                    .cloned()
                    .ok_or_else(|| anyhow!("{flag} requires a value")),
            }
        };
        match flag {
            "--ordering" | "--sort" => {
                let raw = value()?;
                query.ordering =
                    Ordering::parse(&raw).ok_or_else(|| anyhow!("Unknown ordering: {raw}"))?;
            }
            "--section" => {
                let raw = value()?;
                query.section =
                    Section::parse(&raw).ok_or_else(|| anyhow!("Unknown section: {raw}"))?;
            }
            "--page" => {
                let raw = value()?;
                query.page = raw
                    .parse()
                    .with_context(|| format!("Invalid page number: {raw}"))?;
            }
            _ => words.push(arg.to_string()),
        }
    }
    query.query = words.join(" ");
    Ok(query)
}

pub fn run(invocation: Invocation) -> Result<()> {
    let format = invocation.format();
    match invocation.command {
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Version => {
            println!("lethalkit v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliCommand::Browse(query) => browse_listing(&query, format),
        command => {
            let mut app = App::initialize(invocation.global.base.clone())?;
            run_command(&mut app, command, format, invocation.global.profile.as_deref())
        }
    }
}

fn run_command(
    app: &mut App,
    command: CliCommand,
    format: OutputFormat,
    profile_override: Option<&str>,
) -> Result<()> {
    match command {
        CliCommand::Install(id) => {
            let profile = app.resolve_profile(profile_override)?;
            let report = app
                .installer
                .install(&profile, &id)
                .with_context(|| format!("install {id}"))?;
            print_report(&report, format)
        }
        CliCommand::Remove(target) => {
            let profile = app.resolve_profile(profile_override)?;
            app.installer
                .delete(&profile, &target)
                .with_context(|| format!("remove {target}"))?;
            print_message(format, "removed", &target.to_string())
        }
        CliCommand::List => {
            let profile = app.resolve_profile(profile_override)?;
            list_mods(app, &profile, format)
        }
        CliCommand::Outdated => {
            let profile = app.resolve_profile(profile_override)?;
            list_outdated(app, &profile, format)
        }
        CliCommand::Update => {
            let profile = app.resolve_profile(profile_override)?;
            let updated = app.update_all(&profile)?;
            let items: Vec<UpdatedItem> = updated
                .iter()
                .map(|(entry, _)| UpdatedItem {
                    id: entry.installed.id.to_string(),
                    from: entry.installed.version.clone(),
                    to: entry.latest_version.clone(),
                })
                .collect();
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
                OutputFormat::Text => {
                    if items.is_empty() {
                        println!("Everything is up to date.");
                    }
                    for item in items {
                        println!("{} {} -> {}", item.id, item.from, item.to);
                    }
                }
            }
            Ok(())
        }
        CliCommand::Profiles(command) => run_profiles(app, command, format),
        CliCommand::Runtime(command) => run_runtime(app, command, format),
        CliCommand::Clone => {
            let roots = clone::known_profile_roots()?;
            let cloned = app.clone_other_managers(&roots)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&cloned)?),
                OutputFormat::Text => {
                    if cloned.is_empty() {
                        println!("No profiles cloned.");
                    }
                    for name in cloned {
                        println!("cloned {name}");
                    }
                }
            }
            Ok(())
        }
        CliCommand::Launch => {
            let profile = app.resolve_profile(profile_override)?;
            app.launch(&profile)?;
            print_message(format, "launched", &profile)
        }
        CliCommand::Init => {
            let version = app.init()?;
            print_message(format, "ready", &format!("BepInEx {version}"))
        }
        CliCommand::Paths => list_paths(app, profile_override, format),
        CliCommand::Browse(_) | CliCommand::Help | CliCommand::Version => Ok(()),
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    status: &'a str,
    detail: &'a str,
}

fn print_message(format: OutputFormat, status: &str, detail: &str) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = MessageOutput { status, detail };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => println!("{status} {detail}"),
    }
    Ok(())
}

#[derive(Serialize)]
struct ReportOutput {
    installed: Vec<String>,
    up_to_date: Vec<String>,
}

fn print_report(report: &InstallReport, format: OutputFormat) -> Result<()> {
    let output = ReportOutput {
        installed: report.installed.iter().map(ToString::to_string).collect(),
        up_to_date: report.up_to_date.iter().map(ToString::to_string).collect(),
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Text => {
            for name in &output.installed {
                println!("installed {name}");
            }
            for name in &output.up_to_date {
                println!("up to date {name}");
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ModListItem {
    dir_name: String,
    author: String,
    name: String,
    version: String,
    description: String,
    dependencies: Vec<String>,
}

fn list_mods(app: &App, profile: &str, format: OutputFormat) -> Result<()> {
    let items: Vec<ModListItem> = app
        .installer
        .list(profile)?
        .into_iter()
        .map(|installed| ModListItem {
            dir_name: installed.dir_name,
            author: installed.author,
            name: installed.manifest.name,
            version: installed.manifest.version,
            description: installed.manifest.description,
            dependencies: installed.manifest.dependencies,
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Text => {
            if items.is_empty() {
                println!("No mods installed in {profile}.");
            }
            for item in items {
                println!(
                    "{name:<32} {version:<10} {author}",
                    name = item.name,
                    version = item.version,
                    author = item.author
                );
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct UpdatedItem {
    id: String,
    from: String,
    to: String,
}

fn list_outdated(app: &App, profile: &str, format: OutputFormat) -> Result<()> {
    let items: Vec<UpdatedItem> = app
        .installer
        .outdated(profile)?
        .into_iter()
        .map(|entry| UpdatedItem {
            id: entry.installed.id.to_string(),
            from: entry.installed.version,
            to: entry.latest_version,
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Text => {
            if items.is_empty() {
                println!("Everything is up to date.");
            }
            for item in items {
                println!("{} {} (latest {})", item.id, item.from, item.to);
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ProfileListItem {
    name: String,
    active: bool,
}

fn run_profiles(app: &mut App, command: ProfilesCommand, format: OutputFormat) -> Result<()> {
    match command {
        ProfilesCommand::List => {
            let items: Vec<ProfileListItem> = profile::list(&app.paths)?
                .into_iter()
                .map(|name| ProfileListItem {
                    active: name == app.config.last_used_profile,
                    name,
                })
                .collect();
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
                OutputFormat::Text => {
                    for item in items {
                        if item.active {
                            println!("* {}", item.name);
                        } else {
                            println!("  {}", item.name);
                        }
                    }
                }
            }
            Ok(())
        }
        ProfilesCommand::Create(name) => {
            if !bepinex::is_cached(&app.paths) {
                bepinex::ensure_cached(&app.paths, &mut app.config)?;
            }
            profile::create(&app.paths, &name)?;
            print_message(format, "created", &name)
        }
        ProfilesCommand::Delete(name) => {
            app.delete_profile(&name)?;
            print_message(format, "deleted", &name)
        }
        ProfilesCommand::Use(name) => {
            app.use_profile(&name)?;
            print_message(format, "using", &name)
        }
        ProfilesCommand::Rename(old, new) => {
            app.rename_profile(&old, &new)?;
            print_message(format, "renamed", &format!("{old} -> {new}"))
        }
    }
}

#[derive(Serialize)]
struct RuntimeOutput {
    cached: bool,
    cached_version: String,
    latest_version: String,
    up_to_date: bool,
}

fn run_runtime(app: &mut App, command: RuntimeCommand, format: OutputFormat) -> Result<()> {
    match command {
        RuntimeCommand::Status => {
            let release = bepinex::fetch_latest_release()?;
            let status = bepinex::status(&app.paths, &app.config, &release);
            let output = RuntimeOutput {
                cached: status != RuntimeStatus::Missing,
                cached_version: app.config.cached_bepinex_version.clone(),
                latest_version: release.tag_name.clone(),
                up_to_date: matches!(status, RuntimeStatus::Current { .. }),
            };
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
                OutputFormat::Text => match status {
                    RuntimeStatus::Missing => {
                        println!("BepInEx is not cached (latest {})", release.tag_name)
                    }
                    RuntimeStatus::Stale { cached, latest } => {
                        let cached = if cached.is_empty() { "unknown" } else { cached.as_str() };
                        println!("BepInEx {cached} is cached; {latest} is available")
                    }
                    RuntimeStatus::Current { version } => println!("BepInEx {version} is current"),
                },
            }
            Ok(())
        }
        RuntimeCommand::Update => {
            let version = bepinex::ensure_cached(&app.paths, &mut app.config)?;
            print_message(format, "cached", &format!("BepInEx {version}"))
        }
    }
}

fn browse_listing(query: &ListingQuery, format: OutputFormat) -> Result<()> {
    let mods = browse::fetch_listing(query)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&mods)?),
        OutputFormat::Text => {
            if mods.is_empty() {
                println!("No mods found.");
            }
            for listed in mods {
                println!("{:<32} {}-{}", listed.title, listed.author, listed.name);
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct PathsOutput {
    base: String,
    profiles: String,
    caches: String,
    config: String,
    active_profile: String,
    plugins: String,
}

fn list_paths(app: &App, profile_override: Option<&str>, format: OutputFormat) -> Result<()> {
    let active = profile_override.unwrap_or(&app.config.last_used_profile);
    let output = PathsOutput {
        base: app.paths.base().display().to_string(),
        profiles: app.paths.profiles_dir().display().to_string(),
        caches: app.paths.cache_dir().display().to_string(),
        config: app.paths.config_path().display().to_string(),
        active_profile: active.to_string(),
        plugins: app.paths.plugins_dir(active).display().to_string(),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Text => {
            println!("Base: {}", output.base);
            println!("Profiles: {}", output.profiles);
            println!("Caches: {}", output.caches);
            println!("Config: {}", output.config);
            println!("Active profile: {}", output.active_profile);
            println!("Plugins: {}", output.plugins);
        }
    }
    Ok(())
}

fn print_help() {
    println!("lethalkit v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  lethalkit init                         Cache BepInEx and create the Default profile");
    println!("  lethalkit install <author> <name>      Install a mod and its dependencies");
    println!("  lethalkit install <mod-url>            Install from a Thunderstore page URL");
    println!("  lethalkit remove <author-name-version> Remove an installed mod");
    println!("  lethalkit list                         List installed mods");
    println!("  lethalkit outdated                     List mods with newer versions");
    println!("  lethalkit update                       Update every outdated mod");
    println!("  lethalkit profiles [list]              List profiles");
    println!("  lethalkit profiles create|delete|use <name>");
    println!("  lethalkit profiles rename <old> <new>");
    println!("  lethalkit runtime [status|update]      Check or refresh the cached BepInEx");
    println!("  lethalkit clone                        Import profiles from other managers");
    println!("  lethalkit launch                       Start the game with the active profile");
    println!("  lethalkit browse [query]               Search Thunderstore");
    println!("      --ordering <last-updated|newest|most-downloaded|top-rated>");
    println!("      --section <mods|asset-replacements|libraries|modpacks>");
    println!("      --page <n>");
    println!("  lethalkit paths                        Show data paths");
    println!();
    println!("Global options:");
    println!("  --base <path>                          Data directory (or LETHALKIT_HOME)");
    println!("  --profile <name>                       Profile to act on");
    println!("  --format <json|text>                   Output format");
    println!("  -q, --quiet                            Errors only");
    println!("  -v, -vv                                Increase log verbosity");
    println!("  -h, --help                             Show help");
    println!("  -V, --version                          Show version");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Invocation> {
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        parse_args(&args)
    }

    #[test]
    fn parses_global_options_anywhere() {
        let invocation = parse(&["list", "--format", "json", "--profile=Speedrun", "-vv"]).unwrap();
        assert_eq!(invocation.command, CliCommand::List);
        assert_eq!(invocation.format(), OutputFormat::Json);
        assert_eq!(invocation.global.profile.as_deref(), Some("Speedrun"));
        assert_eq!(invocation.verbosity(), Verbosity::Debug);

        let invocation = parse(&["-q", "--base", "/tmp/lmm", "paths"]).unwrap();
        assert_eq!(invocation.verbosity(), Verbosity::Quiet);
        assert_eq!(invocation.global.base, Some(PathBuf::from("/tmp/lmm")));
        assert!(parse(&["list", "--format", "yaml"]).is_err());
    }

    #[test]
    fn parses_install_targets() {
        let expected = ModIdentity::new("notnotnotswipez", "MoreCompany").unwrap();
        let by_name = parse(&["install", "notnotnotswipez", "MoreCompany"]).unwrap();
        assert_eq!(by_name.command, CliCommand::Install(expected.clone()));

        let by_url = parse(&[
            "install",
            "https://thunderstore.io/c/lethal-company/p/notnotnotswipez/MoreCompany/",
        ])
        .unwrap();
        assert_eq!(by_url.command, CliCommand::Install(expected));

        assert!(parse(&["install"]).is_err());
        assert!(parse(&["install", "../evil", "x"]).is_err());
    }

    #[test]
    fn parses_remove_targets() {
        let joined = parse(&["remove", "Foo-Bar-1.0.0"]).unwrap();
        let split = parse(&["remove", "Foo", "Bar", "1.0.0"]).unwrap();
        assert_eq!(joined.command, split.command);
        assert!(parse(&["remove", "FooBar"]).is_err());
    }

    #[test]
    fn parses_profile_commands() {
        assert_eq!(
            parse(&["profiles"]).unwrap().command,
            CliCommand::Profiles(ProfilesCommand::List)
        );
        assert_eq!(
            parse(&["profiles", "rename", "Old", "New"]).unwrap().command,
            CliCommand::Profiles(ProfilesCommand::Rename("Old".into(), "New".into()))
        );
        assert!(parse(&["profiles", "create"]).is_err());
        assert!(parse(&["profiles", "frobnicate", "x"]).is_err());
    }

    #[test]
    fn parses_browse_query() {
        let invocation = parse(&[
            "browse",
            "more",
            "suits",
            "--ordering=top-rated",
            "--section",
            "libraries",
            "--page",
            "3",
        ])
        .unwrap();
        let CliCommand::Browse(query) = invocation.command else {
            panic!("expected browse");
        };
        assert_eq!(query.query, "more suits");
        assert_eq!(query.ordering, Ordering::TopRated);
        assert_eq!(query.section, Section::Libraries);
        assert_eq!(query.page, 3);
        assert!(parse(&["browse", "--page", "x"]).is_err());
    }

    #[test]
    fn unknown_command_is_an_error() {
        assert!(parse(&["frobnicate"]).is_err());
        assert_eq!(parse(&[]).unwrap().command, CliCommand::Help);
    }
}
