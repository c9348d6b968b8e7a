//! Entry point for the hostdash watcher. Parses args, resolves the profile and
//! runs the App.

use hostdash::app::App;
use hostdash::profiles::{
    load_profiles, save_profiles, upsert, ProfileEntry, ProfileRequest, ResolveProfile,
};
use hostdash::settings::ClientSettings;
use hostdash::types::TimeRange;
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "[--tls-ca CERT_PEM|-t CERT_PEM] [--profile NAME|-P NAME] [--save] [--token TOKEN] [--cookie COOKIE] [--hours 24|168] [--reconnect-secs N] [--dry-run] [http(s)://HOST:PORT]";

#[derive(Debug, Default)]
struct ParsedArgs {
    url: Option<String>,
    tls_ca: Option<String>,
    profile: Option<String>,
    token: Option<String>,
    cookie: Option<String>,
    hours: Option<TimeRange>,
    reconnect_secs: Option<u64>,
    save: bool,
    dry_run: bool,
}

enum ArgsError {
    Help(String),
    Invalid(String),
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, ArgsError> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "hostdash".into());
    let usage = || format!("Usage: {prog} {USAGE}");
    let mut parsed = ParsedArgs::default();

    while let Some(arg) = it.next() {
        // --flag=value is accepted for every flag that takes a value
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |name: &str| -> Result<String, ArgsError> {
            inline
                .clone()
                .or_else(|| it.next())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ArgsError::Invalid(format!("{name} needs a value\n{}", usage())))
        };
        match flag.as_str() {
            "-h" | "--help" => return Err(ArgsError::Help(usage())),
            "--tls-ca" | "-t" => parsed.tls_ca = Some(value("--tls-ca")?),
            "--profile" | "-P" => parsed.profile = Some(value("--profile")?),
            "--token" => parsed.token = Some(value("--token")?),
            "--cookie" => parsed.cookie = Some(value("--cookie")?),
            "--hours" => {
                let v = value("--hours")?;
                let hours = v
                    .parse::<u32>()
                    .map_err(|_| ArgsError::Invalid(format!("--hours: not a number: {v}")))?;
                parsed.hours =
                    Some(TimeRange::try_from(hours).map_err(|e| ArgsError::Invalid(format!("--hours: {e}")))?);
            }
            "--reconnect-secs" => {
                let v = value("--reconnect-secs")?;
                parsed.reconnect_secs = Some(
                    v.parse::<u64>()
                        .ok()
                        .filter(|s| *s > 0)
                        .ok_or_else(|| ArgsError::Invalid(format!("--reconnect-secs: expected a positive number, got {v}")))?,
                );
            }
            "--save" => parsed.save = true,
            "--dry-run" => parsed.dry_run = true,
            _ if arg.starts_with('-') => {
                return Err(ArgsError::Invalid(format!("Unknown flag {arg}\n{}", usage())));
            }
            _ => {
                if parsed.url.is_none() {
                    parsed.url = Some(arg);
                } else {
                    return Err(ArgsError::Invalid(format!("Unexpected argument. {}", usage())));
                }
            }
        }
    }
    Ok(parsed)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = match parse_args(env::args()) {
        Ok(v) => v,
        Err(ArgsError::Help(msg)) => {
            eprintln!("{msg}");
            return Ok(());
        }
        Err(ArgsError::Invalid(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };
    init_tracing();

    let Some((url, tls_ca)) = resolve_connection(&parsed)? else {
        return Ok(());
    };

    if parsed.dry_run {
        eprintln!("Resolved {url}");
        return Ok(());
    }

    let mut settings = ClientSettings::new(&url)?;
    settings.tls_ca = tls_ca.map(PathBuf::from);
    settings.session_cookie = parsed.cookie.clone();
    if let Some(range) = parsed.hours {
        settings.time_range = range;
    }
    if let Some(secs) = parsed.reconnect_secs {
        settings.reconnect_delay = Duration::from_secs(secs);
    }
    let token = parsed
        .token
        .clone()
        .or_else(|| env::var("HOSTDASH_TOKEN").ok().filter(|t| !t.is_empty()));

    let mut app = App::new(settings, token);
    app.run().await
}

/// Final (url, tls_ca), persisting profile changes along the way. `None` when
/// the user aborted or nothing could be resolved.
fn resolve_connection(parsed: &ParsedArgs) -> io::Result<Option<(String, Option<String>)>> {
    let profiles_file = load_profiles();
    let req = ProfileRequest {
        profile_name: parsed.profile.clone(),
        url: parsed.url.clone(),
        tls_ca: parsed.tls_ca.clone(),
    };
    let mut profiles_mut = profiles_file.clone();
    let resolved = match req.resolve(&profiles_file) {
        ResolveProfile::Direct(u, t) => {
            if let Some(name) = parsed.profile.as_ref() {
                let entry = ProfileEntry {
                    url: u.clone(),
                    tls_ca: t.clone(),
                };
                let write = match profiles_mut.profiles.get(name) {
                    None => true,
                    Some(existing) if *existing == entry => false,
                    Some(_) => {
                        parsed.save
                            || prompt_yes_no(&format!("Overwrite existing profile '{name}'? [y/N]: "))
                    }
                };
                if write && upsert(&mut profiles_mut, name, entry) {
                    if let Err(e) = save_profiles(&profiles_mut) {
                        tracing::warn!("could not save profile '{name}': {e}");
                    }
                }
            }
            (u, t)
        }
        ResolveProfile::Loaded(u, t) => (u, t),
        ResolveProfile::PromptSelect(names) => {
            eprintln!("Select profile:");
            for (i, n) in names.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, n);
            }
            let line = prompt_string("Enter number (or blank to abort): ")?;
            let picked = line
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|idx| *idx >= 1 && *idx <= names.len())
                .and_then(|idx| profiles_mut.profiles.get(&names[idx - 1]));
            match picked {
                Some(entry) => (entry.url.clone(), entry.tls_ca.clone()),
                None => return Ok(None),
            }
        }
        ResolveProfile::PromptCreate(name) => {
            eprintln!("Profile '{name}' does not exist yet.");
            let url = prompt_string("Enter URL (http://HOST:PORT or https://...): ")?;
            if url.trim().is_empty() {
                return Ok(None);
            }
            let ca = prompt_string("Enter TLS CA path (or leave blank): ")?;
            let ca_opt = Some(ca.trim().to_string()).filter(|c| !c.is_empty());
            upsert(
                &mut profiles_mut,
                &name,
                ProfileEntry {
                    url: url.trim().to_string(),
                    tls_ca: ca_opt.clone(),
                },
            );
            save_profiles(&profiles_mut)?;
            (url.trim().to_string(), ca_opt)
        }
        ResolveProfile::None => {
            eprintln!("No URL provided and no profiles to select.");
            return Ok(None);
        }
    };
    Ok(Some(resolved))
}

fn prompt_yes_no(prompt: &str) -> bool {
    eprint!("{prompt}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_ok() {
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    } else {
        false
    }
}

fn prompt_string(prompt: &str) -> io::Result<String> {
    eprint!("{prompt}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}
