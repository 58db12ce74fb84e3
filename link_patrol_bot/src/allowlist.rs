use std::{
    fs::File,
    io::{BufRead, BufReader, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};

use notify::{RecursiveMode, Watcher};
use tokio::sync::{watch, Notify};
use url::Url;

use crate::policy::DomainPolicy;

/// Parse an allowlist file: one domain per line, with blank lines and `#`
/// comments ignored.
///
/// Returns the domains and a description of every line that was skipped.
pub fn parse_allowlist(reader: impl BufRead) -> (Vec<String>, Vec<String>) {
    let mut domains = Vec::new();
    let mut errors = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let number = index + 1;
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                errors.push(format!("Line {number}: could not read: {e}"));
                break;
            }
        };

        // Trim a comment...
        let line = match line.find('#') {
            Some(0) => continue,
            Some(start) if line[..start].ends_with(char::is_whitespace) => &line[..start],
            _ => line.as_str(),
        };

        let mut split = line.split_whitespace();
        let Some(domain) = split.next() else {
            continue;
        };

        if split.next().is_some() {
            errors.push(format!("Line {number}: more than one domain: {line:?}"));
            continue;
        }

        let domain = domain.to_lowercase();
        if !is_plausible_host(&domain) {
            errors.push(format!("Line {number}: not a domain: {domain:?}"));
            continue;
        }

        domains.push(domain);
    }

    (domains, errors)
}

fn is_plausible_host(domain: &str) -> bool {
    Url::parse(&format!("http://{domain}/"))
        .ok()
        .is_some_and(|x| x.host_str() == Some(domain) && x.path() == "/")
}

/// Read the allowlist file and put its domains, together with `base`, into
/// `policy`. A missing file leaves `policy` as it is.
fn ingest(path: &Path, base: &[String], policy: &DomainPolicy) -> std::io::Result<()> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("No allowlist file at {}, keeping current list", path.display());
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let (domains, errors) = parse_allowlist(BufReader::new(file));
    for error in &errors {
        log::warn!("In {}: {error}", path.display());
    }

    log::info!(
        "Loaded {} allowed domain(s) from {}",
        domains.len(),
        path.display()
    );
    policy.replace(base.iter().cloned().chain(domains));
    Ok(())
}

/// Keep `policy` in sync with the allowlist file at `path` until `shutdown`
/// turns true. Domains in `base` always stay allowed.
pub async fn watch_allowlist(
    path: PathBuf,
    base: Vec<String>,
    policy: Arc<DomainPolicy>,
    mut shutdown: watch::Receiver<bool>,
) {
    // First ingest ASAP...
    if let Err(e) = ingest(&path, &base, &policy) {
        log::warn!("Failed to read allowlist {}: {e}", path.display());
    }

    let Some(file_name) = path.file_name().map(ToOwned::to_owned) else {
        log::warn!("Allowlist path {} has no file name, not watching it", path.display());
        return;
    };
    let directory = match path.parent() {
        Some(x) if !x.as_os_str().is_empty() => x.to_owned(),
        _ => PathBuf::from("."),
    };

    let update_notify = Arc::new(Notify::new());
    let update_notify_watcher = update_notify.clone();

    let watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                log::warn!("Allowlist watcher error: {e}");
                return;
            }
        };
        let kind = event.kind;
        if (kind.is_create() || kind.is_modify() || kind.is_other())
            && event.paths.iter().any(|x| x.ends_with(&file_name))
        {
            update_notify_watcher.notify_one();
        }
    });

    let mut watcher = match watcher {
        Ok(watcher) => watcher,
        Err(e) => {
            log::warn!("Could not create allowlist watcher, reload disabled: {e}");
            return;
        }
    };

    if let Err(e) = watcher.watch(&directory, RecursiveMode::NonRecursive) {
        log::warn!(
            "Could not watch {} for allowlist changes, reload disabled: {e}",
            directory.display()
        );
        return;
    }

    loop {
        tokio::select! {
            _ = update_notify.notified() => {
                log::debug!("Allowlist file changed");
                if let Err(e) = ingest(&path, &base, &policy) {
                    log::warn!("Failed to read allowlist {}: {e}", path.display());
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    log::debug!("Stopped watching the allowlist");
}
