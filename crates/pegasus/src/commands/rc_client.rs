//! pegasus-rc-client: shell for the replica catalog.
//!
//! Commands come from the command line, from a command file (`-f`), from
//! stdin, or from an interactive prompt when stdin is a terminal. `-i`, `-d` and `-l` instead apply one command
//! to every line of a file, in chunks.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal, Write};

use anyhow::{Context as _, Result};
use clap::{ArgGroup, Parser};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use tracing::{debug, error, info, warn};

use pegasus_catalog::replica::{self, SITE_ATTRIBUTE};
use pegasus_catalog::{OpenMode, ReplicaCatalog, ReplicaEntry};

use super::Context;
use crate::cli::{GlobalArgs, Tool};
use crate::exit::usage;

const PROPERTY_PREFIX: &str = "pegasus.catalog.replica.";
/// Lines per chunk in the batch modes.
pub const CHUNK_SIZE_KEY: &str = "pegasus.catalog.replica.chunk.size";
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
const LEGACY_SITE_ATTRIBUTE: &str = "pool";
const ARGUMENT_COUNT: &str = "Illegal number of arguments, ignoring!";

/// Query and update the replica catalog
#[derive(Parser, Debug)]
#[command(name = "pegasus-rc-client", author, version, about, long_about = None)]
#[command(group(ArgGroup::new("batch").args(["insert", "delete", "lookup"])))]
pub struct RcClientArgs {
    /// Read commands from FILE; '-' reads stdin without prompting
    #[arg(short = 'f', long, value_name = "FILE")]
    pub file: Option<String>,

    /// Enter a KEY=VALUE preference (repeatable)
    #[arg(short = 'p', long = "pref", value_name = "KEY=VALUE")]
    pub prefs: Vec<String>,

    /// Insert every "LFN PFN [k=v ...]" line of FILE
    #[arg(short = 'i', long, value_name = "FILE")]
    pub insert: Option<String>,

    /// Delete every "LFN PFN [k=v ...]" line of FILE
    #[arg(short = 'd', long, value_name = "FILE")]
    pub delete: Option<String>,

    /// Look up every LFN listed in FILE
    #[arg(short = 'l', long, value_name = "FILE")]
    pub lookup: Option<String>,

    #[command(flatten)]
    pub globals: GlobalArgs,

    /// A single command and its arguments
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Tool for RcClientArgs {
    const NAME: &'static str = "pegasus-rc-client";

    fn globals(&self) -> GlobalArgs {
        self.globals.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchCommand {
    Insert,
    Delete,
    Lookup,
}

impl RcClientArgs {
    fn batch(&self) -> Option<(BatchCommand, &str)> {
        [
            (BatchCommand::Insert, &self.insert),
            (BatchCommand::Delete, &self.delete),
            (BatchCommand::Lookup, &self.lookup),
        ]
        .into_iter()
        .find_map(|(command, file)| file.as_deref().map(|f| (command, f)))
    }

    fn preferences(&self) -> Result<BTreeMap<String, String>> {
        self.prefs
            .iter()
            .map(|p| match p.split_once('=') {
                Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_ascii_lowercase(), v.to_string())),
                _ => Err(usage(format!("preference '{p}' is not KEY=VALUE"))),
            })
            .collect()
    }
}

/// The property a preference stands for.
fn property_key(pref: &str) -> String {
    if pref.starts_with("pegasus.") {
        pref.to_string()
    } else {
        format!("{PROPERTY_PREFIX}{pref}")
    }
}

/// Run pegasus-rc-client.
pub fn run(args: RcClientArgs, ctx: &Context) -> Result<()> {
    let batch = args.batch();
    if !args.command.is_empty() && (args.file.is_some() || batch.is_some()) {
        return Err(usage("the -f|-i|-d|-l options and command-line commands are mutually exclusive"));
    }
    if args.file.is_some() && batch.is_some() {
        return Err(usage("the -f and -i|-d|-l options are mutually exclusive"));
    }

    let prefs = args.preferences()?;
    let mut props = ctx.properties()?;
    for (key, value) in &prefs {
        props.set(property_key(key), value.clone());
    }
    let chunk = props
        .get(CHUNK_SIZE_KEY)
        .and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_CHUNK_SIZE);

    let mut catalog = replica::connect(&props, OpenMode::Write).context("unable to connect to the replica catalog")?;
    debug!(path = %catalog.path().display(), "connected to backend");

    let result = {
        let mut session = Session::new(&mut catalog, prefs, io::stdout());
        if !args.command.is_empty() {
            session.work(&args.command).map(|_| ())
        } else if let Some((command, file)) = batch {
            open_input(file).and_then(|reader| session.parse_batch(reader, command, chunk))
        } else {
            match args.file.as_deref() {
                Some(file) => open_input(file).and_then(|reader| session.parse_commands(reader)),
                None if io::stdin().is_terminal() => session.interactive(),
                None => session.parse_commands(io::stdin().lock()),
            }
        }
    };

    catalog.close().context("unable to write the replica catalog")?;
    debug!("disconnected from backend");
    result
}

fn open_input(file: &str) -> Result<Box<dyn BufRead>> {
    if file == "-" {
        return Ok(Box::new(io::stdin().lock()));
    }
    let handle = File::open(file).with_context(|| format!("unable to open '{file}'"))?;
    Ok(Box::new(BufReader::new(handle)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Whether to keep reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Number of entries the command touched.
    Continue(usize),
    Quit,
}

pub struct Session<'a, W: Write> {
    catalog: &'a mut ReplicaCatalog,
    prefs: BTreeMap<String, String>,
    out: W,
}

impl<'a, W: Write> Session<'a, W> {
    pub fn new(catalog: &'a mut ReplicaCatalog, prefs: BTreeMap<String, String>, out: W) -> Self {
        Self { catalog, prefs, out }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs one command line, already split into words.
    pub fn work<S: AsRef<str>>(&mut self, words: &[S]) -> Result<Flow> {
        let Some((command, rest)) = words.split_first() else {
            return Ok(Flow::Continue(0));
        };
        let rest: Vec<&str> = rest.iter().map(AsRef::as_ref).collect();
        let count = match command.as_ref().to_ascii_lowercase().as_str() {
            "help" => {
                self.out.write_all(HELP.as_bytes())?;
                0
            }
            "lookup" => {
                let store = self.catalog.store()?;
                let mut count = 0;
                for lfn in &rest {
                    let found = store.lookup(lfn);
                    info!(lfn, matches = found.len(), "lookup");
                    for entry in found {
                        write_entry(&mut self.out, entry)?;
                        count += 1;
                    }
                }
                count
            }
            "list" => self.list(&rest)?,
            "insert" | "delete" if rest.len() < 2 => {
                warn!("{ARGUMENT_COUNT}");
                0
            }
            "insert" => {
                let entry = parse_entry(&rest);
                self.catalog.store_mut()?.insert(entry);
                info!("inserted 1 entries");
                1
            }
            "delete" => {
                let entry = parse_entry(&rest);
                let store = self.catalog.store_mut()?;
                let count = if entry.attributes.is_empty() {
                    store.delete(&entry.lfn, &entry.pfn)
                } else {
                    store.delete_matching(&entry)
                };
                info!("deleted {count} entries");
                count
            }
            "remove" => {
                let store = self.catalog.store_mut()?;
                let mut total = 0;
                for lfn in &rest {
                    let count = store.remove(lfn);
                    if count > 0 {
                        info!("removed LFN {lfn}");
                    } else {
                        info!("ignoring unknown LFN {lfn}");
                    }
                    total += count;
                }
                total
            }
            "clear" => {
                let count = self.catalog.store_mut()?.clear();
                info!("removed {count} entries");
                count
            }
            "quit" | "exit" => {
                info!("Good-bye");
                return Ok(Flow::Quit);
            }
            "set" => self.set(&rest)?,
            other => {
                warn!("Unknown command: {other}, ignoring!");
                0
            }
        };
        Ok(Flow::Continue(count))
    }

    /// `list [lfn PATTERN] [pfn PATTERN] [site NAME]`
    fn list(&mut self, words: &[&str]) -> Result<usize> {
        let mut filters: BTreeMap<String, &str> = BTreeMap::new();
        for pair in words.chunks(2) {
            if let [key, value] = pair {
                filters.insert(key.to_ascii_lowercase(), *value);
            }
        }
        for key in filters.keys().filter(|k| !matches!(k.as_str(), "lfn" | "pfn" | "site")) {
            warn!(key = %key, "unsupported list filter, ignoring");
        }
        let store = self.catalog.store()?;
        let found = store.list(
            filters.get("lfn").copied(),
            filters.get("pfn").copied(),
            filters.get("site").copied(),
        )?;
        for entry in &found {
            write_entry(&mut self.out, entry)?;
        }
        if found.is_empty() {
            info!("no matches found");
        } else {
            info!("found {} matches", found.len());
        }
        Ok(found.len())
    }

    /// `set` shows all preferences, `set KEY` one, `set KEY VALUE` enters one.
    fn set(&mut self, words: &[&str]) -> Result<usize> {
        match words {
            [] => {
                for (key, value) in &self.prefs {
                    writeln!(self.out, "set {key} {value}")?;
                }
                Ok(self.prefs.len())
            }
            [key] => match self.prefs.get(&key.to_ascii_lowercase()) {
                Some(value) => {
                    writeln!(self.out, "set {} {value}", key.to_ascii_lowercase())?;
                    Ok(1)
                }
                None => {
                    warn!("no such preference");
                    Ok(0)
                }
            },
            [key, value] => {
                self.prefs.insert(key.to_ascii_lowercase(), value.to_string());
                Ok(1)
            }
            _ => {
                warn!("{ARGUMENT_COUNT}");
                Ok(0)
            }
        }
    }

    /// Reads and runs one command per line until end of input or `quit`.
    /// A failing command is logged and the next line is read.
    pub fn parse_commands<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let Some(words) = split_line(&line) else {
                continue;
            };
            debug!(line = index + 1, "{}", words.join(" "));
            if !self.work_logged(&words) {
                break;
            }
        }
        Ok(())
    }

    /// Prompts on the terminal until end of input or `quit`.
    pub fn interactive(&mut self) -> Result<()> {
        let config = Config::builder()
            .history_ignore_space(true)
            .auto_add_history(true)
            .build();
        let mut editor: Editor<(), DefaultHistory> = Editor::with_config(config)?;
        loop {
            match editor.readline("rc> ") {
                Ok(line) => {
                    let Some(words) = split_line(&line) else {
                        continue;
                    };
                    if !self.work_logged(&words) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Runs one command, logging its failure. False once the user quits.
    fn work_logged(&mut self, words: &[String]) -> bool {
        match self.work(words) {
            Ok(Flow::Quit) => false,
            Ok(Flow::Continue(_)) => true,
            Err(e) => {
                error!(command = %words.join(" "), error = %e, "command failed");
                true
            }
        }
    }

    /// Applies `command` to every line, `chunk` lines at a time.
    pub fn parse_batch<R: BufRead>(&mut self, reader: R, command: BatchCommand, chunk: usize) -> Result<()> {
        let mut pending: Vec<Vec<String>> = Vec::with_capacity(chunk.min(DEFAULT_CHUNK_SIZE));
        let mut worked = 0;
        let mut succeeded = 0;
        for line in reader.lines() {
            let line = line?;
            let Some(words) = split_line(&line) else {
                continue;
            };
            pending.push(words);
            worked += 1;
            if pending.len() >= chunk {
                succeeded += self.work_batch(command, &pending)?;
                pending.clear();
            }
        }
        if !pending.is_empty() {
            succeeded += self.work_batch(command, &pending)?;
        }
        eprintln!("#Successfully worked on    : {succeeded} lines.");
        eprintln!("#Worked on total number of : {worked} lines.");
        Ok(())
    }

    pub fn work_batch(&mut self, command: BatchCommand, lines: &[Vec<String>]) -> Result<usize> {
        match command {
            BatchCommand::Insert | BatchCommand::Delete => {
                let entries: Vec<ReplicaEntry> = lines
                    .iter()
                    .filter_map(|words| {
                        if words.len() < 2 {
                            warn!("{ARGUMENT_COUNT}");
                            return None;
                        }
                        let words: Vec<&str> = words.iter().map(String::as_str).collect();
                        Some(parse_entry(&words))
                    })
                    .collect();
                let store = self.catalog.store_mut()?;
                let count = if command == BatchCommand::Insert {
                    let count = entries.len();
                    store.extend(entries);
                    info!("inserted {count} entries");
                    count
                } else {
                    let count: usize = entries.iter().map(|e| store.delete_matching(e)).sum();
                    info!("deleted {count} entries");
                    count
                };
                Ok(count)
            }
            BatchCommand::Lookup => {
                let mut lfns = BTreeSet::new();
                for words in lines {
                    if words.len() != 1 {
                        warn!("{ARGUMENT_COUNT}");
                    }
                    if let Some(lfn) = words.first() {
                        lfns.insert(lfn.as_str());
                    }
                }
                let store = self.catalog.store()?;
                let found = store.lookup_many(lfns.iter().copied());
                for entries in found.values() {
                    for entry in entries {
                        write_entry(&mut self.out, entry)?;
                    }
                }
                for lfn in lfns.iter().filter(|lfn| !found.contains_key(**lfn)) {
                    eprintln!("LFN doesn't exist: {lfn}");
                }
                Ok(found.len())
            }
        }
    }
}

const HELP: &str = "
Commands and their respective arguments, line-by-line:
 help
 quit
 exit
 clear
 insert LFN PFN [k=v [..]]
 delete LFN PFN [k=v [..]]
 remove LFN [LFN [..]]
 lookup LFN [LFN [..]]
 list   [lfn <pattern>] [pfn <pattern>] [site <name>]
 set    [var [value]]
";

/// Words of a command line with `#` comments removed; `None` when blank.
fn split_line(line: &str) -> Option<Vec<String>> {
    let line = line.split_once('#').map_or(line, |(before, _)| before);
    let words: Vec<String> = line.split_whitespace().map(String::from).collect();
    (!words.is_empty()).then_some(words)
}

fn noquote(s: &str) -> &str {
    s.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(s)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `LFN PFN [k=v ...]`; a bare word is taken as the site handle.
fn parse_entry(words: &[&str]) -> ReplicaEntry {
    let mut entry = ReplicaEntry::new(words[0], noquote(words[1]));
    for attr in &words[2..] {
        match attr.split_once('=') {
            Some((key, value)) => {
                entry.attributes.insert(key.to_string(), unescape(noquote(value)));
            }
            None => {
                error!("attribute \"{attr}\" without assignment, assuming resource handle");
                entry = entry.with_site(*attr);
            }
        }
    }
    if let Some(pool) = entry.attributes.remove(LEGACY_SITE_ATTRIBUTE) {
        entry.attributes.entry(SITE_ATTRIBUTE.to_string()).or_insert(pool);
    }
    entry
}

fn write_entry<W: Write>(out: &mut W, entry: &ReplicaEntry) -> io::Result<()> {
    write!(out, "{} {}", entry.lfn, entry.pfn)?;
    for (key, value) in &entry.attributes {
        write!(out, " {key}=\"{}\"", escape(value))?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pegasus_catalog::{Catalog, RcFormat};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn catalog(dir: &TempDir) -> ReplicaCatalog {
        Catalog::create(RcFormat::File, dir.path().join("rc.data"))
    }

    fn output(session: Session<'_, Vec<u8>>) -> String {
        String::from_utf8(session.into_output()).unwrap()
    }

    #[test]
    fn test_insert_lookup_remove() {
        let dir = TempDir::new().unwrap();
        let mut rc = catalog(&dir);
        let mut session = Session::new(&mut rc, BTreeMap::new(), Vec::new());
        assert_eq!(session.work(&["insert", "f.a", "file:///f.a", "pool=local"]).unwrap(), Flow::Continue(1));
        assert_eq!(session.work(&["insert", "f.a", "gsiftp://x/f.a", "isi"]).unwrap(), Flow::Continue(1));
        assert_eq!(session.work(&["lookup", "f.a", "f.z"]).unwrap(), Flow::Continue(2));
        assert_eq!(session.work(&["remove", "f.a"]).unwrap(), Flow::Continue(2));
        assert_eq!(session.work(&["quit"]).unwrap(), Flow::Quit);
        let text = output(session);
        assert!(text.contains("f.a file:///f.a site=\"local\""));
        assert!(text.contains("f.a gsiftp://x/f.a site=\"isi\""));
    }

    #[test]
    fn test_delete_with_attributes() {
        let dir = TempDir::new().unwrap();
        let mut rc = catalog(&dir);
        let mut session = Session::new(&mut rc, BTreeMap::new(), Vec::new());
        session.work(&["insert", "f.a", "file:///f.a", "site=local"]).unwrap();
        session.work(&["insert", "f.a", "file:///f.a", "site=isi"]).unwrap();
        assert_eq!(session.work(&["delete", "f.a", "file:///f.a", "site=isi"]).unwrap(), Flow::Continue(1));
        assert_eq!(session.work(&["delete", "f.a"]).unwrap(), Flow::Continue(0));
        assert_eq!(session.work(&["delete", "f.a", "file:///f.a"]).unwrap(), Flow::Continue(1));
    }

    #[test]
    fn test_list_and_set() {
        let dir = TempDir::new().unwrap();
        let mut rc = catalog(&dir);
        let prefs = BTreeMap::from([("file".to_string(), "rc.data".to_string())]);
        let mut session = Session::new(&mut rc, prefs, Vec::new());
        session.work(&["insert", "f.a", "file:///f.a", "site=local"]).unwrap();
        session.work(&["insert", "g.b", "file:///g.b", "site=isi"]).unwrap();
        assert_eq!(session.work(&["list", "lfn", "f.*"]).unwrap(), Flow::Continue(1));
        assert_eq!(session.work(&["list", "site", "isi"]).unwrap(), Flow::Continue(1));
        assert_eq!(session.work(&["set", "mode", "fast"]).unwrap(), Flow::Continue(1));
        assert_eq!(session.work(&["set"]).unwrap(), Flow::Continue(2));
        let text = output(session);
        assert!(text.contains("set file rc.data\n"));
        assert!(text.contains("set mode fast\n"));
    }

    #[test]
    fn test_parse_commands_stops_at_quit() {
        let dir = TempDir::new().unwrap();
        let mut rc = catalog(&dir);
        let mut session = Session::new(&mut rc, BTreeMap::new(), Vec::new());
        let script = "# comment\ninsert f.a file:///f.a site=local\n\nbogus\nquit\ninsert f.b file:///f.b\n";
        session.parse_commands(Cursor::new(script)).unwrap();
        drop(session);
        let store = rc.store().unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.lookup("f.b").is_empty());
    }

    #[test]
    fn test_batch_in_chunks() {
        let dir = TempDir::new().unwrap();
        let mut rc = catalog(&dir);
        let mut session = Session::new(&mut rc, BTreeMap::new(), Vec::new());
        let lines = "f.a file:///f.a site=local\nf.b file:///f.b site=local\nbroken\nf.c file:///f.c\n";
        session.parse_batch(Cursor::new(lines), BatchCommand::Insert, 2).unwrap();
        session.parse_batch(Cursor::new("f.a\nf.z\n"), BatchCommand::Lookup, 2).unwrap();
        let text = output(session);
        assert_eq!(text, "f.a file:///f.a site=\"local\"\n");
        assert_eq!(rc.store().unwrap().len(), 3);
    }

    #[test]
    fn test_property_key() {
        assert_eq!(property_key("file"), "pegasus.catalog.replica.file");
        assert_eq!(property_key("pegasus.catalog.replica"), "pegasus.catalog.replica");
    }

    #[test]
    fn test_batch_options_exclusive() {
        assert!(RcClientArgs::try_parse_from(["pegasus-rc-client", "-i", "a", "-d", "b"]).is_err());
        let args = RcClientArgs::try_parse_from(["pegasus-rc-client", "lookup", "f.a"]).unwrap();
        assert_eq!(args.command, vec!["lookup", "f.a"]);
    }
}
