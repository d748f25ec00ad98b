//! The multi-line text transformation catalog.
//!
//! ```text
//! tr example::keg:1.0 {
//!     profile env "APP_HOME" "/tmp/app"
//!     site isi {
//!         profile env "JAVA_HOME" "/opt/java"
//!         pfn "/path/to/keg"
//!         arch "x86_64"
//!         os "linux"
//!         type "INSTALLED"
//!     }
//! }
//! ```
//!
//! Profiles at transformation level apply to every site and are overridden
//! by site-level profiles with the same namespace and key.

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::Local;

use super::entry::{TransformationEntry, split_logical_name};
use super::store::TransformationStore;
use crate::common::{CatalogProfile, SysInfo, upsert_profile};
use crate::error::{CatalogError, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Open,
    Close,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    path: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str, path: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
            path,
        }
    }

    fn next_token(&mut self) -> Result<Option<(Token, usize)>> {
        loop {
            match self.chars.peek().copied() {
                None => return Ok(None),
                Some('\n') => {
                    self.line += 1;
                    self.chars.next();
                }
                Some(c) if c.is_whitespace() => {
                    self.chars.next();
                }
                Some('#') => {
                    while let Some(c) = self.chars.peek() {
                        if *c == '\n' {
                            break;
                        }
                        self.chars.next();
                    }
                }
                Some('{') => {
                    self.chars.next();
                    return Ok(Some((Token::Open, self.line)));
                }
                Some('}') => {
                    self.chars.next();
                    return Ok(Some((Token::Close, self.line)));
                }
                Some('"') => {
                    self.chars.next();
                    let start = self.line;
                    let mut value = String::new();
                    loop {
                        match self.chars.next() {
                            None => {
                                return Err(CatalogError::parse(
                                    self.path,
                                    start,
                                    "unterminated quoted string",
                                ));
                            }
                            Some('"') => break,
                            Some('\\') => match self.chars.next() {
                                Some(c) => value.push(c),
                                None => {
                                    return Err(CatalogError::parse(
                                        self.path,
                                        start,
                                        "unterminated quoted string",
                                    ));
                                }
                            },
                            Some(c) => {
                                if c == '\n' {
                                    self.line += 1;
                                }
                                value.push(c);
                            }
                        }
                    }
                    return Ok(Some((Token::Quoted(value), start)));
                }
                Some(_) => {
                    let mut word = String::new();
                    while let Some(c) = self.chars.peek().copied() {
                        if c.is_whitespace() || c == '{' || c == '}' || c == '"' || c == '#' {
                            break;
                        }
                        word.push(c);
                        self.chars.next();
                    }
                    return Ok(Some((Token::Word(word), self.line)));
                }
            }
        }
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    fn next(&mut self) -> Result<Option<(Token, usize)>> {
        self.lexer.next_token()
    }

    fn error(&self, line: usize, message: impl Into<String>) -> CatalogError {
        CatalogError::parse(self.lexer.path, line, message)
    }

    fn expect_open(&mut self) -> Result<()> {
        match self.next()? {
            Some((Token::Open, _)) => Ok(()),
            Some((_, line)) => Err(self.error(line, "expected '{'")),
            None => Err(self.error(self.lexer.line, "expected '{', found end of file")),
        }
    }

    /// A bare word or a quoted string.
    fn value(&mut self, what: &str) -> Result<String> {
        match self.next()? {
            Some((Token::Word(w), _)) | Some((Token::Quoted(w), _)) => Ok(w),
            Some((_, line)) => Err(self.error(line, format!("expected {what}"))),
            None => Err(self.error(self.lexer.line, format!("expected {what}, found end of file"))),
        }
    }

    fn parsed<T: FromStr<Err = CatalogError>>(&mut self, what: &str, line: usize) -> Result<T> {
        let raw = self.value(what)?;
        raw.parse::<T>()
            .map_err(|e| self.error(line, e.to_string()))
    }

    fn profile(&mut self) -> Result<CatalogProfile> {
        let namespace = self.value("profile namespace")?;
        let key = self.value("profile key")?;
        let value = self.value("profile value")?;
        Ok(CatalogProfile::new(namespace, key, value))
    }

    fn catalog(&mut self) -> Result<Vec<TransformationEntry>> {
        let mut entries = Vec::new();
        while let Some((token, line)) = self.next()? {
            match token {
                Token::Word(w) if w == "tr" => {
                    let lfn = self.value("transformation name")?;
                    self.expect_open()?;
                    entries.extend(self.transformation(&lfn)?);
                }
                Token::Word(w) if w == "cont" => {
                    return Err(self.error(line, "container blocks are not supported"));
                }
                _ => return Err(self.error(line, "expected 'tr'")),
            }
        }
        Ok(entries)
    }

    fn transformation(&mut self, lfn: &str) -> Result<Vec<TransformationEntry>> {
        let mut common = Vec::new();
        let mut sites: Vec<TransformationEntry> = Vec::new();
        loop {
            match self.next()? {
                Some((Token::Close, _)) => break,
                Some((Token::Word(w), _)) if w == "profile" => {
                    let profile = self.profile()?;
                    upsert_profile(&mut common, profile);
                }
                Some((Token::Word(w), _)) if w == "site" => {
                    let site = self.value("site handle")?;
                    self.expect_open()?;
                    sites.push(self.site(lfn, site)?);
                }
                Some((_, line)) => {
                    return Err(self.error(line, format!("unexpected token in 'tr {lfn}'")));
                }
                None => {
                    return Err(self.error(self.lexer.line, format!("unterminated 'tr {lfn}'")));
                }
            }
        }

        // transformation-level profiles first, site-level ones override
        for entry in &mut sites {
            let mut profiles = common.clone();
            for p in entry.profiles.drain(..) {
                upsert_profile(&mut profiles, p);
            }
            entry.profiles = profiles;
        }
        Ok(sites)
    }

    fn site(&mut self, lfn: &str, site: String) -> Result<TransformationEntry> {
        let (namespace, name, version) = split_logical_name(lfn);
        let mut entry = TransformationEntry {
            namespace,
            name,
            version,
            site,
            pfn: String::new(),
            tc_type: Default::default(),
            sysinfo: SysInfo::default(),
            profiles: Vec::new(),
        };
        loop {
            let (token, line) = match self.next()? {
                Some(t) => t,
                None => {
                    return Err(self.error(
                        self.lexer.line,
                        format!("unterminated 'site {}'", entry.site),
                    ));
                }
            };
            let keyword = match token {
                Token::Word(keyword) => keyword,
                Token::Close => break,
                _ => return Err(self.error(line, "expected a site attribute")),
            };
            match keyword.as_str() {
                "profile" => {
                    let p = self.profile()?;
                    entry.add_profile(p);
                }
                "pfn" => entry.pfn = self.value("pfn")?,
                "arch" => entry.sysinfo.arch = self.parsed("arch", line)?,
                "os" => entry.sysinfo.os = self.parsed("os", line)?,
                "osrelease" => entry.sysinfo.os_release = non_empty(self.value("osrelease")?),
                "osversion" => entry.sysinfo.os_version = non_empty(self.value("osversion")?),
                "glibc" => entry.sysinfo.glibc = non_empty(self.value("glibc")?),
                "type" => entry.tc_type = self.parsed("type", line)?,
                "container" => {
                    return Err(self.error(line, "containers are not supported"));
                }
                other => return Err(self.error(line, format!("unknown site attribute '{other}'"))),
            }
        }
        if entry.pfn.is_empty() {
            return Err(self.error(self.lexer.line, format!("site '{}' has no pfn", entry.site)));
        }
        Ok(entry)
    }
}

fn non_empty(s: String) -> Option<String> {
    Some(s).filter(|s| !s.is_empty())
}

/// Parses the text format. `path` is only used in error messages.
pub fn parse(text: &str, path: &str) -> Result<Vec<TransformationEntry>> {
    let mut parser = Parser {
        lexer: Lexer::new(text, path),
    };
    parser.catalog()
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Renders the store in the text format.
pub fn render(store: &TransformationStore) -> String {
    let mut out = format!(
        "# multiple line text-based transformation catalog: {}\n",
        Local::now().to_rfc3339()
    );
    for (lfn, entries) in store.by_logical_name() {
        let _ = writeln!(out, "tr {lfn} {{");
        for e in entries {
            let _ = writeln!(out, "\tsite {} {{", e.site);
            for p in &e.profiles {
                let _ = writeln!(out, "\t\tprofile {} {} {}", p.namespace, quote(&p.key), quote(&p.value));
            }
            let _ = writeln!(out, "\t\tpfn {}", quote(&e.pfn));
            let _ = writeln!(out, "\t\tarch {}", quote(e.sysinfo.arch.as_str()));
            let _ = writeln!(out, "\t\tos {}", quote(e.sysinfo.os.as_str()));
            for (key, value) in [
                ("osrelease", &e.sysinfo.os_release),
                ("osversion", &e.sysinfo.os_version),
                ("glibc", &e.sysinfo.glibc),
            ] {
                if let Some(v) = value {
                    let _ = writeln!(out, "\t\t{key} {}", quote(v));
                }
            }
            let _ = writeln!(out, "\t\ttype {}", quote(e.tc_type.as_str()));
            out.push_str("\t}\n");
        }
        out.push_str("}\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Arch;
    use crate::transformation::TcType;

    const SAMPLE: &str = r#"
# a comment
tr example::keg:1.0 {
    profile env "APP_HOME" "/tmp/karan"
    profile env "JAVA_HOME" "/bin/java.1.5"

    site isi {
        profile env "JAVA_HOME" "/bin/java.1.6"
        pfn "/path/to/keg"
        arch "x86"
        os "linux"
        osrelease "fc"
        type "STAGEABLE"
    }

    site wind {
        pfn "/opt/keg"
    }
}
"#;

    #[test]
    fn test_parse_sample() {
        let entries = parse(SAMPLE, "tc.text").unwrap();
        assert_eq!(entries.len(), 2);

        let isi = &entries[0];
        assert_eq!(isi.logical_name(), "example::keg:1.0");
        assert_eq!(isi.sysinfo.arch, Arch::X86);
        assert_eq!(isi.sysinfo.os_release.as_deref(), Some("fc"));
        assert_eq!(isi.tc_type, TcType::Stageable);
        let java = isi.profiles.iter().find(|p| p.key == "JAVA_HOME").unwrap();
        assert_eq!(java.value, "/bin/java.1.6");
        assert_eq!(isi.profiles.len(), 2);

        let wind = &entries[1];
        assert_eq!(wind.tc_type, TcType::Installed);
        assert_eq!(wind.profiles.len(), 2);
    }

    #[test]
    fn test_containers_rejected() {
        let err = parse("cont centos {\n}\n", "tc").unwrap_err();
        assert!(matches!(err, CatalogError::Parse { line: 1, .. }));

        let err = parse("tr a {\n site s {\n  pfn \"/x\"\n  container \"c\"\n }\n}\n", "tc").unwrap_err();
        assert!(matches!(err, CatalogError::Parse { line: 4, .. }));
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = parse("tr a {\n  site s {\n  }\n}\n", "tc").unwrap_err();
        assert!(err.to_string().contains("has no pfn"));

        let err = parse("tr a {\n  bogus\n}\n", "tc").unwrap_err();
        assert!(matches!(err, CatalogError::Parse { line: 2, .. }));

        assert!(parse("tr a {\n site s { pfn \"/x\" }\n", "tc").is_err());
    }

    #[test]
    fn test_render_reparses() {
        let mut store = TransformationStore::new();
        store.extend(parse(SAMPLE, "tc").unwrap());
        let text = render(&store);
        assert!(text.starts_with("# multiple line text-based transformation catalog"));

        let mut again = TransformationStore::new();
        again.extend(parse(&text, "tc").unwrap());
        assert_eq!(
            again.entries().cloned().collect::<Vec<_>>(),
            store.entries().cloned().collect::<Vec<_>>()
        );
    }
}
