//! Streaming DAX reader.
//!
//! [`parse_with`] walks a DAX document and reports each top-level piece to a
//! [`DaxCallback`] as soon as it is complete. [`AdagBuilder`] is the callback
//! that assembles an [`Adag`]; [`parse_str`] and [`parse_file`] wire the two
//! together.

use std::collections::HashMap;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, warn};

use crate::adag::Adag;
use crate::child::Child;
use crate::error::{DaxError, Result};
use crate::filename::{Filename, LinkType};
use crate::job::Job;
use crate::leaf::Leaf;
use crate::profile::Profile;

/// Root element attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    pub name: Option<String>,
    pub count: Option<u32>,
    pub index: Option<u32>,
    pub version: Option<String>,
}

/// Receives the pieces of a DAX document in document order.
pub trait DaxCallback {
    fn on_document(&mut self, _info: &DocumentInfo) {}
    fn on_filename(&mut self, file: Filename);
    fn on_job(&mut self, job: Job);
    fn on_child(&mut self, child: Child);
    fn on_done(&mut self) {}
}

/// Callback that collects everything into an [`Adag`].
#[derive(Debug, Default)]
pub struct AdagBuilder {
    adag: Adag,
}

impl AdagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_adag(self) -> Adag {
        self.adag
    }
}

impl DaxCallback for AdagBuilder {
    fn on_document(&mut self, info: &DocumentInfo) {
        self.adag.set_name(info.name.clone());
        if let Some(count) = info.count {
            self.adag.set_count(count);
        }
        if let Some(index) = info.index {
            self.adag.set_index(index);
        }
        if let Some(version) = &info.version {
            self.adag.set_version(version.clone());
        }
    }

    fn on_filename(&mut self, file: Filename) {
        self.adag.insert_filename(file);
    }

    fn on_job(&mut self, job: Job) {
        if !self.adag.add_job(job) {
            warn!("duplicate job id in DAX, keeping the later definition");
        }
    }

    fn on_child(&mut self, child: Child) {
        let id = child.child().to_string();
        for parent in child.parents() {
            self.adag.add_child_edge(&id, parent);
        }
        self.adag.add_child_placeholder(&id);
    }
}

/// Parses a DAX document into an [`Adag`].
pub fn parse_str(xml: &str) -> Result<Adag> {
    let mut builder = AdagBuilder::new();
    parse_with(xml, &mut builder)?;
    Ok(builder.into_adag())
}

/// Reads and parses a DAX file.
pub fn parse_file(path: &Path) -> Result<Adag> {
    let xml = std::fs::read_to_string(path).map_err(|e| DaxError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let adag = parse_str(&xml)?;
    debug!(
        path = %path.display(),
        jobs = adag.job_count(),
        files = adag.file_count(),
        "parsed DAX"
    );
    Ok(adag)
}

enum Frame {
    Document,
    Job(Job),
    Argument,
    Profile(Profile),
    Child(Child),
    Other,
}

/// Streams `xml` into `callback`.
pub fn parse_with<C: DaxCallback>(xml: &str, callback: &mut C) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);
    let mut stack: Vec<Frame> = Vec::new();
    let mut seen_root = false;

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|source| DaxError::Xml { position, source })?;

        match event {
            Event::Start(e) => {
                let frame = open(&e, &mut stack, callback, position, &mut seen_root)?;
                stack.push(frame);
            }
            Event::Empty(e) => {
                let frame = open(&e, &mut stack, callback, position, &mut seen_root)?;
                close(frame, &mut stack, callback);
            }
            Event::End(_) => {
                if let Some(frame) = stack.pop() {
                    close(frame, &mut stack, callback);
                }
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|source| DaxError::Xml { position, source })?;
                add_text(&mut stack, &text);
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                add_text(&mut stack, &String::from_utf8_lossy(&raw));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(structure(reader.buffer_position(), "missing <adag> root element"));
    }
    callback.on_done();
    Ok(())
}

fn structure(position: usize, message: impl Into<String>) -> DaxError {
    DaxError::Structure {
        position,
        message: message.into(),
    }
}

/// Handles an opening (or self-closing) element and returns its frame.
fn open<C: DaxCallback>(
    e: &BytesStart<'_>,
    stack: &mut [Frame],
    callback: &mut C,
    position: usize,
    seen_root: &mut bool,
) -> Result<Frame> {
    let local = e.local_name();
    let tag = String::from_utf8_lossy(local.as_ref()).into_owned();
    let attrs = attributes(e, position)?;

    if stack.is_empty() {
        if tag != "adag" {
            return Err(structure(position, format!("unexpected root element <{tag}>")));
        }
        if *seen_root {
            return Err(structure(position, "second root element <adag>"));
        }
        *seen_root = true;
        let info = DocumentInfo {
            name: attrs.get("name").cloned(),
            count: parse_number(&attrs, "count", position)?,
            index: parse_number(&attrs, "index", position)?,
            version: attrs.get("version").cloned(),
        };
        callback.on_document(&info);
        return Ok(Frame::Document);
    }

    if tag == "filename" && matches!(stack.last(), Some(Frame::Argument)) {
        let file = filename_from(&attrs, position)?;
        if let Some(job) = enclosing_job(stack) {
            job.add_argument(file);
        }
        return Ok(Frame::Other);
    }

    let parent = stack.len() - 1;
    match (tag.as_str(), &mut stack[parent]) {
        ("filename", Frame::Document) => {
            callback.on_filename(filename_from(&attrs, position)?);
            Ok(Frame::Other)
        }
        ("filename", Frame::Profile(profile)) => {
            profile.add_leaf(filename_from(&attrs, position)?);
            Ok(Frame::Other)
        }
        ("job", Frame::Document) => Ok(Frame::Job(job_from(&attrs, position)?)),
        ("argument", Frame::Job(_)) => Ok(Frame::Argument),
        ("profile", Frame::Job(_)) => {
            let mut profile = Profile::default();
            profile.set_namespace(attrs.get("namespace").cloned());
            profile.set_key(attrs.get("key").cloned());
            profile.set_origin(attrs.get("origin").cloned());
            Ok(Frame::Profile(profile))
        }
        ("stdin" | "stdout" | "stderr", Frame::Job(job)) => {
            let file = filename_from(&attrs, position)?;
            match tag.as_str() {
                "stdin" => job.set_stdin(Some(file)),
                "stdout" => job.set_stdout(Some(file)),
                _ => job.set_stderr(Some(file)),
            }
            Ok(Frame::Other)
        }
        ("uses", Frame::Job(job)) => {
            job.add_uses(filename_from(&attrs, position)?);
            Ok(Frame::Other)
        }
        ("child", Frame::Document) => {
            let id = required(&attrs, "ref", "child", position)?;
            Ok(Frame::Child(Child::new(id)))
        }
        ("parent", Frame::Child(child)) => {
            child.add_parent(required(&attrs, "ref", "parent", position)?);
            Ok(Frame::Other)
        }
        _ => {
            warn!(element = %tag, position, "ignoring unexpected element in DAX");
            Ok(Frame::Other)
        }
    }
}

/// Completes a frame, handing finished pieces to their owner.
fn close<C: DaxCallback>(frame: Frame, stack: &mut [Frame], callback: &mut C) {
    match frame {
        Frame::Job(job) => callback.on_job(job),
        Frame::Child(child) => callback.on_child(child),
        Frame::Profile(profile) => {
            if let Some(Frame::Job(job)) = stack.last_mut() {
                job.add_profile(profile);
            }
        }
        Frame::Document | Frame::Argument | Frame::Other => {}
    }
}

/// Appends character data to the argument line or profile value being read.
fn add_text(stack: &mut [Frame], text: &str) {
    if text.is_empty() {
        return;
    }
    match stack.last_mut() {
        Some(Frame::Profile(profile)) => match profile.leaves().last() {
            Some(Leaf::Text(t)) => {
                let index = profile.leaves().len() - 1;
                let mut merged = t.clone();
                merged.append(text);
                profile.set_leaf(index, merged);
            }
            _ => profile.add_leaf(Leaf::text(text)),
        },
        Some(Frame::Argument) => {
            if let Some(job) = enclosing_job(stack) {
                match job.arguments().last() {
                    Some(Leaf::Text(t)) => {
                        let index = job.arguments().len() - 1;
                        let mut merged = t.clone();
                        merged.append(text);
                        job.set_argument(index, merged);
                    }
                    _ => job.add_argument(Leaf::text(text)),
                }
            }
        }
        _ => {}
    }
}

/// The job that owns the argument frame on top of the stack.
fn enclosing_job(stack: &mut [Frame]) -> Option<&mut Job> {
    stack.iter_mut().rev().find_map(|frame| match frame {
        Frame::Job(job) => Some(job),
        _ => None,
    })
}

fn attributes(e: &BytesStart<'_>, position: usize) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| DaxError::Xml {
            position,
            source: err.into(),
        })?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|source| DaxError::Xml { position, source })?
            .into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

fn required(
    attrs: &HashMap<String, String>,
    key: &str,
    element: &str,
    position: usize,
) -> Result<String> {
    attrs.get(key).cloned().ok_or_else(|| {
        structure(
            position,
            format!("<{element}> is missing required attribute '{key}'"),
        )
    })
}

fn parse_number<T: std::str::FromStr>(
    attrs: &HashMap<String, String>,
    key: &str,
    position: usize,
) -> Result<Option<T>> {
    match attrs.get(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            structure(position, format!("attribute '{key}' is not a number: '{raw}'"))
        }),
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1")
}

fn filename_from(attrs: &HashMap<String, String>, position: usize) -> Result<Filename> {
    let name = attrs
        .get("file")
        .or_else(|| attrs.get("name"))
        .cloned()
        .ok_or_else(|| structure(position, "file reference without a 'file' attribute"))?;

    let mut file = Filename::new(name);
    if let Some(link) = attrs.get("link") {
        file.set_link(link.parse::<LinkType>()?);
    }
    if let Some(register) = attrs.get("register") {
        file.set_register(parse_bool(register));
    } else if let Some(dont) = attrs.get("dontRegister") {
        file.set_register(!parse_bool(dont));
    }
    if let Some(transfer) = attrs.get("transfer").or_else(|| attrs.get("dontTransfer")) {
        file.set_transfer(transfer.parse()?);
    }
    if let Some(optional) = attrs.get("optional") {
        file.set_optional(parse_bool(optional));
    }
    if let Some(kind) = attrs.get("type") {
        file.set_file_type(kind.parse()?);
    }
    file.set_temporary_hint(attrs.get("temporaryHint").cloned());
    file.set_variable(attrs.get("varname").cloned());
    Ok(file)
}

fn job_from(attrs: &HashMap<String, String>, position: usize) -> Result<Job> {
    let id = required(attrs, "id", "job", position)?;
    let name = required(attrs, "name", "job", position)?;
    let mut job = Job::new(id, name);
    job.set_namespace(attrs.get("namespace").cloned());
    job.set_version(attrs.get("version").cloned());
    if let Some(level) = parse_number::<i32>(attrs, "level", position)? {
        job.set_level(level);
    }
    job.set_chain(attrs.get("compound").cloned());
    if attrs.contains_key("dv-name") {
        job.set_derivation(
            attrs.get("dv-namespace").cloned(),
            attrs.get("dv-name").cloned(),
            attrs.get("dv-version").cloned(),
        );
    }
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename::TransferMode;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<adag xmlns="https://pegasus.isi.edu/schema/DAX" version="2.1" count="2" index="1" name="black">
  <filename file="f.a" link="input" register="true" transfer="optional" optional="false" type="data"/>
  <job id="ID1" namespace="ns" name="preprocess" version="1.0" level="2">
    <argument>-a top -i <filename file="f.a"/> -o &lt;x&gt;</argument>
    <profile namespace="env" key="HOME" origin="user">/home/<filename file="u"/></profile>
    <stdout file="out.txt" link="output"/>
    <uses file="f.a" link="input" register="false" transfer="true" type="data"/>
  </job>
  <job id="ID2" name="analyze"/>
  <child ref="ID2">
    <parent ref="ID1"/>
  </child>
  <child ref="ID1"/>
</adag>
"#;

    #[test]
    fn test_parse_sample() {
        let dag = parse_str(SAMPLE).unwrap();
        assert_eq!(dag.name(), Some("black"));
        assert_eq!(dag.count(), 2);
        assert_eq!(dag.index(), 1);
        assert_eq!(dag.file_count(), 1);
        assert_eq!(dag.job_count(), 2);

        let f = dag.filename("f.a").unwrap();
        assert_eq!(f.transfer(), TransferMode::Optional);

        let job = dag.job("ID1").unwrap();
        assert_eq!(job.level(), 2);
        assert_eq!(job.transformation(), "ns::preprocess:1.0");
        assert_eq!(job.arguments().len(), 3);
        assert_eq!(job.argument_line(), "-a top -i f.a -o <x>");
        assert_eq!(job.profile("env", "HOME").unwrap().value(), "/home/u");
        assert_eq!(job.profile("env", "HOME").unwrap().origin(), Some("user"));
        assert_eq!(job.stdout().map(Filename::name), Some("out.txt"));
        assert!(!job.uses()[0].register());

        assert!(dag.child("ID2").unwrap().has_parent("ID1"));
        assert_eq!(dag.child("ID1").unwrap().parent_count(), 0);
    }

    #[test]
    fn test_missing_job_id_is_structural_error() {
        let xml = r#"<adag><job name="x"/></adag>"#;
        assert!(matches!(parse_str(xml), Err(DaxError::Structure { .. })));
    }

    #[test]
    fn test_bad_link_value() {
        let xml = r#"<adag><filename file="a" link="sideways"/></adag>"#;
        assert!(matches!(
            parse_str(xml),
            Err(DaxError::InvalidArgument { kind: "link", .. })
        ));
    }

    #[test]
    fn test_wrong_root() {
        assert!(parse_str("<pdag/>").is_err());
        assert!(parse_str("").is_err());
    }

    #[test]
    fn test_second_root_rejected() {
        let xml = r#"<adag name="one"><job id="a" name="x"/></adag><adag name="two"/>"#;
        assert!(matches!(parse_str(xml), Err(DaxError::Structure { .. })));
    }

    #[test]
    fn test_malformed_xml() {
        let xml = r#"<adag><job id="a" name="b"></adag>"#;
        assert!(parse_str(xml).is_err());
    }

    #[derive(Default)]
    struct Counter {
        files: usize,
        jobs: usize,
        children: usize,
        done: bool,
    }

    impl DaxCallback for Counter {
        fn on_filename(&mut self, _file: Filename) {
            self.files += 1;
        }
        fn on_job(&mut self, _job: Job) {
            self.jobs += 1;
        }
        fn on_child(&mut self, _child: Child) {
            self.children += 1;
        }
        fn on_done(&mut self) {
            self.done = true;
        }
    }

    #[test]
    fn test_custom_callback_sees_every_piece() {
        let mut counter = Counter::default();
        parse_with(SAMPLE, &mut counter).unwrap();
        assert_eq!((counter.files, counter.jobs, counter.children), (1, 2, 2));
        assert!(counter.done);
    }
}
