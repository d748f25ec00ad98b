//! Logical file references and their transfer/registration policy.

use std::fmt::{self, Write};
use std::str::FromStr;

use crate::error::{DaxError, Result};
use crate::escape::{escape, quote, write_attr, write_opt_attr};

/// Include the `link` attribute in [`Filename::short_xml`].
pub const SHORT_LINK: u8 = 0x01;
/// Include `optional="true"` in [`Filename::short_xml`] for optional files.
pub const SHORT_OPTIONAL: u8 = 0x02;

/// Direction in which a job touches a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LinkType {
    #[default]
    None,
    Input,
    Output,
    InOut,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::None => "none",
            LinkType::Input => "input",
            LinkType::Output => "output",
            LinkType::InOut => "inout",
        }
    }
}

impl TryFrom<i32> for LinkType {
    type Error = DaxError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(LinkType::None),
            1 => Ok(LinkType::Input),
            2 => Ok(LinkType::Output),
            3 => Ok(LinkType::InOut),
            other => Err(DaxError::invalid("link", other.to_string())),
        }
    }
}

impl FromStr for LinkType {
    type Err = DaxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(LinkType::None),
            "input" | "in" => Ok(LinkType::Input),
            "output" | "out" => Ok(LinkType::Output),
            "inout" | "io" => Ok(LinkType::InOut),
            _ => Err(DaxError::invalid("link", s)),
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a file must, may, or must not be staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransferMode {
    #[default]
    Mandatory,
    Optional,
    Not,
}

impl TransferMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMode::Mandatory => "true",
            TransferMode::Optional => "optional",
            TransferMode::Not => "false",
        }
    }
}

impl TryFrom<i32> for TransferMode {
    type Error = DaxError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(TransferMode::Mandatory),
            1 => Ok(TransferMode::Optional),
            2 => Ok(TransferMode::Not),
            other => Err(DaxError::invalid("transfer", other.to_string())),
        }
    }
}

impl FromStr for TransferMode {
    type Err = DaxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "true" | "mandatory" => Ok(TransferMode::Mandatory),
            "optional" => Ok(TransferMode::Optional),
            "false" | "not" => Ok(TransferMode::Not),
            _ => Err(DaxError::invalid("transfer", s)),
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of thing a logical file name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileType {
    #[default]
    Data,
    Executable,
    Pattern,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Data => "data",
            FileType::Executable => "executable",
            FileType::Pattern => "pattern",
        }
    }
}

impl FromStr for FileType {
    type Err = DaxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "data" => Ok(FileType::Data),
            "executable" => Ok(FileType::Executable),
            "pattern" => Ok(FileType::Pattern),
            _ => Err(DaxError::invalid("type", s)),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical file referenced by a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filename {
    name: String,
    link: LinkType,
    register: bool,
    transfer: TransferMode,
    temporary_hint: Option<String>,
    optional: bool,
    file_type: FileType,
    variable: Option<String>,
}

impl Filename {
    /// A data file with no linkage, registered and mandatory to transfer.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: LinkType::None,
            register: true,
            transfer: TransferMode::Mandatory,
            temporary_hint: None,
            optional: false,
            file_type: FileType::Data,
            variable: None,
        }
    }

    pub fn with_link(name: impl Into<String>, link: LinkType) -> Self {
        Self {
            link,
            ..Self::new(name)
        }
    }

    /// A temporary file: never registered and never transferred.
    pub fn temporary(name: impl Into<String>, link: LinkType, hint: impl Into<String>) -> Self {
        Self {
            link,
            register: false,
            transfer: TransferMode::Not,
            temporary_hint: Some(hint.into()),
            ..Self::new(name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn link(&self) -> LinkType {
        self.link
    }

    pub fn set_link(&mut self, link: LinkType) {
        self.link = link;
    }

    pub fn register(&self) -> bool {
        self.register
    }

    pub fn set_register(&mut self, register: bool) {
        self.register = register;
    }

    pub fn transfer(&self) -> TransferMode {
        self.transfer
    }

    pub fn set_transfer(&mut self, transfer: TransferMode) {
        self.transfer = transfer;
    }

    pub fn temporary_hint(&self) -> Option<&str> {
        self.temporary_hint.as_deref()
    }

    pub fn set_temporary_hint(&mut self, hint: Option<String>) {
        self.temporary_hint = hint;
    }

    pub fn optional(&self) -> bool {
        self.optional
    }

    pub fn set_optional(&mut self, optional: bool) {
        self.optional = optional;
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn set_file_type(&mut self, file_type: FileType) {
        self.file_type = file_type;
    }

    pub fn variable(&self) -> Option<&str> {
        self.variable.as_deref()
    }

    pub fn set_variable(&mut self, variable: Option<String>) {
        self.variable = variable;
    }

    /// Folds another declaration of the same file into this one.
    ///
    /// Opposite linkage widens to [`LinkType::InOut`]. Restrictive hints stick:
    /// a later `dont_register = false` or a mandatory transfer never resets
    /// an earlier non-default setting.
    pub fn merge(
        &mut self,
        is_input: bool,
        temporary_hint: Option<&str>,
        dont_register: bool,
        transfer: TransferMode,
    ) {
        match (self.link, is_input) {
            (LinkType::Input, false) | (LinkType::Output, true) => self.link = LinkType::InOut,
            _ => {}
        }
        if let Some(hint) = temporary_hint {
            self.temporary_hint = Some(hint.to_string());
        }
        if dont_register {
            self.register = false;
        }
        if transfer != TransferMode::Mandatory {
            self.transfer = transfer;
        }
    }

    /// Whether the text form may omit the `|flags` suffix.
    pub fn is_abbreviatable(&self) -> bool {
        if self.optional {
            return false;
        }
        match self.temporary_hint {
            None => self.register && self.transfer == TransferMode::Mandatory,
            Some(_) => !self.register && self.transfer == TransferMode::Not,
        }
    }

    /// Writes the compact element used inside argument and profile content.
    pub fn short_xml<W: Write>(&self, out: &mut W, flags: u8) -> fmt::Result {
        out.write_str("<filename")?;
        write_attr(out, "file", &self.name)?;
        write_opt_attr(out, "varname", self.variable.as_deref())?;
        if flags & SHORT_LINK != 0 {
            write_attr(out, "link", self.link.as_str())?;
        }
        if flags & SHORT_OPTIONAL != 0 && self.optional {
            out.write_str(" optional=\"true\"")?;
        }
        out.write_str("/>")
    }

    /// Writes the full `<filename>` element with every policy attribute.
    pub fn write_xml<W: Write>(&self, out: &mut W) -> fmt::Result {
        out.write_str("<filename")?;
        write_attr(out, "file", &self.name)?;
        write_opt_attr(out, "varname", self.variable.as_deref())?;
        write_attr(out, "link", self.link.as_str())?;
        write_attr(out, "register", bool_str(self.register))?;
        write_attr(out, "transfer", self.transfer.as_str())?;
        write_attr(out, "optional", bool_str(self.optional))?;
        write_attr(out, "type", self.file_type.as_str())?;
        write_opt_attr(out, "temporaryHint", self.temporary_hint.as_deref())?;
        out.write_str("/>")
    }

    /// Writes a job-level `<uses>` element.
    pub(crate) fn write_uses<W: Write>(&self, out: &mut W) -> fmt::Result {
        write!(
            out,
            "<uses file=\"{}\" link=\"{}\" register=\"{}\" transfer=\"{}\" type=\"{}\"",
            quote(&self.name, true),
            self.link,
            bool_str(self.register),
            self.transfer,
            self.file_type
        )?;
        if self.optional {
            out.write_str(" optional=\"true\"")?;
        }
        write_opt_attr(out, "temporaryHint", self.temporary_hint.as_deref())?;
        out.write_str("/>")
    }

    /// Writes a stdio binding such as `<stdout file=".." link=".."/>`.
    pub(crate) fn write_stdio<W: Write>(&self, out: &mut W, tag: &str) -> fmt::Result {
        write!(
            out,
            "<{} file=\"{}\" link=\"{}\"",
            tag,
            quote(&self.name, true),
            self.link
        )?;
        write_opt_attr(out, "varname", self.variable.as_deref())?;
        out.write_str("/>")
    }
}

impl fmt::Display for Filename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{{{}:\"{}", self.link, escape(&self.name))?;
        if let Some(hint) = &self.temporary_hint {
            write!(f, "\":\"{}", escape(hint))?;
        }
        f.write_char('"')?;

        if !self.is_abbreviatable() {
            f.write_char('|')?;
            if self.optional {
                f.write_char('o')?;
            }
            if self.register {
                f.write_char('r')?;
            }
            match self.transfer {
                TransferMode::Mandatory => f.write_char('t')?,
                TransferMode::Optional => f.write_char('T')?,
                TransferMode::Not => {}
            }
        }
        f.write_char('}')
    }
}

fn bool_str(b: bool) -> &'static str {
    if b { "true" } else { "false" }
}
