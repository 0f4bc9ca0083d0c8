//! Registry path parsing.
//!
//! Paths follow the grammar `[<view>:]<hive>\<segment>[\<segment>]*`, where
//! the optional view is `32` or `64` and the hive is one of the supported
//! root aliases. Key names are compared case-insensitively but keep the
//! case they were declared with.

use crate::error::ParseError;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Separator between path segments.
pub const SEPARATOR: char = '\\';

/// Supported predefined root keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Hive {
    /// HKEY_LOCAL_MACHINE.
    LocalMachine,

    /// HKEY_CLASSES_ROOT.
    ClassesRoot,
}

impl Hive {
    /// Resolves a root alias, ignoring case.
    ///
    /// Returns `None` for predefined roots that are not supported, such as
    /// `HKEY_USERS`.
    pub fn from_alias(alias: &str) -> Option<Self> {
        const ALIASES: [(&str, Hive); 4] = [
            ("HKLM", Hive::LocalMachine),
            ("HKEY_LOCAL_MACHINE", Hive::LocalMachine),
            ("HKCR", Hive::ClassesRoot),
            ("HKEY_CLASSES_ROOT", Hive::ClassesRoot),
        ];

        ALIASES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(alias))
            .map(|(_, hive)| *hive)
    }

    /// Short name used when displaying paths.
    pub fn short_name(&self) -> &'static str {
        match self {
            Hive::LocalMachine => "HKLM",
            Hive::ClassesRoot => "HKCR",
        }
    }

    /// Full predefined key name.
    pub fn long_name(&self) -> &'static str {
        match self {
            Hive::LocalMachine => "HKEY_LOCAL_MACHINE",
            Hive::ClassesRoot => "HKEY_CLASSES_ROOT",
        }
    }
}

/// Registry redirection view on 64-bit systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum View {
    /// Whatever view the process naturally sees.
    #[default]
    Default,

    /// The 32-bit view (`32:` prefix).
    Bits32,

    /// The 64-bit view (`64:` prefix).
    Bits64,
}

impl View {
    fn prefix(&self) -> &'static str {
        match self {
            View::Default => "",
            View::Bits32 => "32:",
            View::Bits64 => "64:",
        }
    }
}

/// Whether a path names a key or a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// Every segment is a key name.
    Key,

    /// The final segment is a value name, possibly empty for the default value.
    Value,
}

/// A parsed registry path.
///
/// For value paths the last segment is the value name; an empty last
/// segment denotes the key's unnamed default value. Equality, hashing and
/// ordering ignore the case of segments but respect hive and view exactly.
#[derive(Debug, Clone)]
pub struct RegistryPath {
    view: View,
    hive: Hive,
    segments: Vec<String>,
}

impl RegistryPath {
    /// Parses a declared path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty, names an unsupported hive,
    /// contains an empty key name, or is a value path without a value
    /// segment.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reg_reconcile::path::{Hive, PathKind, RegistryPath, View};
    ///
    /// let path = RegistryPath::parse(r"32:HKLM\Software\Vendor", PathKind::Key).unwrap();
    /// assert_eq!(path.view(), View::Bits32);
    /// assert_eq!(path.hive(), Hive::LocalMachine);
    /// assert_eq!(path.segments(), ["Software", "Vendor"]);
    /// ```
    pub fn parse(raw: &str, kind: PathKind) -> Result<Self, ParseError> {
        if raw.is_empty() {
            return Err(ParseError::Empty);
        }

        let (view, rest) = if let Some(rest) = raw.strip_prefix("32:") {
            (View::Bits32, rest)
        } else if let Some(rest) = raw.strip_prefix("64:") {
            (View::Bits64, rest)
        } else {
            (View::Default, raw)
        };

        if rest.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut parts = rest.split(SEPARATOR);
        // split always yields at least one item
        let root = parts.next().unwrap_or_default();
        let hive = Hive::from_alias(root)
            .ok_or_else(|| ParseError::UnsupportedHive(root.to_string()))?;

        let mut segments: Vec<String> = parts.map(str::to_string).collect();

        let name = match kind {
            PathKind::Key => None,
            PathKind::Value => {
                Some(segments.pop().ok_or_else(|| ParseError::MissingValueName(raw.to_string()))?)
            }
        };

        if segments.iter().any(String::is_empty) {
            return Err(ParseError::EmptySegment(raw.to_string()));
        }

        segments.extend(name);

        Ok(Self {
            view,
            hive,
            segments,
        })
    }

    /// Creates the path of a hive root.
    pub fn root(hive: Hive, view: View) -> Self {
        Self {
            view,
            hive,
            segments: Vec::new(),
        }
    }

    /// Returns the root hive.
    pub fn hive(&self) -> Hive {
        self.hive
    }

    /// Returns the bitness view.
    pub fn view(&self) -> View {
        self.view
    }

    /// Returns the path components below the hive.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns true if the path is the hive root itself.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the path one level up, or `None` for a hive root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let mut parent = self.clone();
        parent.segments.pop();
        Some(parent)
    }

    /// Returns the last segment, which is the value name for value paths.
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Appends a segment.
    pub fn join(&self, segment: &str) -> Self {
        let mut joined = self.clone();
        joined.segments.push(segment.to_string());
        joined
    }

    /// Returns the segments below the hive joined by the separator, as
    /// expected by the native registry API.
    pub fn subkey(&self) -> String {
        self.segments.join("\\")
    }

    fn folded(&self) -> impl Iterator<Item = String> + '_ {
        self.segments.iter().map(|s| fold(s))
    }
}

/// Case-folds a key or value name for comparison.
pub(crate) fn fold(name: &str) -> String {
    name.to_lowercase()
}

/// Compares two key or value names the way the registry does.
pub fn segment_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || fold(a) == fold(b)
}

impl PartialEq for RegistryPath {
    fn eq(&self, other: &Self) -> bool {
        self.view == other.view
            && self.hive == other.hive
            && self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| segment_eq(a, b))
    }
}

impl Eq for RegistryPath {}

impl Hash for RegistryPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.view.hash(state);
        self.hive.hash(state);
        self.segments.len().hash(state);
        for segment in self.folded() {
            segment.hash(state);
        }
    }
}

impl Ord for RegistryPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hive
            .cmp(&other.hive)
            .then(self.view.cmp(&other.view))
            .then_with(|| self.folded().cmp(other.folded()))
    }
}

impl PartialOrd for RegistryPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RegistryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.view.prefix(), self.hive.short_name())?;
        for segment in &self.segments {
            write!(f, "{}{}", SEPARATOR, segment)?;
        }
        Ok(())
    }
}
