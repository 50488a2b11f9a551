//! Source name encoding
//!
//! Attributes live in source-tree file names. A name is a sequence of
//! markers, the base name, then suffixes:
//!
//! ```text
//! file     [create_][encrypted_][private_][readonly_][executable_][dot_][literal_]NAME[.literal][.tmpl][<encrypted suffix>]
//! dir      [exact_][dot_][literal_]NAME
//! script   run_[onchange_][before_|after_][dot_][literal_]NAME[.literal][.tmpl]
//! symlink  symlink_[dot_][literal_]NAME[.literal][.tmpl]
//! remove   remove_[dot_][literal_]NAME
//! ```
//!
//! A leading `.` in the base name is written `dot_`. `literal_` escapes a
//! base name that starts with a marker, `.literal` one that ends in `.tmpl`
//! or `.literal`. Decoding is strict: anything the encoder would not have
//! produced is rejected, so decode then encode always gives back the same
//! bytes.
//!
//! # Examples
//!
//! ```
//! use hearth_engine::attr::Attr;
//! use hearth_engine::codec::{AttrCodec, SourceName};
//! use hearth_engine::entry::EntryType;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let codec = AttrCodec::default();
//! let name = codec.decode("private_dot_netrc.tmpl", false)?;
//! assert_eq!(name.base_name, ".netrc");
//! assert_eq!(name.entry_type, EntryType::File);
//! assert_eq!(name.attr, Attr::PRIVATE | Attr::TEMPLATE);
//! assert_eq!(codec.encode(&name)?, "private_dot_netrc.tmpl");
//! # Ok(())
//! # }
//! ```

use crate::attr::{Attr, RunOrder, ScriptAttr, ScriptCondition};
use crate::entry::EntryType;
use crate::error::{Error, Result};

const AFTER_PREFIX: &str = "after_";
const BEFORE_PREFIX: &str = "before_";
const CREATE_PREFIX: &str = "create_";
const DOT_PREFIX: &str = "dot_";
const ENCRYPTED_PREFIX: &str = "encrypted_";
const EXACT_PREFIX: &str = "exact_";
const EXECUTABLE_PREFIX: &str = "executable_";
const LITERAL_PREFIX: &str = "literal_";
const ONCHANGE_PREFIX: &str = "onchange_";
const PRIVATE_PREFIX: &str = "private_";
const READONLY_PREFIX: &str = "readonly_";
const REMOVE_PREFIX: &str = "remove_";
const RUN_PREFIX: &str = "run_";
const SYMLINK_PREFIX: &str = "symlink_";

const LITERAL_SUFFIX: &str = ".literal";
const TEMPLATE_SUFFIX: &str = ".tmpl";

/// Every marker, in the order a fully decorated file name would carry them
const KNOWN_PREFIXES: [&str; 14] = [
    CREATE_PREFIX,
    REMOVE_PREFIX,
    RUN_PREFIX,
    ONCHANGE_PREFIX,
    BEFORE_PREFIX,
    AFTER_PREFIX,
    SYMLINK_PREFIX,
    EXACT_PREFIX,
    ENCRYPTED_PREFIX,
    PRIVATE_PREFIX,
    READONLY_PREFIX,
    EXECUTABLE_PREFIX,
    DOT_PREFIX,
    LITERAL_PREFIX,
];

const FILE_ATTRS: Attr = Attr::ENCRYPTED
    .union(Attr::PRIVATE)
    .union(Attr::READONLY)
    .union(Attr::EXECUTABLE)
    .union(Attr::TEMPLATE)
    .union(Attr::CREATE);

/// A decoded source name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceName {
    /// Target name of the entry
    pub base_name: String,
    /// Entry kind
    pub entry_type: EntryType,
    /// Boolean attributes
    pub attr: Attr,
    /// Script attributes, default for non-scripts
    pub script: ScriptAttr,
}

impl SourceName {
    /// A name with no attributes
    pub fn new(base_name: impl Into<String>, entry_type: EntryType) -> Self {
        Self {
            base_name: base_name.into(),
            entry_type,
            attr: Attr::empty(),
            script: ScriptAttr::default(),
        }
    }

    /// Set the attributes
    #[must_use]
    pub fn with_attr(mut self, attr: Attr) -> Self {
        self.attr = attr;
        self
    }

    /// Set the script attributes
    #[must_use]
    pub fn with_script(mut self, script: ScriptAttr) -> Self {
        self.script = script;
        self
    }
}

fn starts_with_marker(name: &str) -> Option<&'static str> {
    KNOWN_PREFIXES
        .iter()
        .copied()
        .find(|prefix| name.starts_with(prefix))
}

fn needs_literal_suffix(name: &str) -> bool {
    name.ends_with(TEMPLATE_SUFFIX) || name.ends_with(LITERAL_SUFFIX)
}

/// Attributes each entry type may carry
fn allowed_attrs(entry_type: EntryType) -> Attr {
    match entry_type {
        EntryType::File => FILE_ATTRS,
        EntryType::Dir => Attr::EXACT,
        EntryType::Symlink | EntryType::Script => Attr::TEMPLATE,
        EntryType::Remove => Attr::empty(),
    }
}

/// Encoder/decoder for source names
#[derive(Debug, Clone)]
pub struct AttrCodec {
    encrypted_suffix: String,
}

impl Default for AttrCodec {
    fn default() -> Self {
        Self::new(".age")
    }
}

impl AttrCodec {
    /// Create a codec using `encrypted_suffix` for encrypted files
    pub fn new(encrypted_suffix: impl Into<String>) -> Self {
        Self {
            encrypted_suffix: encrypted_suffix.into(),
        }
    }

    /// Suffix carried by encrypted files
    pub fn encrypted_suffix(&self) -> &str {
        &self.encrypted_suffix
    }

    /// Encode a name and its attributes
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEncoding`] when the attributes are not valid
    /// for the entry type or the base name cannot be a path segment.
    pub fn encode(&self, name: &SourceName) -> Result<String> {
        let invalid = |reason: &str| Error::InvalidEncoding {
            name: name.base_name.clone(),
            reason: reason.to_string(),
        };

        let base = name.base_name.as_str();
        if base.is_empty() || base == "." || base == ".." || base.contains('/') {
            return Err(invalid("not a valid path segment"));
        }

        let disallowed = name.attr.difference(allowed_attrs(name.entry_type));
        if !disallowed.is_empty() {
            return Err(invalid(&format!(
                "attributes {disallowed} are not valid on a {}",
                name.entry_type
            )));
        }
        if name.entry_type != EntryType::Script && name.script != ScriptAttr::default() {
            return Err(invalid("script attributes on a non-script"));
        }

        let mut encoded = String::with_capacity(base.len() + 16);
        match name.entry_type {
            EntryType::File => {
                for (flag, prefix) in [
                    (Attr::CREATE, CREATE_PREFIX),
                    (Attr::ENCRYPTED, ENCRYPTED_PREFIX),
                    (Attr::PRIVATE, PRIVATE_PREFIX),
                    (Attr::READONLY, READONLY_PREFIX),
                    (Attr::EXECUTABLE, EXECUTABLE_PREFIX),
                ] {
                    if name.attr.contains(flag) {
                        encoded.push_str(prefix);
                    }
                }
            }
            EntryType::Dir => {
                if name.attr.is_exact() {
                    encoded.push_str(EXACT_PREFIX);
                }
            }
            EntryType::Script => {
                encoded.push_str(RUN_PREFIX);
                if name.script.condition == ScriptCondition::OnChange {
                    encoded.push_str(ONCHANGE_PREFIX);
                }
                match name.script.order {
                    RunOrder::Before => encoded.push_str(BEFORE_PREFIX),
                    RunOrder::During => {}
                    RunOrder::After => encoded.push_str(AFTER_PREFIX),
                }
            }
            EntryType::Symlink => encoded.push_str(SYMLINK_PREFIX),
            EntryType::Remove => encoded.push_str(REMOVE_PREFIX),
        }

        let rest = match base.strip_prefix('.') {
            Some(rest) => {
                encoded.push_str(DOT_PREFIX);
                rest
            }
            None => base,
        };
        if starts_with_marker(rest).is_some() {
            encoded.push_str(LITERAL_PREFIX);
        }
        encoded.push_str(rest);

        if Self::has_suffixes(name.entry_type) {
            if needs_literal_suffix(rest) {
                encoded.push_str(LITERAL_SUFFIX);
            }
            if name.attr.is_template() {
                encoded.push_str(TEMPLATE_SUFFIX);
            }
            if name.attr.is_encrypted() {
                encoded.push_str(&self.encrypted_suffix);
            }
        }

        Ok(encoded)
    }

    fn has_suffixes(entry_type: EntryType) -> bool {
        matches!(
            entry_type,
            EntryType::File | EntryType::Symlink | EntryType::Script
        )
    }

    /// Decode a source name
    ///
    /// `is_dir` selects the directory grammar.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEncoding`], [`Error::DuplicateAttribute`] or
    /// [`Error::InvalidAttributeOrder`] when `encoded` is not something
    /// [`AttrCodec::encode`] could have produced.
    pub fn decode(&self, encoded: &str, is_dir: bool) -> Result<SourceName> {
        let invalid = |reason: String| Error::InvalidEncoding {
            name: encoded.to_string(),
            reason,
        };

        let mut rest = encoded;
        let mut attr = Attr::empty();
        let mut script = ScriptAttr::default();

        let entry_type = if is_dir {
            if let Some(stripped) = rest.strip_prefix(REMOVE_PREFIX) {
                rest = stripped;
                EntryType::Remove
            } else {
                if let Some(stripped) = rest.strip_prefix(EXACT_PREFIX) {
                    rest = stripped;
                    attr |= Attr::EXACT;
                }
                EntryType::Dir
            }
        } else if let Some(stripped) = rest.strip_prefix(CREATE_PREFIX) {
            rest = stripped;
            attr |= Attr::CREATE;
            EntryType::File
        } else if let Some(stripped) = rest.strip_prefix(REMOVE_PREFIX) {
            rest = stripped;
            EntryType::Remove
        } else if let Some(stripped) = rest.strip_prefix(RUN_PREFIX) {
            rest = stripped;
            if let Some(stripped) = rest.strip_prefix(ONCHANGE_PREFIX) {
                rest = stripped;
                script.condition = ScriptCondition::OnChange;
            }
            if let Some(stripped) = rest.strip_prefix(BEFORE_PREFIX) {
                rest = stripped;
                script.order = RunOrder::Before;
            } else if let Some(stripped) = rest.strip_prefix(AFTER_PREFIX) {
                rest = stripped;
                script.order = RunOrder::After;
            }
            EntryType::Script
        } else if let Some(stripped) = rest.strip_prefix(SYMLINK_PREFIX) {
            rest = stripped;
            EntryType::Symlink
        } else {
            EntryType::File
        };

        if entry_type == EntryType::File {
            for (flag, prefix) in [
                (Attr::ENCRYPTED, ENCRYPTED_PREFIX),
                (Attr::PRIVATE, PRIVATE_PREFIX),
                (Attr::READONLY, READONLY_PREFIX),
                (Attr::EXECUTABLE, EXECUTABLE_PREFIX),
            ] {
                if let Some(stripped) = rest.strip_prefix(prefix) {
                    rest = stripped;
                    attr |= flag;
                }
            }
        }

        let dot = match rest.strip_prefix(DOT_PREFIX) {
            Some(stripped) => {
                rest = stripped;
                true
            }
            None => false,
        };
        let literal = match rest.strip_prefix(LITERAL_PREFIX) {
            Some(stripped) => {
                rest = stripped;
                true
            }
            None => false,
        };

        if !literal && let Some(marker) = starts_with_marker(rest) {
            return Err(self.misplaced_marker(encoded, marker, entry_type, attr, script));
        }
        if literal && starts_with_marker(rest).is_none() {
            return Err(invalid("unnecessary literal_ prefix".to_string()));
        }

        if Self::has_suffixes(entry_type) {
            if attr.is_encrypted() {
                rest = rest.strip_suffix(self.encrypted_suffix.as_str()).ok_or_else(|| {
                    invalid(format!(
                        "encrypted_ requires the {} suffix",
                        self.encrypted_suffix
                    ))
                })?;
            }
            if let Some(stripped) = rest.strip_suffix(TEMPLATE_SUFFIX) {
                rest = stripped;
                attr |= Attr::TEMPLATE;
            }
            if let Some(stripped) = rest.strip_suffix(LITERAL_SUFFIX) {
                rest = stripped;
                if !needs_literal_suffix(rest) {
                    return Err(invalid("unnecessary .literal suffix".to_string()));
                }
            } else if needs_literal_suffix(rest) {
                return Err(invalid(format!(
                    "a name ending in {TEMPLATE_SUFFIX} or {LITERAL_SUFFIX} must be escaped with {LITERAL_SUFFIX}"
                )));
            }
        }

        if rest.is_empty() {
            return Err(invalid("empty name".to_string()));
        }
        if rest.starts_with('.') && !dot {
            return Err(invalid("a leading dot must be written as dot_".to_string()));
        }

        let base_name = if dot {
            format!(".{rest}")
        } else {
            rest.to_string()
        };
        if base_name == "." || base_name == ".." {
            return Err(invalid("not a valid path segment".to_string()));
        }

        Ok(SourceName {
            base_name,
            entry_type,
            attr,
            script,
        })
    }

    /// Explain why a marker was found where the base name should start
    fn misplaced_marker(
        &self,
        encoded: &str,
        marker: &str,
        entry_type: EntryType,
        attr: Attr,
        script: ScriptAttr,
    ) -> Error {
        let repeated = match marker {
            CREATE_PREFIX => attr.is_create(),
            EXACT_PREFIX => attr.is_exact(),
            ENCRYPTED_PREFIX => attr.is_encrypted(),
            PRIVATE_PREFIX => attr.is_private(),
            READONLY_PREFIX => attr.is_readonly(),
            EXECUTABLE_PREFIX => attr.is_executable(),
            ONCHANGE_PREFIX => script.condition == ScriptCondition::OnChange,
            BEFORE_PREFIX | AFTER_PREFIX => script.order != RunOrder::During,
            _ => false,
        };
        if repeated {
            return Error::DuplicateAttribute {
                name: encoded.to_string(),
                attribute: marker.trim_end_matches('_').to_string(),
            };
        }

        let kind_only = match marker {
            EXACT_PREFIX => Some("directories"),
            CREATE_PREFIX | ENCRYPTED_PREFIX | PRIVATE_PREFIX | READONLY_PREFIX
            | EXECUTABLE_PREFIX => Some("files"),
            ONCHANGE_PREFIX | BEFORE_PREFIX | AFTER_PREFIX => Some("scripts"),
            _ => None,
        };
        let valid_here = match entry_type {
            EntryType::File => matches!(
                marker,
                CREATE_PREFIX
                    | ENCRYPTED_PREFIX
                    | PRIVATE_PREFIX
                    | READONLY_PREFIX
                    | EXECUTABLE_PREFIX
            ),
            EntryType::Script => matches!(marker, ONCHANGE_PREFIX | BEFORE_PREFIX | AFTER_PREFIX),
            _ => false,
        };

        if valid_here {
            let suggestion = self
                .encode(&SourceName {
                    base_name: "name".to_string(),
                    entry_type,
                    attr: attr | Self::flag_for(marker),
                    script,
                })
                .unwrap_or_default();
            return Error::InvalidAttributeOrder {
                name: encoded.to_string(),
                found: marker.to_string(),
                suggestion: format!("markers go in the order shown by '{suggestion}'"),
            };
        }

        Error::InvalidEncoding {
            name: encoded.to_string(),
            reason: match kind_only {
                Some(kinds) => format!("{marker} is only valid on {kinds}"),
                None => format!("misplaced {marker} marker, use literal_ to escape it"),
            },
        }
    }

    fn flag_for(marker: &str) -> Attr {
        match marker {
            CREATE_PREFIX => Attr::CREATE,
            ENCRYPTED_PREFIX => Attr::ENCRYPTED,
            PRIVATE_PREFIX => Attr::PRIVATE,
            READONLY_PREFIX => Attr::READONLY,
            EXECUTABLE_PREFIX => Attr::EXECUTABLE,
            _ => Attr::empty(),
        }
    }
}
