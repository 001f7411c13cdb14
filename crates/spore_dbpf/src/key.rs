//! Resource keys identifying the entries of a package.

use std::{fmt, str::FromStr};

use miette::Diagnostic;
use spore_registry::{NameRegistry, Table};
use thiserror::Error;

/// The `(group, instance, type)` triple identifying one resource.
///
/// Keys order lexicographically by group, then instance, then type. The canonical text form is
/// `GROUP!INSTANCE.TYPE` with every field as eight uppercase hex digits:
///
/// ```
/// use spore_dbpf::ResourceKey;
///
/// let key = ResourceKey::new(0x40626200, 0x1, 0x2F4E681C);
/// assert_eq!(key.to_string(), "40626200!00000001.2F4E681C");
/// assert_eq!("40626200!00000001.2F4E681C".parse::<ResourceKey>().unwrap(), key);
/// ```
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub group: u32,
    pub instance: u32,
    pub type_id: u32,
}

impl ResourceKey {
    pub const fn new(group: u32, instance: u32, type_id: u32) -> Self {
        Self {
            group,
            instance,
            type_id,
        }
    }

    /// Render the key with names from `registry`, e.g. `animations!sporemaster.prop`.
    ///
    /// Fields without a registered name are shown as `0x` prefixed hex.
    pub fn display_with<'a>(&'a self, registry: &'a NameRegistry) -> NamedKey<'a> {
        NamedKey {
            key: self,
            registry,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08X}!{:08X}.{:08X}",
            self.group, self.instance, self.type_id
        )
    }
}

impl FromStr for ResourceKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (group, rest) = s.split_once('!').ok_or(ParseKeyError::FieldCount)?;
        let (instance, type_id) = rest.split_once('.').ok_or(ParseKeyError::FieldCount)?;
        let separator = |c: char| c == '!' || c == '.';
        if group.contains(separator) || instance.contains('!') || type_id.contains(separator) {
            return Err(ParseKeyError::FieldCount);
        }

        Ok(Self {
            group: parse_field(group)?,
            instance: parse_field(instance)?,
            type_id: parse_field(type_id)?,
        })
    }
}

fn parse_field(field: &str) -> Result<u32, ParseKeyError> {
    if field.is_empty() {
        return Err(ParseKeyError::EmptyField);
    }
    if field.len() > 8 {
        return Err(ParseKeyError::FieldTooLong(field.to_owned()));
    }
    if !field.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ParseKeyError::NotHex(field.to_owned()));
    }
    u32::from_str_radix(field, 16).map_err(|_| ParseKeyError::NotHex(field.to_owned()))
}

/// A [`ResourceKey`] rendered with registry names, see [`ResourceKey::display_with`]
pub struct NamedKey<'a> {
    key: &'a ResourceKey,
    registry: &'a NameRegistry,
}

impl fmt::Display for NamedKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}!{}.{}",
            self.registry.lookup_or_hex(Table::File, self.key.group),
            self.registry.lookup_or_hex(Table::File, self.key.instance),
            self.registry.lookup_or_hex(Table::Type, self.key.type_id)
        )
    }
}

/// Text that is not a `GROUP!INSTANCE.TYPE` key
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum ParseKeyError {
    #[error("expected GROUP!INSTANCE.TYPE")]
    FieldCount,

    #[error("empty key field")]
    EmptyField,

    #[error("key field {0:?} is longer than 8 hex digits")]
    FieldTooLong(String),

    #[error("key field {0:?} is not hexadecimal")]
    NotHex(String),
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn render_pads_and_uppercases() {
        assert_eq!(
            ResourceKey::new(0x12345678, 0x9ABCDEF0, 0x11111111).to_string(),
            "12345678!9ABCDEF0.11111111"
        );
        assert_eq!(ResourceKey::new(0, 0xab, 1).to_string(), "00000000!000000AB.00000001");
    }

    #[test]
    fn parse_is_inverse_of_render() {
        let edges = [0, 1, 0x7FFF_FFFF, 0x8000_0000, 0xFFFF_FFFE, u32::MAX];
        for &group in &edges {
            for &instance in &edges {
                for &type_id in &edges {
                    let key = ResourceKey::new(group, instance, type_id);
                    assert_eq!(key.to_string().parse::<ResourceKey>(), Ok(key));
                }
            }
        }
    }

    #[test]
    fn parse_accepts_short_and_lowercase_fields() {
        assert_eq!(
            "1!2.2f4e681c".parse::<ResourceKey>(),
            Ok(ResourceKey::new(1, 2, 0x2F4E681C))
        );
    }

    #[test]
    fn parse_rejects_malformed_text() {
        assert_eq!("".parse::<ResourceKey>(), Err(ParseKeyError::FieldCount));
        assert_eq!("1.2.3".parse::<ResourceKey>(), Err(ParseKeyError::FieldCount));
        assert_eq!("1!2!3".parse::<ResourceKey>(), Err(ParseKeyError::FieldCount));
        assert_eq!("1!2.3.4".parse::<ResourceKey>(), Err(ParseKeyError::FieldCount));
        assert_eq!("1!.3".parse::<ResourceKey>(), Err(ParseKeyError::EmptyField));
        assert_eq!(
            "1!2.123456789".parse::<ResourceKey>(),
            Err(ParseKeyError::FieldTooLong("123456789".into()))
        );
        assert_eq!(
            "1!0x2.3".parse::<ResourceKey>(),
            Err(ParseKeyError::NotHex("0x2".into()))
        );
        assert_eq!(
            "1!+2.3".parse::<ResourceKey>(),
            Err(ParseKeyError::NotHex("+2".into()))
        );
    }

    #[test]
    fn ordering_is_group_instance_type() {
        let mut keys = vec![
            ResourceKey::new(2, 0, 0),
            ResourceKey::new(1, 5, 0),
            ResourceKey::new(1, 2, 9),
            ResourceKey::new(1, 2, 3),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ResourceKey::new(1, 2, 3),
                ResourceKey::new(1, 2, 9),
                ResourceKey::new(1, 5, 0),
                ResourceKey::new(2, 0, 0),
            ]
        );
    }

    #[test]
    fn display_with_registry_names() {
        let mut registry = NameRegistry::default();
        registry.table_mut(Table::File).insert("animations", 0xCF15F26A);
        registry.table_mut(Table::Type).insert("prop", 0x00B1B104);

        let key = ResourceKey::new(0xCF15F26A, 0x1234, 0x00B1B104);
        assert_eq!(
            key.display_with(&registry).to_string(),
            "animations!0x00001234.prop"
        );
    }
}
